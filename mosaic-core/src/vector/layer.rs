//
// Copyright (c) Pirmin Kalberer. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.
//

use crate::core::error::{Error, Result};
use crate::raster::projection::Transformer;
use geo::{LineString, Simplify};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tile_grid::Extent;

pub type Coord = (f64, f64);

#[derive(PartialEq, Clone, Debug)]
pub enum Geometry {
    Points(Vec<Coord>),
    Lines(Vec<Vec<Coord>>),
    /// Polygons with exterior ring first, followed by holes
    Polygons(Vec<Vec<Vec<Coord>>>),
}

#[derive(Clone, Debug)]
pub struct VectorFeature {
    pub geometry: Geometry,
    pub properties: Map<String, Value>,
}

#[derive(Clone, Debug)]
pub struct VectorLayer {
    pub features: Vec<VectorFeature>,
    pub srid: i32,
}

#[derive(PartialEq, Clone, Copy, Debug)]
pub enum SelectOperator {
    In,
    NotIn,
    Equals,
    NotEquals,
    Lt,
    Gt,
    Lte,
    Gte,
}

impl FromStr for SelectOperator {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, String> {
        match s {
            "IN" => Ok(SelectOperator::In),
            "NOT IN" => Ok(SelectOperator::NotIn),
            "EQUALS" => Ok(SelectOperator::Equals),
            "NOT EQUALS" => Ok(SelectOperator::NotEquals),
            "LT" => Ok(SelectOperator::Lt),
            "GT" => Ok(SelectOperator::Gt),
            "LTE" => Ok(SelectOperator::Lte),
            "GTE" => Ok(SelectOperator::Gte),
            _ => Err(format!("Unknown operator '{}'", s)),
        }
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn contains(list: &Value, v: &Value) -> bool {
    match list {
        Value::Array(items) => items
            .iter()
            .any(|item| compare(item, v) == Some(Ordering::Equal)),
        single => compare(single, v) == Some(Ordering::Equal),
    }
}

impl SelectOperator {
    /// Whether a property value passes the filter. Missing values only pass negations.
    pub fn matches(&self, prop: Option<&Value>, value: &Value) -> bool {
        let prop = match prop {
            Some(Value::Null) | None => {
                return *self == SelectOperator::NotIn || *self == SelectOperator::NotEquals
            }
            Some(prop) => prop,
        };
        let ord = compare(prop, value);
        match self {
            SelectOperator::In => contains(value, prop),
            SelectOperator::NotIn => !contains(value, prop),
            SelectOperator::Equals => ord == Some(Ordering::Equal),
            SelectOperator::NotEquals => ord != Some(Ordering::Equal),
            SelectOperator::Lt => ord == Some(Ordering::Less),
            SelectOperator::Gt => ord == Some(Ordering::Greater),
            SelectOperator::Lte => ord == Some(Ordering::Less) || ord == Some(Ordering::Equal),
            SelectOperator::Gte => ord == Some(Ordering::Greater) || ord == Some(Ordering::Equal),
        }
    }
}

fn coord(v: &Value) -> Result<Coord> {
    match v.as_array().map(|a| a.as_slice()) {
        Some([x, y, ..]) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => Ok((x, y)),
            _ => Err(Error::Vector(format!("Invalid coordinate {}", v))),
        },
        _ => Err(Error::Vector(format!("Invalid coordinate {}", v))),
    }
}

fn coords(v: &Value) -> Result<Vec<Coord>> {
    v.as_array()
        .ok_or_else(|| Error::Vector(format!("Invalid coordinate list {}", v)))?
        .iter()
        .map(coord)
        .collect()
}

fn nested<T, F>(v: &Value, f: F) -> Result<Vec<T>>
where
    F: Fn(&Value) -> Result<T>,
{
    v.as_array()
        .ok_or_else(|| Error::Vector(format!("Invalid geometry coordinates {}", v)))?
        .iter()
        .map(f)
        .collect()
}

/// Douglas-Peucker simplification of a path. Paths which would end up
/// with less than `min_len` vertices are kept unchanged.
fn simplify_path(path: &[Coord], tolerance: f64, min_len: usize) -> Vec<Coord> {
    let line: LineString<f64> = path.iter().cloned().collect();
    let simplified: Vec<Coord> = line
        .simplify(&tolerance)
        .coords()
        .map(|c| (c.x, c.y))
        .collect();
    if simplified.len() < min_len {
        path.to_vec()
    } else {
        simplified
    }
}

impl Geometry {
    pub fn from_geojson(geom: &Value) -> Result<Geometry> {
        let c = &geom["coordinates"];
        match geom["type"].as_str() {
            Some("Point") => Ok(Geometry::Points(vec![coord(c)?])),
            Some("MultiPoint") => Ok(Geometry::Points(coords(c)?)),
            Some("LineString") => Ok(Geometry::Lines(vec![coords(c)?])),
            Some("MultiLineString") => Ok(Geometry::Lines(nested(c, coords)?)),
            Some("Polygon") => Ok(Geometry::Polygons(vec![nested(c, coords)?])),
            Some("MultiPolygon") => Ok(Geometry::Polygons(nested(c, |p| nested(p, coords))?)),
            other => Err(Error::Vector(format!(
                "Unsupported geometry type {:?}",
                other
            ))),
        }
    }

    fn coords(&self) -> Box<dyn Iterator<Item = &Coord> + '_> {
        match self {
            Geometry::Points(pts) => Box::new(pts.iter()),
            Geometry::Lines(lines) => Box::new(lines.iter().flatten()),
            Geometry::Polygons(polys) => Box::new(polys.iter().flatten().flatten()),
        }
    }

    fn coords_mut(&mut self) -> Box<dyn Iterator<Item = &mut Coord> + '_> {
        match self {
            Geometry::Points(pts) => Box::new(pts.iter_mut()),
            Geometry::Lines(lines) => Box::new(lines.iter_mut().flatten()),
            Geometry::Polygons(polys) => Box::new(polys.iter_mut().flatten().flatten()),
        }
    }

    pub fn bbox(&self) -> Option<Extent> {
        self.coords().fold(None, |acc, (x, y)| {
            let p = Extent::new(*x, *y, *x, *y);
            Some(match acc {
                None => p,
                Some(b) => b.union(&p),
            })
        })
    }

    pub fn simplify(&self, tolerance: f64) -> Geometry {
        match self {
            Geometry::Points(pts) => Geometry::Points(pts.clone()),
            Geometry::Lines(lines) => Geometry::Lines(
                lines
                    .iter()
                    .map(|line| simplify_path(line, tolerance, 2))
                    .collect(),
            ),
            Geometry::Polygons(polys) => Geometry::Polygons(
                polys
                    .iter()
                    .map(|rings| {
                        rings
                            .iter()
                            .map(|ring| simplify_path(ring, tolerance, 4))
                            .collect()
                    })
                    .collect(),
            ),
        }
    }
}

impl VectorFeature {
    pub fn bbox(&self) -> Option<Extent> {
        self.geometry.bbox()
    }
}

impl VectorLayer {
    /// Parse a GeoJSON FeatureCollection. Features without geometry are skipped.
    pub fn from_geojson(json: &str, srid: i32) -> Result<VectorLayer> {
        let doc: Value = serde_json::from_str(json)?;
        let kind = doc["type"].as_str().map(|s| s.to_string());
        let features = match kind.as_deref() {
            Some("FeatureCollection") => doc["features"]
                .as_array()
                .cloned()
                .unwrap_or_default(),
            Some("Feature") => vec![doc],
            _ => return Err(Error::Vector("Expected GeoJSON FeatureCollection".to_string())),
        };
        let mut layer = VectorLayer {
            features: Vec::with_capacity(features.len()),
            srid,
        };
        for feature in features {
            if feature["geometry"].is_null() {
                continue;
            }
            let geometry = Geometry::from_geojson(&feature["geometry"])?;
            let properties = feature["properties"]
                .as_object()
                .cloned()
                .unwrap_or_default();
            layer.features.push(VectorFeature {
                geometry,
                properties,
            });
        }
        Ok(layer)
    }

    pub fn read<P: AsRef<Path>>(path: P, srid: i32) -> Result<VectorLayer> {
        let json = fs::read_to_string(path.as_ref())?;
        debug!(
            "Reading vector layer {}",
            path.as_ref().display()
        );
        VectorLayer::from_geojson(&json, srid)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn full_extent(&self) -> Option<Extent> {
        Extent::union_all(&self.feature_extents())
    }

    pub fn feature_extents(&self) -> Vec<Extent> {
        self.features.iter().filter_map(|f| f.bbox()).collect()
    }

    pub fn reproject(mut self, srid: i32) -> Result<VectorLayer> {
        let transformer = Transformer::new(self.srid, srid)?;
        if !transformer.is_identity() {
            for feature in self.features.iter_mut() {
                for c in feature.geometry.coords_mut() {
                    *c = transformer.transform(c.0, c.1)?;
                }
            }
        }
        self.srid = srid;
        Ok(self)
    }

    pub fn select(mut self, field: &str, value: &Value, operator: SelectOperator) -> VectorLayer {
        self.features
            .retain(|f| operator.matches(f.properties.get(field), value));
        self
    }

    /// Replace polygons by their boundary rings
    pub fn polygon_to_line(mut self) -> VectorLayer {
        for feature in self.features.iter_mut() {
            if let Geometry::Polygons(polys) = &feature.geometry {
                let rings = polys.iter().flatten().cloned().collect();
                feature.geometry = Geometry::Lines(rings);
            }
        }
        self
    }

    /// Copy of the layer with simplified lines and polygon rings
    pub fn simplify(&self, tolerance: f64) -> VectorLayer {
        let features = self
            .features
            .iter()
            .map(|f| VectorFeature {
                geometry: f.geometry.simplify(tolerance),
                properties: f.properties.clone(),
            })
            .collect();
        VectorLayer {
            features,
            srid: self.srid,
        }
    }

    /// Store the coordinates of point features in the properties `X` and `Y`
    pub fn add_xy_fields(mut self) -> VectorLayer {
        for feature in self.features.iter_mut() {
            if let Geometry::Points(pts) = &feature.geometry {
                if let Some((x, y)) = pts.first() {
                    feature.properties.insert("X".to_string(), json!(x));
                    feature.properties.insert("Y".to_string(), json!(y));
                }
            }
        }
        self
    }
}
