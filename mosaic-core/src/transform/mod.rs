//
// Copyright (c) Pirmin Kalberer. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.
//

//! Named data transforms applied after loading

use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::raster::projection;
use crate::raster::{GeoTransform, Raster, Resampler, Resampling};
use crate::vector::{SelectOperator, VectorLayer};
use std::collections::BTreeMap;
use toml::Value;

#[derive(Deserialize, Clone, Debug)]
pub struct TransformCfg {
    pub name: String,
    pub args: Option<Value>,
}

#[derive(PartialEq, Clone, Copy, Debug)]
pub enum DataType {
    Float32,
    Float64,
    Int8,
    Int16,
    Int32,
    UInt8,
    UInt16,
    UInt32,
}

#[derive(PartialEq, Clone, Copy, Debug)]
pub enum Axis {
    X,
    Y,
}

#[derive(PartialEq, Clone, Debug)]
pub enum Transform {
    ReprojectRaster { epsg: i32 },
    Cast { dtype: DataType },
    Squeeze { dim: Option<String> },
    OrientArray,
    FlipCoords { axis: Axis },
    /// Overview pyramid directive: zoom level -> pixel width
    BuildRasterOverviews { levels: BTreeMap<u8, u32> },
    /// Vector overview directive: zoom level -> simplify tolerance in layer units
    BuildVectorOverviews { levels: BTreeMap<u8, f64> },
    ReprojectVector { epsg: i32 },
    SelectByAttributes {
        field: String,
        value: serde_json::Value,
        operator: SelectOperator,
    },
    PolygonToLine,
    AddXyFields,
}

#[derive(Deserialize)]
struct EpsgArgs {
    epsg: i32,
}

#[derive(Deserialize)]
struct CastArgs {
    dtype: String,
}

#[derive(Deserialize)]
struct SqueezeArgs {
    dim: Option<String>,
}

#[derive(Deserialize)]
struct FlipArgs {
    dim: String,
}

#[derive(Deserialize)]
struct OverviewArgs {
    levels: BTreeMap<String, u32>,
}

#[derive(Deserialize)]
struct VectorOverviewArgs {
    levels: BTreeMap<String, f64>,
}

#[derive(Deserialize)]
struct SelectArgs {
    field: String,
    value: Value,
    #[serde(default = "default_operator")]
    operator: String,
}

fn default_operator() -> String {
    "IN".to_string()
}

fn args<'de, T: serde::Deserialize<'de>>(cfg: &TransformCfg) -> std::result::Result<T, String> {
    cfg.args
        .clone()
        .unwrap_or_else(|| Value::Table(Default::default()))
        .try_into::<T>()
        .map_err(|e| format!("Invalid arguments for transform '{}': {}", cfg.name, e))
}

fn check_epsg(epsg: i32) -> std::result::Result<i32, String> {
    projection::check_epsg(epsg)
        .map(|_| epsg)
        .map_err(|_| format!("Invalid EPSG {}", epsg))
}

fn parse_level(level: &str) -> std::result::Result<u8, String> {
    level
        .parse::<u8>()
        .map_err(|_| format!("Invalid overview level '{}'", level))
}

impl DataType {
    fn from_name(name: &str) -> std::result::Result<DataType, String> {
        match name {
            "float32" => Ok(DataType::Float32),
            "float64" => Ok(DataType::Float64),
            "int8" => Ok(DataType::Int8),
            "int16" => Ok(DataType::Int16),
            "int32" => Ok(DataType::Int32),
            "uint8" => Ok(DataType::UInt8),
            "uint16" => Ok(DataType::UInt16),
            "uint32" => Ok(DataType::UInt32),
            _ => Err(format!("Unsupported dtype '{}'", name)),
        }
    }
    /// Value as stored in this type. Integer types truncate and saturate, NaN becomes 0.
    pub fn convert(&self, v: f32) -> f32 {
        match self {
            DataType::Float32 | DataType::Float64 => v,
            DataType::Int8 => v as i8 as f32,
            DataType::Int16 => v as i16 as f32,
            DataType::Int32 => v as i32 as f32,
            DataType::UInt8 => v as u8 as f32,
            DataType::UInt16 => v as u16 as f32,
            DataType::UInt32 => v as u32 as f32,
        }
    }
}

impl<'a> Config<'a, TransformCfg> for Transform {
    fn from_config(cfg: &TransformCfg) -> std::result::Result<Self, String> {
        match cfg.name.as_str() {
            "reproject_raster" => {
                let a: EpsgArgs = args(cfg)?;
                Ok(Transform::ReprojectRaster {
                    epsg: check_epsg(a.epsg)?,
                })
            }
            "reproject_vector" => {
                let a: EpsgArgs = args(cfg)?;
                Ok(Transform::ReprojectVector {
                    epsg: check_epsg(a.epsg)?,
                })
            }
            "cast" => {
                let a: CastArgs = args(cfg)?;
                Ok(Transform::Cast {
                    dtype: DataType::from_name(&a.dtype)?,
                })
            }
            "squeeze" => {
                let a: SqueezeArgs = args(cfg)?;
                match a.dim.as_deref() {
                    None | Some("band") => Ok(Transform::Squeeze { dim: a.dim }),
                    Some(dim) => Err(format!(
                        "Can not squeeze dimension '{}' of a single band raster",
                        dim
                    )),
                }
            }
            "orient_array" => Ok(Transform::OrientArray),
            "flip_coords" => {
                let a: FlipArgs = args(cfg)?;
                let axis = match a.dim.as_str() {
                    "x" => Axis::X,
                    "y" => Axis::Y,
                    _ => return Err(format!("Unknown dimension '{}'", a.dim)),
                };
                Ok(Transform::FlipCoords { axis })
            }
            "build_raster_overviews" => {
                let a: OverviewArgs = args(cfg)?;
                let mut levels = BTreeMap::new();
                for (level, resolution) in a.levels {
                    let level = parse_level(&level)?;
                    if resolution == 0 {
                        return Err(format!("Invalid resolution for overview level {}", level));
                    }
                    levels.insert(level, resolution);
                }
                Ok(Transform::BuildRasterOverviews { levels })
            }
            "build_vector_overviews" => {
                let a: VectorOverviewArgs = args(cfg)?;
                let mut levels = BTreeMap::new();
                for (level, tolerance) in a.levels {
                    let level = parse_level(&level)?;
                    if !(tolerance.is_finite() && tolerance >= 0.0) {
                        return Err(format!("Invalid simplify tolerance for overview level {}", level));
                    }
                    levels.insert(level, tolerance);
                }
                Ok(Transform::BuildVectorOverviews { levels })
            }
            "select_by_attributes" => {
                let a: SelectArgs = args(cfg)?;
                let operator = a.operator.parse::<SelectOperator>()?;
                let value = serde_json::to_value(&a.value).map_err(|e| e.to_string())?;
                Ok(Transform::SelectByAttributes {
                    field: a.field,
                    value,
                    operator,
                })
            }
            "polygon_to_line" => Ok(Transform::PolygonToLine),
            "add_xy_fields" => Ok(Transform::AddXyFields),
            _ => Err(format!("Unknown transform '{}'", cfg.name)),
        }
    }
    fn gen_config() -> String {
        let toml = r#"
#[[dataset.transform]]
#name = "reproject_raster"
#args = { epsg = 3857 }
#[[dataset.transform]]
#name = "build_raster_overviews"
#args = { levels = { "0" = 256, "1" = 512, "2" = 1024 } }
#[[dataset.transform]]
#name = "build_vector_overviews"
#args = { levels = { "0" = 10000, "1" = 2500, "2" = 1250 } }
"#;
        toml.to_string()
    }
}

/// Resolve a transform chain. Unknown names are configuration errors.
pub fn transforms_from_config(cfgs: &[TransformCfg]) -> Result<Vec<Transform>> {
    cfgs.iter()
        .map(|cfg| Transform::from_config(cfg).map_err(Error::Config))
        .collect()
}

/// Pixel width of a world-wide overview at `level`, 256 pixels at level 0.
/// `None` if the width does not fit into `u32`.
pub fn default_overview_resolution(level: u8) -> Option<u32> {
    1u32.checked_shl(u32::from(level))
        .and_then(|factor| factor.checked_mul(256))
}

/// Configured raster overview levels. At most one overview directive is allowed.
pub fn overview_levels(transforms: &[Transform]) -> Result<Option<BTreeMap<u8, u32>>> {
    let mut directives = transforms.iter().filter_map(|t| match t {
        Transform::BuildRasterOverviews { levels } => Some(levels),
        _ => None,
    });
    let levels = directives.next().cloned();
    if directives.next().is_some() {
        return Err(Error::Config(
            "Only one build_raster_overviews transform is supported".to_string(),
        ));
    }
    Ok(levels)
}

/// Configured vector overview tolerances. At most one overview directive is allowed.
pub fn vector_overview_levels(transforms: &[Transform]) -> Result<Option<BTreeMap<u8, f64>>> {
    let mut directives = transforms.iter().filter_map(|t| match t {
        Transform::BuildVectorOverviews { levels } => Some(levels),
        _ => None,
    });
    let levels = directives.next().cloned();
    if directives.next().is_some() {
        return Err(Error::Config(
            "Only one build_vector_overviews transform is supported".to_string(),
        ));
    }
    Ok(levels)
}

impl Transform {
    pub fn name(&self) -> &'static str {
        match self {
            Transform::ReprojectRaster { .. } => "reproject_raster",
            Transform::Cast { .. } => "cast",
            Transform::Squeeze { .. } => "squeeze",
            Transform::OrientArray => "orient_array",
            Transform::FlipCoords { .. } => "flip_coords",
            Transform::BuildRasterOverviews { .. } => "build_raster_overviews",
            Transform::BuildVectorOverviews { .. } => "build_vector_overviews",
            Transform::ReprojectVector { .. } => "reproject_vector",
            Transform::SelectByAttributes { .. } => "select_by_attributes",
            Transform::PolygonToLine => "polygon_to_line",
            Transform::AddXyFields => "add_xy_fields",
        }
    }

    pub fn is_vector(&self) -> bool {
        match self {
            Transform::ReprojectVector { .. }
            | Transform::SelectByAttributes { .. }
            | Transform::PolygonToLine
            | Transform::AddXyFields
            | Transform::BuildVectorOverviews { .. } => true,
            _ => false,
        }
    }

    pub fn apply_raster(&self, raster: Raster, resampler: &dyn Resampler) -> Result<Raster> {
        if raster.is_empty() {
            return Ok(raster);
        }
        match self {
            Transform::ReprojectRaster { epsg } => {
                resampler.reproject(&raster, *epsg, Resampling::Nearest)
            }
            Transform::Cast { dtype } => {
                let mut raster = raster;
                for v in raster.data.iter_mut() {
                    *v = dtype.convert(*v);
                }
                Ok(raster)
            }
            Transform::Squeeze { .. } => Ok(raster),
            Transform::OrientArray => Ok(raster.north_up()),
            Transform::FlipCoords { axis } => {
                let mut raster = raster;
                let t = raster.transform;
                raster.transform = match axis {
                    Axis::X => GeoTransform {
                        origin_x: t.origin_x + raster.width as f64 * t.pixel_width,
                        pixel_width: -t.pixel_width,
                        ..t
                    },
                    Axis::Y => GeoTransform {
                        origin_y: t.origin_y + raster.height as f64 * t.pixel_height,
                        pixel_height: -t.pixel_height,
                        ..t
                    },
                };
                Ok(raster)
            }
            Transform::BuildRasterOverviews { .. } => Ok(raster),
            _ => Err(Error::Config(format!(
                "Transform '{}' can not be applied to raster data",
                self.name()
            ))),
        }
    }

    pub fn apply_vector(&self, layer: VectorLayer) -> Result<VectorLayer> {
        match self {
            Transform::ReprojectVector { epsg } => layer.reproject(*epsg),
            Transform::SelectByAttributes {
                field,
                value,
                operator,
            } => Ok(layer.select(field, value, *operator)),
            Transform::PolygonToLine => Ok(layer.polygon_to_line()),
            Transform::AddXyFields => Ok(layer.add_xy_fields()),
            Transform::BuildVectorOverviews { .. } => Ok(layer),
            _ => Err(Error::Config(format!(
                "Transform '{}' can not be applied to vector data",
                self.name()
            ))),
        }
    }
}

/// Apply a transform chain to raster data. The overview directive is skipped.
pub fn apply_raster_transforms(
    raster: Raster,
    transforms: &[Transform],
    resampler: &dyn Resampler,
) -> Result<Raster> {
    transforms
        .iter()
        .filter(|t| match t {
            Transform::BuildRasterOverviews { .. } => false,
            _ => true,
        })
        .try_fold(raster, |raster, t| t.apply_raster(raster, resampler))
}

/// Apply a transform chain to vector data. The overview directive is skipped.
pub fn apply_vector_transforms(layer: VectorLayer, transforms: &[Transform]) -> Result<VectorLayer> {
    transforms
        .iter()
        .try_fold(layer, |layer, t| t.apply_vector(layer))
}
