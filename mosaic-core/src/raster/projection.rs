//
// Copyright (c) Pirmin Kalberer. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.
//

//! Coordinate transformations between the supported reference systems

use crate::core::error::{Error, Result};
use proj4rs::proj::Proj;
use std::convert::TryFrom;
use tile_grid::Extent;

/// PROJ definition of an EPSG code from the crs-definitions database
pub fn proj_string(srid: i32) -> Option<&'static str> {
    u16::try_from(srid)
        .ok()
        .and_then(crs_definitions::from_code)
        .map(|def| def.proj4)
}

pub fn is_geographic(srid: i32) -> bool {
    proj_string(srid)
        .map(|s| s.contains("+proj=longlat"))
        .unwrap_or(false)
}

/// Fails for EPSG codes missing in the database
pub fn check_epsg(srid: i32) -> Result<()> {
    projection(srid).map(|_| ())
}

/// Point transformation from `src` to `dst` reference system
pub struct Transformer {
    src: Option<(Proj, bool)>,
    dst: Option<(Proj, bool)>,
}

fn projection(srid: i32) -> Result<(Proj, bool)> {
    let def = proj_string(srid)
        .ok_or_else(|| Error::Projection(format!("Unknown EPSG code {}", srid)))?;
    let proj = Proj::from_proj_string(def)
        .map_err(|e| Error::Projection(format!("EPSG:{}: {:?}", srid, e)))?;
    Ok((proj, is_geographic(srid)))
}

impl Transformer {
    pub fn new(src: i32, dst: i32) -> Result<Transformer> {
        if src == dst {
            return Ok(Transformer {
                src: None,
                dst: None,
            });
        }
        Ok(Transformer {
            src: Some(projection(src)?),
            dst: Some(projection(dst)?),
        })
    }

    pub fn is_identity(&self) -> bool {
        self.src.is_none()
    }

    pub fn transform(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let (src, dst) = match (&self.src, &self.dst) {
            (Some(src), Some(dst)) => (src, dst),
            _ => return Ok((x, y)),
        };
        // proj4rs works in radians for geographic systems
        let mut point = if src.1 {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };
        proj4rs::transform::transform(&src.0, &dst.0, &mut point)
            .map_err(|e| Error::Projection(format!("{:?}", e)))?;
        if dst.1 {
            Ok((point.0.to_degrees(), point.1.to_degrees()))
        } else {
            Ok((point.0, point.1))
        }
    }

    /// Bounding box of a transformed extent. The edges are densified with
    /// `densify` points each, points failing to transform are skipped.
    pub fn transform_extent(&self, extent: &Extent, densify: usize) -> Result<Extent> {
        if self.is_identity() {
            return Ok(extent.clone());
        }
        let n = densify.max(1);
        let mut points = Vec::with_capacity(4 * (n + 1));
        for i in 0..=n {
            let t = i as f64 / n as f64;
            let x = extent.minx + t * extent.width();
            let y = extent.miny + t * extent.height();
            points.push((x, extent.miny));
            points.push((x, extent.maxy));
            points.push((extent.minx, y));
            points.push((extent.maxx, y));
        }
        let mut bbox: Option<Extent> = None;
        for (x, y) in points {
            let (tx, ty) = match self.transform(x, y) {
                Ok(p) if p.0.is_finite() && p.1.is_finite() => p,
                _ => continue,
            };
            let p = Extent::new(tx, ty, tx, ty);
            bbox = Some(match bbox {
                None => p,
                Some(b) => b.union(&p),
            });
        }
        bbox.ok_or_else(|| Error::Projection("Extent can not be transformed".to_string()))
    }
}
