//
// Copyright (c) Pirmin Kalberer. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.
//

use crate::core::error::{Error, Result};
use crate::raster::projection::Transformer;
use crate::raster::raster::{GeoTransform, Raster};
use rayon::prelude::*;
use std::str::FromStr;
use tile_grid::Extent;

/// Number of points per edge when transforming raster bounds
pub const DENSIFY_PTS: usize = 21;
/// Upper bound of sub-samples per axis for averaging
const MAX_SUPERSAMPLING: usize = 16;

#[derive(PartialEq, Clone, Copy, Debug)]
pub enum Resampling {
    Nearest,
    Bilinear,
    /// Mean of all source values within a target cell
    Average,
}

impl FromStr for Resampling {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "nearest" => Ok(Resampling::Nearest),
            "linear" | "bilinear" => Ok(Resampling::Bilinear),
            "average" => Ok(Resampling::Average),
            _ => Err(Error::Config(format!("Unknown resampling method '{}'", s))),
        }
    }
}

/// Target grid of a resampling operation
#[derive(PartialEq, Clone, Debug)]
pub struct GridSpec {
    pub width: u32,
    pub height: u32,
    pub transform: GeoTransform,
    pub srid: i32,
}

impl GridSpec {
    pub fn from_extent(extent: &Extent, width: u32, height: u32, srid: i32) -> GridSpec {
        GridSpec {
            width,
            height,
            transform: GeoTransform::north_up(extent, width, height),
            srid,
        }
    }
    pub fn extent(&self) -> Extent {
        let (x0, y0) = self.transform.pixel_to_coord(0.0, 0.0);
        let (x1, y1) = self
            .transform
            .pixel_to_coord(self.width as f64, self.height as f64);
        Extent::new(x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
    }
}

/// Raster resampling and reprojection
pub trait Resampler: Send + Sync {
    /// Resample `src` onto `target`. Target cells without source data are NaN.
    fn resample(&self, src: &Raster, target: &GridSpec, method: Resampling) -> Result<Raster>;
    /// Reproject keeping the number of pixels. The bounds are taken from the
    /// transformed source edges.
    fn reproject(&self, src: &Raster, srid: i32, method: Resampling) -> Result<Raster> {
        if src.srid == srid || src.is_empty() {
            return Ok(src.clone());
        }
        let transformer = Transformer::new(src.srid, srid)?;
        let extent = transformer.transform_extent(&src.extent(), DENSIFY_PTS)?;
        let target = GridSpec::from_extent(&extent, src.width, src.height, srid);
        let mut raster = self.resample(src, &target, method)?;
        raster.attrs = src.attrs.clone();
        Ok(raster)
    }
}

/// Inverse mapping resampler: every target cell looks up its source position
#[derive(Default, Clone, Debug)]
pub struct WarpResampler;

impl WarpResampler {
    fn bilinear(src: &Raster, col: f64, row: f64) -> f32 {
        if col < 0.0 || row < 0.0 || col >= src.width as f64 || row >= src.height as f64 {
            return f32::NAN;
        }
        // Position relative to cell centers
        let u = col - 0.5;
        let v = row - 0.5;
        let c0 = u.floor();
        let r0 = v.floor();
        let fx = u - c0;
        let fy = v - r0;
        let mut sum = 0.0;
        let mut weights = 0.0;
        for (dc, dr, w) in &[
            (0.0, 0.0, (1.0 - fx) * (1.0 - fy)),
            (1.0, 0.0, fx * (1.0 - fy)),
            (0.0, 1.0, (1.0 - fx) * fy),
            (1.0, 1.0, fx * fy),
        ] {
            let c = (c0 + dc).max(0.0).min(src.width as f64 - 1.0) as u32;
            let r = (r0 + dr).max(0.0).min(src.height as f64 - 1.0) as u32;
            let value = src.get(c, r);
            if *w > 0.0 && !value.is_nan() {
                sum += *w * value as f64;
                weights += *w;
            }
        }
        if weights > 0.0 {
            (sum / weights) as f32
        } else {
            src.get(
                col.floor().min(src.width as f64 - 1.0) as u32,
                row.floor().min(src.height as f64 - 1.0) as u32,
            )
        }
    }

    /// Source pixels covered by one target cell along each axis
    fn supersampling(src: &Raster, target: &GridSpec, transformer: &Transformer) -> usize {
        let col = target.width as f64 / 2.0;
        let row = target.height as f64 / 2.0;
        let corners = [
            target.transform.pixel_to_coord(col.floor(), row.floor()),
            target.transform.pixel_to_coord(col.floor() + 1.0, row.floor() + 1.0),
        ];
        let mut pixels = Vec::with_capacity(2);
        for (x, y) in corners.iter() {
            match transformer.transform(*x, *y) {
                Ok((sx, sy)) if sx.is_finite() && sy.is_finite() => {
                    pixels.push(src.transform.coord_to_pixel(sx, sy))
                }
                _ => return 1,
            }
        }
        let dx = (pixels[1].0 - pixels[0].0).abs();
        let dy = (pixels[1].1 - pixels[0].1).abs();
        (dx.max(dy).ceil() as usize).max(1).min(MAX_SUPERSAMPLING)
    }
}

impl Resampler for WarpResampler {
    fn resample(&self, src: &Raster, target: &GridSpec, method: Resampling) -> Result<Raster> {
        let mut out = Raster::filled(target, f32::NAN);
        out.attrs = src.attrs.clone();
        if src.is_empty() || out.is_empty() {
            return Ok(out);
        }
        let transformer = Transformer::new(target.srid, src.srid)?;
        let k = match method {
            Resampling::Average => Self::supersampling(src, target, &transformer),
            _ => 1,
        };
        let src_extent = src.extent();

        out.data
            .par_chunks_mut(target.width as usize)
            .enumerate()
            .for_each(|(row, line)| {
                for (col, cell) in line.iter_mut().enumerate() {
                    let mut sum = 0.0f64;
                    let mut count = 0usize;
                    for i in 0..k {
                        for j in 0..k {
                            let (x, y) = target.transform.pixel_to_coord(
                                col as f64 + (j as f64 + 0.5) / k as f64,
                                row as f64 + (i as f64 + 0.5) / k as f64,
                            );
                            let (sx, sy) = match transformer.transform(x, y) {
                                Ok(p) => p,
                                Err(_) => continue,
                            };
                            if !(sx >= src_extent.minx
                                && sx <= src_extent.maxx
                                && sy >= src_extent.miny
                                && sy <= src_extent.maxy)
                            {
                                continue;
                            }
                            let value = match method {
                                Resampling::Bilinear => {
                                    let (c, r) = src.transform.coord_to_pixel(sx, sy);
                                    Self::bilinear(src, c, r)
                                }
                                _ => src.sample(sx, sy),
                            };
                            if !value.is_nan() {
                                sum += value as f64;
                                count += 1;
                            }
                        }
                    }
                    if count > 0 {
                        *cell = (sum / count as f64) as f32;
                    }
                }
            });
        Ok(out)
    }
}
