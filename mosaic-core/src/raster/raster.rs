//
// Copyright (c) Pirmin Kalberer. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.
//

use crate::core::error::{Error, Result};
use crate::raster::resample::GridSpec;
use std::collections::BTreeMap;
use tile_grid::Extent;

/// Affine pixel to coordinate mapping without rotation.
/// A north-up raster has a negative `pixel_height`.
#[derive(PartialEq, Clone, Copy, Debug)]
pub struct GeoTransform {
    /// Coordinate of the outer corner of pixel (0, 0)
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// North-up transform covering `extent` with `width` x `height` pixels
    pub fn north_up(extent: &Extent, width: u32, height: u32) -> GeoTransform {
        GeoTransform {
            origin_x: extent.minx,
            origin_y: extent.maxy,
            pixel_width: extent.width() / width.max(1) as f64,
            pixel_height: -extent.height() / height.max(1) as f64,
        }
    }
    /// Coordinate of a (fractional) pixel position. Cell centers are at `col + 0.5`.
    pub fn pixel_to_coord(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.pixel_width,
            self.origin_y + row * self.pixel_height,
        )
    }
    /// Fractional pixel position of a coordinate
    pub fn coord_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.origin_x) / self.pixel_width,
            (y - self.origin_y) / self.pixel_height,
        )
    }
}

/// Single band raster with `f32` cells in row-major order. NaN marks missing data.
#[derive(Clone, Debug)]
pub struct Raster {
    pub width: u32,
    pub height: u32,
    pub transform: GeoTransform,
    pub srid: i32,
    pub data: Vec<f32>,
    /// Free form metadata carried along with the data
    pub attrs: BTreeMap<String, String>,
}

impl Raster {
    pub fn new(
        width: u32,
        height: u32,
        transform: GeoTransform,
        srid: i32,
        data: Vec<f32>,
    ) -> Result<Raster> {
        if data.len() != width as usize * height as usize {
            return Err(Error::Raster(format!(
                "{} cells do not fit into {}x{} raster",
                data.len(),
                width,
                height
            )));
        }
        Ok(Raster {
            width,
            height,
            transform,
            srid,
            data,
            attrs: BTreeMap::new(),
        })
    }
    /// Raster with all cells set to `value`
    pub fn filled(spec: &GridSpec, value: f32) -> Raster {
        Raster {
            width: spec.width,
            height: spec.height,
            transform: spec.transform,
            srid: spec.srid,
            data: vec![value; spec.width as usize * spec.height as usize],
            attrs: BTreeMap::new(),
        }
    }
    /// Zero-sized raster returned for regions without data
    pub fn empty() -> Raster {
        Raster {
            width: 0,
            height: 0,
            transform: GeoTransform {
                origin_x: 0.0,
                origin_y: 0.0,
                pixel_width: 1.0,
                pixel_height: -1.0,
            },
            srid: 0,
            data: Vec::new(),
            attrs: BTreeMap::new(),
        }
    }
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
    /// Outer edges of the raster cells
    pub fn extent(&self) -> Extent {
        let (x0, y0) = self.transform.pixel_to_coord(0.0, 0.0);
        let (x1, y1) = self
            .transform
            .pixel_to_coord(self.width as f64, self.height as f64);
        Extent {
            minx: x0.min(x1),
            miny: y0.min(y1),
            maxx: x0.max(x1),
            maxy: y0.max(y1),
        }
    }
    pub fn get(&self, col: u32, row: u32) -> f32 {
        self.data[row as usize * self.width as usize + col as usize]
    }
    pub fn set(&mut self, col: u32, row: u32, value: f32) {
        let idx = row as usize * self.width as usize + col as usize;
        self.data[idx] = value;
    }
    /// Number of cells holding data
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| !v.is_nan()).count()
    }
    pub fn grid_spec(&self) -> GridSpec {
        GridSpec {
            width: self.width,
            height: self.height,
            transform: self.transform,
            srid: self.srid,
        }
    }
    /// Copy with rows running north to south and columns west to east
    pub fn north_up(&self) -> Raster {
        let flip_x = self.transform.pixel_width < 0.0;
        let flip_y = self.transform.pixel_height > 0.0;
        if !flip_x && !flip_y {
            return self.clone();
        }
        let mut oriented = self.clone();
        for row in 0..self.height {
            for col in 0..self.width {
                let src_col = if flip_x { self.width - 1 - col } else { col };
                let src_row = if flip_y { self.height - 1 - row } else { row };
                oriented.set(col, row, self.get(src_col, src_row));
            }
        }
        oriented.transform = GeoTransform::north_up(&self.extent(), self.width, self.height);
        oriented
    }
    /// Value of the cell containing a coordinate, NaN outside
    pub fn sample(&self, x: f64, y: f64) -> f32 {
        let (col, row) = self.transform.coord_to_pixel(x, y);
        let (col, row) = (col.floor(), row.floor());
        if col < 0.0 || row < 0.0 || col >= self.width as f64 || row >= self.height as f64 {
            return f32::NAN;
        }
        self.get(col as u32, row as u32)
    }
}

/// Combine rasters into one covering the union of their extents.
/// The output uses the pixel size of the first raster. Where rasters
/// overlap the first one holding data wins.
pub fn merge(rasters: &[Raster]) -> Result<Raster> {
    let rasters: Vec<&Raster> = rasters.iter().filter(|r| !r.is_empty()).collect();
    let first = match rasters.first() {
        Some(first) => *first,
        None => return Ok(Raster::empty()),
    };
    if rasters.len() == 1 {
        return Ok(first.clone());
    }
    if let Some(other) = rasters.iter().find(|r| r.srid != first.srid) {
        return Err(Error::Raster(format!(
            "Cannot merge rasters with SRID {} and {}",
            first.srid, other.srid
        )));
    }
    let extents: Vec<Extent> = rasters.iter().map(|r| r.extent()).collect();
    let extent = match Extent::union_all(&extents) {
        Some(extent) => extent,
        None => return Ok(Raster::empty()),
    };
    let xres = first.transform.pixel_width.abs();
    let yres = first.transform.pixel_height.abs();
    let width = (extent.width() / xres).round().max(1.0) as u32;
    let height = (extent.height() / yres).round().max(1.0) as u32;
    let spec = GridSpec::from_extent(&extent, width, height, first.srid);
    let mut merged = Raster::filled(&spec, f32::NAN);
    merged.attrs = first.attrs.clone();

    for row in 0..height {
        for col in 0..width {
            let (x, y) = spec
                .transform
                .pixel_to_coord(col as f64 + 0.5, row as f64 + 0.5);
            let value = rasters
                .iter()
                .map(|r| r.sample(x, y))
                .find(|v| !v.is_nan())
                .unwrap_or(f32::NAN);
            merged.set(col, row, value);
        }
    }
    Ok(merged)
}
