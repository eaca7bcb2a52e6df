//
// Copyright (c) Pirmin Kalberer. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.
//

use crate::core::error::{Error, Result};
use crate::raster::{GeoTiffDriver, GeoTransform, Raster, RasterDriver, RasterIo, WarpResampler};
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tile_grid::Extent;

/// Fresh, empty directory below the system temp dir
pub fn test_dir(name: &str) -> PathBuf {
    let dir = env::temp_dir().join(format!("mosaic_test_{}", name));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

pub fn raster<F>(extent: Extent, width: u32, height: u32, srid: i32, value: F) -> Raster
where
    F: Fn(u32, u32) -> f32,
{
    let mut data = Vec::with_capacity((width * height) as usize);
    for row in 0..height {
        for col in 0..width {
            data.push(value(col, row));
        }
    }
    Raster::new(
        width,
        height,
        GeoTransform::north_up(&extent, width, height),
        srid,
        data,
    )
    .unwrap()
}

pub fn write_tif(path: &Path, raster: &Raster) {
    GeoTiffDriver.write_band(raster, "band_data", path).unwrap();
}

/// GeoTIFF driver counting file accesses
#[derive(Default)]
pub struct CountingDriver {
    pub reads: AtomicUsize,
    pub writes: AtomicUsize,
}

impl CountingDriver {
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl RasterDriver for CountingDriver {
    fn extension(&self) -> &str {
        "tif"
    }
    fn band_names(&self, path: &Path) -> Result<Vec<String>> {
        GeoTiffDriver.band_names(path)
    }
    fn read_band(&self, path: &Path, band: &str) -> Result<Raster> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        GeoTiffDriver.read_band(path, band)
    }
    fn encode(&self, raster: &Raster, band: &str) -> Result<Vec<u8>> {
        GeoTiffDriver.encode(raster, band)
    }
    fn write_band(&self, raster: &Raster, band: &str, path: &Path) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        fs::write(path, self.encode(raster, band)?)?;
        Ok(())
    }
}

/// Driver failing after writing the first bytes of a file
pub struct FailingWriteDriver;

impl RasterDriver for FailingWriteDriver {
    fn extension(&self) -> &str {
        "tif"
    }
    fn band_names(&self, path: &Path) -> Result<Vec<String>> {
        GeoTiffDriver.band_names(path)
    }
    fn read_band(&self, path: &Path, band: &str) -> Result<Raster> {
        GeoTiffDriver.read_band(path, band)
    }
    fn encode(&self, raster: &Raster, band: &str) -> Result<Vec<u8>> {
        GeoTiffDriver.encode(raster, band)
    }
    fn write_band(&self, _raster: &Raster, _band: &str, path: &Path) -> Result<()> {
        fs::write(path, b"II*\0")?;
        Err(Error::Io(io::Error::new(io::ErrorKind::Other, "disk full")))
    }
}

pub fn io_with(driver: Arc<dyn RasterDriver>) -> RasterIo {
    RasterIo {
        driver,
        resampler: Arc::new(WarpResampler),
    }
}
