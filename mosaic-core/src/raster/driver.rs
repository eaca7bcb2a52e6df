//
// Copyright (c) Pirmin Kalberer. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.
//

use crate::core::error::Result;
use crate::raster::geotiff::GeoTiffDriver;
use crate::raster::raster::Raster;
use crate::raster::resample::{Resampler, WarpResampler};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Raster file format access
pub trait RasterDriver: Send + Sync {
    /// File extension handled by this driver, without leading dot
    fn extension(&self) -> &str;
    /// Band names stored in a file
    fn band_names(&self, path: &Path) -> Result<Vec<String>>;
    fn read_band(&self, path: &Path, band: &str) -> Result<Raster>;
    /// Serialize a single band
    fn encode(&self, raster: &Raster, band: &str) -> Result<Vec<u8>>;
    fn write_band(&self, raster: &Raster, band: &str, path: &Path) -> Result<()> {
        let data = self.encode(raster, band)?;
        fs::write(path, data)?;
        Ok(())
    }
}

/// File access and resampling used by raster datasets
#[derive(Clone)]
pub struct RasterIo {
    pub driver: Arc<dyn RasterDriver>,
    pub resampler: Arc<dyn Resampler>,
}

impl Default for RasterIo {
    fn default() -> Self {
        RasterIo {
            driver: Arc::new(GeoTiffDriver),
            resampler: Arc::new(WarpResampler),
        }
    }
}
