//
// Copyright (c) Pirmin Kalberer. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.
//

use crate::core::error::Result;
use crate::datasource::datasource::DatasourceType;
use crate::datasource::raster_ds::render_onto;
use crate::multifile::MultiFileRaster;
use crate::raster::{GridSpec, Raster, Resampling, Transformer, DENSIFY_PTS};
use std::sync::Arc;
use tile_grid::Extent;

/// One band of a shared multi-file raster
pub struct MultiFileDatasource {
    pub raster: Arc<MultiFileRaster>,
    pub band: String,
    interpolate: Resampling,
}

impl MultiFileDatasource {
    /// Uses the first band of the dataset if `band` is not given
    pub fn new(raster: Arc<MultiFileRaster>, band: Option<String>, interpolate: Resampling) -> MultiFileDatasource {
        let band = band
            .or_else(|| raster.bands().first().cloned())
            .unwrap_or_default();
        MultiFileDatasource {
            raster,
            band,
            interpolate,
        }
    }
}

impl DatasourceType for MultiFileDatasource {
    fn srid(&self) -> Result<i32> {
        Ok(self.raster.grid().srid)
    }
    fn full_extent(&self) -> Result<Option<Extent>> {
        Ok(Some(self.raster.full_extent()))
    }
    fn render_region(&self, target: &GridSpec, level: Option<u8>) -> Result<Raster> {
        if let Some(level) = level {
            if let Some(overview) = self.raster.load_overview(level, &self.band)? {
                debug!("Using overview {} of {}", level, self.raster.pattern());
                return render_onto(&overview, target, self.interpolate, self.raster.io());
            }
        }
        let bounds = Transformer::new(target.srid, self.raster.grid().srid)?
            .transform_extent(&target.extent(), DENSIFY_PTS)?;
        let data = self.raster.load_bounds(&bounds, &self.band)?;
        render_onto(&data, target, self.interpolate, self.raster.io())
    }
}
