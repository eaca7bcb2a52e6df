//
// Copyright (c) Pirmin Kalberer. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.
//

use crate::core::error::Result;
use crate::raster::{GridSpec, Raster};
use tile_grid::Extent;

pub trait DatasourceType {
    /// Spatial reference of `full_extent` and `feature_extents`
    fn srid(&self) -> Result<i32>;
    /// Reported extent, `None` for datasets without data
    fn full_extent(&self) -> Result<Option<Extent>>;
    /// Extents used for tile enumeration
    fn feature_extents(&self) -> Result<Vec<Extent>> {
        Ok(self.full_extent()?.into_iter().collect())
    }
    /// Render the area of `target`. `level` selects a precomputed overview when
    /// one exists for exactly this level. Regions without data yield `Raster::empty()`.
    fn render_region(&self, target: &GridSpec, level: Option<u8>) -> Result<Raster>;
}
