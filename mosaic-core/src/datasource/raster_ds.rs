//
// Copyright (c) Pirmin Kalberer. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.
//

use crate::core::error::{Error, Result};
use crate::datasource::datasource::DatasourceType;
use crate::multifile::overview::overview_grid;
use crate::raster::{GridSpec, Raster, RasterIo, Resampling, Transformer, DENSIFY_PTS};
use crate::transform::{apply_raster_transforms, overview_levels, Transform};
use once_cell::sync::OnceCell;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tile_grid::{Extent, TileScheme};

struct Overview {
    resolution: u32,
    raster: OnceCell<Arc<Raster>>,
}

/// Single raster file, loaded on first use and kept in memory.
/// Overviews are computed in memory.
pub struct RasterDatasource {
    pub path: PathBuf,
    band: Option<String>,
    transforms: Vec<Transform>,
    interpolate: Resampling,
    scheme: TileScheme,
    io: RasterIo,
    raster: OnceCell<Arc<Raster>>,
    overviews: BTreeMap<u8, Overview>,
}

impl RasterDatasource {
    pub fn new(
        path: PathBuf,
        band: Option<String>,
        transforms: Vec<Transform>,
        interpolate: Resampling,
        scheme: &TileScheme,
        io: RasterIo,
    ) -> Result<RasterDatasource> {
        let overviews = overview_levels(&transforms)?
            .unwrap_or_default()
            .into_iter()
            .map(|(level, resolution)| {
                let overview = Overview {
                    resolution,
                    raster: OnceCell::new(),
                };
                (level, overview)
            })
            .collect();
        Ok(RasterDatasource {
            path,
            band,
            transforms,
            interpolate,
            scheme: scheme.clone(),
            io,
            raster: OnceCell::new(),
            overviews,
        })
    }

    /// Transformed raster data
    pub fn load(&self) -> Result<Arc<Raster>> {
        self.raster
            .get_or_try_init(|| {
                let band = match &self.band {
                    Some(band) => band.clone(),
                    None => self
                        .io
                        .driver
                        .band_names(&self.path)?
                        .into_iter()
                        .next()
                        .ok_or_else(|| Error::Raster(format!("No bands in {}", self.path.display())))?,
                };
                info!("Loading {} band {}", self.path.display(), band);
                let raster = self.io.driver.read_band(&self.path, &band)?;
                apply_raster_transforms(raster, &self.transforms, self.io.resampler.as_ref())
                    .map(Arc::new)
            })
            .map(Arc::clone)
    }

    pub fn overview_levels(&self) -> Vec<u8> {
        self.overviews.keys().cloned().collect()
    }

    /// Overview for `level`, `None` if not configured
    pub fn load_overview(&self, level: u8) -> Result<Option<Arc<Raster>>> {
        let overview = match self.overviews.get(&level) {
            Some(overview) => overview,
            None => return Ok(None),
        };
        let raster = overview.raster.get_or_try_init(|| {
            let data = self.load()?;
            let data_extent = Transformer::new(data.srid, self.scheme.srid)?
                .transform_extent(&data.extent(), DENSIFY_PTS)?;
            let spec = overview_grid(&self.scheme, &data_extent, overview.resolution);
            debug!("Computing overview level {} of {}", level, self.path.display());
            self.io
                .resampler
                .resample(&data, &spec, Resampling::Average)
                .map(Arc::new)
        })?;
        Ok(Some(raster.clone()))
    }
}

impl DatasourceType for RasterDatasource {
    fn srid(&self) -> Result<i32> {
        Ok(self.load()?.srid)
    }
    fn full_extent(&self) -> Result<Option<Extent>> {
        let raster = self.load()?;
        if raster.is_empty() {
            Ok(None)
        } else {
            Ok(Some(raster.extent()))
        }
    }
    fn render_region(&self, target: &GridSpec, level: Option<u8>) -> Result<Raster> {
        if let Some(overview) = level.map(|l| self.load_overview(l)).transpose()?.flatten() {
            return render_onto(&overview, target, self.interpolate, &self.io);
        }
        let raster = self.load()?;
        render_onto(&raster, target, self.interpolate, &self.io)
    }
}

/// Resample `src` onto `target`, returning an empty raster if they don't overlap
pub(crate) fn render_onto(src: &Raster, target: &GridSpec, method: Resampling, io: &RasterIo) -> Result<Raster> {
    if src.is_empty() {
        return Ok(Raster::empty());
    }
    let bounds = Transformer::new(target.srid, src.srid)?.transform_extent(&target.extent(), DENSIFY_PTS)?;
    if !bounds.intersects(&src.extent()) {
        return Ok(Raster::empty());
    }
    io.resampler.resample(src, target, method)
}
