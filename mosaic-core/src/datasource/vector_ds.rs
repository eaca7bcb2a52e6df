//
// Copyright (c) Pirmin Kalberer. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.
//

use crate::core::error::{Error, Result};
use crate::datasource::datasource::DatasourceType;
use crate::raster::{GridSpec, Raster};
use crate::transform::{vector_overview_levels, Transform};
use crate::vector::{Rasterizer, VectorLayer};
use std::collections::BTreeMap;
use std::path::Path;
use tile_grid::Extent;

/// GeoJSON layer rendered by rasterizing its features
pub struct VectorDatasource {
    pub layer: VectorLayer,
    /// Simplified layers per zoom level
    pub overviews: BTreeMap<u8, VectorLayer>,
    /// Aggregated attribute, feature count if `None`
    pub field: Option<String>,
}

/// One simplified layer per level. Levels sharing a tolerance share the result.
fn simplified_levels(layer: &VectorLayer, levels: &BTreeMap<u8, f64>) -> BTreeMap<u8, VectorLayer> {
    let mut by_tolerance: Vec<(f64, VectorLayer)> = Vec::new();
    let mut overviews = BTreeMap::new();
    for (level, tolerance) in levels {
        let known = by_tolerance.iter().find(|(t, _)| t == tolerance);
        let simplified = match known {
            Some((_, simplified)) => simplified.clone(),
            None => {
                info!(
                    "Generating vector overview level {} at {} simplify tolerance",
                    level, tolerance
                );
                let simplified = layer.simplify(*tolerance);
                by_tolerance.push((*tolerance, simplified.clone()));
                simplified
            }
        };
        overviews.insert(*level, simplified);
    }
    overviews
}

impl VectorDatasource {
    /// Wrap a layer, reprojecting it to `srid`
    pub fn new(layer: VectorLayer, field: Option<String>, srid: i32) -> Result<VectorDatasource> {
        let layer = layer.reproject(srid)?;
        Ok(VectorDatasource {
            layer,
            overviews: BTreeMap::new(),
            field,
        })
    }

    /// Add overview layers, reprojected to the layer's reference system
    pub fn with_overviews(mut self, overviews: BTreeMap<u8, VectorLayer>) -> Result<VectorDatasource> {
        for (level, overview) in overviews {
            let overview = overview.reproject(self.layer.srid)?;
            self.overviews.insert(level, overview);
        }
        Ok(self)
    }

    /// Read a GeoJSON file with coordinates in `src_srid` and apply `transforms`.
    /// Overviews are simplified from the layer as transformed so far, later
    /// transforms apply to the layer and its overviews alike.
    pub fn read(
        path: &Path,
        src_srid: i32,
        transforms: &[Transform],
        field: Option<String>,
        srid: i32,
    ) -> Result<VectorDatasource> {
        if let Some(t) = transforms.iter().find(|t| !t.is_vector()) {
            return Err(Error::Config(format!(
                "Transform '{}' is not applicable to vector data",
                t.name()
            )));
        }
        vector_overview_levels(transforms)?;
        let mut layer = VectorLayer::read(path, src_srid)?;
        info!("Read {} features from {}", layer.len(), path.display());
        let mut overviews = BTreeMap::new();
        for t in transforms {
            match t {
                Transform::BuildVectorOverviews { levels } => {
                    overviews = simplified_levels(&layer, levels);
                }
                t => {
                    layer = t.apply_vector(layer)?;
                    overviews = overviews
                        .into_iter()
                        .map(|(level, overview)| Ok((level, t.apply_vector(overview)?)))
                        .collect::<Result<_>>()?;
                }
            }
        }
        VectorDatasource::new(layer, field, srid)?.with_overviews(overviews)
    }

    pub fn overview_levels(&self) -> Vec<u8> {
        self.overviews.keys().cloned().collect()
    }

    /// Overview layer of `level`, the full layer otherwise
    pub fn layer_for(&self, level: Option<u8>) -> &VectorLayer {
        level
            .and_then(|z| self.overviews.get(&z))
            .unwrap_or(&self.layer)
    }
}

impl DatasourceType for VectorDatasource {
    fn srid(&self) -> Result<i32> {
        Ok(self.layer.srid)
    }
    fn full_extent(&self) -> Result<Option<Extent>> {
        Ok(self.layer.full_extent())
    }
    fn feature_extents(&self) -> Result<Vec<Extent>> {
        Ok(self.layer.feature_extents())
    }
    fn render_region(&self, target: &GridSpec, level: Option<u8>) -> Result<Raster> {
        if target.srid != self.layer.srid {
            return Err(Error::Projection(format!(
                "Cannot render layer in EPSG:{} onto EPSG:{}",
                self.layer.srid, target.srid
            )));
        }
        let layer = self.layer_for(level);
        if level.map(|z| self.overviews.contains_key(&z)).unwrap_or(false) {
            debug!("Using vector overview {:?}", level);
        }
        let extent = target.extent();
        if !layer.feature_extents().iter().any(|e| e.intersects(&extent)) {
            return Ok(Raster::empty());
        }
        Ok(Rasterizer::new(target.clone()).rasterize(layer, self.field.as_deref()))
    }
}
