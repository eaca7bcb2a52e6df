//
// Copyright (c) Pirmin Kalberer. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.
//

use crate::core::error::{Error, Result};
use crate::raster::RasterIo;
use crate::transform::{apply_raster_transforms, Transform};
use rayon::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tile_grid::Extent;

/// Bounding box of one source file
#[derive(PartialEq, Clone, Debug)]
pub struct GridEntry {
    pub path: PathBuf,
    pub extent: Extent,
}

/// Index of source file extents
#[derive(PartialEq, Clone, Debug)]
pub struct SpatialGrid {
    pub entries: Vec<GridEntry>,
    pub srid: i32,
}

impl SpatialGrid {
    /// Scan all files. Extents are taken after applying `transforms`.
    pub fn build(files: &[PathBuf], band: &str, transforms: &[Transform], io: &RasterIo) -> Result<SpatialGrid> {
        let scanned = files
            .par_iter()
            .map(|path| -> Result<(GridEntry, i32)> {
                let raster = io.driver.read_band(path, band)?;
                let raster = apply_raster_transforms(raster, transforms, io.resampler.as_ref())?;
                Ok((
                    GridEntry {
                        path: path.clone(),
                        extent: raster.extent(),
                    },
                    raster.srid,
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        let srid = scanned.first().map(|(_, srid)| *srid).unwrap_or(0);
        let entries = scanned.into_iter().map(|(entry, _)| entry).collect();
        Ok(SpatialGrid { entries, srid })
    }

    /// Union of all file extents
    pub fn total_bounds(&self) -> Option<Extent> {
        Extent::union_all(self.entries.iter().map(|e| &e.extent))
    }

    /// Entries whose extent touches `extent`
    pub fn intersecting(&self, extent: &Extent) -> Vec<&GridEntry> {
        self.entries
            .iter()
            .filter(|e| e.extent.intersects(extent))
            .collect()
    }

    pub fn files(&self) -> Vec<PathBuf> {
        self.entries.iter().map(|e| e.path.clone()).collect()
    }

    pub fn to_geojson(&self) -> Value {
        let features: Vec<Value> = self
            .entries
            .iter()
            .map(|e| {
                let x = &e.extent;
                json!({
                    "type": "Feature",
                    "properties": {
                        "filename": e.path.to_string_lossy(),
                        "xmin": x.minx,
                        "ymin": x.miny,
                        "xmax": x.maxx,
                        "ymax": x.maxy,
                    },
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[
                            [x.minx, x.miny], [x.maxx, x.miny], [x.maxx, x.maxy],
                            [x.minx, x.maxy], [x.minx, x.miny]
                        ]]
                    }
                })
            })
            .collect();
        json!({
            "type": "FeatureCollection",
            "srid": self.srid,
            "features": features,
        })
    }

    pub fn from_geojson(doc: &Value) -> Result<SpatialGrid> {
        let invalid = |msg: &str| Error::Vector(format!("Invalid grid: {}", msg));
        let features = doc["features"]
            .as_array()
            .ok_or_else(|| invalid("missing features"))?;
        let mut entries = Vec::with_capacity(features.len());
        for feature in features {
            let props = &feature["properties"];
            let coord = |key: &str| props[key].as_f64().ok_or_else(|| invalid(key));
            let path = props["filename"]
                .as_str()
                .ok_or_else(|| invalid("filename"))?;
            entries.push(GridEntry {
                path: PathBuf::from(path),
                extent: Extent::new(coord("xmin")?, coord("ymin")?, coord("xmax")?, coord("ymax")?),
            });
        }
        if entries.is_empty() {
            return Err(invalid("no entries"));
        }
        let srid = doc["srid"].as_i64().unwrap_or(0) as i32;
        Ok(SpatialGrid { entries, srid })
    }

    /// Read a cached grid. Unreadable or corrupt files count as missing.
    pub fn read(path: &Path) -> Option<SpatialGrid> {
        if !path.is_file() {
            return None;
        }
        let grid = fs::read_to_string(path)
            .map_err(Error::from)
            .and_then(|json| Ok(serde_json::from_str::<Value>(&json)?))
            .and_then(|doc| SpatialGrid::from_geojson(&doc));
        match grid {
            Ok(grid) => {
                info!("Read cached grid {}", path.display());
                Some(grid)
            }
            Err(e) => {
                warn!("Ignoring grid cache {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        info!("Writing grid {}", path.display());
        fs::write(path, serde_json::to_string_pretty(&self.to_geojson())?)?;
        Ok(())
    }
}
