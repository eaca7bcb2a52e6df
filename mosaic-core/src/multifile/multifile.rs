//
// Copyright (c) Pirmin Kalberer. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.
//

use crate::core::error::{Error, Result};
use crate::multifile::overview::{overview_path, OverviewBuilder, OverviewReport};
use crate::multifile::spatial_grid::SpatialGrid;
use crate::raster::{merge, Raster, RasterIo, Transformer, DENSIFY_PTS};
use crate::transform::{apply_raster_transforms, overview_levels, Transform};
use once_cell::sync::OnceCell;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tile_grid::{Extent, TileScheme};

const GRID_FILENAME: &str = "mosaic_grid.geojson";

type OverviewCell = Arc<OnceCell<Arc<Raster>>>;

/// Raster dataset split into many files, presented as one surface.
///
/// All reads of source and overview files are serialized by one lock.
pub struct MultiFileRaster {
    pattern: String,
    base_dir: PathBuf,
    transforms: Vec<Transform>,
    io: RasterIo,
    scheme: TileScheme,
    grid: SpatialGrid,
    total_bounds: Extent,
    bands: Vec<String>,
    io_lock: Mutex<()>,
    /// Absent key: no overview configured. Empty cell: not loaded yet.
    overviews: RwLock<HashMap<(u8, String), OverviewCell>>,
}

/// Split a path pattern into directory and file name pattern
fn split_pattern(pattern: &str) -> Result<(PathBuf, String)> {
    let path = Path::new(pattern);
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::Config(format!("Invalid file pattern '{}'", pattern)))?;
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((dir, name.to_string()))
}

fn name_regex(name_pattern: &str) -> Result<Regex> {
    let mut re = String::from("^");
    for c in name_pattern.chars() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            c => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).map_err(|e| Error::Config(e.to_string()))
}

/// Files matching `pattern`, sorted by name. A `*` matches within the file name only.
pub fn matching_files(pattern: &str) -> Result<Vec<PathBuf>> {
    let (dir, name) = split_pattern(pattern)?;
    let re = name_regex(&name)?;
    let mut files = Vec::new();
    for entry in fs::read_dir(&dir)? {
        let path = entry?.path();
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| re.is_match(n))
            .unwrap_or(false);
        if matches && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

impl MultiFileRaster {
    /// Open a dataset. Uses the cached grid if present, otherwise scans all files
    /// and writes the grid cache. Configured overviews are built if missing.
    pub fn new(
        pattern: &str,
        transforms: Vec<Transform>,
        scheme: &TileScheme,
        io: RasterIo,
        force_recreate_overviews: bool,
    ) -> Result<MultiFileRaster> {
        let (base_dir, name) = split_pattern(pattern)?;
        let extension = Path::new(&name)
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| Error::Config(format!("Missing file extension in '{}'", pattern)))?;
        if !extension.eq_ignore_ascii_case(io.driver.extension()) {
            return Err(Error::Config(format!(
                "Unsupported file extension '{}' in '{}'",
                extension, pattern
            )));
        }
        let levels = overview_levels(&transforms)?;

        let files = matching_files(pattern)?;
        let first = files
            .first()
            .ok_or_else(|| Error::Config(format!("Unable to read any files from path {}", pattern)))?;
        let bands = io.driver.band_names(first)?;
        let first_band = bands
            .first()
            .cloned()
            .ok_or_else(|| Error::Raster(format!("No bands in {}", first.display())))?;

        let grid_path = base_dir.join("grid").join(GRID_FILENAME);
        let grid = match SpatialGrid::read(&grid_path) {
            Some(grid) => grid,
            None => {
                let grid = SpatialGrid::build(&files, &first_band, &transforms, &io)?;
                if let Err(e) = grid.write(&grid_path) {
                    warn!("Could not write grid cache {}: {}", grid_path.display(), e);
                }
                grid
            }
        };
        let total_bounds = grid
            .total_bounds()
            .ok_or_else(|| Error::Raster(format!("Empty grid for {}", pattern)))?;
        debug!("{}: total bounds {:?}", pattern, total_bounds);

        let dataset = MultiFileRaster {
            pattern: pattern.to_string(),
            base_dir,
            transforms,
            io,
            scheme: scheme.clone(),
            grid,
            total_bounds,
            bands,
            io_lock: Mutex::new(()),
            overviews: RwLock::new(HashMap::new()),
        };
        if let Some(levels) = levels {
            dataset.build_overviews(&levels, force_recreate_overviews)?;
        }
        Ok(dataset)
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn bands(&self) -> &[String] {
        &self.bands
    }

    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    pub fn transforms(&self) -> &[Transform] {
        &self.transforms
    }

    pub fn io(&self) -> &RasterIo {
        &self.io
    }

    fn lock_io(&self) -> std::sync::MutexGuard<()> {
        self.io_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Union of all source file extents
    pub fn full_extent(&self) -> Extent {
        let _io = self.lock_io();
        self.total_bounds.clone()
    }

    fn check_band(&self, band: &str) -> Result<()> {
        if self.bands.iter().any(|b| b == band) {
            Ok(())
        } else {
            Err(Error::UnknownBand {
                dataset: self.pattern.clone(),
                band: band.to_string(),
            })
        }
    }

    /// Merged raster of all files touching `extent`, with transforms applied.
    /// Returns an empty raster if no file intersects.
    pub fn load_bounds(&self, extent: &Extent, band: &str) -> Result<Raster> {
        self.check_band(band)?;
        let entries = self.grid.intersecting(extent);
        if entries.is_empty() {
            return Ok(Raster::empty());
        }
        let rasters = {
            let _io = self.lock_io();
            entries
                .iter()
                .map(|entry| self.io.driver.read_band(&entry.path, band))
                .collect::<Result<Vec<_>>>()?
        };
        debug!("Merging {} files of {}", rasters.len(), self.pattern);
        let merged = merge(&rasters)?;
        apply_raster_transforms(merged, &self.transforms, self.io.resampler.as_ref())
    }

    pub fn overview_dir(&self) -> PathBuf {
        self.base_dir.join("overviews")
    }

    pub fn overview_path(&self, level: u8, band: &str) -> PathBuf {
        overview_path(&self.overview_dir(), level, band, self.io.driver.extension())
    }

    /// Configured overview levels
    pub fn overview_levels(&self) -> Vec<u8> {
        let overviews = self.overviews.read().unwrap_or_else(PoisonError::into_inner);
        let mut levels: Vec<u8> = overviews.keys().map(|(level, _)| *level).collect();
        levels.sort();
        levels.dedup();
        levels
    }

    /// Overview raster for `level`, `None` if this level is not configured.
    /// The file is read once and kept in memory.
    pub fn load_overview(&self, level: u8, band: &str) -> Result<Option<Arc<Raster>>> {
        let cell = {
            let overviews = self.overviews.read().unwrap_or_else(PoisonError::into_inner);
            match overviews.get(&(level, band.to_string())) {
                Some(cell) => cell.clone(),
                None => return Ok(None),
            }
        };
        if let Some(raster) = cell.get() {
            debug!("Cached overview {} {}", level, band);
            return Ok(Some(raster.clone()));
        }
        let raster = cell.get_or_try_init(|| {
            let _io = self.lock_io();
            let path = self.overview_path(level, band);
            info!("Reading overview {}", path.display());
            self.io.driver.read_band(&path, band).map(Arc::new)
        })?;
        Ok(Some(raster.clone()))
    }

    /// Build overview files for `levels`. Existing files are kept unless `force` is set.
    pub fn build_overviews(&self, levels: &BTreeMap<u8, u32>, force: bool) -> Result<OverviewReport> {
        let files = self.grid.files();
        let data_extent = Transformer::new(self.grid.srid, self.scheme.srid)?
            .transform_extent(&self.total_bounds, DENSIFY_PTS)?;
        let builder = OverviewBuilder {
            files: &files,
            bands: &self.bands,
            transforms: &self.transforms,
            io: &self.io,
            scheme: &self.scheme,
            data_extent,
            dir: self.overview_dir(),
        };
        let report = builder.build(levels, force)?;

        let mut overviews = self.overviews.write().unwrap_or_else(PoisonError::into_inner);
        for level in levels.keys() {
            for band in &self.bands {
                let path = self.overview_path(*level, band);
                let key = (*level, band.clone());
                if report.written.contains(&path) || !overviews.contains_key(&key) {
                    overviews.insert(key, Arc::new(OnceCell::new()));
                }
            }
        }
        Ok(report)
    }
}
