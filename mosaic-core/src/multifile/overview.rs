//
// Copyright (c) Pirmin Kalberer. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.
//

//! Overview pyramid generation

use crate::core::error::{Error, Result};
use crate::raster::{GridSpec, Raster, RasterIo, Resampling};
use crate::transform::{apply_raster_transforms, Transform};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tile_grid::{Extent, TileScheme};

/// Attributes which are not written into overview files
const UNSAFE_ATTRS: &[&str] = &["grid_mapping"];

/// Elementwise maximum ignoring missing values
pub fn nan_max(a: f32, b: f32) -> f32 {
    if a.is_nan() {
        b
    } else if b.is_nan() || a >= b {
        a
    } else {
        b
    }
}

/// Fold two rasters on the same grid with `nan_max`
pub fn combine(mut acc: Raster, other: Raster) -> Raster {
    for (a, b) in acc.data.iter_mut().zip(other.data.into_iter()) {
        *a = nan_max(*a, b);
    }
    acc
}

/// Target grid for overview level with `resolution` pixels across the
/// whole tile scheme extent. The grid is cropped to `data_extent` plus one
/// pixel on each side.
pub fn overview_grid(scheme: &TileScheme, data_extent: &Extent, resolution: u32) -> GridSpec {
    let world = scheme.extent();
    let n = resolution.max(1) as i64;
    let dx = world.width() / n as f64;
    let dy = world.height() / n as f64;

    let clip = |i: i64| i.max(0).min(n - 1);
    let imin = clip(((data_extent.minx - world.minx) / dx - 0.5).floor() as i64 - 1);
    let imax = clip(((data_extent.maxx - world.minx) / dx - 0.5).ceil() as i64 + 1);
    let jmin = clip(((data_extent.miny - world.miny) / dy - 0.5).floor() as i64 - 1);
    let jmax = clip(((data_extent.maxy - world.miny) / dy - 0.5).ceil() as i64 + 1);

    let width = (imax - imin + 1) as u32;
    let height = (jmax - jmin + 1) as u32;
    let minx = world.minx + dx * imin as f64;
    let miny = world.miny + dy * jmin as f64;
    let extent = Extent::new(minx, miny, minx + dx * width as f64, miny + dy * height as f64);
    GridSpec::from_extent(&extent, width, height, scheme.srid)
}

pub fn overview_path(dir: &Path, level: u8, band: &str, extension: &str) -> PathBuf {
    dir.join(format!("{}_{}.{}", level, band, extension))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Result of an overview build run
#[derive(Default, Debug)]
pub struct OverviewReport {
    pub written: Vec<PathBuf>,
    /// Levels where all band files already existed
    pub skipped_levels: Vec<u8>,
    /// Existing files which were kept
    pub skipped: Vec<PathBuf>,
}

/// Builds one overview file per level and band from a set of source files
pub struct OverviewBuilder<'a> {
    pub files: &'a [PathBuf],
    pub bands: &'a [String],
    pub transforms: &'a [Transform],
    pub io: &'a RasterIo,
    pub scheme: &'a TileScheme,
    pub data_extent: Extent,
    pub dir: PathBuf,
}

impl<'a> OverviewBuilder<'a> {
    pub fn path(&self, level: u8, band: &str) -> PathBuf {
        overview_path(&self.dir, level, band, self.io.driver.extension())
    }

    /// Build all missing overviews. With `force` existing files are replaced.
    pub fn build(&self, levels: &BTreeMap<u8, u32>, force: bool) -> Result<OverviewReport> {
        fs::create_dir_all(&self.dir)?;
        let mut report = OverviewReport::default();
        for (level, resolution) in levels {
            if !force && self.bands.iter().all(|band| self.path(*level, band).is_file()) {
                info!(
                    "Overviews exist for all bands at level {} {:?}",
                    level, self.bands
                );
                report.skipped_levels.push(*level);
                continue;
            }
            let spec = overview_grid(self.scheme, &self.data_extent, *resolution);
            info!(
                "Generating overview level {} at {} pixel width ({}x{})",
                level, resolution, spec.width, spec.height
            );
            for band in self.bands {
                let path = self.path(*level, band);
                if !force && path.is_file() {
                    info!("Overview already exists {}", path.display());
                    report.skipped.push(path);
                    continue;
                }
                let overview = self.build_band(&spec, band)?;
                self.write(overview, band, &path)?;
                report.written.push(path);
            }
        }
        Ok(report)
    }

    /// Reproject and resample one file onto the overview grid
    fn project_file(&self, path: &Path, band: &str, spec: &GridSpec) -> Result<Raster> {
        let raster = self.io.driver.read_band(path, band)?;
        let raster = apply_raster_transforms(raster, self.transforms, self.io.resampler.as_ref())?;
        self.io
            .resampler
            .resample(&raster, spec, Resampling::Average)
    }

    pub fn build_band(&self, spec: &GridSpec, band: &str) -> Result<Raster> {
        if let [single] = self.files {
            return self.project_file(single, band, spec);
        }
        self.files
            .par_iter()
            .map(|path| self.project_file(path, band, spec))
            .try_reduce_with(|acc, other| Ok(combine(acc, other)))
            .unwrap_or_else(|| Ok(Raster::filled(spec, f32::NAN)))
    }

    /// Write to a sibling temporary file and rename it into place.
    /// Readers see either the previous or the complete new file.
    fn write(&self, mut overview: Raster, band: &str, path: &Path) -> Result<()> {
        for key in UNSAFE_ATTRS {
            overview.attrs.remove(*key);
        }
        info!("Writing overview {}", path.display());
        let tmp = temp_path(path);
        let written = self
            .io
            .driver
            .write_band(&overview, band, &tmp)
            .and_then(|_| fs::rename(&tmp, path).map_err(Error::from));
        if written.is_err() && tmp.is_file() {
            let _ = fs::remove_file(&tmp);
        }
        written
    }
}
