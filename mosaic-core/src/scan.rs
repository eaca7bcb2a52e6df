//
// Copyright (c) Pirmin Kalberer. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.
//

//! Dataset discovery in directory trees

use crate::core::config::DatasetCfg;
use crate::core::error::{Error, Result};
use crate::raster::geotiff::DEFAULT_BAND;
use crate::transform::{default_overview_resolution, TransformCfg};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use toml::Value;
use walkdir::WalkDir;

/// Directories holding generated files, never scanned for source data
const GENERATED_DIRS: &[&str] = &["overviews", "grid"];

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

/// Overview levels already written below `<dir>/overviews`
pub fn existing_overview_levels(dir: &Path, band: &str) -> Result<BTreeSet<u8>> {
    let overview_dir = dir.join("overviews");
    let mut levels = BTreeSet::new();
    if !overview_dir.is_dir() {
        return Ok(levels);
    }
    let re = Regex::new(&format!(r"^(\d+)_{}\.tif$", regex::escape(band)))
        .map_err(|e| Error::Config(e.to_string()))?;
    for entry in fs::read_dir(&overview_dir)? {
        let name = entry?.file_name();
        let level = name
            .to_str()
            .and_then(|name| re.captures(name))
            .and_then(|caps| caps[1].parse::<u8>().ok());
        if let Some(level) = level {
            levels.insert(level);
        }
    }
    Ok(levels)
}

fn overview_transform(levels: &BTreeMap<u8, u32>) -> TransformCfg {
    let mut table = toml::value::Table::new();
    for (level, resolution) in levels {
        table.insert(level.to_string(), Value::Integer(i64::from(*resolution)));
    }
    let mut args = toml::value::Table::new();
    args.insert("levels".to_string(), Value::Table(table));
    TransformCfg {
        name: "build_raster_overviews".to_string(),
        args: Some(Value::Table(args)),
    }
}

fn dataset_cfg(dir: &Path, overview_levels: Option<&[u8]>) -> Result<DatasetCfg> {
    let name = dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("dataset")
        .replace(' ', "-");
    let mut levels = existing_overview_levels(dir, DEFAULT_BAND)?;
    if let Some(requested) = overview_levels {
        levels.extend(requested.iter().cloned());
    }
    let levels: BTreeMap<u8, u32> = levels
        .into_iter()
        .filter_map(|level| match default_overview_resolution(level) {
            Some(resolution) => Some((level, resolution)),
            None => {
                warn!("Skipping overview level {}, width exceeds {} pixels", level, u32::MAX);
                None
            }
        })
        .collect();
    let transforms = if levels.is_empty() {
        Vec::new()
    } else {
        vec![overview_transform(&levels)]
    };
    Ok(DatasetCfg {
        name,
        path: dir.join("*.tif").to_string_lossy().to_string(),
        geometry_type: "raster".to_string(),
        band: Some(DEFAULT_BAND.to_string()),
        field: None,
        srid: None,
        raster_interpolate: "linear".to_string(),
        preload: false,
        force_recreate_overviews: false,
        transforms,
        tiling: None,
    })
}

/// Multi-file raster datasets for every directory below `dir` containing GeoTIFF files.
/// Overview levels are taken from existing overview files plus `overview_levels`.
pub fn scan_directory(dir: &Path, overview_levels: Option<&[u8]>) -> Result<Vec<DatasetCfg>> {
    if !dir.is_dir() {
        return Err(Error::Config(format!("Not a directory: '{}'", dir.display())));
    }
    let mut dirs: BTreeMap<PathBuf, usize> = BTreeMap::new();
    let walker = WalkDir::new(dir).into_iter().filter_entry(|entry| {
        let generated = entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .map(|name| GENERATED_DIRS.contains(&name))
                .unwrap_or(false);
        !generated
    });
    for entry in walker.filter_map(|e| e.ok()) {
        let path = entry.path();
        if entry.file_type().is_file() && has_extension(path, "tif") {
            if let Some(parent) = path.parent() {
                *dirs.entry(parent.to_path_buf()).or_insert(0) += 1;
            }
        }
    }
    let mut datasets = Vec::with_capacity(dirs.len());
    for (dir, count) in dirs {
        debug!("Found {} raster files in {}", count, dir.display());
        datasets.push(dataset_cfg(&dir, overview_levels)?);
    }
    info!("Found {} datasets", datasets.len());
    Ok(datasets)
}
