//
// Copyright (c) Pirmin Kalberer. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.
//

use crate::core::error::Error;
use crate::multifile::multifile::{matching_files, MultiFileRaster};
use crate::multifile::spatial_grid::{GridEntry, SpatialGrid};
use crate::multifile::testutils::{io_with, raster, test_dir, write_tif, CountingDriver};
use crate::raster::RasterIo;
use crate::transform::Transform;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Barrier};
use std::thread;
use tile_grid::{Extent, TileScheme};

fn write_tiles(dir: &Path) -> (PathBuf, PathBuf) {
    let a = dir.join("tile_a.tif");
    let b = dir.join("tile_b.tif");
    write_tif(&a, &raster(Extent::new(0.0, 0.0, 1.0, 1.0), 10, 10, 4326, |c, _| c as f32));
    write_tif(&b, &raster(Extent::new(1.0, 0.0, 2.0, 1.0), 10, 10, 4326, |c, _| 10.0 + c as f32));
    (a, b)
}

fn pattern(dir: &Path) -> String {
    dir.join("*.tif").to_string_lossy().to_string()
}

fn overview_transforms() -> Vec<Transform> {
    let mut levels = BTreeMap::new();
    levels.insert(0, 256);
    levels.insert(1, 512);
    vec![Transform::BuildRasterOverviews { levels }]
}

#[test]
fn test_matching_files() {
    let dir = test_dir("multifile_matching");
    write_tiles(&dir);
    fs::write(dir.join("notes.txt"), "x").unwrap();
    let files = matching_files(&pattern(&dir)).unwrap();
    let names: Vec<_> = files
        .iter()
        .map(|f| f.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, vec!["tile_a.tif", "tile_b.tif"]);
    let files = matching_files(&dir.join("tile_?.tif").to_string_lossy()).unwrap();
    assert_eq!(files.len(), 2);
}

#[test]
fn test_load_bounds() {
    let dir = test_dir("multifile_load");
    write_tiles(&dir);
    let scheme = TileScheme::web_mercator();
    let ds = MultiFileRaster::new(&pattern(&dir), Vec::new(), &scheme, RasterIo::default(), false).unwrap();
    assert_eq!(ds.bands(), &["band_data".to_string()]);
    assert_eq!(ds.full_extent(), Extent::new(0.0, 0.0, 2.0, 1.0));
    assert!(dir.join("grid").join("mosaic_grid.geojson").is_file());

    let merged = ds.load_bounds(&Extent::new(0.5, 0.2, 1.5, 0.8), "band_data").unwrap();
    assert_eq!((merged.width, merged.height), (20, 10));
    assert_eq!(merged.extent(), Extent::new(0.0, 0.0, 2.0, 1.0));
    assert_eq!(merged.valid_count(), 200);
    assert_eq!(merged.get(3, 0), 3.0);
    assert_eq!(merged.get(13, 5), 13.0);

    let single = ds.load_bounds(&Extent::new(1.2, 0.2, 1.5, 0.8), "band_data").unwrap();
    assert_eq!((single.width, single.height), (10, 10));

    let outside = ds.load_bounds(&Extent::new(5.0, 5.0, 6.0, 6.0), "band_data").unwrap();
    assert!(outside.is_empty());

    match ds.load_bounds(&Extent::new(0.5, 0.2, 1.5, 0.8), "elevation") {
        Err(Error::UnknownBand { band, .. }) => assert_eq!(band, "elevation"),
        other => panic!("unexpected result {:?}", other.map(|r| r.width)),
    }
}

#[test]
fn test_invalid_datasets() {
    let dir = test_dir("multifile_invalid");
    let scheme = TileScheme::web_mercator();
    let open = |pattern: &str, transforms: Vec<Transform>| {
        MultiFileRaster::new(pattern, transforms, &scheme, RasterIo::default(), false)
    };

    let no_ext = dir.join("*").to_string_lossy().to_string();
    assert!(matches!(open(&no_ext, Vec::new()), Err(Error::Config(_))));
    let netcdf = dir.join("*.nc").to_string_lossy().to_string();
    assert!(matches!(open(&netcdf, Vec::new()), Err(Error::Config(_))));
    match open(&pattern(&dir), Vec::new()) {
        Err(Error::Config(msg)) => assert!(msg.starts_with("Unable to read any files from path")),
        _ => panic!("empty directory accepted"),
    }

    write_tiles(&dir);
    let mut transforms = overview_transforms();
    transforms.extend(overview_transforms());
    assert!(matches!(open(&pattern(&dir), transforms), Err(Error::Config(_))));
}

#[test]
fn test_cached_grid() {
    let dir = test_dir("multifile_cached_grid");
    let (a, b) = write_tiles(&dir);
    let grid_path = dir.join("grid").join("mosaic_grid.geojson");
    let scheme = TileScheme::web_mercator();

    // an existing grid is trusted
    let cached = SpatialGrid {
        entries: vec![
            GridEntry { path: a, extent: Extent::new(0.0, 0.0, 1.0, 1.0) },
            GridEntry { path: b, extent: Extent::new(1.0, 0.0, 3.0, 4.0) },
        ],
        srid: 4326,
    };
    cached.write(&grid_path).unwrap();
    let ds = MultiFileRaster::new(&pattern(&dir), Vec::new(), &scheme, RasterIo::default(), false).unwrap();
    assert_eq!(ds.full_extent(), Extent::new(0.0, 0.0, 3.0, 4.0));

    // a corrupt grid is rebuilt
    fs::write(&grid_path, "corrupt").unwrap();
    let ds = MultiFileRaster::new(&pattern(&dir), Vec::new(), &scheme, RasterIo::default(), false).unwrap();
    assert_eq!(ds.full_extent(), Extent::new(0.0, 0.0, 2.0, 1.0));
    assert_eq!(SpatialGrid::read(&grid_path).map(|g| g.entries.len()), Some(2));
}

fn write_mercator_tiles(dir: &Path) {
    write_tif(
        &dir.join("a.tif"),
        &raster(Extent::new(-2.0e6, 0.0, 0.0, 2.0e6), 20, 20, 3857, |_, _| 1.0),
    );
    write_tif(
        &dir.join("b.tif"),
        &raster(Extent::new(-1.0e6, -1.0e6, 1.0e6, 1.0e6), 20, 20, 3857, |_, _| 2.0),
    );
}

#[test]
fn test_overview_build_skip_and_force() {
    let dir = test_dir("multifile_overviews");
    write_mercator_tiles(&dir);
    let scheme = TileScheme::web_mercator();
    let driver = Arc::new(CountingDriver::default());

    let ds = MultiFileRaster::new(&pattern(&dir), overview_transforms(), &scheme, io_with(driver.clone()), false)
        .unwrap();
    assert_eq!(driver.writes(), 2);
    assert_eq!(ds.overview_levels(), vec![0, 1]);
    assert!(ds.overview_path(0, "band_data").is_file());
    assert!(dir.join("overviews").join("1_band_data.tif").is_file());

    // existing overviews are kept
    let _ds = MultiFileRaster::new(&pattern(&dir), overview_transforms(), &scheme, io_with(driver.clone()), false)
        .unwrap();
    assert_eq!(driver.writes(), 2);

    let _ds = MultiFileRaster::new(&pattern(&dir), overview_transforms(), &scheme, io_with(driver.clone()), true)
        .unwrap();
    assert_eq!(driver.writes(), 4);
}

#[test]
fn test_load_overview() {
    let dir = test_dir("multifile_load_overview");
    write_mercator_tiles(&dir);
    let scheme = TileScheme::web_mercator();
    let driver = Arc::new(CountingDriver::default());
    let ds = MultiFileRaster::new(&pattern(&dir), overview_transforms(), &scheme, io_with(driver.clone()), false)
        .unwrap();

    let reads = driver.reads();
    let first = ds.load_overview(1, "band_data").unwrap().unwrap();
    let second = ds.load_overview(1, "band_data").unwrap().unwrap();
    assert_eq!(driver.reads(), reads + 1);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.srid, 3857);
    assert_eq!(first.sample(-5.0e5, 5.0e5), 2.0);

    assert!(ds.load_overview(5, "band_data").unwrap().is_none());
    assert!(ds.load_overview(0, "elevation").unwrap().is_none());
}

#[test]
fn test_load_overview_concurrent() {
    let dir = test_dir("multifile_load_overview_concurrent");
    write_mercator_tiles(&dir);
    let scheme = TileScheme::web_mercator();
    let driver = Arc::new(CountingDriver::default());
    let ds = MultiFileRaster::new(&pattern(&dir), overview_transforms(), &scheme, io_with(driver.clone()), false)
        .unwrap();

    let reads = driver.reads();
    let barrier = Barrier::new(8);
    let loaded: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    ds.load_overview(0, "band_data").unwrap().unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert_eq!(driver.reads(), reads + 1);
    assert!(loaded.iter().all(|r| Arc::ptr_eq(r, &loaded[0])));
}

#[test]
fn test_load_overview_during_rebuild() {
    let dir = test_dir("multifile_load_during_rebuild");
    write_mercator_tiles(&dir);
    let scheme = TileScheme::web_mercator();
    let ds = MultiFileRaster::new(&pattern(&dir), overview_transforms(), &scheme, RasterIo::default(), false)
        .unwrap();
    let mut levels = BTreeMap::new();
    levels.insert(1, 512);

    let barrier = Barrier::new(5);
    thread::scope(|s| {
        s.spawn(|| {
            barrier.wait();
            for _ in 0..3 {
                ds.build_overviews(&levels, true).unwrap();
            }
        });
        for _ in 0..4 {
            s.spawn(|| {
                barrier.wait();
                for _ in 0..10 {
                    let overview = ds.load_overview(1, "band_data").unwrap().unwrap();
                    assert_eq!(overview.sample(-5.0e5, 5.0e5), 2.0);
                }
            });
        }
    });
    assert!(!dir.join("overviews/1_band_data.tif.tmp").exists());
}
