//
// Copyright (c) Pirmin Kalberer. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.
//

use crate::datasources::{Datasource, Datasources};
use crate::mosaic_service::{MosaicService, Region};
use clap::{App, Arg};
use mosaic_core::core::{parse_config, ApplicationCfg, Config};
use mosaic_core::raster::{GeoTiffDriver, GeoTransform, Raster, RasterDriver, RasterIo};
use mosaic_core::Error;
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tile_grid::{Extent, TileScheme};

fn test_dir(name: &str) -> PathBuf {
    let dir = env::temp_dir().join(format!("mosaic_test_service_{}", name));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(dir.join("data")).unwrap();
    dir
}

fn write_constant(path: &Path, extent: Extent, value: f32) {
    let raster = Raster::new(20, 20, GeoTransform::north_up(&extent, 20, 20), 3857, vec![value; 400]).unwrap();
    GeoTiffDriver.write_band(&raster, "band_data", path).unwrap();
}

/// Two adjacent files north of the equator
fn write_dataset(dir: &Path) -> String {
    let data = dir.join("data");
    write_constant(&data.join("west.tif"), Extent::new(-2.0e6, 0.0, 0.0, 2.0e6), 1.0);
    write_constant(&data.join("east.tif"), Extent::new(0.0, 0.0, 2.0e6, 2.0e6), 2.0);
    data.join("*.tif").to_string_lossy().to_string()
}

fn service(dir: &Path, dataset_toml: &str) -> MosaicService {
    let toml = format!(
        r#"
        [grid]
        predefined = "web_mercator"

        {}

        [cache.file]
        base = "{}"
        "#,
        dataset_toml,
        dir.join("cache").to_string_lossy()
    );
    let config: ApplicationCfg = parse_config(toml, "").unwrap();
    MosaicService::from_config(&config).unwrap()
}

fn multifile_toml(pattern: &str) -> String {
    format!(
        r#"
        [[dataset]]
        name = "dem"
        path = "{}"
        raster_interpolate = "nearest"

        [dataset.tiling]
        minzoom = 0
        maxzoom = 3
        "#,
        pattern
    )
}

#[test]
fn test_render_tiles() {
    let dir = test_dir("render");
    let pattern = write_dataset(&dir);
    let service = service(&dir, &multifile_toml(&pattern));

    assert_eq!(
        service.full_extent("dem").unwrap(),
        Some(Extent::new(-2.0e6, 0.0, 2.0e6, 2.0e6))
    );

    let tile = service.tile("dem", 0, 0, 0).unwrap();
    assert_eq!((tile.width, tile.height), (256, 256));
    assert_eq!(tile.srid, 3857);
    assert_eq!(tile.sample(-1.0e6, 1.0e6), 1.0);
    assert_eq!(tile.sample(1.0e6, 1.0e6), 2.0);
    assert!(tile.sample(-1.0e7, -1.0e7).is_nan());

    let region = Region::Extent(Extent::new(-1.0e6, 5.0e5, 1.0e6, 1.5e6));
    let raster = service.render_region("dem", &region, 20, 10).unwrap();
    assert_eq!(raster.valid_count(), 200);
    assert_eq!(raster.get(0, 0), 1.0);
    assert_eq!(raster.get(19, 9), 2.0);

    // outside of the data and invalid tiles are empty
    assert!(service.tile("dem", 0, 7, 3).unwrap().is_empty());
    assert!(service.tile("dem", 5, 0, 1).unwrap().is_empty());

    match service.tile("missing", 0, 0, 0) {
        Err(Error::UnknownDataset(name)) => assert_eq!(name, "missing"),
        _ => panic!("unknown dataset accepted"),
    }
}

#[test]
fn test_cached_tile() {
    let dir = test_dir("cached_tile");
    let pattern = write_dataset(&dir);
    let service = service(&dir, &multifile_toml(&pattern));
    let tile_path = dir.join("cache").join("dem/0/0/0.tif");

    let bytes = service.cached_tile("dem", 0, 0, 0).unwrap().unwrap();
    assert_eq!(fs::read(&tile_path).unwrap(), bytes);
    let tile = GeoTiffDriver.read_band(&tile_path, "band_data").unwrap();
    assert_eq!(tile.sample(-1.0e6, 1.0e6), 1.0);

    // served from the cache without rendering
    fs::write(&tile_path, b"cached").unwrap();
    assert_eq!(service.cached_tile("dem", 0, 0, 0).unwrap().unwrap(), b"cached".to_vec());

    assert!(service.cached_tile("dem", 0, 7, 3).unwrap().is_none());
    assert!(!dir.join("cache").join("dem/3/0/7.tif").exists());
    assert!(matches!(
        service.cached_tile("missing", 0, 0, 0),
        Err(Error::UnknownDataset(_))
    ));
}

#[test]
fn test_list_tiles() {
    let dir = test_dir("list");
    let pattern = write_dataset(&dir);
    let service = service(&dir, &multifile_toml(&pattern));

    let batch = service.list_tiles("dem", 0, 2).unwrap();
    let keys: Vec<_> = batch.iter().map(|r| (r.z, r.x, r.y)).collect();
    let mut sorted = keys.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(keys, sorted);
    assert_eq!(keys[0], (0, 0, 0));
    assert!(keys.contains(&(1, 0, 0)));
    assert!(keys.contains(&(1, 1, 0)));
    assert!(keys.contains(&(2, 1, 1)));
    assert!(keys.contains(&(2, 2, 1)));
    assert!(!keys.contains(&(2, 0, 0)));
    assert!(batch
        .iter()
        .all(|r| service.scheme.is_valid_tile(r.x as i64, r.y as i64, r.z)));
}

#[test]
fn test_generate() {
    let dir = test_dir("generate");
    let pattern = write_dataset(&dir);
    let service = service(&dir, &multifile_toml(&pattern));
    let total = service.list_tiles("dem", 0, 1).unwrap().len() as u64;

    let stats = service
        .generate(Some("dem"), None, Some(1), None, None, false, false)
        .unwrap();
    assert_eq!(stats.tiles, total);
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.written + stats.empty, total);
    assert!(stats.written >= 3);

    let tile_path = dir.join("cache").join("dem/0/0/0.tif");
    let tile = GeoTiffDriver.read_band(&tile_path, "band_data").unwrap();
    assert_eq!((tile.width, tile.height), (256, 256));
    assert_eq!(tile.sample(1.0e6, 1.0e6), 2.0);
    assert!(dir.join("cache").join("dem/1/1/0.tif").is_file());

    // second run keeps existing tiles
    let stats = service
        .generate(Some("dem"), None, Some(1), None, None, false, false)
        .unwrap();
    assert_eq!(stats.written, 0);

    // partitioned run over two nodes
    let node0 = service
        .generate(Some("dem"), None, Some(1), Some(2), Some(0), false, true)
        .unwrap();
    let node1 = service
        .generate(Some("dem"), None, Some(1), Some(2), Some(1), false, true)
        .unwrap();
    assert_eq!(node0.tiles + node1.tiles, total);
    assert_eq!(node0.existing + node1.existing, 0);

    assert!(matches!(
        service.generate(Some("dem"), None, None, Some(2), Some(2), false, false),
        Err(Error::Config(_))
    ));
    assert!(matches!(
        service.generate(Some("missing"), None, None, None, None, false, false),
        Err(Error::UnknownDataset(_))
    ));
}

#[test]
fn test_overviews() {
    let dir = test_dir("overviews");
    let pattern = write_dataset(&dir);
    write_constant(&dir.join("single.tif"), Extent::new(0.0, 0.0, 1.0e6, 1.0e6), 3.0);
    let datasets = format!(
        r#"
        [[dataset]]
        name = "dem"
        path = "{}"
        raster_interpolate = "nearest"

        [[dataset.transform]]
        name = "build_raster_overviews"
        args = {{ levels = {{ "0" = 256 }} }}

        [[dataset]]
        name = "single"
        path = "{}"
        "#,
        pattern,
        dir.join("single.tif").to_string_lossy()
    );
    let service = service(&dir, &datasets);

    // built while opening the dataset
    let overview = dir.join("data").join("overviews").join("0_band_data.tif");
    assert!(overview.is_file());

    let report = service.build_overviews("dem", None, false).unwrap();
    assert_eq!(report.skipped_levels, vec![0]);
    assert!(report.written.is_empty());

    let report = service.build_overviews("dem", None, true).unwrap();
    assert_eq!(report.written, vec![overview]);

    let mut levels = BTreeMap::new();
    levels.insert(1, 512);
    let report = service.build_overviews("dem", Some(&levels), false).unwrap();
    assert_eq!(report.written.len(), 1);

    let tile = service.tile("dem", 0, 0, 0).unwrap();
    assert_eq!(tile.sample(-1.0e6, 1.0e6), 1.0);
    assert_eq!(tile.sample(1.0e6, 1.0e6), 2.0);

    assert!(matches!(
        service.build_overviews("single", None, false),
        Err(Error::Config(_))
    ));
}

#[test]
fn test_vector_dataset() {
    let dir = test_dir("vector");
    let path = dir.join("data").join("places.geojson");
    fs::write(
        &path,
        r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "properties": {"pop": 5}, "geometry": {"type": "Point", "coordinates": [10.0, 10.0]}},
            {"type": "Feature", "properties": {"pop": 7}, "geometry": {"type": "Point", "coordinates": [-100.0, -40.0]}}
        ]}"#,
    )
    .unwrap();
    let datasets = format!(
        r#"
        [[dataset]]
        name = "places"
        path = "{}"
        geometry_type = "point"
        field = "pop"
        "#,
        path.to_string_lossy()
    );
    let service = service(&dir, &datasets);
    let extents = service.tiling_extents("places").unwrap();
    assert_eq!(extents.len(), 2);

    // one tile per point and level
    let batch = service.list_tiles("places", 1, 3).unwrap();
    assert_eq!(batch.len(), 6);
    let level1: Vec<_> = batch.iter().filter(|r| r.z == 1).map(|r| (r.x, r.y)).collect();
    assert_eq!(level1, vec![(0, 1), (1, 0)]);

    let tile = service.tile("places", 1, 1, 0).unwrap();
    assert_eq!(tile.valid_count(), 1);
    assert!(tile.data.contains(&5.0));
}

#[test]
fn test_invalid_config() {
    let dir = test_dir("invalid");
    let toml = r#"
        [grid]
        predefined = "web_mercator"

        [[dataset]]
        name = "lines"
        path = "lines.geojson"
        geometry_type = "curve"
        "#;
    let config: ApplicationCfg = parse_config(toml.to_string(), "").unwrap();
    let err = MosaicService::from_config(&config).err().unwrap();
    assert_eq!(
        err,
        "Configuration error: Unknown geometry type 'curve' of dataset 'lines'"
    );

    let pattern = dir.join("data").join("*.tif").to_string_lossy().to_string();
    let err = MosaicService::from_config(
        &parse_config::<ApplicationCfg>(
            format!(
                "[grid]\npredefined = \"web_mercator\"\n[[dataset]]\nname = \"dem\"\npath = \"{}\"\npreload = true\n",
                pattern
            ),
            "",
        )
        .unwrap(),
    )
    .err()
    .unwrap();
    assert!(err.contains("Unable to read any files from path"));
}

#[test]
fn test_gen_config() {
    let config: Result<ApplicationCfg, _> = parse_config(MosaicService::gen_config(), "");
    let config = config.unwrap();
    assert_eq!(config.datasets[0].name, "elevation");
    assert_eq!(config.datasets[0].tiling.as_ref().map(|t| t.maxzoom), Some(5));
}

#[test]
fn test_shared_datasets() {
    let dir = test_dir("shared");
    let pattern = write_dataset(&dir);
    let datasets = format!(
        "{}\n[[dataset]]\nname = \"dem2\"\npath = \"{}\"\n",
        multifile_toml(&pattern),
        pattern
    );
    let service = service(&dir, &datasets);
    let raster = |name: &str| match service.datasources.dataset(name).unwrap().datasource.as_ref() {
        Datasource::MultiFile(src) => src.raster().unwrap(),
        _ => panic!("multi-file dataset expected"),
    };
    assert!(Arc::ptr_eq(&raster("dem"), &raster("dem2")));
    assert_eq!(service.datasources.registry.len(), 1);
}

#[test]
fn test_datasource_from_args() {
    let dir = test_dir("args");
    let path = dir.join("data").join("elevation.tif");
    write_constant(&path, Extent::new(0.0, 0.0, 1.0e6, 1.0e6), 3.0);
    let path = path.to_string_lossy().to_string();
    let args = App::new("mosaic")
        .arg(Arg::with_name("datasource").long("datasource").takes_value(true))
        .get_matches_from(vec!["mosaic", "--datasource", &path]);
    let dss = Datasources::from_args(&args, &TileScheme::web_mercator(), &RasterIo::default()).unwrap();
    assert_eq!(dss.names(), vec!["elevation"]);
    assert!(matches!(
        dss.dataset("elevation").unwrap().datasource.as_ref(),
        Datasource::Raster(_)
    ));
}
