//
// Copyright (c) Pirmin Kalberer. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.
//

use crate::datasources::{Dataset, Datasource, Datasources};
use mosaic_core::cache::{Cache, Tilecache};
use mosaic_core::core::{ApplicationCfg, Config};
use mosaic_core::datasource::DatasourceType;
use mosaic_core::multifile::OverviewReport;
use mosaic_core::raster::{GridSpec, Raster, RasterIo, Transformer, DENSIFY_PTS};
use mosaic_core::transform::overview_levels;
use mosaic_core::{Error, Result};
use pbr::ProgressBar;
use std::cmp;
use std::collections::BTreeMap;
use std::io::Read;
use std::io::Stdout;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tile_grid::{Extent, TileBatch, TileScheme};
use tokio::task;

/// Area to render
#[derive(Clone, Debug)]
pub enum Region {
    /// Bounding box in the tile scheme's CRS
    Extent(Extent),
    Tile { x: u32, y: u32, z: u8 },
}

/// Tile counts of a generate run
#[derive(Default, Debug)]
pub struct GenerateStats {
    /// Tiles assigned to this node
    pub tiles: u64,
    pub written: u64,
    /// Tiles already in the cache
    pub existing: u64,
    /// Tiles without data
    pub empty: u64,
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    written: AtomicU64,
    empty: AtomicU64,
    failed: AtomicU64,
}

/// Raster rendering service over all configured datasets
#[derive(Clone)]
pub struct MosaicService {
    pub datasources: Datasources,
    pub scheme: TileScheme,
    pub cache: Tilecache,
    pub io: RasterIo,
}

impl MosaicService {
    pub fn dataset(&self, name: &str) -> Result<&Dataset> {
        self.datasources
            .dataset(name)
            .ok_or_else(|| Error::UnknownDataset(name.to_string()))
    }

    /// Dataset extent in its own CRS
    pub fn full_extent(&self, name: &str) -> Result<Option<Extent>> {
        self.dataset(name)?.datasource.full_extent()
    }

    /// Render a region onto a `width` x `height` grid in the tile scheme's CRS.
    /// Tile requests use the overview of their zoom level if there is one.
    pub fn render_region(&self, name: &str, region: &Region, width: u32, height: u32) -> Result<Raster> {
        let ds = &self.dataset(name)?.datasource;
        let (extent, level) = match region {
            Region::Extent(extent) => (extent.clone(), None),
            Region::Tile { x, y, z } => {
                if !self.scheme.is_valid_tile(*x as i64, *y as i64, *z) {
                    debug!("Invalid tile {}/{}/{}", z, x, y);
                    return Ok(Raster::empty());
                }
                (self.scheme.get_tile_meters(*x, *y, *z), Some(*z))
            }
        };
        let target = GridSpec::from_extent(&extent, width, height, self.scheme.srid);
        ds.render_region(&target, level)
    }

    /// Square tile of the scheme's tile size
    pub fn tile(&self, name: &str, x: u32, y: u32, z: u8) -> Result<Raster> {
        let size = self.scheme.tile_size;
        self.render_region(name, &Region::Tile { x, y, z }, size, size)
    }

    fn cache_path(name: &str, x: u32, y: u32, z: u8) -> String {
        format!("{}/{}/{}/{}.tif", name, z, x, y)
    }

    /// Encoded tile from the cache. Missing tiles are rendered and stored.
    /// Tiles without data are returned as `None` and not cached.
    pub fn cached_tile(&self, name: &str, x: u32, y: u32, z: u8) -> Result<Option<Vec<u8>>> {
        let path = Self::cache_path(name, x, y, z);
        let mut cached: Option<std::io::Result<Vec<u8>>> = None;
        self.cache.read(&path, |f| {
            let mut data = Vec::new();
            cached = Some(f.read_to_end(&mut data).map(|_| data));
        });
        match cached {
            Some(Ok(data)) => {
                debug!("Cached tile {}", path);
                return Ok(Some(data));
            }
            Some(Err(e)) => warn!("Error reading cached tile {}: {}", path, e),
            None => {}
        }
        let raster = self.tile(name, x, y, z)?;
        if raster.is_empty() || raster.valid_count() == 0 {
            return Ok(None);
        }
        let band = &self.dataset(name)?.band;
        let bytes = self.io.driver.encode(&raster, band)?;
        self.cache.write(&path, &bytes)?;
        Ok(Some(bytes))
    }

    /// Build overviews of a multi-file dataset. Uses the configured levels if `levels` is `None`.
    pub fn build_overviews(
        &self,
        name: &str,
        levels: Option<&BTreeMap<u8, u32>>,
        force: bool,
    ) -> Result<OverviewReport> {
        let src = match self.dataset(name)?.datasource.as_ref() {
            Datasource::MultiFile(src) => src,
            _ => {
                return Err(Error::Config(format!(
                    "Dataset '{}' is not a multi-file raster",
                    name
                )))
            }
        };
        let raster = src.raster()?;
        let configured = overview_levels(raster.transforms())?;
        let levels = levels
            .or_else(|| configured.as_ref())
            .ok_or_else(|| Error::Config(format!("No overview levels for dataset '{}'", name)))?;
        raster.build_overviews(levels, force)
    }

    /// Extents for tile enumeration in the tile scheme's CRS
    pub fn tiling_extents(&self, name: &str) -> Result<Vec<Extent>> {
        let ds = &self.dataset(name)?.datasource;
        let extents = ds.feature_extents()?;
        let transformer = Transformer::new(ds.srid()?, self.scheme.srid)?;
        extents
            .iter()
            .map(|extent| transformer.transform_extent(extent, DENSIFY_PTS))
            .collect()
    }

    /// Sorted tiles touching the dataset on levels `minzoom..=maxzoom`
    pub fn list_tiles(&self, name: &str, minzoom: u8, maxzoom: u8) -> Result<TileBatch> {
        let extents = self.tiling_extents(name)?;
        Ok(TileBatch::from_extents(&self.scheme, &extents, minzoom, maxzoom))
    }

    /// Zoom range limited by the dataset tiling configuration and the tile scheme
    fn zoom_range(&self, dataset: &Dataset, minzoom: Option<u8>, maxzoom: Option<u8>) -> (u8, u8) {
        let ts_minzoom = cmp::max(dataset.minzoom, minzoom.unwrap_or(0));
        let ts_maxzoom = *[dataset.maxzoom, maxzoom.unwrap_or(99), self.scheme.max_zoom]
            .iter()
            .min()
            .unwrap_or(&dataset.maxzoom);
        if minzoom.map(|z| z < ts_minzoom).unwrap_or(false) {
            warn!("Skipping zoom levels <{}", ts_minzoom);
        }
        if maxzoom.map(|z| z > ts_maxzoom).unwrap_or(false) {
            warn!("Skipping zoom levels >{}", ts_maxzoom);
        }
        (ts_minzoom, ts_maxzoom)
    }

    /// Render tiles into the tile cache. Tiles are distributed round-robin over
    /// `nodes`, this call renders the share of `nodeno`.
    #[allow(clippy::too_many_arguments)]
    pub fn generate(
        &self,
        dataset_name: Option<&str>,
        minzoom: Option<u8>,
        maxzoom: Option<u8>,
        nodes: Option<u8>,
        nodeno: Option<u8>,
        progress: bool,
        overwrite: bool,
    ) -> Result<GenerateStats> {
        let nodes = nodes.unwrap_or(1).max(1) as usize;
        let nodeno = nodeno.unwrap_or(0) as usize;
        if nodeno >= nodes {
            return Err(Error::Config(format!(
                "Node number {} out of range for {} nodes",
                nodeno, nodes
            )));
        }
        if let Some(name) = dataset_name {
            self.dataset(name)?;
        }
        info!("{}", &self.cache.info());
        let rt = tokio::runtime::Runtime::new()?;
        let mut stats = GenerateStats::default();
        for dataset in &self.datasources.datasets {
            if dataset_name.map(|name| name != dataset.name).unwrap_or(false) {
                continue;
            }
            if progress {
                println!("Generating dataset '{}'...", dataset.name);
            }
            let (ts_minzoom, ts_maxzoom) = self.zoom_range(dataset, minzoom, maxzoom);
            let batch = self.list_tiles(&dataset.name, ts_minzoom, ts_maxzoom)?;
            let ds_stats = rt.block_on(self.generate_dataset(dataset, &batch, nodes, nodeno, progress, overwrite));
            info!("Dataset '{}': {:?}", dataset.name, ds_stats);
            stats.tiles += ds_stats.tiles;
            stats.written += ds_stats.written;
            stats.existing += ds_stats.existing;
            stats.empty += ds_stats.empty;
            stats.failed += ds_stats.failed;
        }
        if progress {
            println!();
        }
        Ok(stats)
    }

    async fn generate_dataset(
        &self,
        dataset: &Dataset,
        batch: &TileBatch,
        nodes: usize,
        nodeno: usize,
        progress: bool,
        overwrite: bool,
    ) -> GenerateStats {
        // Keep a queue of tasks waiting for parallel execution (size >= #cores)
        let task_queue_size = cmp::min(num_cpus::get() * 2, 64);
        let mut tasks = Vec::with_capacity(task_queue_size);
        let counters = Arc::new(Counters::default());
        let mut stats = GenerateStats::default();
        let rows: Vec<_> = batch.partition(nodes, nodeno).cloned().collect();
        let mut pb = if progress {
            Some(self.progress_bar(&format!("{}: ", dataset.name), rows.len() as u64))
        } else {
            None
        };
        for row in rows {
            stats.tiles += 1;
            let path = Self::cache_path(&dataset.name, row.x, row.y, row.z);
            if !overwrite && self.cache.exists(&path) {
                stats.existing += 1;
            } else {
                let svc = self.clone();
                let name = dataset.name.clone();
                let band = dataset.band.clone();
                let counters = counters.clone();
                tasks.push(task::spawn_blocking(move || {
                    let written = svc
                        .tile(&name, row.x, row.y, row.z)
                        .and_then(|raster| {
                            if raster.is_empty() || raster.valid_count() == 0 {
                                return Ok(false);
                            }
                            let bytes = svc.io.driver.encode(&raster, &band)?;
                            svc.cache.write(&path, &bytes)?;
                            Ok(true)
                        });
                    match written {
                        Ok(true) => counters.written.fetch_add(1, Ordering::SeqCst),
                        Ok(false) => counters.empty.fetch_add(1, Ordering::SeqCst),
                        Err(e) => {
                            error!("Error writing {}: {}", path, e);
                            counters.failed.fetch_add(1, Ordering::SeqCst)
                        }
                    };
                }));
                if tasks.len() >= task_queue_size {
                    tasks = await_one_task(tasks).await;
                }
            }
            if let Some(pb) = pb.as_mut() {
                pb.inc();
            }
        }
        // Finish remaining tasks
        futures_util::future::join_all(tasks).await;
        if let Some(pb) = pb.as_mut() {
            pb.finish();
        }
        stats.written = counters.written.load(Ordering::SeqCst);
        stats.empty = counters.empty.load(Ordering::SeqCst);
        stats.failed = counters.failed.load(Ordering::SeqCst);
        stats
    }

    fn progress_bar(&self, msg: &str, tiles: u64) -> ProgressBar<Stdout> {
        let mut pb = ProgressBar::new(tiles);
        pb.message(msg);
        pb.show_speed = false;
        pb.show_percent = false;
        pb.show_time_left = false;
        pb
    }
}

async fn await_one_task<T>(tasks: Vec<task::JoinHandle<T>>) -> Vec<task::JoinHandle<T>> {
    // Ignoring all errors
    let (_result, _index, remaining) = futures_util::future::select_all(tasks).await;
    remaining
}

impl<'a> Config<'a, ApplicationCfg> for MosaicService {
    fn from_config(config: &ApplicationCfg) -> std::result::Result<Self, String> {
        let scheme = TileScheme::from_config(&config.grid)?;
        let io = RasterIo::default();
        let datasources = Datasources::from_dataset_cfgs(&config.datasets, &scheme, &io)
            .map_err(|e| e.to_string())?;
        let cache = Tilecache::from_config(config)?;
        Ok(MosaicService {
            datasources,
            scheme,
            cache,
            io,
        })
    }
    fn gen_config() -> String {
        format!(
            "{}{}{}",
            r#"[grid]
# Predefined grids: web_mercator
predefined = "web_mercator"
"#,
            Datasources::gen_config(),
            Tilecache::gen_config()
        )
    }
}
