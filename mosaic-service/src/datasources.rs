//
// Copyright (c) Pirmin Kalberer. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.
//

use clap::ArgMatches;
use mosaic_core::core::config::{ApplicationCfg, DatasetCfg, TilingCfg};
use mosaic_core::core::Config;
use mosaic_core::datasource::{
    DatasourceType, MultiFileDatasource, RasterDatasource, VectorDatasource,
};
use mosaic_core::multifile::{MultiFileRaster, SharedRegistry};
use mosaic_core::raster::{GridSpec, Raster, RasterIo, Resampling};
use mosaic_core::transform::{overview_levels, transforms_from_config, Transform};
use mosaic_core::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tile_grid::{Extent, TileScheme};

/// Multi-file raster resolved through the shared registry on each access
pub struct MultiFileSource {
    pub pattern: String,
    band: Option<String>,
    transforms: Vec<Transform>,
    interpolate: Resampling,
    force_recreate_overviews: bool,
    scheme: TileScheme,
    io: RasterIo,
    registry: Arc<SharedRegistry>,
}

impl MultiFileSource {
    pub fn raster(&self) -> Result<Arc<MultiFileRaster>> {
        self.registry.get(&self.pattern, || {
            MultiFileRaster::new(
                &self.pattern,
                self.transforms.clone(),
                &self.scheme,
                self.io.clone(),
                self.force_recreate_overviews,
            )
        })
    }
    pub fn open(&self) -> Result<MultiFileDatasource> {
        Ok(MultiFileDatasource::new(
            self.raster()?,
            self.band.clone(),
            self.interpolate,
        ))
    }
}

pub enum Datasource {
    Raster(RasterDatasource),
    MultiFile(MultiFileSource),
    Vector(VectorDatasource),
}

impl DatasourceType for Datasource {
    fn srid(&self) -> Result<i32> {
        match self {
            Datasource::Raster(ds) => ds.srid(),
            Datasource::MultiFile(src) => src.open()?.srid(),
            Datasource::Vector(ds) => ds.srid(),
        }
    }
    fn full_extent(&self) -> Result<Option<Extent>> {
        match self {
            Datasource::Raster(ds) => ds.full_extent(),
            Datasource::MultiFile(src) => src.open()?.full_extent(),
            Datasource::Vector(ds) => ds.full_extent(),
        }
    }
    fn feature_extents(&self) -> Result<Vec<Extent>> {
        match self {
            Datasource::Raster(ds) => ds.feature_extents(),
            Datasource::MultiFile(src) => src.open()?.feature_extents(),
            Datasource::Vector(ds) => ds.feature_extents(),
        }
    }
    fn render_region(&self, target: &GridSpec, level: Option<u8>) -> Result<Raster> {
        match self {
            Datasource::Raster(ds) => ds.render_region(target, level),
            Datasource::MultiFile(src) => src.open()?.render_region(target, level),
            Datasource::Vector(ds) => ds.render_region(target, level),
        }
    }
}

impl Datasource {
    /// Select the variant from the geometry type and path of a dataset configuration.
    /// Datasets with `preload` or configured overviews are opened immediately.
    pub fn from_dataset_cfg(
        cfg: &DatasetCfg,
        scheme: &TileScheme,
        io: &RasterIo,
        registry: &Arc<SharedRegistry>,
    ) -> Result<Datasource> {
        let transforms = transforms_from_config(&cfg.transforms)?;
        match cfg.geometry_type.as_str() {
            "raster" => {
                let interpolate = cfg.raster_interpolate.parse::<Resampling>()?;
                let eager = cfg.preload || overview_levels(&transforms)?.is_some();
                if cfg.path.contains('*') {
                    let src = MultiFileSource {
                        pattern: cfg.path.clone(),
                        band: cfg.band.clone(),
                        transforms,
                        interpolate,
                        force_recreate_overviews: cfg.force_recreate_overviews,
                        scheme: scheme.clone(),
                        io: io.clone(),
                        registry: registry.clone(),
                    };
                    if eager {
                        src.raster()?;
                    }
                    Ok(Datasource::MultiFile(src))
                } else {
                    let ds = RasterDatasource::new(
                        PathBuf::from(&cfg.path),
                        cfg.band.clone(),
                        transforms,
                        interpolate,
                        scheme,
                        io.clone(),
                    )?;
                    if eager {
                        ds.load()?;
                    }
                    Ok(Datasource::Raster(ds))
                }
            }
            "point" | "line" | "polygon" => {
                let ds = VectorDatasource::read(
                    Path::new(&cfg.path),
                    cfg.srid.unwrap_or(4326),
                    &transforms,
                    cfg.field.clone(),
                    scheme.srid,
                )?;
                Ok(Datasource::Vector(ds))
            }
            other => Err(Error::Config(format!(
                "Unknown geometry type '{}' of dataset '{}'",
                other, cfg.name
            ))),
        }
    }
}

/// Named datasource with its tiling zoom range
#[derive(Clone)]
pub struct Dataset {
    pub name: String,
    pub datasource: Arc<Datasource>,
    pub minzoom: u8,
    pub maxzoom: u8,
    /// Band name written into generated tiles
    pub band: String,
}

#[derive(Clone, Default)]
pub struct Datasources {
    /// Datasets in configuration order
    pub datasets: Vec<Dataset>,
    pub registry: Arc<SharedRegistry>,
}

impl Datasources {
    pub fn new() -> Self {
        Datasources::default()
    }
    pub fn add(&mut self, name: &str, datasource: Datasource, tiling: Option<&TilingCfg>, band: Option<&str>) {
        if self.dataset(name).is_some() {
            warn!("Replacing dataset '{}'", name);
            self.datasets.retain(|ds| ds.name != name);
        }
        let (minzoom, maxzoom) = tiling.map(|t| (t.minzoom, t.maxzoom)).unwrap_or((0, 5));
        self.datasets.push(Dataset {
            name: name.to_string(),
            datasource: Arc::new(datasource),
            minzoom,
            maxzoom,
            band: band.unwrap_or("band_data").to_string(),
        });
    }
    pub fn dataset(&self, name: &str) -> Option<&Dataset> {
        self.datasets.iter().find(|ds| ds.name == name)
    }
    pub fn names(&self) -> Vec<&str> {
        self.datasets.iter().map(|ds| ds.name.as_str()).collect()
    }

    /// Build datasets from configuration
    pub fn from_dataset_cfgs(cfgs: &[DatasetCfg], scheme: &TileScheme, io: &RasterIo) -> Result<Self> {
        let mut datasources = Datasources::new();
        for cfg in cfgs {
            let ds = Datasource::from_dataset_cfg(cfg, scheme, io, &datasources.registry)?;
            datasources.add(&cfg.name, ds, cfg.tiling.as_ref(), cfg.band.as_deref());
        }
        Ok(datasources)
    }

    /// Single raster dataset named after the file given with `--datasource`
    pub fn from_args(args: &ArgMatches, scheme: &TileScheme, io: &RasterIo) -> Result<Self> {
        let mut datasources = Datasources::new();
        if let Some(path) = args.value_of("datasource") {
            let name = Path::new(path)
                .parent()
                .filter(|_| path.contains('*'))
                .unwrap_or_else(|| Path::new(path))
                .file_stem()
                .and_then(|n| n.to_str())
                .unwrap_or("datasource")
                .to_string();
            let cfg = DatasetCfg {
                name: name.clone(),
                path: path.to_string(),
                geometry_type: "raster".to_string(),
                band: None,
                field: None,
                srid: None,
                raster_interpolate: "linear".to_string(),
                preload: false,
                force_recreate_overviews: false,
                transforms: Vec::new(),
                tiling: None,
            };
            let ds = Datasource::from_dataset_cfg(&cfg, scheme, io, &datasources.registry)?;
            datasources.add(&name, ds, None, None);
        }
        Ok(datasources)
    }
}

impl<'a> Config<'a, ApplicationCfg> for Datasources {
    fn from_config(app_cfg: &ApplicationCfg) -> std::result::Result<Self, String> {
        let scheme = TileScheme::from_config(&app_cfg.grid)?;
        Datasources::from_dataset_cfgs(&app_cfg.datasets, &scheme, &RasterIo::default())
            .map_err(|e| e.to_string())
    }
    fn gen_config() -> String {
        let toml = r#"
[[dataset]]
name = "elevation"
# A '*' in the file name combines all matching files
path = "data/elevation/*.tif"
geometry_type = "raster"
band = "band_data"
#raster_interpolate = "linear"
#preload = false
#force_recreate_overviews = false

#[[dataset.transform]]
#name = "reproject_raster"
#args = { epsg = 3857 }

#[[dataset.transform]]
#name = "build_raster_overviews"
#args = { levels = { "0" = 256, "1" = 512, "2" = 1024 } }

[dataset.tiling]
minzoom = 0
maxzoom = 5
"#;
        toml.to_string()
    }
}
