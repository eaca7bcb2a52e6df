//
// Copyright (c) Pirmin Kalberer. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.
//

use crate::transform::TransformCfg;
use regex::Regex;
use serde::Deserialize;
use std;
use std::collections::HashMap;
use std::env;
use std::error::Error;
use std::fs::File;
use std::io::prelude::*;
use tera::{Context, Tera};
use toml::Value;

pub trait Config<'a, C: Deserialize<'a>>
where
    Self: std::marker::Sized,
{
    /// Read configuration
    fn from_config(config: &C) -> Result<Self, String>;
    /// Generate configuration template
    fn gen_config() -> String;
    /// Generate configuration template with runtime information
    fn gen_runtime_config(&self) -> String {
        Self::gen_config()
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct ApplicationCfg {
    pub grid: GridCfg,
    #[serde(rename = "dataset", default)]
    pub datasets: Vec<DatasetCfg>,
    pub cache: Option<CacheCfg>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct GridCfg {
    pub predefined: Option<String>,
    pub user: Option<UserGridCfg>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct UserGridCfg {
    /// Width and height of a tile in pixels
    #[serde(default = "default_tile_size")]
    pub tile_size: u32,
    #[serde(default)]
    pub minzoom: u8,
    #[serde(default = "default_grid_maxzoom")]
    pub maxzoom: u8,
    /// Projected extent of zoom level 0 as (min, max)
    pub x_range: (f64, f64),
    pub y_range: (f64, f64),
    /// Ground units per pixel at zoom level 0. Derived from `x_range` if missing.
    pub initial_resolution: Option<f64>,
    #[serde(default = "default_srid")]
    pub srid: i32,
}

pub fn default_tile_size() -> u32 {
    256
}

fn default_grid_maxzoom() -> u8 {
    30
}

fn default_srid() -> i32 {
    3857
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatasetCfg {
    pub name: String,
    /// File path. A `*` in the file name selects a multi-file raster.
    pub path: String,
    /// raster | point | line | polygon
    #[serde(default = "default_geometry_type")]
    pub geometry_type: String,
    /// Raster band to render
    pub band: Option<String>,
    /// Vector attribute aggregated into rendered cells (default: feature count)
    pub field: Option<String>,
    /// SRID of vector input coordinates (GeoJSON default: 4326)
    pub srid: Option<i32>,
    /// linear | nearest
    #[serde(default = "default_interpolate")]
    pub raster_interpolate: String,
    /// Open the dataset at startup instead of on first request
    #[serde(default)]
    pub preload: bool,
    #[serde(default)]
    pub force_recreate_overviews: bool,
    #[serde(rename = "transform", default)]
    pub transforms: Vec<TransformCfg>,
    pub tiling: Option<TilingCfg>,
}

fn default_geometry_type() -> String {
    "raster".to_string()
}

fn default_interpolate() -> String {
    "linear".to_string()
}

#[derive(Deserialize, Clone, Debug)]
pub struct TilingCfg {
    #[serde(default)]
    pub minzoom: u8,
    #[serde(default = "default_tiling_maxzoom")]
    pub maxzoom: u8,
}

fn default_tiling_maxzoom() -> u8 {
    5
}

#[derive(Deserialize, Clone, Debug)]
pub struct CacheCfg {
    pub file: Option<CacheFileCfg>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct CacheFileCfg {
    pub base: String,
}

pub const DEFAULT_CONFIG: &'static str = r#"
[grid]
predefined = "web_mercator"

[[dataset]]
name = ""
path = ""

[cache.file]
base = "/tmp/mosaic"
"#;

/// Load and parse the config file into an config struct.
pub fn read_config<'a, T: Deserialize<'a>>(path: &str) -> Result<T, String> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(_) => {
            return Err("Could not find config file!".to_string());
        }
    };
    let mut config_toml = String::new();
    if let Err(err) = file.read_to_string(&mut config_toml) {
        return Err(format!("Error while reading config: [{}]", err));
    };

    parse_config(config_toml, path)
}

/// Parse the configuration into an config struct.
pub fn parse_config<'a, T: Deserialize<'a>>(config_toml: String, path: &str) -> Result<T, String> {
    // Check for old ${var} expressions
    let re = Regex::new(r"\$\{([[:alnum:]]+)\}").map_err(|e| e.to_string())?;
    if re.is_match(&config_toml) {
        return Err(
            "Replace old environment variable syntax ${VARNAME} with `{{env.VARNAME}}`".to_string(),
        );
    }

    // Parse template
    let mut tera = Tera::default();
    tera.add_raw_template(path, &config_toml)
        .map_err(|e| format!("Template error: {}", e))?;
    let mut context = Context::new();
    let env: HashMap<String, String> = env::vars().collect();
    context.insert("env", &env);
    let toml = tera.render(path, &context).map_err(|e| match e.source() {
        Some(source) => format!("Template error: {}", source),
        None => format!("Template error: {}", e),
    })?;

    toml.parse::<Value>()
        .and_then(|cfg| cfg.try_into::<T>())
        .map_err(|err| format!("{} - {}", path, err))
}
