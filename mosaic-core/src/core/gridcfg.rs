//
// Copyright (c) Pirmin Kalberer. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.
//

use crate::core::config::GridCfg;
use crate::core::Config;
use tile_grid::TileScheme;

impl<'a> Config<'a, GridCfg> for TileScheme {
    fn from_config(grid_cfg: &GridCfg) -> Result<Self, String> {
        if let Some(ref gridname) = grid_cfg.predefined {
            match gridname.as_str() {
                "web_mercator" => Ok(TileScheme::web_mercator()),
                _ => Err(format!("Unkown grid '{}'", gridname)),
            }
        } else if let Some(ref usergrid) = grid_cfg.user {
            let (minx, maxx) = usergrid.x_range;
            let (miny, maxy) = usergrid.y_range;
            if !(maxx > minx && maxy > miny) {
                return Err("Invalid grid ranges".to_string());
            }
            if usergrid.tile_size == 0 {
                return Err("tile_size must be positive".to_string());
            }
            if usergrid.minzoom > usergrid.maxzoom || usergrid.maxzoom > 62 {
                return Err(format!(
                    "Invalid zoom range {}..{}",
                    usergrid.minzoom, usergrid.maxzoom
                ));
            }
            let initial_resolution = usergrid
                .initial_resolution
                .unwrap_or((maxx - minx) / usergrid.tile_size as f64);
            Ok(TileScheme {
                x_range: usergrid.x_range,
                y_range: usergrid.y_range,
                tile_size: usergrid.tile_size,
                min_zoom: usergrid.minzoom,
                max_zoom: usergrid.maxzoom,
                x_origin_offset: -minx,
                y_origin_offset: -miny,
                initial_resolution,
                srid: usergrid.srid,
            })
        } else {
            Err("Invalid grid definition".to_string())
        }
    }
    fn gen_config() -> String {
        let toml = r#"
[grid]
# Predefined grids: web_mercator
predefined = "web_mercator"
# User defined grid:
#[grid.user]
#tile_size = 256
#minzoom = 0
#maxzoom = 18
#x_range = [-20037508.34, 20037508.34]
#y_range = [-20037508.34, 20037508.34]
#srid = 3857
"#;
        toml.to_string()
    }
}
