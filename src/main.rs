//
// Copyright (c) Pirmin Kalberer. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.
//

#[macro_use]
extern crate clap;
#[macro_use]
extern crate log;

use clap::{App, AppSettings, ArgMatches, SubCommand};
use dotenv::dotenv;
use env_logger::Builder;
use log::Record;
use mosaic_core::cache::{Filecache, Tilecache};
use mosaic_core::core::config::{DatasetCfg, DEFAULT_CONFIG};
use mosaic_core::core::{parse_config, read_config, ApplicationCfg, Config};
use mosaic_core::raster::RasterIo;
use mosaic_core::scan::scan_directory;
use mosaic_core::transform::{default_overview_resolution, overview_levels, transforms_from_config};
use mosaic_service::datasources::Datasources;
use mosaic_service::mosaic_service::MosaicService;
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process;
use std::str::FromStr;
use tile_grid::TileScheme;
use time;

fn init_logger(args: &ArgMatches<'_>) {
    let mut builder = Builder::new();
    builder.format(|buf, record: &Record<'_>| {
        let t = time::now();
        let ts = time::strftime("%Y-%m-%d %H:%M:%S", &t)
            .map(|ts| ts.to_string())
            .unwrap_or_default();
        writeln!(
            buf,
            "{}.{:03} {} {}",
            ts,
            t.tm_nsec / 1000_000,
            record.level(),
            record.args()
        )
    });

    let rust_log_env = env::var("RUST_LOG").ok();
    let rust_log = match (args.value_of("loglevel"), rust_log_env.as_deref()) {
        (None, Some(env_filter)) => env_filter,
        (loglevel, _) => match loglevel.unwrap_or("info") {
            "debug" => "debug,tokio=info",
            loglevel => loglevel,
        },
    };
    builder.parse_filters(rust_log);

    builder.init();
}

fn exit_with<E: std::fmt::Display>(msg: &str, err: E) -> ! {
    println!("{} - {}", msg, err);
    process::exit(1)
}

fn parse_arg<T: FromStr>(args: &ArgMatches<'_>, name: &str) -> Option<T> {
    args.value_of(name).map(|s| {
        s.parse::<T>().unwrap_or_else(|_| {
            println!("Error parsing '{}' value '{}'", name, s);
            process::exit(1)
        })
    })
}

fn config_from_args(args: &ArgMatches<'_>) -> ApplicationCfg {
    if let Some(cfgpath) = args.value_of("config") {
        info!("Reading configuration from '{}'", cfgpath);
        if args.value_of("datasource").is_some() {
            warn!("Ignoring argument `datasource`");
        }
        read_config(cfgpath).unwrap_or_else(|err| exit_with("Error reading configuration", err))
    } else {
        parse_config(DEFAULT_CONFIG.to_string(), "")
            .unwrap_or_else(|err| exit_with("Error reading configuration", err))
    }
}

fn service_from_args(config: &ApplicationCfg, args: &ArgMatches<'_>) -> MosaicService {
    if args.value_of("config").is_some() {
        MosaicService::from_config(config)
            .unwrap_or_else(|err| exit_with("Error reading configuration", err))
    } else {
        let scheme = TileScheme::from_config(&config.grid)
            .unwrap_or_else(|err| exit_with("Error reading configuration", err));
        let io = RasterIo::default();
        let datasources = Datasources::from_args(args, &scheme, &io)
            .unwrap_or_else(|err| exit_with("Error opening datasource", err));
        if datasources.datasets.is_empty() {
            println!("Either 'config' or 'datasource' is required");
            process::exit(1)
        }
        let cache = match args.value_of("cache") {
            None => Tilecache::from_config(config)
                .unwrap_or_else(|err| exit_with("Error reading configuration", err)),
            Some(dir) => Tilecache::Filecache(Filecache {
                basepath: dir.to_string(),
            }),
        };
        MosaicService {
            datasources,
            scheme,
            cache,
            io,
        }
    }
}

fn dataset_name<'a>(service: &'a MosaicService, args: &'a ArgMatches<'_>) -> &'a str {
    match args.value_of("dataset") {
        Some(name) => name,
        None => match service.datasources.names().as_slice() {
            [name] => *name,
            names => {
                println!("Missing 'dataset' argument. Available: {}", names.join(", "));
                process::exit(1)
            }
        },
    }
}

fn parse_levels(numlist: &str) -> BTreeMap<u8, u32> {
    numlist
        .split(',')
        .map(|v| {
            let level = v.trim().parse::<u8>().unwrap_or_else(|_| {
                println!("Error parsing 'levels' as list of zoom levels");
                process::exit(1)
            });
            let resolution = default_overview_resolution(level).unwrap_or_else(|| {
                println!("Overview level {} is too large", level);
                process::exit(1)
            });
            (level, resolution)
        })
        .collect()
}

fn build_overviews(args: &ArgMatches<'_>) {
    let config = config_from_args(args);
    let service = service_from_args(&config, args);
    let name = dataset_name(&service, args);
    let levels = args.value_of("levels").map(parse_levels);
    let force = parse_arg::<bool>(args, "force").unwrap_or(false);
    match service.build_overviews(name, levels.as_ref(), force) {
        Ok(report) => println!("{:?}", report),
        Err(err) => exit_with("Error building overviews", err),
    }
}

fn list_tiles(args: &ArgMatches<'_>) {
    let config = config_from_args(args);
    let service = service_from_args(&config, args);
    let name = dataset_name(&service, args);
    let dataset = service
        .dataset(name)
        .unwrap_or_else(|err| exit_with("Error listing tiles", err));
    let minzoom = parse_arg::<u8>(args, "minzoom").unwrap_or(dataset.minzoom);
    let maxzoom = parse_arg::<u8>(args, "maxzoom").unwrap_or(dataset.maxzoom);
    let batch = service
        .list_tiles(name, minzoom, maxzoom)
        .unwrap_or_else(|err| exit_with("Error listing tiles", err));
    println!("z,x,y,q");
    for row in batch.iter() {
        println!("{},{},{},{}", row.z, row.x, row.y, row.quadkey);
    }
}

fn extent(args: &ArgMatches<'_>) {
    let config = config_from_args(args);
    let service = service_from_args(&config, args);
    let name = dataset_name(&service, args);
    match service.full_extent(name) {
        Ok(Some(e)) => println!("{},{},{},{}", e.minx, e.miny, e.maxx, e.maxy),
        Ok(None) => println!("Dataset '{}' is empty", name),
        Err(err) => exit_with("Error reading extent", err),
    }
}

fn tile(args: &ArgMatches<'_>) {
    let config = config_from_args(args);
    let service = service_from_args(&config, args);
    let name = dataset_name(&service, args);
    let (x, y, z) = match (parse_arg(args, "xtile"), parse_arg(args, "ytile"), parse_arg(args, "zoom")) {
        (Some(x), Some(y), Some(z)) => (x, y, z),
        _ => {
            println!("Arguments 'xtile', 'ytile' and 'zoom' are required");
            process::exit(1)
        }
    };
    let bytes = match service.cached_tile(name, x, y, z) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            println!("Tile {}/{}/{} of '{}' has no data", z, x, y, name);
            return;
        }
        Err(err) => exit_with("Error reading tile", err),
    };
    let output = args.value_of("output").unwrap_or("tile.tif");
    fs::write(output, &bytes).unwrap_or_else(|err| exit_with("Error writing tile", err));
    info!("Tile {}/{}/{} written to {}", z, x, y, output);
}

fn generate(args: &ArgMatches<'_>) {
    let config = config_from_args(args);
    let service = service_from_args(&config, args);
    if let Tilecache::Nocache(_) = service.cache {
        println!("Missing configuration entry base in [cache.file]");
        process::exit(1)
    }
    let stats = service
        .generate(
            args.value_of("dataset"),
            parse_arg(args, "minzoom"),
            parse_arg(args, "maxzoom"),
            parse_arg(args, "nodes"),
            parse_arg(args, "nodeno"),
            parse_arg(args, "progress").unwrap_or(true),
            parse_arg(args, "overwrite").unwrap_or(false),
        )
        .unwrap_or_else(|err| exit_with("Error generating tiles", err));
    info!(
        "{} tiles: {} written, {} cached, {} empty, {} failed",
        stats.tiles, stats.written, stats.existing, stats.empty, stats.failed
    );
}

fn dataset_toml(cfg: &DatasetCfg) -> String {
    let mut toml = format!(
        "\n[[dataset]]\nname = \"{}\"\npath = \"{}\"\ngeometry_type = \"{}\"\n",
        cfg.name, cfg.path, cfg.geometry_type
    );
    if let Some(ref band) = cfg.band {
        toml.push_str(&format!("band = \"{}\"\n", band));
    }
    let levels = transforms_from_config(&cfg.transforms).and_then(|t| overview_levels(&t));
    if let Ok(Some(levels)) = levels {
        let levels: Vec<_> = levels
            .iter()
            .map(|(level, res)| format!("\"{}\" = {}", level, res))
            .collect();
        toml.push_str(&format!(
            "\n[[dataset.transform]]\nname = \"build_raster_overviews\"\nargs = {{ levels = {{ {} }} }}\n",
            levels.join(", ")
        ));
    }
    toml
}

fn gen_config(args: &ArgMatches<'_>) -> String {
    match args.value_of("datadir") {
        Some(dir) => {
            let levels: Option<Vec<u8>> = args
                .value_of("levels")
                .map(|numlist| parse_levels(numlist).keys().cloned().collect());
            let datasets = scan_directory(Path::new(dir), levels.as_deref())
                .unwrap_or_else(|err| exit_with("Error scanning directory", err));
            let mut config = "[grid]\npredefined = \"web_mercator\"\n".to_string();
            for cfg in &datasets {
                config.push_str(&dataset_toml(cfg));
            }
            config.push_str(&Tilecache::gen_config());
            config
        }
        None => MosaicService::gen_config(),
    }
}

fn main() {
    dotenv().ok();
    let mut app = App::new("mosaic")
        .version(crate_version!())
        .author("Pirmin Kalberer <pka@sourcepole.ch>")
        .about("Tiles sharded raster and vector datasets")
        .subcommand(SubCommand::with_name("genconfig")
                        .args_from_usage("--datadir=[DIR] 'Create datasets for all GeoTIFF directories below DIR'
                                              --levels=[0,1,..] 'Overview levels of scanned datasets'
                                              --loglevel=[error|warn|info|debug|trace] 'Log level (Default: info)'")
                        .about("Generate configuration template"))
        .subcommand(SubCommand::with_name("build-overviews")
                        .args_from_usage("-c, --config=[FILE] 'Load from custom config file'
                                              --datasource=[FILE_OR_PATTERN] 'Raster file or pattern like dir/*.tif'
                                              --loglevel=[error|warn|info|debug|trace] 'Log level (Default: info)'
                                              --dataset=[NAME] 'Dataset name'
                                              --levels=[0,1,..] 'Overview levels (Default: configured levels)'
                                              --force=[false|true] 'Rebuild existing overviews'")
                        .about("Build overviews of a multi-file dataset"))
        .subcommand(SubCommand::with_name("list-tiles")
                        .args_from_usage("-c, --config=[FILE] 'Load from custom config file'
                                              --datasource=[FILE_OR_PATTERN] 'Raster file or pattern like dir/*.tif'
                                              --loglevel=[error|warn|info|debug|trace] 'Log level (Default: info)'
                                              --dataset=[NAME] 'Dataset name'
                                              --minzoom=[LEVEL] 'Minimum zoom level'
                                              --maxzoom=[LEVEL] 'Maximum zoom level'")
                        .about("List tiles covering a dataset as CSV"))
        .subcommand(SubCommand::with_name("extent")
                        .args_from_usage("-c, --config=[FILE] 'Load from custom config file'
                                              --datasource=[FILE_OR_PATTERN] 'Raster file or pattern like dir/*.tif'
                                              --loglevel=[error|warn|info|debug|trace] 'Log level (Default: info)'
                                              --dataset=[NAME] 'Dataset name'")
                        .about("Print the full extent of a dataset"))
        .subcommand(SubCommand::with_name("tile")
                        .args_from_usage("-c, --config=[FILE] 'Load from custom config file'
                                              --datasource=[FILE_OR_PATTERN] 'Raster file or pattern like dir/*.tif'
                                              --cache=[DIR] 'Use tile cache in DIR'
                                              --loglevel=[error|warn|info|debug|trace] 'Log level (Default: info)'
                                              --dataset=[NAME] 'Dataset name'
                                              --xtile=[X] 'Tile column'
                                              --ytile=[Y] 'Tile row'
                                              --zoom=[Z] 'Zoom level'
                                              -o, --output=[FILE] 'Output file (Default: tile.tif)'")
                        .about("Write a single tile, served from the cache if present"))
        .subcommand(SubCommand::with_name("generate")
                        .setting(AppSettings::AllowLeadingHyphen)
                        .args_from_usage("-c, --config=[FILE] 'Load from custom config file'
                                              --datasource=[FILE_OR_PATTERN] 'Raster file or pattern like dir/*.tif'
                                              --cache=[DIR] 'Use tile cache in DIR'
                                              --loglevel=[error|warn|info|debug|trace] 'Log level (Default: info)'
                                              --dataset=[NAME] 'Dataset name'
                                              --minzoom=[LEVEL] 'Minimum zoom level'
                                              --maxzoom=[LEVEL] 'Maximum zoom level'
                                              --nodes=[NUM] 'Number of generator nodes'
                                              --nodeno=[NUM] 'Number of this nodes (0 <= n < nodes)'
                                              --progress=[true|false] 'Show progress bar'
                                              --overwrite=[false|true] 'Overwrite previously cached tiles'")
                        .about("Generate tiles for cache"));

    match app.get_matches_from_safe_borrow(env::args()) {
        //app.get_matches() prohibits later call of app.print_help()
        Result::Err(e) => {
            println!("{}", e);
        }
        Result::Ok(matches) => match matches.subcommand() {
            ("genconfig", Some(sub_m)) => {
                init_logger(sub_m);
                println!("{}", gen_config(sub_m));
            }
            ("build-overviews", Some(sub_m)) => {
                init_logger(sub_m);
                build_overviews(sub_m);
            }
            ("list-tiles", Some(sub_m)) => {
                init_logger(sub_m);
                list_tiles(sub_m);
            }
            ("extent", Some(sub_m)) => {
                init_logger(sub_m);
                extent(sub_m);
            }
            ("tile", Some(sub_m)) => {
                init_logger(sub_m);
                tile(sub_m);
            }
            ("generate", Some(sub_m)) => {
                init_logger(sub_m);
                generate(sub_m);
            }
            _ => {
                let _ = app.print_help();
                println!();
            }
        },
    }
}
