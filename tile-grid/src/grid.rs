//
// Copyright (c) Pirmin Kalberer. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.
//

//! Slippy map tile scheme

use std::f64::consts;

/// Geographic extent
#[derive(PartialEq, Clone, Debug)]
pub struct Extent {
    pub minx: f64,
    pub miny: f64,
    pub maxx: f64,
    pub maxy: f64,
}

impl Extent {
    pub fn new(minx: f64, miny: f64, maxx: f64, maxy: f64) -> Extent {
        Extent {
            minx,
            miny,
            maxx,
            maxy,
        }
    }
    pub fn width(&self) -> f64 {
        self.maxx - self.minx
    }
    pub fn height(&self) -> f64 {
        self.maxy - self.miny
    }
    /// Closed box intersection test. Boxes sharing an edge intersect.
    pub fn intersects(&self, other: &Extent) -> bool {
        self.minx <= other.maxx
            && other.minx <= self.maxx
            && self.miny <= other.maxy
            && other.miny <= self.maxy
    }
    pub fn union(&self, other: &Extent) -> Extent {
        Extent {
            minx: self.minx.min(other.minx),
            miny: self.miny.min(other.miny),
            maxx: self.maxx.max(other.maxx),
            maxy: self.maxy.max(other.maxy),
        }
    }
    /// Union of all extents, `None` for an empty input
    pub fn union_all<'a, I>(extents: I) -> Option<Extent>
    where
        I: IntoIterator<Item = &'a Extent>,
    {
        extents.into_iter().fold(None, |acc, e| match acc {
            None => Some(e.clone()),
            Some(u) => Some(u.union(e)),
        })
    }
    /// Grow the box by `dx` / `dy` on each side
    pub fn buffer(&self, dx: f64, dy: f64) -> Extent {
        Extent {
            minx: self.minx - dx,
            miny: self.miny - dy,
            maxx: self.maxx + dx,
            maxy: self.maxy + dy,
        }
    }
    /// `[minx, miny, maxx, maxy]`
    pub fn as_array(&self) -> [f64; 4] {
        [self.minx, self.miny, self.maxx, self.maxy]
    }
}

/// Min and max tile indices of one level. `maxx` and `maxy` are exclusive.
#[derive(PartialEq, Clone, Debug)]
pub struct ExtentInt {
    pub minx: u32,
    pub miny: u32,
    pub maxx: u32,
    pub maxy: u32,
}

impl ExtentInt {
    pub fn is_empty(&self) -> bool {
        self.minx >= self.maxx || self.miny >= self.maxy
    }
    pub fn tile_count(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            (self.maxx - self.minx) as u64 * (self.maxy - self.miny) as u64
        }
    }
}

/// Tile address in XYZ numbering (y grows southwards) with its extent in meters
#[derive(PartialEq, Clone, Debug)]
pub struct Tile {
    pub x: u32,
    pub y: u32,
    pub z: u8,
    pub extent: Extent,
}

/// Tolerance in tile units for snapping coordinates on tile edges
const EPSILON: f64 = 0.000001;

/// Convert a y tile index between TMS (south-up) and XYZ (north-up) numbering.
/// The conversion is its own inverse.
pub fn invert_y_tile(y: i64, zoom: u8) -> i64 {
    (1i64 << zoom) - 1 - y
}

/// Tile scheme for a square projected plane
#[derive(Clone, Debug)]
pub struct TileScheme {
    /// x extent of zoom level 0 in ground units
    pub x_range: (f64, f64),
    /// y extent of zoom level 0 in ground units
    pub y_range: (f64, f64),
    /// Width and height of a tile in pixels
    pub tile_size: u32,
    pub min_zoom: u8,
    pub max_zoom: u8,
    /// Shift from pixel space origin to the center of the projected plane
    pub x_origin_offset: f64,
    pub y_origin_offset: f64,
    /// Ground units per pixel at zoom level 0
    pub initial_resolution: f64,
    /// Spatial reference system (EPSG code)
    pub srid: i32,
}

impl Default for TileScheme {
    fn default() -> Self {
        TileScheme::web_mercator()
    }
}

impl TileScheme {
    /// Web Mercator tile scheme (Google maps compatible)
    pub fn web_mercator() -> TileScheme {
        TileScheme {
            x_range: (-20037508.34, 20037508.34),
            y_range: (-20037508.34, 20037508.34),
            tile_size: 256,
            min_zoom: 0,
            max_zoom: 30,
            x_origin_offset: 20037508.34,
            y_origin_offset: 20037508.34,
            initial_resolution: 156543.03392804097,
            srid: 3857,
        }
    }

    /// Extent of zoom level 0
    pub fn extent(&self) -> Extent {
        Extent {
            minx: self.x_range.0,
            miny: self.y_range.0,
            maxx: self.x_range.1,
            maxy: self.y_range.1,
        }
    }

    pub fn get_resolution(&self, zoom: u8) -> f64 {
        self.initial_resolution / 2f64.powi(zoom as i32)
    }

    /// Resolution of all levels from `min_zoom` to `max_zoom`
    pub fn resolutions(&self) -> Vec<f64> {
        (self.min_zoom..=self.max_zoom)
            .map(|z| self.get_resolution(z))
            .collect()
    }

    pub fn pixels_to_meters(&self, px: f64, py: f64, zoom: u8) -> (f64, f64) {
        let res = self.get_resolution(zoom);
        (px * res - self.x_origin_offset, py * res - self.y_origin_offset)
    }

    pub fn meters_to_pixels(&self, mx: f64, my: f64, zoom: u8) -> (f64, f64) {
        let res = self.get_resolution(zoom);
        ((mx + self.x_origin_offset) / res, (my + self.y_origin_offset) / res)
    }

    /// Tile containing a pixel. Pixel y counts from the south, the returned tile y
    /// is in XYZ numbering. A pixel on a tile edge belongs to the tile east/north of it.
    /// Results may be out of range; check with `is_valid_tile`.
    pub fn pixels_to_tile(&self, px: f64, py: f64, zoom: u8) -> (i64, i64) {
        let ts = self.tile_size as f64;
        let tx = (px / ts + EPSILON).floor() as i64;
        let ty = (py / ts + EPSILON).floor() as i64;
        (tx, invert_y_tile(ty, zoom))
    }

    pub fn meters_to_tile(&self, mx: f64, my: f64, zoom: u8) -> (i64, i64) {
        let (px, py) = self.meters_to_pixels(mx, my, zoom);
        self.pixels_to_tile(px, py, zoom)
    }

    pub fn is_valid_tile(&self, x: i64, y: i64, zoom: u8) -> bool {
        if zoom > 62 {
            return false;
        }
        let n = 1i64 << zoom;
        x >= 0 && x < n && y >= 0 && y < n
    }

    /// Extent of a tile given in XYZ numbering
    pub fn get_tile_meters(&self, x: u32, y: u32, zoom: u8) -> Extent {
        let tms_y = invert_y_tile(y as i64, zoom) as f64;
        let ts = self.tile_size as f64;
        let (minx, miny) = self.pixels_to_meters(x as f64 * ts, tms_y * ts, zoom);
        let (maxx, maxy) = self.pixels_to_meters((x as f64 + 1.0) * ts, (tms_y + 1.0) * ts, zoom);
        Extent {
            minx,
            miny,
            maxx,
            maxy,
        }
    }

    /// XYZ tile index range covering `extent` at `zoom`, clamped to the valid tiles.
    /// A box ending exactly on a tile edge does not include the next tile.
    pub fn tile_limit(&self, extent: &Extent, zoom: u8) -> ExtentInt {
        let ts = self.tile_size as f64;
        let n = 1i64 << zoom;
        let (pminx, pminy) = self.meters_to_pixels(extent.minx, extent.miny, zoom);
        let (pmaxx, pmaxy) = self.meters_to_pixels(extent.maxx, extent.maxy, zoom);

        let clamp = |v: f64| -> i64 {
            if v.is_nan() {
                0
            } else {
                (v as i64).max(-1).min(n)
            }
        };
        // TMS tile numbers, max inclusive
        let minx = clamp((pminx / ts + EPSILON).floor());
        let miny = clamp((pminy / ts + EPSILON).floor());
        let maxx = clamp((pmaxx / ts - EPSILON).ceil() - 1.0).max(minx);
        let maxy = clamp((pmaxy / ts - EPSILON).ceil() - 1.0).max(miny);

        let minx = minx.max(0);
        let maxx = maxx.min(n - 1);
        // south-up max becomes XYZ min
        let ymin = invert_y_tile(maxy, zoom).max(0);
        let ymax = invert_y_tile(miny, zoom).min(n - 1);

        if minx > maxx || ymin > ymax {
            return ExtentInt {
                minx: 0,
                miny: 0,
                maxx: 0,
                maxy: 0,
            };
        }
        ExtentInt {
            minx: minx as u32,
            miny: ymin as u32,
            maxx: maxx as u32 + 1,
            maxy: ymax as u32 + 1,
        }
    }

    /// Tile limits for all levels `0..=max_zoom`, suitable for `GridIterator`
    pub fn tile_limits(&self, extent: &Extent) -> Vec<ExtentInt> {
        (0..=self.max_zoom)
            .map(|z| self.tile_limit(extent, z))
            .collect()
    }

    /// All valid tiles touching `extent`, rows north to south, columns west to east
    pub fn get_tiles_by_extent(&self, extent: &Extent, zoom: u8) -> Vec<Tile> {
        let limit = self.tile_limit(extent, zoom);
        let mut tiles = Vec::with_capacity(limit.tile_count() as usize);
        for y in limit.miny..limit.maxy {
            for x in limit.minx..limit.maxx {
                if self.is_valid_tile(x as i64, y as i64, zoom) {
                    tiles.push(Tile {
                        x,
                        y,
                        z: zoom,
                        extent: self.get_tile_meters(x, y, zoom),
                    });
                }
            }
        }
        tiles
    }

    /// Ground units per pixel needed to show `extent` in a `width` x `height` image
    pub fn get_resolution_by_extent(&self, extent: &Extent, height: u32, width: u32) -> (f64, f64) {
        (
            extent.width() / width as f64,
            extent.height() / height as f64,
        )
    }

    /// Deepest level whose resolution is not finer than the one needed for `extent`
    pub fn get_level_by_extent(&self, extent: &Extent, height: u32, width: u32) -> u8 {
        let (x_rs, y_rs) = self.get_resolution_by_extent(extent, height, width);
        let resolution = x_rs.max(y_rs);
        for zoom in self.min_zoom..=self.max_zoom {
            if resolution > self.get_resolution(zoom) {
                return if zoom == self.min_zoom {
                    self.min_zoom
                } else {
                    zoom - 1
                };
            }
        }
        self.max_zoom
    }
}

/// Returns the Spherical Mercator (x, y) in meters
pub fn lonlat_to_merc(lon: f64, lat: f64) -> (f64, f64) {
    let x = 6378137.0 * lon.to_radians();
    let y = 6378137.0 * ((consts::PI * 0.25) + (0.5 * lat.to_radians())).tan().ln();
    (x, y)
}

/// Projected extent
pub fn extent_wgs84_to_merc(extent: &Extent) -> Extent {
    let (minx, miny) = lonlat_to_merc(extent.minx, extent.miny);
    let (maxx, maxy) = lonlat_to_merc(extent.maxx, extent.maxy);
    Extent {
        minx,
        miny,
        maxx,
        maxy,
    }
}
