//
// Copyright (c) Pirmin Kalberer. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.
//

//! Quad keys and geographic tile lookup (Bing Maps tile system)

use std::error::Error;
use std::f64::consts::PI;
use std::fmt;

const MIN_LAT: f64 = -85.05112878;
const MAX_LAT: f64 = 85.05112878;
const MIN_LNG: f64 = -180.0;
const MAX_LNG: f64 = 180.0;

#[derive(Debug, PartialEq)]
pub struct InvalidQuadKey(pub char);

impl fmt::Display for InvalidQuadKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Invalid quad key digit '{}'", self.0)
    }
}

impl Error for InvalidQuadKey {}

/// Base-4 key with one digit per zoom level
pub fn tile_to_quad(x: u32, y: u32, zoom: u8) -> String {
    let mut key = String::with_capacity(zoom as usize);
    for i in (1..=zoom).rev() {
        let mask = 1u32 << (i - 1);
        let mut digit = b'0';
        if x & mask != 0 {
            digit += 1;
        }
        if y & mask != 0 {
            digit += 2;
        }
        key.push(digit as char);
    }
    key
}

/// Inverse of `tile_to_quad`. The empty key is tile 0/0/0.
pub fn quad_to_tile(key: &str) -> Result<(u32, u32, u8), InvalidQuadKey> {
    let zoom = key.chars().count() as u8;
    let (mut x, mut y) = (0u32, 0u32);
    for (i, c) in key.chars().enumerate() {
        let mask = 1u32 << (zoom as usize - i - 1);
        match c {
            '0' => {}
            '1' => x |= mask,
            '2' => y |= mask,
            '3' => {
                x |= mask;
                y |= mask;
            }
            _ => return Err(InvalidQuadKey(c)),
        }
    }
    Ok((x, y, zoom))
}

fn map_size(zoom: u8) -> f64 {
    (256u64 << zoom) as f64
}

/// XYZ tile containing a WGS84 position. Positions are clipped to the Mercator limits.
pub fn lng_lat_to_tile(lng: f64, lat: f64, zoom: u8) -> (u32, u32) {
    let size = map_size(zoom);
    let lat = lat.max(MIN_LAT).min(MAX_LAT);
    let lng = lng.max(MIN_LNG).min(MAX_LNG);

    let x = (lng + 180.0) / 360.0;
    let sinlat = (lat * PI / 180.0).sin();
    let y = 0.5 - ((1.0 + sinlat) / (1.0 - sinlat)).ln() / (4.0 * PI);

    let px = (x * size + 0.5).max(0.0).min(size - 1.0) as u64;
    let py = (y * size + 0.5).max(0.0).min(size - 1.0) as u64;
    ((px / 256) as u32, (py / 256) as u32)
}

#[test]
fn test_quadkey() {
    assert_eq!(tile_to_quad(0, 0, 0), "");
    assert_eq!(tile_to_quad(3, 5, 3), "213");
    assert_eq!(quad_to_tile("213"), Ok((3, 5, 3)));
    assert_eq!(quad_to_tile(""), Ok((0, 0, 0)));
    assert_eq!(quad_to_tile("0124"), Err(InvalidQuadKey('4')));
    for z in 0..6 {
        let n = 1 << z;
        for x in 0..n {
            for y in 0..n {
                assert_eq!(quad_to_tile(&tile_to_quad(x, y, z)), Ok((x, y, z)));
            }
        }
    }
}

#[test]
fn test_lng_lat_to_tile() {
    assert_eq!(lng_lat_to_tile(0.0, 0.0, 0), (0, 0));
    assert_eq!(lng_lat_to_tile(-179.9, 85.0, 1), (0, 0));
    assert_eq!(lng_lat_to_tile(179.9, -85.0, 1), (1, 1));
    // Bern
    assert_eq!(lng_lat_to_tile(7.44, 46.95, 10), (533, 360));
}
