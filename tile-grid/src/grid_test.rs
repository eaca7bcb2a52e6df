//
// Copyright (c) Pirmin Kalberer. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.
//

use crate::batch::TileBatch;
use crate::grid::{extent_wgs84_to_merc, invert_y_tile, lonlat_to_merc, Extent, TileScheme};

fn assert_extent_near(a: &Extent, b: &Extent, tolerance: f64) {
    for (va, vb) in a.as_array().iter().zip(b.as_array().iter()) {
        assert!(
            (va - vb).abs() < tolerance,
            "{:?} differs from {:?}",
            a,
            b
        );
    }
}

#[test]
fn test_valid_tiles() {
    let scheme = TileScheme::web_mercator();
    for z in 0..8u8 {
        let n = 1i64 << z;
        assert!(scheme.is_valid_tile(0, 0, z));
        assert!(scheme.is_valid_tile(n - 1, n - 1, z));
        assert!(!scheme.is_valid_tile(n, 0, z));
        assert!(!scheme.is_valid_tile(0, n, z));
        assert!(!scheme.is_valid_tile(-1, 0, z));
        assert!(!scheme.is_valid_tile(0, -1, z));
    }
}

#[test]
fn test_resolutions() {
    let scheme = TileScheme::web_mercator();
    assert_eq!(scheme.get_resolution(0), 156543.03392804097);
    for z in 0..scheme.max_zoom {
        assert_eq!(scheme.get_resolution(z + 1), scheme.get_resolution(z) / 2.0);
    }
    assert_eq!(scheme.resolutions().len(), 31);
}

#[test]
fn test_pixel_conversions() {
    let scheme = TileScheme::web_mercator();
    assert_eq!(scheme.pixels_to_meters(0.0, 0.0, 0), (-20037508.34, -20037508.34));
    let (px, py) = scheme.meters_to_pixels(0.0, 0.0, 3);
    assert!((px - 1024.0).abs() < 0.001);
    assert!((py - 1024.0).abs() < 0.001);
    // pixel row 0 is the southernmost, tile row 0 the northernmost
    assert_eq!(scheme.pixels_to_tile(10.0, 10.0, 1), (0, 1));
    assert_eq!(scheme.pixels_to_tile(300.0, 300.0, 1), (1, 0));
    assert_eq!(scheme.pixels_to_tile(256.0, 0.0, 1), (1, 1));
    assert_eq!(invert_y_tile(invert_y_tile(5, 4), 4), 5);
}

#[test]
fn test_tile_meters() {
    let scheme = TileScheme::web_mercator();
    assert_extent_near(
        &scheme.get_tile_meters(0, 0, 0),
        &Extent::new(-20037508.34, -20037508.34, 20037508.34, 20037508.34),
        0.01,
    );
    // north west quadrant
    assert_extent_near(
        &scheme.get_tile_meters(0, 0, 1),
        &Extent::new(-20037508.34, 0.0, 0.0, 20037508.34),
        0.01,
    );
    assert_extent_near(
        &scheme.get_tile_meters(1, 1, 1),
        &Extent::new(0.0, -20037508.34, 20037508.34, 0.0),
        0.01,
    );
}

#[test]
fn test_tile_meters_match_reference_server() {
    let scheme = TileScheme::web_mercator();
    assert_extent_near(
        &scheme.get_tile_meters(486, 332, 10),
        &web_mercator::tile_extent(486, 332, 10),
        0.01,
    );
    assert_extent_near(
        &scheme.get_tile_meters(1073, 717, 11),
        &web_mercator::tile_extent(1073, 717, 11),
        0.01,
    );
    assert_extent_near(
        &scheme.get_tile_meters(32, 21, 6),
        &web_mercator::tile_extent(32, 21, 6),
        0.01,
    );
}

#[test]
fn test_tile_roundtrip() {
    let scheme = TileScheme::web_mercator();
    for z in 0..=8u8 {
        let n = 1u32 << z;
        for x in 0..n {
            for y in 0..n {
                let extent = scheme.get_tile_meters(x, y, z);
                assert_eq!(
                    scheme.meters_to_tile(extent.minx, extent.miny, z),
                    (x as i64, y as i64)
                );
            }
        }
    }
}

#[test]
fn test_full_plane_tiles() {
    let scheme = TileScheme::web_mercator();
    for level in 0..=6u8 {
        let tiles = scheme.get_tiles_by_extent(&scheme.extent(), level);
        assert_eq!(tiles.len(), 4usize.pow(level as u32));
        let mut addresses: Vec<_> = tiles.iter().map(|t| (t.x, t.y)).collect();
        addresses.sort();
        addresses.dedup();
        assert_eq!(addresses.len(), tiles.len());
        assert!(tiles
            .iter()
            .all(|t| scheme.is_valid_tile(t.x as i64, t.y as i64, t.z)));
    }
}

#[test]
fn test_tiles_by_extent() {
    let scheme = TileScheme::web_mercator();

    // A tile extent yields exactly that tile
    let extent = scheme.get_tile_meters(486, 332, 10);
    let tiles = scheme.get_tiles_by_extent(&extent, 10);
    assert_eq!(tiles.len(), 1);
    assert_eq!((tiles[0].x, tiles[0].y, tiles[0].z), (486, 332, 10));
    assert_eq!(tiles[0].extent, extent);

    // One level up the same box is covered by the parent tile
    let tiles = scheme.get_tiles_by_extent(&extent, 9);
    assert_eq!(tiles.len(), 1);
    assert_eq!((tiles[0].x, tiles[0].y), (243, 166));

    // Rows from north to south
    let tiles = scheme.get_tiles_by_extent(&Extent::new(-100.0, -100.0, 100.0, 100.0), 2);
    let addresses: Vec<_> = tiles.iter().map(|t| (t.x, t.y)).collect();
    assert_eq!(addresses, vec![(1, 1), (2, 1), (1, 2), (2, 2)]);

    // Outside of the projected plane
    let tiles = scheme.get_tiles_by_extent(&Extent::new(3.0e7, 0.0, 4.0e7, 1.0), 3);
    assert!(tiles.is_empty());

    // Partially outside is clipped
    let tiles =
        scheme.get_tiles_by_extent(&Extent::new(-3.0e7, -3.0e7, -1.9e7, -1.9e7), 2);
    let addresses: Vec<_> = tiles.iter().map(|t| (t.x, t.y)).collect();
    assert_eq!(addresses, vec![(0, 3)]);
}

#[test]
fn test_level_by_extent() {
    let scheme = TileScheme::web_mercator();
    let world = scheme.extent();
    assert_eq!(scheme.get_level_by_extent(&world, 256, 256), 0);
    assert_eq!(scheme.get_level_by_extent(&world, 512, 512), 1);
    let tile = scheme.get_tile_meters(10, 10, 5);
    assert_eq!(scheme.get_level_by_extent(&tile.buffer(-1.0, -1.0), 256, 256), 5);
    let (xres, yres) = scheme.get_resolution_by_extent(&tile, 256, 256);
    assert!((xres - scheme.get_resolution(5)).abs() < 0.0001);
    assert!((yres - scheme.get_resolution(5)).abs() < 0.0001);
}

#[test]
fn test_list_full_plane() {
    let scheme = TileScheme::web_mercator();
    let batch = TileBatch::from_extents(&scheme, &[scheme.extent()], 1, 5);
    let expected: usize = (1..=5u32).map(|z| 4usize.pow(z)).sum();
    assert_eq!(batch.len(), expected);
    let keys: Vec<_> = batch.iter().map(|r| (r.z, r.x, r.y)).collect();
    let mut sorted = keys.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(keys, sorted);
    assert!(batch
        .iter()
        .all(|r| scheme.is_valid_tile(r.x as i64, r.y as i64, r.z)));
}

#[test]
fn test_list_overlapping_extents() {
    let scheme = TileScheme::web_mercator();
    let a = Extent::new(-100.0, -100.0, 100.0, 100.0);
    let b = Extent::new(50.0, 50.0, 150.0, 150.0);
    let batch = TileBatch::from_extents(&scheme, &[a, b], 0, 2);
    let rows: Vec<_> = batch
        .iter()
        .map(|r| (r.z, r.x, r.y, r.quadkey.as_str()))
        .collect();
    assert_eq!(
        rows,
        vec![
            (0, 0, 0, ""),
            (1, 0, 0, "0"),
            (1, 0, 1, "2"),
            (1, 1, 0, "1"),
            (1, 1, 1, "3"),
            (2, 1, 1, "03"),
            (2, 1, 2, "21"),
            (2, 2, 1, "12"),
            (2, 2, 2, "30"),
        ]
    );

    let node0: Vec<_> = batch.partition(2, 0).map(|r| r.quadkey.clone()).collect();
    let node1: Vec<_> = batch.partition(2, 1).map(|r| r.quadkey.clone()).collect();
    assert_eq!(node0.len() + node1.len(), batch.len());
    assert_eq!(node0[0], "");
    assert_eq!(node1[0], "0");
}

#[test]
fn test_projected_extent() {
    let extent_wgs84 = Extent {
        minx: 4.0,
        miny: 52.0,
        maxx: 5.0,
        maxy: 53.0,
    };
    let projected = extent_wgs84_to_merc(&extent_wgs84);
    assert_extent_near(
        &projected,
        &Extent {
            minx: 445277.96317309426,
            miny: 6800125.454397307,
            maxx: 556597.4539663679,
            maxy: 6982997.920389788,
        },
        0.000001,
    );
    assert_eq!(
        lonlat_to_merc(extent_wgs84.minx, extent_wgs84.miny),
        (projected.minx, projected.miny)
    );
}

#[test]
fn test_extent_ops() {
    let a = Extent::new(0.0, 0.0, 1.0, 1.0);
    let b = Extent::new(1.0, 0.0, 2.0, 1.0);
    let c = Extent::new(3.0, 3.0, 4.0, 4.0);
    assert!(a.intersects(&b));
    assert!(!a.intersects(&c));
    assert_eq!(a.union(&b), Extent::new(0.0, 0.0, 2.0, 1.0));
    assert_eq!(
        Extent::union_all(&[a, b, c]),
        Some(Extent::new(0.0, 0.0, 4.0, 4.0))
    );
    assert_eq!(Extent::union_all(Vec::<Extent>::new().iter()), None);
}

mod web_mercator {

    // --- Web Mercator calculations ---
    // Credits: Mercantile by Sean C. Gillies (https://github.com/mapbox/mercantile)

    use crate::grid::Extent;
    use std::f64::consts;

    /// Returns the upper left (lon, lat) of a tile
    fn ul(xtile: u32, ytile: u32, zoom: u8) -> (f64, f64) {
        let n = (zoom as f64).exp2();
        let lon_deg = xtile as f64 / n * 360.0 - 180.0;
        let lat_rad = (consts::PI * (1.0 - 2.0 * ytile as f64 / n)).sinh().atan();
        (lon_deg, lat_rad.to_degrees())
    }

    /// Returns the Spherical Mercator (x, y) in meters
    fn xy(lon: f64, lat: f64) -> (f64, f64) {
        let x = 6378137.0 * lon.to_radians();
        let y = 6378137.0 * ((consts::PI * 0.25) + (0.5 * lat.to_radians())).tan().ln();
        (x, y)
    }

    /// Returns the Spherical Mercator bounding box of a tile
    pub fn tile_extent(xtile: u32, ytile: u32, zoom: u8) -> Extent {
        let (alon, alat) = ul(xtile, ytile, zoom);
        let (ax, ay) = xy(alon, alat);
        let (blon, blat) = ul(xtile + 1, ytile + 1, zoom);
        let (bx, by) = xy(blon, blat);
        Extent {
            minx: ax,
            miny: by,
            maxx: bx,
            maxy: ay,
        }
    }

    #[test]
    fn test_ul() {
        assert_eq!(ul(486, 332, 10), (-9.140625, 53.33087298301705));
    }
}
