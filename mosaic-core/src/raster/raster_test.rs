//
// Copyright (c) Pirmin Kalberer. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.
//

use crate::raster::raster::{merge, GeoTransform, Raster};
use tile_grid::Extent;

fn ramp(extent: Extent, width: u32, height: u32, offset: f32) -> Raster {
    let data = (0..width * height).map(|i| i as f32 + offset).collect();
    Raster::new(
        width,
        height,
        GeoTransform::north_up(&extent, width, height),
        4326,
        data,
    )
    .unwrap()
}

#[test]
fn test_raster_geometry() {
    let raster = ramp(Extent::new(0.0, 0.0, 2.0, 1.0), 20, 10, 0.0);
    assert_eq!(raster.extent(), Extent::new(0.0, 0.0, 2.0, 1.0));
    assert_eq!(raster.get(0, 0), 0.0);
    assert_eq!(raster.get(1, 1), 21.0);
    // north west corner
    assert_eq!(raster.sample(0.05, 0.95), 0.0);
    assert!(raster.sample(2.5, 0.5).is_nan());
    assert_eq!(raster.valid_count(), 200);
    assert!(Raster::new(2, 2, raster.transform, 4326, vec![1.0]).is_err());
    assert!(Raster::empty().is_empty());
}

#[test]
fn test_north_up() {
    let south_up = Raster::new(
        2,
        2,
        GeoTransform {
            origin_x: 0.0,
            origin_y: 0.0,
            pixel_width: 1.0,
            pixel_height: 1.0,
        },
        3857,
        vec![1.0, 2.0, 3.0, 4.0],
    )
    .unwrap();
    let oriented = south_up.north_up();
    assert_eq!(oriented.data, vec![3.0, 4.0, 1.0, 2.0]);
    assert_eq!(oriented.extent(), south_up.extent());
    assert!(oriented.transform.pixel_height < 0.0);
}

#[test]
fn test_merge_adjacent() {
    let a = ramp(Extent::new(0.0, 0.0, 1.0, 1.0), 10, 10, 0.0);
    let b = ramp(Extent::new(1.0, 0.0, 2.0, 1.0), 10, 10, 1000.0);
    let merged = merge(&[a.clone(), b.clone()]).unwrap();
    assert_eq!((merged.width, merged.height), (20, 10));
    assert_eq!(merged.extent(), Extent::new(0.0, 0.0, 2.0, 1.0));
    assert_eq!(merged.valid_count(), 200);
    for row in 0..10 {
        for col in 0..10 {
            assert_eq!(merged.get(col, row), a.get(col, row));
            assert_eq!(merged.get(col + 10, row), b.get(col, row));
        }
    }
}

#[test]
fn test_merge_overlap_and_gaps() {
    let a = ramp(Extent::new(0.0, 0.0, 1.0, 1.0), 2, 2, 0.0);
    let b = ramp(Extent::new(0.5, 0.0, 1.5, 1.0), 2, 2, 10.0);
    let merged = merge(&[a, b]).unwrap();
    assert_eq!((merged.width, merged.height), (3, 2));
    // first raster wins on overlap
    assert_eq!(merged.data, vec![0.0, 1.0, 11.0, 2.0, 3.0, 13.0]);

    let c = ramp(Extent::new(2.0, 0.0, 3.0, 1.0), 2, 2, 0.0);
    let merged = merge(&[merged, c]).unwrap();
    assert_eq!((merged.width, merged.height), (6, 2));
    assert!(merged.get(3, 0).is_nan());

    assert!(merge(&[]).unwrap().is_empty());
    assert!(merge(&[Raster::empty()]).unwrap().is_empty());
}

#[test]
fn test_merge_srid_mismatch() {
    let a = ramp(Extent::new(0.0, 0.0, 1.0, 1.0), 2, 2, 0.0);
    let mut b = a.clone();
    b.srid = 3857;
    assert!(merge(&[a, b]).is_err());
}
