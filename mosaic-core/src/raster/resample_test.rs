//
// Copyright (c) Pirmin Kalberer. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.
//

use crate::raster::{GeoTransform, GridSpec, Raster, Resampler, Resampling, WarpResampler};
use tile_grid::Extent;

fn grid4x4() -> Raster {
    let extent = Extent::new(0.0, 0.0, 4.0, 4.0);
    let data = (0..16).map(|v| v as f32).collect();
    Raster::new(4, 4, GeoTransform::north_up(&extent, 4, 4), 3857, data).unwrap()
}

#[test]
fn test_resampling_names() {
    assert_eq!("linear".parse::<Resampling>().unwrap(), Resampling::Bilinear);
    assert_eq!("Nearest".parse::<Resampling>().unwrap(), Resampling::Nearest);
    assert_eq!("average".parse::<Resampling>().unwrap(), Resampling::Average);
    assert!("cubic".parse::<Resampling>().is_err());
}

#[test]
fn test_same_grid() {
    let src = grid4x4();
    for method in &[Resampling::Nearest, Resampling::Bilinear, Resampling::Average] {
        let out = WarpResampler.resample(&src, &src.grid_spec(), *method).unwrap();
        assert_eq!(out.data, src.data);
    }
}

#[test]
fn test_rows_keep_order() {
    let extent = Extent::new(0.0, 0.0, 7.0, 300.0);
    let data = (0..300)
        .flat_map(|row| (0..7).map(move |col| (row * 1000 + col) as f32))
        .collect();
    let src = Raster::new(7, 300, GeoTransform::north_up(&extent, 7, 300), 3857, data).unwrap();
    let out = WarpResampler
        .resample(&src, &src.grid_spec(), Resampling::Nearest)
        .unwrap();
    assert_eq!(out.data, src.data);

    let target = GridSpec::from_extent(&extent, 14, 600, 3857);
    let out = WarpResampler
        .resample(&src, &target, Resampling::Nearest)
        .unwrap();
    for row in (0..600).step_by(37) {
        for col in 0..14 {
            assert_eq!(out.get(col, row), src.get(col / 2, row / 2));
        }
    }
}

#[test]
fn test_average_downsampling() {
    let mut src = grid4x4();
    let target = GridSpec::from_extent(&src.extent(), 2, 2, 3857);
    let out = WarpResampler
        .resample(&src, &target, Resampling::Average)
        .unwrap();
    assert_eq!(out.data, vec![2.5, 4.5, 10.5, 12.5]);

    src.set(0, 0, f32::NAN);
    let out = WarpResampler
        .resample(&src, &target, Resampling::Average)
        .unwrap();
    assert_eq!(out.get(0, 0), 10.0 / 3.0);
}

#[test]
fn test_outside_source() {
    let src = grid4x4();
    let target = GridSpec::from_extent(&Extent::new(2.0, 2.0, 6.0, 6.0), 2, 2, 3857);
    let out = WarpResampler
        .resample(&src, &target, Resampling::Nearest)
        .unwrap();
    // only the south west cell overlaps the source
    assert_eq!(out.valid_count(), 1);
    assert_eq!(out.get(0, 1), 7.0);
}

#[test]
fn test_reproject() {
    let extent = Extent::new(4.0, 52.0, 5.0, 53.0);
    let src = Raster::new(
        10,
        10,
        GeoTransform::north_up(&extent, 10, 10),
        4326,
        vec![1.0; 100],
    )
    .unwrap();
    let out = WarpResampler
        .reproject(&src, 3857, Resampling::Nearest)
        .unwrap();
    assert_eq!(out.srid, 3857);
    assert_eq!((out.width, out.height), (10, 10));
    let bounds = out.extent();
    assert!((bounds.minx - 445277.96317309426).abs() < 0.01);
    assert!((bounds.maxy - 6982997.920389788).abs() < 0.01);
    assert_eq!(out.valid_count(), 100);
}
