//
// Copyright (c) Pirmin Kalberer. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.
//

use crate::raster::{GridSpec, Raster};
use crate::vector::layer::{Coord, Geometry, VectorFeature, VectorLayer};
use std::collections::BTreeSet;

/// Aggregates vector features onto a grid.
/// Cells hold the maximum of a numeric field, or the number of features
/// touching them. Cells without features are NaN.
pub struct Rasterizer {
    spec: GridSpec,
}

type Cells = BTreeSet<(u32, u32)>;

impl Rasterizer {
    pub fn new(spec: GridSpec) -> Rasterizer {
        Rasterizer { spec }
    }

    pub fn rasterize(&self, layer: &VectorLayer, field: Option<&str>) -> Raster {
        let mut raster = Raster::filled(&self.spec, f32::NAN);
        for feature in &layer.features {
            let value = match field {
                Some(field) => match feature.properties.get(field).and_then(|v| v.as_f64()) {
                    Some(v) => Some(v as f32),
                    None => continue,
                },
                None => None,
            };
            for (col, row) in self.feature_cells(feature) {
                let current = raster.get(col, row);
                let updated = match value {
                    Some(v) if current.is_nan() || v > current => v,
                    Some(_) => current,
                    None if current.is_nan() => 1.0,
                    None => current + 1.0,
                };
                raster.set(col, row, updated);
            }
        }
        raster
    }

    fn pixel(&self, c: &Coord) -> (f64, f64) {
        self.spec.transform.coord_to_pixel(c.0, c.1)
    }

    fn insert(&self, cells: &mut Cells, col: f64, row: f64) {
        let (col, row) = (col.floor(), row.floor());
        if col >= 0.0 && row >= 0.0 && col < self.spec.width as f64 && row < self.spec.height as f64 {
            cells.insert((col as u32, row as u32));
        }
    }

    fn feature_cells(&self, feature: &VectorFeature) -> Cells {
        let mut cells = Cells::new();
        match &feature.geometry {
            Geometry::Points(pts) => {
                for p in pts {
                    let (col, row) = self.pixel(p);
                    self.insert(&mut cells, col, row);
                }
            }
            Geometry::Lines(lines) => {
                for line in lines {
                    self.line_cells(line, &mut cells);
                }
            }
            Geometry::Polygons(polys) => {
                for rings in polys {
                    self.polygon_cells(rings, &mut cells);
                }
            }
        }
        cells
    }

    /// Walks each segment in half pixel steps
    fn line_cells(&self, line: &[Coord], cells: &mut Cells) {
        if let [p] = line {
            let (col, row) = self.pixel(p);
            self.insert(cells, col, row);
        }
        for seg in line.windows(2) {
            let (c0, r0) = self.pixel(&seg[0]);
            let (c1, r1) = self.pixel(&seg[1]);
            let len = (c1 - c0).abs().max((r1 - r0).abs());
            let steps = ((len * 2.0).ceil() as usize).max(1);
            for i in 0..=steps {
                let t = i as f64 / steps as f64;
                self.insert(cells, c0 + t * (c1 - c0), r0 + t * (r1 - r0));
            }
        }
    }

    /// Cells whose center lies inside the polygon (even-odd rule)
    fn polygon_cells(&self, rings: &[Vec<Coord>], cells: &mut Cells) {
        let pixel_rings: Vec<Vec<(f64, f64)>> = rings
            .iter()
            .map(|ring| ring.iter().map(|c| self.pixel(c)).collect())
            .collect();
        let exterior = match pixel_rings.first() {
            Some(ring) if ring.len() >= 3 => ring,
            _ => return,
        };
        let (mut cmin, mut rmin) = (f64::MAX, f64::MAX);
        let (mut cmax, mut rmax) = (f64::MIN, f64::MIN);
        for (c, r) in exterior {
            cmin = cmin.min(*c);
            cmax = cmax.max(*c);
            rmin = rmin.min(*r);
            rmax = rmax.max(*r);
        }
        let col0 = cmin.floor().max(0.0) as u32;
        let row0 = rmin.floor().max(0.0) as u32;
        let col1 = cmax.ceil().min(self.spec.width as f64).max(0.0) as u32;
        let row1 = rmax.ceil().min(self.spec.height as f64).max(0.0) as u32;
        for row in row0..row1 {
            for col in col0..col1 {
                let (x, y) = (col as f64 + 0.5, row as f64 + 0.5);
                let inside = pixel_rings
                    .iter()
                    .filter(|ring| crosses_odd(ring, x, y))
                    .count()
                    % 2
                    == 1;
                if inside {
                    cells.insert((col, row));
                }
            }
        }
    }
}

/// Even-odd ray casting test of one ring
fn crosses_odd(ring: &[(f64, f64)], x: f64, y: f64) -> bool {
    let mut inside = false;
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = ring[i];
        let (xj, yj) = ring[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}
