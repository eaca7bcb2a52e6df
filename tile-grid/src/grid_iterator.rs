//
// Copyright (c) Pirmin Kalberer. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.
//

//! Grid iterators

use crate::grid::ExtentInt;

/// Level-by-level iterator over tile limits, skipping empty levels
pub struct GridIterator {
    z: u8,
    x: u32,
    y: u32,
    maxz: u8,
    limits: Vec<ExtentInt>,
    finished: bool,
}

impl GridIterator {
    /// `limits` are indexed by zoom level
    pub fn new(minz: u8, maxz: u8, limits: Vec<ExtentInt>) -> GridIterator {
        if minz <= maxz && limits.len() > minz as usize {
            let limit = &limits[minz as usize];
            let maxz = std::cmp::min(maxz, limits.len() as u8 - 1);
            let mut iter = GridIterator {
                z: minz,
                x: limit.minx,
                y: limit.miny,
                maxz,
                limits,
                finished: false,
            };
            iter.skip_empty_levels();
            iter
        } else {
            GridIterator {
                z: 0,
                x: 0,
                y: 0,
                maxz: 0,
                limits: Vec::new(),
                finished: true,
            }
        }
    }

    fn skip_empty_levels(&mut self) {
        while self.limits[self.z as usize].is_empty() {
            if self.z >= self.maxz {
                self.finished = true;
                return;
            }
            self.z += 1;
            let limit = &self.limits[self.z as usize];
            self.x = limit.minx;
            self.y = limit.miny;
        }
    }
}

impl Iterator for GridIterator {
    /// Current cell index `(z, x, y)`
    type Item = (u8, u32, u32);

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let current = (self.z, self.x, self.y);
        let limit = &self.limits[self.z as usize];
        if self.y + 1 < limit.maxy {
            self.y += 1;
        } else if self.x + 1 < limit.maxx {
            self.x += 1;
            self.y = limit.miny;
        } else if self.z < self.maxz {
            self.z += 1;
            let limit = &self.limits[self.z as usize];
            self.x = limit.minx;
            self.y = limit.miny;
            self.skip_empty_levels();
        } else {
            self.finished = true;
        }
        Some(current)
    }
}

#[test]
fn test_mercator_iter() {
    use crate::grid::TileScheme;
    let scheme = TileScheme::web_mercator();
    let tile_limits = scheme.tile_limits(&scheme.extent());
    let cells = GridIterator::new(0, 2, tile_limits.clone()).collect::<Vec<_>>();
    assert_eq!(cells.len(), 1 + 4 + 16);
    assert_eq!(&cells[0..5], &[(0, 0, 0), (1, 0, 0), (1, 0, 1), (1, 1, 0), (1, 1, 1)]);
    assert_eq!(cells[20], (2, 3, 3));

    let cells = GridIterator::new(0, 0, tile_limits).collect::<Vec<_>>();
    assert_eq!(cells, vec![(0, 0, 0)]);
}

#[test]
fn test_skip_empty_levels() {
    let empty = ExtentInt {
        minx: 0,
        miny: 0,
        maxx: 0,
        maxy: 0,
    };
    let griditer = GridIterator::new(
        0,
        2,
        vec![
            empty.clone(),
            ExtentInt {
                minx: 1,
                miny: 0,
                maxx: 2,
                maxy: 2,
            },
            empty,
        ],
    );
    let cells = griditer.collect::<Vec<_>>();
    assert_eq!(cells, vec![(1, 1, 0), (1, 1, 1)]);
}

#[test]
fn test_bad_params() {
    use crate::grid::TileScheme;
    let scheme = TileScheme::web_mercator();

    // missing tile_limits
    let griditer = GridIterator::new(0, 10, Vec::new());
    assert_eq!(griditer.count(), 0);

    // minz > maxz
    let griditer = GridIterator::new(3, 2, scheme.tile_limits(&scheme.extent()));
    assert_eq!(griditer.count(), 0);

    // maxz >= tile_limits.len()
    let griditer = GridIterator::new(
        0,
        2,
        vec![
            ExtentInt {
                minx: 0,
                miny: 0,
                maxx: 1,
                maxy: 1,
            },
            ExtentInt {
                minx: 0,
                miny: 0,
                maxx: 2,
                maxy: 2,
            },
        ],
    );
    let cells = griditer.collect::<Vec<_>>();
    assert_eq!(
        cells,
        vec![(0, 0, 0), (1, 0, 0), (1, 0, 1), (1, 1, 0), (1, 1, 1)]
    );
}
