//
// Copyright (c) Pirmin Kalberer. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.
//

//! Deduplicated tile lists for bulk rendering

use crate::grid::{Extent, TileScheme};
use crate::grid_iterator::GridIterator;
use crate::quadkey::tile_to_quad;
use std::collections::BTreeSet;

#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Debug)]
pub struct TileRow {
    pub z: u8,
    pub x: u32,
    pub y: u32,
    pub quadkey: String,
}

/// Tile addresses sorted by `(z, x, y)` without duplicates
#[derive(Clone, Debug, Default)]
pub struct TileBatch {
    rows: Vec<TileRow>,
}

impl TileBatch {
    /// Union of the tiles touching any of `extents` on levels `minzoom..=maxzoom`.
    /// Levels above the scheme's `max_zoom` are ignored.
    pub fn from_extents<'a, I>(scheme: &TileScheme, extents: I, minzoom: u8, maxzoom: u8) -> TileBatch
    where
        I: IntoIterator<Item = &'a Extent>,
    {
        let maxzoom = maxzoom.min(scheme.max_zoom);
        let mut cells = BTreeSet::new();
        for extent in extents {
            let limits = scheme.tile_limits(extent);
            cells.extend(GridIterator::new(minzoom, maxzoom, limits));
        }
        let rows = cells
            .into_iter()
            .map(|(z, x, y)| TileRow {
                z,
                x,
                y,
                quadkey: tile_to_quad(x, y, z),
            })
            .collect();
        TileBatch { rows }
    }
    pub fn len(&self) -> usize {
        self.rows.len()
    }
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
    pub fn rows(&self) -> &[TileRow] {
        &self.rows
    }
    pub fn iter(&self) -> std::slice::Iter<TileRow> {
        self.rows.iter()
    }
    /// Rows assigned to node `nodeno` when distributing round-robin over `nodes`
    pub fn partition(&self, nodes: usize, nodeno: usize) -> impl Iterator<Item = &TileRow> {
        let nodes = nodes.max(1);
        self.rows
            .iter()
            .enumerate()
            .filter(move |(i, _)| i % nodes == nodeno)
            .map(|(_, row)| row)
    }
}

impl IntoIterator for TileBatch {
    type Item = TileRow;
    type IntoIter = std::vec::IntoIter<TileRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}
