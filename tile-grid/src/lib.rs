//! A library for slippy map tile calculations
//!
//! ## Tile scheme
//!
//! ```rust
//! use tile_grid::TileScheme;
//!
//! let scheme = TileScheme::web_mercator();
//! let extent = scheme.get_tile_meters(0, 0, 1);
//! assert_eq!(scheme.meters_to_tile(extent.minx, extent.miny, 1), (0, 0));
//! assert_eq!(scheme.get_tiles_by_extent(&scheme.extent(), 2).len(), 16);
//! ```
//!
//! ## Grid iterators
//!
//! ```rust
//! use tile_grid::{GridIterator, TileScheme};
//!
//! let scheme = TileScheme::web_mercator();
//! let tile_limits = scheme.tile_limits(&scheme.extent());
//! let griditer = GridIterator::new(0, 2, tile_limits);
//! for (z, x, y) in griditer {
//!     println!("Tile {}/{}/{}", z, x, y);
//! }
//! ```
//!
//! ## Tile batches
//!
//! ```rust
//! use tile_grid::{Extent, TileBatch, TileScheme};
//!
//! let scheme = TileScheme::web_mercator();
//! let features = vec![
//!     Extent::new(-100.0, -100.0, 100.0, 100.0),
//!     Extent::new(50.0, 50.0, 150.0, 150.0),
//! ];
//! let batch = TileBatch::from_extents(&scheme, &features, 0, 2);
//! assert_eq!(batch.len(), 9);
//! assert_eq!(batch.rows()[5].quadkey, "03");
//! ```

mod batch;
mod grid;
mod grid_iterator;
#[cfg(test)]
mod grid_test;
mod quadkey;

pub use batch::{TileBatch, TileRow};
pub use grid::{
    extent_wgs84_to_merc, invert_y_tile, lonlat_to_merc, Extent, ExtentInt, Tile, TileScheme,
};
pub use grid_iterator::GridIterator;
pub use quadkey::{lng_lat_to_tile, quad_to_tile, tile_to_quad, InvalidQuadKey};
