//
// Copyright (c) Pirmin Kalberer. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.
//

//! Sharded raster datasets: spatial index, overview pyramids and shared instances

#[allow(clippy::module_inception)]
pub mod multifile;
pub mod overview;
pub mod registry;
pub mod spatial_grid;

pub use self::multifile::MultiFileRaster;
pub use self::overview::{OverviewBuilder, OverviewReport};
pub use self::registry::SharedRegistry;
pub use self::spatial_grid::{GridEntry, SpatialGrid};

#[cfg(test)]
mod multifile_test;
#[cfg(test)]
mod registry_test;
#[cfg(test)]
mod testutils;
