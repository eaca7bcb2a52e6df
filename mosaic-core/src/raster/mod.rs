//
// Copyright (c) Pirmin Kalberer. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.
//

//! Raster model, file drivers and resampling primitives

pub mod driver;
pub mod geotiff;
pub mod projection;
#[allow(clippy::module_inception)]
pub mod raster;
pub mod resample;

pub use self::driver::{RasterDriver, RasterIo};
pub use self::geotiff::GeoTiffDriver;
pub use self::projection::Transformer;
pub use self::raster::{merge, GeoTransform, Raster};
pub use self::resample::{GridSpec, Resampler, Resampling, WarpResampler, DENSIFY_PTS};

#[cfg(test)]
mod raster_test;
#[cfg(test)]
mod resample_test;
