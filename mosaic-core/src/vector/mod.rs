//
// Copyright (c) Pirmin Kalberer. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.
//

//! Vector layers read from GeoJSON

pub mod layer;
pub mod rasterize;

pub use self::layer::{Coord, Geometry, SelectOperator, VectorFeature, VectorLayer};
pub use self::rasterize::Rasterizer;
