//
// Copyright (c) Pirmin Kalberer. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.
//

#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate serde_json;

pub mod cache;
pub mod core;
pub mod datasource;
pub mod multifile;
pub mod raster;
pub mod scan;
pub mod transform;
pub mod vector;

pub use crate::core::error::{Error, Result};
