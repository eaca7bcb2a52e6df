//
// Copyright (c) Pirmin Kalberer. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.
//

#[macro_use]
extern crate log;

pub mod datasources;
pub mod mosaic_service;
#[cfg(test)]
mod mosaic_service_test;
