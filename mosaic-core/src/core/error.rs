//
// Copyright (c) Pirmin Kalberer. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.
//

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Invalid setup. Raised when building datasets, never retried.
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Raster error: {0}")]
    Raster(String),
    #[error("Vector error: {0}")]
    Vector(String),
    #[error("Projection error: {0}")]
    Projection(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Dataset '{0}' not found")]
    UnknownDataset(String),
    #[error("Band '{band}' not found in '{dataset}'")]
    UnknownBand { dataset: String, band: String },
}

impl From<tiff::TiffError> for Error {
    fn from(e: tiff::TiffError) -> Self {
        match e {
            tiff::TiffError::IoError(e) => Error::Io(e),
            e => Error::Raster(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
