//
// Copyright (c) Pirmin Kalberer. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.
//

#[allow(clippy::module_inception)]
pub mod datasource;
pub mod multifile_ds;
pub mod raster_ds;
pub mod vector_ds;

pub use self::datasource::DatasourceType;
pub use self::multifile_ds::MultiFileDatasource;
pub use self::raster_ds::RasterDatasource;
pub use self::vector_ds::VectorDatasource;
