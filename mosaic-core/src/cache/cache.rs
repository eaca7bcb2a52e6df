//
// Copyright (c) Pirmin Kalberer. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.
//

use std::io;
use std::io::Read;

/// Storage for rendered tiles, addressed by relative path
pub trait Cache {
    fn info(&self) -> String;
    fn read<F>(&self, path: &str, read: F) -> bool
    where
        F: FnMut(&mut dyn Read);
    fn write(&self, path: &str, obj: &[u8]) -> Result<(), io::Error>;
    fn exists(&self, path: &str) -> bool;
}

#[derive(Clone, Debug)]
pub struct Nocache;

impl Cache for Nocache {
    fn info(&self) -> String {
        "No cache".to_string()
    }
    fn read<F>(&self, _path: &str, _read: F) -> bool
    where
        F: FnMut(&mut dyn Read),
    {
        false
    }
    fn write(&self, _path: &str, _obj: &[u8]) -> Result<(), io::Error> {
        Ok(())
    }
    fn exists(&self, _path: &str) -> bool {
        false
    }
}
