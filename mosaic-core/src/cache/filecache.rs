//
// Copyright (c) Pirmin Kalberer. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.
//

use crate::cache::cache::Cache;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::PathBuf;

/// Tiles stored as files below `basepath`
#[derive(Clone, Debug)]
pub struct Filecache {
    pub basepath: String,
}

impl Filecache {
    pub fn fullpath(&self, path: &str) -> PathBuf {
        PathBuf::from(&self.basepath).join(path)
    }
}

impl Cache for Filecache {
    fn info(&self) -> String {
        format!("Tile cache directory: {}", self.basepath)
    }
    fn read<F>(&self, path: &str, mut read: F) -> bool
    where
        F: FnMut(&mut dyn Read),
    {
        let fullpath = self.fullpath(path);
        debug!("Filecache.read {}", fullpath.display());
        match File::open(&fullpath) {
            Ok(mut f) => {
                read(&mut f);
                true
            }
            Err(_e) => false,
        }
    }
    fn write(&self, path: &str, obj: &[u8]) -> Result<(), io::Error> {
        let fullpath = self.fullpath(path);
        debug!("Filecache.write {}", fullpath.display());
        if let Some(dir) = fullpath.parent() {
            fs::create_dir_all(dir)?;
        }
        let mut f = File::create(&fullpath)?;
        f.write_all(obj)
    }
    fn exists(&self, path: &str) -> bool {
        self.fullpath(path).exists()
    }
}
