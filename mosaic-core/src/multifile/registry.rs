//
// Copyright (c) Pirmin Kalberer. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.
//

use crate::core::error::Result;
use crate::multifile::MultiFileRaster;
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Keyed instances shared between threads. At most one instance is built per key.
///
/// The registry lock is only held for the lookup. Construction runs outside of it,
/// so a slow build blocks callers of the same key only.
pub struct SharedRegistry<T = MultiFileRaster> {
    instances: Mutex<HashMap<String, Arc<OnceCell<Arc<T>>>>>,
}

impl<T> Default for SharedRegistry<T> {
    fn default() -> Self {
        SharedRegistry {
            instances: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> SharedRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Instance for `key`, calling `build` if there is none yet.
    /// A failed build leaves the key empty for a later retry.
    pub fn get<F>(&self, key: &str, build: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Result<T>,
    {
        let cell = {
            let mut instances = self
                .instances
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            instances
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };
        cell.get_or_try_init(|| {
            debug!("Creating shared instance for {}", key);
            build().map(Arc::new)
        })
        .map(Arc::clone)
    }

    /// Whether an instance for `key` has been built
    pub fn contains(&self, key: &str) -> bool {
        self.instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map(|cell| cell.get().is_some())
            .unwrap_or(false)
    }

    /// Number of built instances
    pub fn len(&self) -> usize {
        self.instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|cell| cell.get().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
