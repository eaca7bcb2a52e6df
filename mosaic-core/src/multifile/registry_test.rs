//
// Copyright (c) Pirmin Kalberer. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.
//

use crate::core::error::Error;
use crate::multifile::registry::SharedRegistry;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_concurrent_get() {
    let registry: Arc<SharedRegistry<String>> = Arc::new(SharedRegistry::new());
    let builds = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = registry.clone();
            let builds = builds.clone();
            thread::spawn(move || {
                registry
                    .get("data/*.tif", || {
                        builds.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(50));
                        Ok("dataset".to_string())
                    })
                    .unwrap()
            })
        })
        .collect();
    let instances: Vec<Arc<String>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(builds.load(Ordering::SeqCst), 1);
    assert!(instances.iter().all(|i| Arc::ptr_eq(i, &instances[0])));
    assert_eq!(registry.len(), 1);
    assert!(registry.contains("data/*.tif"));
}

#[test]
fn test_keys_and_failures() {
    let registry: SharedRegistry<u32> = SharedRegistry::new();
    let failed = registry.get("a", || Err(Error::Config("broken".to_string())));
    assert!(failed.is_err());
    assert!(!registry.contains("a"));
    assert!(registry.is_empty());

    // a failed build is retried
    assert_eq!(*registry.get("a", || Ok(1)).unwrap(), 1);
    assert_eq!(*registry.get("b", || Ok(2)).unwrap(), 2);
    assert_eq!(*registry.get("a", || Ok(3)).unwrap(), 1);
    assert_eq!(registry.len(), 2);
}
