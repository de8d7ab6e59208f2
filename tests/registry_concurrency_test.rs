//! Concurrent registry behavior after the startup freeze.

use rookdb_services::capability::SVC_HASH_SHA256;
use rookdb_services::{ServiceHost, ServicesConfig};
use std::sync::Arc;
use std::thread;

#[test]
fn test_concurrent_lookups_return_identical_descriptor() {
    let host = Arc::new(ServiceHost::bootstrap(ServicesConfig::default()).unwrap());
    let reference = host.registry().lookup(SVC_HASH_SHA256).unwrap();

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let host = host.clone();
            let reference = reference.clone();
            thread::spawn(move || {
                for _ in 0..1000 {
                    let desc = host.registry().lookup(SVC_HASH_SHA256).unwrap();
                    // Same published Arc every time, no tearing.
                    assert!(Arc::ptr_eq(&desc, &reference));
                    assert_eq!(desc.version(), reference.version());
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
}

#[test]
fn test_concurrent_binds_are_serialized() {
    let host = Arc::new(ServiceHost::bootstrap(ServicesConfig::default()).unwrap());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let host = host.clone();
            thread::spawn(move || {
                let binding = host
                    .load_module(
                        &rookdb_services::ModuleDeclaration::new(format!("engine_{}", i)).requires(
                            rookdb_services::capability::SVC_ALLOC,
                            rookdb_services::InterfaceVersion::new(1, 0),
                        ),
                    )
                    .unwrap();
                drop(binding);
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
    // Every binding released its consumer count.
    assert_eq!(
        host.registry()
            .lookup(rookdb_services::capability::SVC_ALLOC)
            .unwrap()
            .consumers(),
        0
    );
}
