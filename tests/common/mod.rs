//! Shared helpers for storage integration tests.

#![allow(dead_code)]

use std::sync::{Arc, OnceLock};

/// A handle to a value that is installed after the value is created, so a
/// computation can refer to the value computing it.
pub struct SelfRef<H>(Arc<OnceLock<H>>);

impl<H> SelfRef<H> {
    pub fn get(&self) -> &H {
        self.0.get().expect("self reference installed before first invoke")
    }
}

/// Builds a handle whose computation can reach the handle itself.
pub fn self_referencing<H: Clone>(build: impl FnOnce(SelfRef<H>) -> H) -> H {
    let slot = Arc::new(OnceLock::new());
    let handle = build(SelfRef(Arc::clone(&slot)));
    let _ = slot.set(handle.clone());
    handle
}
