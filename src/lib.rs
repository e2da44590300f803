//! # lockmemo
//!
//! Compute-once lazy values and memoized functions for lazy semantic
//! analysis.
//!
//! ## Overview
//!
//! Analysis results such as types, resolved declarations and diagnostics are
//! produced by expensive, mutually recursive computations that are triggered
//! lazily from many call sites, possibly from several threads. This library
//! guarantees that:
//!
//! - **Each computation runs at most once**: concurrent callers block on a
//!   single lock and observe the same result
//! - **Failures are remembered**: a failing computation returns the same
//!   error on every access instead of being retried
//! - **Recursion is detected**: a computation that needs its own pending
//!   result gets a controlled error, or a provisional answer when a
//!   recursion handler is configured
//! - **Side effects stay serialized**: recording contexts can be wrapped to
//!   run under the same lock as the computations writing into them
//!
//! ## Feature Flags
//!
//! - `trace`: Lock-protected recording contexts (enabled by default)
//!
//! ## Example
//!
//! ```rust
//! use lockmemo::prelude::*;
//!
//! let manager = StorageManager::new("analysis");
//! let length = manager.create_memoized_function(|name: &String| Ok(name.len()));
//!
//! assert_eq!(length.invoke(String::from("kotlin")), Ok(6));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Prelude module for convenient imports.
///
/// Re-exports commonly used types and traits.
///
/// # Usage
///
/// ```rust
/// use lockmemo::prelude::*;
/// ```
pub mod prelude {
    pub use crate::storage::*;
}

pub mod storage;
