//! Compute-once storage for lazily evaluated analysis results.
//!
//! This module provides the memoization engine used by lazy semantic
//! analysis:
//!
//! - [`StorageManager`]: owns one reentrant lock and creates everything below
//! - [`NotNullLazyValue`] / [`NullableLazyValue`]: zero-argument memoized computations
//! - [`MemoizedFunctionToNotNull`] / [`MemoizedFunctionToNullable`]: per-key memoized computations
//! - [`CacheWithNotNullValues`] / [`CacheWithNullableValues`]: keyed caches computed per lookup
//! - [`LockProtectedTrace`]: a recording context serialized by the manager's lock
//!
//! Each computation runs at most once. Failures are memoized like values.
//! A computation that needs its own result fails with
//! [`StorageError::Reentered`] unless a recursion handler supplies a
//! provisional answer.
//!
//! # Examples
//!
//! ## Mutually dependent values
//!
//! ```rust
//! use lockmemo::storage::{NotNullLazyValue, StorageManager};
//! use std::sync::{Arc, OnceLock};
//!
//! let manager = StorageManager::new("supertypes");
//!
//! // `supertypes` needs a provisional view of itself while it is computed.
//! let slot: Arc<OnceLock<NotNullLazyValue<Vec<String>>>> = Arc::new(OnceLock::new());
//! let this = Arc::clone(&slot);
//! let supertypes = manager.create_recursion_tolerant_lazy_value(
//!     move || {
//!         let provisional = this.get().expect("installed").invoke()?;
//!         let mut supertypes = provisional;
//!         supertypes.push(String::from("Any"));
//!         Ok(supertypes)
//!     },
//!     Vec::new(),
//! );
//! let _ = slot.set(supertypes.clone());
//!
//! assert_eq!(supertypes.invoke(), Ok(vec![String::from("Any")]));
//! ```
//!
//! ## Recording side effects
//!
//! ```rust
//! use lockmemo::storage::{BindingTrace, Slice, StorageManager};
//!
//! const TYPE: Slice = Slice::new("TYPE");
//!
//! let manager = StorageManager::new("body resolve");
//! let trace = std::sync::Arc::new(
//!     manager.create_safe_trace(BindingTrace::<String, String, String>::new("body")),
//! );
//!
//! let recorded = std::sync::Arc::clone(&trace);
//! let body_type = manager.create_lazy_value(move || {
//!     recorded.record(TYPE, String::from("main"), String::from("Unit"));
//!     Ok(String::from("Unit"))
//! });
//!
//! assert_eq!(body_type.invoke(), Ok(String::from("Unit")));
//! assert_eq!(trace.get(TYPE, &String::from("main")), Some(String::from("Unit")));
//! ```

mod cache;
mod cell;
mod error;
mod lazy_value;
mod manager;
mod memoized;
#[cfg(feature = "trace")]
mod trace;

pub use cache::{CacheWithNotNullValues, CacheWithNullableValues};
pub use error::{StorageError, StorageResult};
pub use lazy_value::{NotNullLazyValue, NullableLazyValue};
pub use manager::{FailureHook, StorageManager};
pub use memoized::{MemoizedFunctionToNotNull, MemoizedFunctionToNullable};
#[cfg(feature = "trace")]
pub use trace::{BindingTrace, LockProtectedTrace, Slice, Trace};
