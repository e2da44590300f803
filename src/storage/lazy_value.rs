//! Zero-argument memoized computations.
//!
//! [`NotNullLazyValue`] and [`NullableLazyValue`] are thin typed handles
//! over one shared core. The capabilities that distinguish the factory
//! flavors (recursion handler, post-compute step) are optional closures on
//! that core rather than separate types.

use std::fmt;
use std::sync::Arc;

use super::cell::{Cell, Hooks, PostCompute, RecursionHandler};
use super::error::StorageResult;
use super::manager::StorageContext;

type Compute<S> = dyn Fn() -> StorageResult<S> + Send + Sync;

pub(crate) struct LazyCore<S> {
    context: Arc<StorageContext>,
    presentable_name: &'static str,
    cell: Cell<S>,
    compute: Box<Compute<S>>,
    on_recursive_call: Option<Box<RecursionHandler<S>>>,
    post_compute: Option<Box<PostCompute<S>>>,
}

impl<S: Clone> LazyCore<S> {
    pub(crate) fn new<F>(
        context: Arc<StorageContext>,
        presentable_name: &'static str,
        compute: F,
    ) -> Self
    where
        F: Fn() -> StorageResult<S> + Send + Sync + 'static,
    {
        Self {
            context,
            presentable_name,
            cell: Cell::new(),
            compute: Box::new(compute),
            on_recursive_call: None,
            post_compute: None,
        }
    }

    pub(crate) fn with_recursion_handler<R>(mut self, on_recursive_call: R) -> Self
    where
        R: Fn(bool) -> StorageResult<S> + Send + Sync + 'static,
    {
        self.on_recursive_call = Some(Box::new(on_recursive_call));
        self
    }

    pub(crate) fn with_post_compute<P>(mut self, post_compute: P) -> Self
    where
        P: Fn(&mut S) + Send + Sync + 'static,
    {
        self.post_compute = Some(Box::new(post_compute));
        self
    }

    fn invoke(&self) -> StorageResult<S> {
        let hooks = Hooks {
            on_recursive_call: self.on_recursive_call.as_deref(),
            post_compute: self.post_compute.as_deref(),
        };
        self.cell.get_or_compute(&self.context, hooks, || (self.compute)())
    }

    fn render(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct(self.presentable_name)
            .field("computed", &self.cell.is_computed())
            .field("computing", &self.cell.is_computing())
            .field("storage_manager", &format_args!("{}", self.context))
            .finish()
    }
}

/// A lazily computed value that is never absent.
///
/// Created by [`StorageManager`](super::StorageManager). Clones share the
/// same slot.
///
/// # Examples
///
/// ```rust
/// use lockmemo::storage::{StorageError, StorageManager};
///
/// let manager = StorageManager::new("example");
/// let failing = manager.create_lazy_value(|| -> Result<i32, _> {
///     Err(StorageError::message("cannot infer type"))
/// });
///
/// let first = failing.invoke().unwrap_err();
/// let second = failing.invoke().unwrap_err();
///
/// // The failure is memoized: the same instance comes back.
/// assert_eq!(first, second);
/// assert!(failing.is_computed());
/// ```
pub struct NotNullLazyValue<T> {
    core: Arc<LazyCore<T>>,
}

impl<T: Clone> NotNullLazyValue<T> {
    pub(crate) fn from_core(core: LazyCore<T>) -> Self {
        Self {
            core: Arc::new(core),
        }
    }

    /// Returns the value, computing it on the first call.
    ///
    /// # Errors
    ///
    /// Returns the memoized failure of the computation,
    /// [`StorageError::Reentered`](super::StorageError::Reentered) when the
    /// computation needs its own result and no recursion handler is set, or
    /// [`StorageError::Retry`](super::StorageError::Retry) when a recursion
    /// handler refused on its first attempt.
    pub fn invoke(&self) -> StorageResult<T> {
        self.core.invoke()
    }

    /// Returns `true` once the value or its failure has been memoized.
    pub fn is_computed(&self) -> bool {
        self.core.cell.is_computed()
    }

    /// Returns `true` while the computation is running.
    pub fn is_computing(&self) -> bool {
        self.core.cell.is_computing()
    }
}

impl<T> Clone for NotNullLazyValue<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T: Clone> fmt::Debug for NotNullLazyValue<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.core.render(formatter)
    }
}

/// A lazily computed value that may legitimately be `None`.
///
/// A computed `None` is memoized like any other result.
///
/// # Examples
///
/// ```rust
/// use lockmemo::storage::StorageManager;
///
/// let manager = StorageManager::new("example");
/// let missing = manager.create_nullable_lazy_value(|| Ok(None::<String>));
///
/// assert!(!missing.is_computed());
/// assert_eq!(missing.invoke(), Ok(None));
/// assert!(missing.is_computed());
/// ```
pub struct NullableLazyValue<T> {
    core: Arc<LazyCore<Option<T>>>,
}

impl<T: Clone> NullableLazyValue<T> {
    pub(crate) fn from_core(core: LazyCore<Option<T>>) -> Self {
        Self {
            core: Arc::new(core),
        }
    }

    /// Returns the value, computing it on the first call.
    ///
    /// # Errors
    ///
    /// Same as [`NotNullLazyValue::invoke`].
    pub fn invoke(&self) -> StorageResult<Option<T>> {
        self.core.invoke()
    }

    /// Returns `true` once the value (possibly `None`) or its failure has been memoized.
    pub fn is_computed(&self) -> bool {
        self.core.cell.is_computed()
    }

    /// Returns `true` while the computation is running.
    pub fn is_computing(&self) -> bool {
        self.core.cell.is_computing()
    }
}

impl<T> Clone for NullableLazyValue<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T: Clone> fmt::Debug for NullableLazyValue<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.core.render(formatter)
    }
}
