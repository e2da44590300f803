//! The storage manager: one reentrant lock shared by every value it creates.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

use super::cache::{CacheWithNotNullValues, CacheWithNullableValues};
use super::error::{StorageError, StorageResult};
use super::lazy_value::{LazyCore, NotNullLazyValue, NullableLazyValue};
use super::memoized::{MemoizedCore, MemoizedFunctionToNotNull, MemoizedFunctionToNullable};
#[cfg(feature = "trace")]
use super::trace::{LockProtectedTrace, Trace};

/// Callback observing each failure at the moment it is memoized.
pub type FailureHook = Arc<dyn Fn(&StorageError) + Send + Sync>;

/// State shared by a manager handle and every value it created.
pub(crate) struct StorageContext {
    lock: Arc<ReentrantMutex<()>>,
    debug_text: String,
    failure_hook: Option<FailureHook>,
}

impl StorageContext {
    pub(crate) fn new(debug_text: impl Into<String>) -> Self {
        Self {
            lock: Arc::new(ReentrantMutex::new(())),
            debug_text: debug_text.into(),
            failure_hook: None,
        }
    }

    #[inline]
    pub(crate) fn lock(&self) -> ReentrantMutexGuard<'_, ()> {
        self.lock.lock()
    }

    pub(crate) fn report_failure(&self, error: &StorageError) {
        if let Some(hook) = &self.failure_hook {
            hook(error);
        }
    }
}

impl fmt::Display for StorageContext {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "StorageManager@{:x} ({})",
            Arc::as_ptr(&self.lock).addr(),
            self.debug_text
        )
    }
}

/// Factory for lazy values and memoized functions that share a single lock.
///
/// Every value created by one manager synchronizes on the same reentrant
/// lock. A cache miss holds that lock for the whole computation, so a web of
/// values that read each other behaves as one atomic step per external call
/// and no lock-ordering deadlock can arise between them. Cache hits never
/// take the lock.
///
/// Entries are never evicted; they live as long as the values holding them.
///
/// # Examples
///
/// ```rust
/// use lockmemo::storage::StorageManager;
///
/// let manager = StorageManager::new("resolve session");
///
/// let declaration = manager.create_lazy_value(|| Ok(String::from("fun main()")));
/// let length = {
///     let declaration = declaration.clone();
///     manager.create_lazy_value(move || Ok(declaration.invoke()?.len()))
/// };
///
/// assert_eq!(length.invoke(), Ok(10));
/// assert!(declaration.is_computed());
/// ```
#[derive(Clone)]
pub struct StorageManager {
    context: Arc<StorageContext>,
}

impl StorageManager {
    /// Creates a manager with its own lock.
    ///
    /// `debug_text` names the manager in diagnostics and log events.
    pub fn new(debug_text: impl Into<String>) -> Self {
        Self {
            context: Arc::new(StorageContext::new(debug_text)),
        }
    }

    /// Creates a manager whose `hook` is called once for every memoized failure.
    pub fn with_failure_hook<H>(debug_text: impl Into<String>, hook: H) -> Self
    where
        H: Fn(&StorageError) + Send + Sync + 'static,
    {
        let mut context = StorageContext::new(debug_text);
        context.failure_hook = Some(Arc::new(hook));
        Self {
            context: Arc::new(context),
        }
    }

    /// Returns a manager sharing this manager's lock with a different name
    /// and failure hook.
    ///
    /// Values created by either handle serialize on the same lock.
    pub fn replace_failure_hook<H>(&self, debug_text: impl Into<String>, hook: H) -> Self
    where
        H: Fn(&StorageError) + Send + Sync + 'static,
    {
        Self {
            context: Arc::new(StorageContext {
                lock: Arc::clone(&self.context.lock),
                debug_text: debug_text.into(),
                failure_hook: Some(Arc::new(hook)),
            }),
        }
    }

    /// Returns `true` when both handles synchronize on the same lock.
    pub fn shares_lock_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.context.lock, &other.context.lock)
    }

    /// Runs `operation` while holding the manager lock.
    pub fn compute<R>(&self, operation: impl FnOnce() -> R) -> R {
        let _guard = self.context.lock();
        operation()
    }

    /// Creates a lazy value that fails with [`StorageError::Reentered`] on recursion.
    pub fn create_lazy_value<T, F>(&self, compute: F) -> NotNullLazyValue<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> StorageResult<T> + Send + Sync + 'static,
    {
        NotNullLazyValue::from_core(LazyCore::new(
            self.context(),
            "NotNullLazyValue",
            compute,
        ))
    }

    /// Creates a lazy value whose recursive calls are answered by
    /// `on_recursive_call(first_attempt)`.
    ///
    /// `first_attempt` is `true` only the first time this value is ever
    /// reentered. Returning [`StorageError::Retry`] then fails the outer call
    /// and resets the value so the next call computes from scratch.
    pub fn create_lazy_value_with_recursion_handler<T, F, R>(
        &self,
        compute: F,
        on_recursive_call: R,
    ) -> NotNullLazyValue<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> StorageResult<T> + Send + Sync + 'static,
        R: Fn(bool) -> StorageResult<T> + Send + Sync + 'static,
    {
        NotNullLazyValue::from_core(
            LazyCore::new(self.context(), "NotNullLazyValue", compute)
                .with_recursion_handler(on_recursive_call),
        )
    }

    /// Creates a lazy value that answers every recursive call with `fallback`.
    ///
    /// The fallback is never stored; only the outer computation's result is.
    pub fn create_recursion_tolerant_lazy_value<T, F>(
        &self,
        compute: F,
        fallback: T,
    ) -> NotNullLazyValue<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> StorageResult<T> + Send + Sync + 'static,
    {
        NotNullLazyValue::from_core(
            LazyCore::new(self.context(), "RecursionTolerantLazyValue", compute)
                .with_recursion_handler(move |_| Ok(fallback.clone())),
        )
    }

    /// Creates a lazy value whose `post_compute` runs once, under the lock,
    /// on the freshly computed value before it is published.
    ///
    /// The value is still computing while `post_compute` runs. Reading it
    /// from `post_compute`, directly or through other values, is a recursive
    /// call: it fails with [`StorageError::Reentered`] rather than observing
    /// the value being post-processed. Work on the `&mut T` argument instead.
    pub fn create_lazy_value_with_post_compute<T, F, P>(
        &self,
        compute: F,
        post_compute: P,
    ) -> NotNullLazyValue<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> StorageResult<T> + Send + Sync + 'static,
        P: Fn(&mut T) + Send + Sync + 'static,
    {
        NotNullLazyValue::from_core(
            LazyCore::new(self.context(), "NotNullLazyValueWithPostCompute", compute)
                .with_post_compute(post_compute),
        )
    }

    /// Combines [`Self::create_lazy_value_with_recursion_handler`] and
    /// [`Self::create_lazy_value_with_post_compute`].
    ///
    /// A read of the value from `post_compute` is answered by
    /// `on_recursive_call`, like any other recursive call.
    pub fn create_recursion_tolerant_lazy_value_with_post_compute<T, F, R, P>(
        &self,
        compute: F,
        on_recursive_call: R,
        post_compute: P,
    ) -> NotNullLazyValue<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> StorageResult<T> + Send + Sync + 'static,
        R: Fn(bool) -> StorageResult<T> + Send + Sync + 'static,
        P: Fn(&mut T) + Send + Sync + 'static,
    {
        NotNullLazyValue::from_core(
            LazyCore::new(self.context(), "NotNullLazyValueWithPostCompute", compute)
                .with_recursion_handler(on_recursive_call)
                .with_post_compute(post_compute),
        )
    }

    /// Creates a lazy value that may legitimately compute to `None`.
    pub fn create_nullable_lazy_value<T, F>(&self, compute: F) -> NullableLazyValue<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> StorageResult<Option<T>> + Send + Sync + 'static,
    {
        NullableLazyValue::from_core(LazyCore::new(
            self.context(),
            "NullableLazyValue",
            compute,
        ))
    }

    /// Creates a nullable lazy value that answers recursive calls with `fallback`.
    pub fn create_recursion_tolerant_nullable_lazy_value<T, F>(
        &self,
        compute: F,
        fallback: Option<T>,
    ) -> NullableLazyValue<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> StorageResult<Option<T>> + Send + Sync + 'static,
    {
        NullableLazyValue::from_core(
            LazyCore::new(self.context(), "RecursionTolerantNullableLazyValue", compute)
                .with_recursion_handler(move |_| Ok(fallback.clone())),
        )
    }

    /// Creates a nullable lazy value with a one-time `post_compute` step.
    ///
    /// Reading the value from `post_compute` fails with
    /// [`StorageError::Reentered`], as in [`Self::create_lazy_value_with_post_compute`].
    pub fn create_nullable_lazy_value_with_post_compute<T, F, P>(
        &self,
        compute: F,
        post_compute: P,
    ) -> NullableLazyValue<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> StorageResult<Option<T>> + Send + Sync + 'static,
        P: Fn(&mut Option<T>) + Send + Sync + 'static,
    {
        NullableLazyValue::from_core(
            LazyCore::new(self.context(), "NullableLazyValueWithPostCompute", compute)
                .with_post_compute(post_compute),
        )
    }

    /// Creates a function memoized per key.
    ///
    /// Failures are memoized per key as well: a failing key returns the same
    /// error instance on every later call.
    pub fn create_memoized_function<K, V, F>(&self, compute: F) -> MemoizedFunctionToNotNull<K, V>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
        F: Fn(&K) -> StorageResult<V> + Send + Sync + 'static,
    {
        MemoizedFunctionToNotNull::from_core(MemoizedCore::new(self.context(), compute))
    }

    /// Creates a function memoized per key whose results may be `None`.
    pub fn create_memoized_function_with_nullable_values<K, V, F>(
        &self,
        compute: F,
    ) -> MemoizedFunctionToNullable<K, V>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
        F: Fn(&K) -> StorageResult<Option<V>> + Send + Sync + 'static,
    {
        MemoizedFunctionToNullable::from_core(MemoizedCore::new(self.context(), compute))
    }

    /// Creates a cache whose computation is passed at each lookup.
    ///
    /// Only the first computation for a key runs; its value or failure is
    /// returned for that key from then on.
    pub fn create_cache_with_not_null_values<K, V>(&self) -> CacheWithNotNullValues<K, V>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        CacheWithNotNullValues::new(self.context())
    }

    /// Creates a cache whose computations may produce `None`.
    pub fn create_cache_with_nullable_values<K, V>(&self) -> CacheWithNullableValues<K, V>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        CacheWithNullableValues::new(self.context())
    }

    /// Wraps `trace` so that each of its operations runs under this manager's lock.
    #[cfg(feature = "trace")]
    pub fn create_safe_trace<T: Trace>(&self, trace: T) -> LockProtectedTrace<T> {
        LockProtectedTrace::new(self.context(), trace)
    }

    fn context(&self) -> Arc<StorageContext> {
        Arc::clone(&self.context)
    }
}

impl fmt::Display for StorageManager {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.context, formatter)
    }
}

impl fmt::Debug for StorageManager {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("StorageManager")
            .field("debug_text", &self.context.debug_text)
            .field("failure_hook", &self.context.failure_hook.is_some())
            .finish()
    }
}
