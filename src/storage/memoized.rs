//! One-argument memoized computations: one cell per distinct key.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use rustc_hash::FxBuildHasher;

use super::cell::{Cell, Hooks};
use super::error::StorageResult;
use super::manager::StorageContext;

type KeyedCompute<K, S> = dyn Fn(&K) -> StorageResult<S> + Send + Sync;

/// One cell per key, all guarded by the manager lock.
pub(crate) struct KeyedCells<K, S> {
    context: Arc<StorageContext>,
    cells: DashMap<K, Arc<Cell<S>>, FxBuildHasher>,
}

impl<K, S> KeyedCells<K, S>
where
    K: Eq + Hash + Clone,
    S: Clone,
{
    pub(crate) fn new(context: Arc<StorageContext>) -> Self {
        Self {
            context,
            cells: DashMap::with_hasher(FxBuildHasher),
        }
    }

    /// Returns the outcome memoized for `key`, running `compute` on a miss.
    pub(crate) fn get_or_compute<F>(&self, key: &K, compute: F) -> StorageResult<S>
    where
        F: FnOnce() -> StorageResult<S>,
    {
        if let Some(outcome) = self.cached(key) {
            return outcome;
        }

        let _guard = self.context.lock();
        let cell = self.cell_for(key);
        cell.get_or_compute(&self.context, Hooks::none(), compute)
    }

    fn cached(&self, key: &K) -> Option<StorageResult<S>> {
        self.cells
            .get(key)
            .and_then(|entry| entry.value().outcome())
    }

    /// Looks up or inserts the cell for `key`. Must be called under the lock.
    fn cell_for(&self, key: &K) -> Arc<Cell<S>> {
        if let Some(cell) = self.cells.get(key).map(|entry| Arc::clone(entry.value())) {
            return cell;
        }

        let cell = Arc::new(Cell::new());
        let previous = self.cells.insert(key.clone(), Arc::clone(&cell));
        assert!(
            previous.is_none(),
            "race condition detected on a memoized input under {}",
            self.context
        );
        cell
    }

    pub(crate) fn is_computed(&self, key: &K) -> bool {
        self.cells
            .get(key)
            .is_some_and(|entry| entry.value().is_computed())
    }

    pub(crate) fn render(&self, name: &str, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct(name)
            .field("keys", &self.cells.len())
            .field("storage_manager", &format_args!("{}", self.context))
            .finish()
    }
}

pub(crate) struct MemoizedCore<K, S> {
    cells: KeyedCells<K, S>,
    compute: Box<KeyedCompute<K, S>>,
}

impl<K, S> MemoizedCore<K, S>
where
    K: Eq + Hash + Clone,
    S: Clone,
{
    pub(crate) fn new<F>(context: Arc<StorageContext>, compute: F) -> Self
    where
        F: Fn(&K) -> StorageResult<S> + Send + Sync + 'static,
    {
        Self {
            cells: KeyedCells::new(context),
            compute: Box::new(compute),
        }
    }

    fn invoke(&self, key: K) -> StorageResult<S> {
        self.cells.get_or_compute(&key, || (self.compute)(&key))
    }

    fn is_computed(&self, key: &K) -> bool {
        self.cells.is_computed(key)
    }

    fn render(&self, name: &str, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.cells.render(name, formatter)
    }
}

/// A memoized function whose results are never absent.
///
/// Each distinct key is computed at most once. Failures are memoized per key.
///
/// # Examples
///
/// ```rust
/// use lockmemo::storage::StorageManager;
///
/// let manager = StorageManager::new("example");
/// let qualified = manager.create_memoized_function(|name: &String| Ok(format!("kotlin.{name}")));
///
/// assert_eq!(qualified.invoke("Int".to_string()), Ok("kotlin.Int".to_string()));
/// assert!(qualified.is_computed(&"Int".to_string()));
/// assert!(!qualified.is_computed(&"Any".to_string()));
/// ```
pub struct MemoizedFunctionToNotNull<K, V> {
    core: Arc<MemoizedCore<K, V>>,
}

impl<K, V> MemoizedFunctionToNotNull<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub(crate) fn from_core(core: MemoizedCore<K, V>) -> Self {
        Self {
            core: Arc::new(core),
        }
    }

    /// Returns the result for `key`, computing it on the first call for that key.
    ///
    /// # Errors
    ///
    /// Returns the memoized failure for `key`, or
    /// [`StorageError::Reentered`](super::StorageError::Reentered) when the
    /// computation for `key` needs its own result.
    ///
    /// # Panics
    ///
    /// Panics if two cells are ever inserted for the same key.
    pub fn invoke(&self, key: K) -> StorageResult<V> {
        self.core.invoke(key)
    }

    /// Returns `true` once the result or failure for `key` has been memoized.
    pub fn is_computed(&self, key: &K) -> bool {
        self.core.is_computed(key)
    }
}

impl<K, V> Clone for MemoizedFunctionToNotNull<K, V> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<K, V> fmt::Debug for MemoizedFunctionToNotNull<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.core.render("MemoizedFunctionToNotNull", formatter)
    }
}

/// A memoized function whose results may be `None`.
///
/// A computed `None` is memoized per key like any other result.
pub struct MemoizedFunctionToNullable<K, V> {
    core: Arc<MemoizedCore<K, Option<V>>>,
}

impl<K, V> MemoizedFunctionToNullable<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub(crate) fn from_core(core: MemoizedCore<K, Option<V>>) -> Self {
        Self {
            core: Arc::new(core),
        }
    }

    /// Returns the result for `key`, computing it on the first call for that key.
    ///
    /// # Errors
    ///
    /// Same as [`MemoizedFunctionToNotNull::invoke`].
    ///
    /// # Panics
    ///
    /// Panics if two cells are ever inserted for the same key.
    pub fn invoke(&self, key: K) -> StorageResult<Option<V>> {
        self.core.invoke(key)
    }

    /// Returns `true` once the result (possibly `None`) or failure for `key` has been memoized.
    pub fn is_computed(&self, key: &K) -> bool {
        self.core.is_computed(key)
    }
}

impl<K, V> Clone for MemoizedFunctionToNullable<K, V> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<K, V> fmt::Debug for MemoizedFunctionToNullable<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.core.render("MemoizedFunctionToNullable", formatter)
    }
}
