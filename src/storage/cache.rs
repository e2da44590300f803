//! Keyed caches whose computation is supplied at each lookup.
//!
//! A cache is a memoized function without a fixed body: the first
//! `compute_if_absent` for a key decides that key's outcome, and every later
//! computation passed for the same key is dropped unrun.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use super::error::StorageResult;
use super::manager::StorageContext;
use super::memoized::KeyedCells;

/// A cache whose values are never absent.
///
/// # Examples
///
/// ```rust
/// use lockmemo::storage::StorageManager;
///
/// let manager = StorageManager::new("example");
/// let descriptors = manager.create_cache_with_not_null_values::<&str, String>();
///
/// let first = descriptors.compute_if_absent("main", || Ok("fun main()".to_string()));
/// let second = descriptors.compute_if_absent("main", || Ok("ignored".to_string()));
///
/// assert_eq!(first, Ok("fun main()".to_string()));
/// assert_eq!(second, first);
/// ```
pub struct CacheWithNotNullValues<K, V> {
    cells: Arc<KeyedCells<K, V>>,
}

impl<K, V> CacheWithNotNullValues<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub(crate) fn new(context: Arc<StorageContext>) -> Self {
        Self {
            cells: Arc::new(KeyedCells::new(context)),
        }
    }

    /// Returns the value cached for `key`, running `computation` if there is none.
    ///
    /// # Errors
    ///
    /// Returns the failure memoized for `key`, or
    /// [`StorageError::Reentered`](super::StorageError::Reentered) when the
    /// computation for `key` looks up `key` again.
    ///
    /// # Panics
    ///
    /// Panics if two cells are ever inserted for the same key.
    pub fn compute_if_absent<F>(&self, key: K, computation: F) -> StorageResult<V>
    where
        F: FnOnce() -> StorageResult<V>,
    {
        self.cells.get_or_compute(&key, computation)
    }

    /// Returns `true` once a value or failure for `key` has been memoized.
    pub fn is_computed(&self, key: &K) -> bool {
        self.cells.is_computed(key)
    }
}

impl<K, V> Clone for CacheWithNotNullValues<K, V> {
    fn clone(&self) -> Self {
        Self {
            cells: Arc::clone(&self.cells),
        }
    }
}

impl<K, V> fmt::Debug for CacheWithNotNullValues<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.cells.render("CacheWithNotNullValues", formatter)
    }
}

/// A cache whose values may be `None`.
pub struct CacheWithNullableValues<K, V> {
    cells: Arc<KeyedCells<K, Option<V>>>,
}

impl<K, V> CacheWithNullableValues<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub(crate) fn new(context: Arc<StorageContext>) -> Self {
        Self {
            cells: Arc::new(KeyedCells::new(context)),
        }
    }

    /// Returns the value cached for `key`, running `computation` if there is none.
    ///
    /// A computed `None` is cached like any other value.
    ///
    /// # Errors
    ///
    /// Same as [`CacheWithNotNullValues::compute_if_absent`].
    ///
    /// # Panics
    ///
    /// Panics if two cells are ever inserted for the same key.
    pub fn compute_if_absent<F>(&self, key: K, computation: F) -> StorageResult<Option<V>>
    where
        F: FnOnce() -> StorageResult<Option<V>>,
    {
        self.cells.get_or_compute(&key, computation)
    }

    /// Returns `true` once a value (possibly `None`) or failure for `key` has been memoized.
    pub fn is_computed(&self, key: &K) -> bool {
        self.cells.is_computed(key)
    }
}

impl<K, V> Clone for CacheWithNullableValues<K, V> {
    fn clone(&self) -> Self {
        Self {
            cells: Arc::clone(&self.cells),
        }
    }
}

impl<K, V> fmt::Debug for CacheWithNullableValues<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.cells.render("CacheWithNullableValues", formatter)
    }
}
