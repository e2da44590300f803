//! Recording contexts that computations write into as a side effect.
//!
//! A [`Trace`] is a plain mutable record store with no locking of its own.
//! [`LockProtectedTrace`] makes it callable from any computation of a
//! [`StorageManager`](super::StorageManager) by running every operation under
//! that manager's lock, so no second, independently ordered lock exists.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use super::manager::StorageContext;

/// Identifies one record table of a trace, e.g. "expression types".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slice(&'static str);

impl Slice {
    /// Creates a slice with the given name.
    #[inline]
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// The slice name.
    #[inline]
    pub const fn name(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for Slice {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.0)
    }
}

/// A mutable record/query context.
pub trait Trace {
    /// Key type of every slice.
    type Key;
    /// Value type of every slice.
    type Value;
    /// Reported diagnostic type.
    type Diagnostic;

    /// Records `value` for `key` in `slice`, replacing any previous value.
    fn record(&mut self, slice: Slice, key: Self::Key, value: Self::Value);

    /// Returns the value recorded for `key` in `slice`.
    fn get(&self, slice: Slice, key: &Self::Key) -> Option<Self::Value>;

    /// Returns every key recorded in `slice`.
    fn keys(&self, slice: Slice) -> Vec<Self::Key>;

    /// Reports a diagnostic.
    fn report(&mut self, diagnostic: Self::Diagnostic);

    /// Returns a snapshot of the reported diagnostics, in report order.
    fn diagnostics(&self) -> Vec<Self::Diagnostic>;
}

/// In-memory [`Trace`].
///
/// A trace may delegate to a read-only parent: lookups that miss locally fall
/// back to the parent, key listings include the parent's keys, and the
/// diagnostics snapshot lists the parent's diagnostics first.
///
/// # Examples
///
/// ```rust
/// use lockmemo::storage::{BindingTrace, Slice, Trace};
/// use std::sync::Arc;
///
/// const TYPE: Slice = Slice::new("TYPE");
///
/// let mut context: BindingTrace<&str, &str, String> = BindingTrace::new("file context");
/// context.record(TYPE, "x", "Int");
///
/// let mut element = BindingTrace::delegating("element", Arc::new(context));
/// element.record(TYPE, "y", "String");
///
/// assert_eq!(element.get(TYPE, &"x"), Some("Int"));
/// assert_eq!(element.get(TYPE, &"y"), Some("String"));
/// ```
pub struct BindingTrace<K, V, D> {
    name: String,
    parent: Option<Arc<BindingTrace<K, V, D>>>,
    slices: FxHashMap<Slice, FxHashMap<K, V>>,
    diagnostics: Vec<D>,
}

impl<K, V, D> BindingTrace<K, V, D> {
    /// Creates an empty trace.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            slices: FxHashMap::default(),
            diagnostics: Vec::new(),
        }
    }

    /// Creates an empty trace that reads through to `parent`.
    pub fn delegating(name: impl Into<String>, parent: Arc<Self>) -> Self {
        Self {
            parent: Some(parent),
            ..Self::new(name)
        }
    }

    /// The debug name of this trace.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<K, V, D> Trace for BindingTrace<K, V, D>
where
    K: Eq + Hash + Clone,
    V: Clone,
    D: Clone,
{
    type Key = K;
    type Value = V;
    type Diagnostic = D;

    fn record(&mut self, slice: Slice, key: K, value: V) {
        self.slices.entry(slice).or_default().insert(key, value);
    }

    fn get(&self, slice: Slice, key: &K) -> Option<V> {
        self.slices
            .get(&slice)
            .and_then(|entries| entries.get(key).cloned())
            .or_else(|| self.parent.as_ref().and_then(|parent| parent.get(slice, key)))
    }

    fn keys(&self, slice: Slice) -> Vec<K> {
        let mut keys = self
            .parent
            .as_ref()
            .map(|parent| parent.keys(slice))
            .unwrap_or_default();
        if let Some(entries) = self.slices.get(&slice) {
            keys.retain(|key| !entries.contains_key(key));
            keys.extend(entries.keys().cloned());
        }
        keys
    }

    fn report(&mut self, diagnostic: D) {
        self.diagnostics.push(diagnostic);
    }

    fn diagnostics(&self) -> Vec<D> {
        let mut diagnostics = self
            .parent
            .as_ref()
            .map(|parent| parent.diagnostics())
            .unwrap_or_default();
        diagnostics.extend(self.diagnostics.iter().cloned());
        diagnostics
    }
}

impl<K, V, D> fmt::Debug for BindingTrace<K, V, D> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("BindingTrace")
            .field("name", &self.name)
            .field("slices", &self.slices.len())
            .field("diagnostics", &self.diagnostics.len())
            .field("delegating", &self.parent.is_some())
            .finish()
    }
}

/// A [`Trace`] whose every operation runs under its manager's lock.
///
/// Created by [`StorageManager::create_safe_trace`](super::StorageManager::create_safe_trace).
/// The inner mutex only turns `&self` into `&mut T`; it is always taken
/// after the manager lock and released before returning, so it is never
/// contended.
pub struct LockProtectedTrace<T> {
    context: Arc<StorageContext>,
    trace: Mutex<T>,
}

impl<T: Trace> LockProtectedTrace<T> {
    pub(crate) fn new(context: Arc<StorageContext>, trace: T) -> Self {
        Self {
            context,
            trace: Mutex::new(trace),
        }
    }

    /// See [`Trace::record`].
    pub fn record(&self, slice: Slice, key: T::Key, value: T::Value) {
        self.locked(|trace| trace.record(slice, key, value));
    }

    /// See [`Trace::get`].
    pub fn get(&self, slice: Slice, key: &T::Key) -> Option<T::Value> {
        self.locked(|trace| trace.get(slice, key))
    }

    /// See [`Trace::keys`].
    pub fn keys(&self, slice: Slice) -> Vec<T::Key> {
        self.locked(|trace| trace.keys(slice))
    }

    /// See [`Trace::report`].
    pub fn report(&self, diagnostic: T::Diagnostic) {
        self.locked(|trace| trace.report(diagnostic));
    }

    /// See [`Trace::diagnostics`].
    pub fn diagnostics(&self) -> Vec<T::Diagnostic> {
        self.locked(|trace| trace.diagnostics())
    }

    /// Unwraps the protected trace.
    pub fn into_inner(self) -> T {
        self.trace.into_inner()
    }

    fn locked<R>(&self, operation: impl FnOnce(&mut T) -> R) -> R {
        let _guard = self.context.lock();
        let mut trace = self.trace.lock();
        operation(&mut *trace)
    }
}

impl<T> fmt::Debug for LockProtectedTrace<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("LockProtectedTrace")
            .field("storage_manager", &format_args!("{}", self.context))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::super::StorageManager;
    use super::*;
    use rstest::rstest;
    use static_assertions::assert_impl_all;

    const TYPE: Slice = Slice::new("TYPE");
    const REFERENCE: Slice = Slice::new("REFERENCE");

    type TestTrace = BindingTrace<String, String, String>;

    assert_impl_all!(LockProtectedTrace<TestTrace>: Send, Sync);

    #[rstest]
    fn record_replaces_previous_value() {
        let mut trace = TestTrace::new("replace");
        trace.record(TYPE, "x".into(), "Int".into());
        trace.record(TYPE, "x".into(), "Long".into());

        assert_eq!(trace.get(TYPE, &"x".into()), Some("Long".into()));
        assert_eq!(trace.keys(TYPE), vec!["x".to_string()]);
    }

    #[rstest]
    fn slices_are_independent() {
        let mut trace = TestTrace::new("slices");
        trace.record(TYPE, "x".into(), "Int".into());

        assert_eq!(trace.get(REFERENCE, &"x".into()), None);
        assert!(trace.keys(REFERENCE).is_empty());
    }

    #[rstest]
    fn delegating_trace_merges_parent() {
        let mut parent = TestTrace::new("parent");
        parent.record(TYPE, "a".into(), "Int".into());
        parent.record(TYPE, "b".into(), "Int".into());
        parent.report("parent warning".into());

        let mut child = TestTrace::delegating("child", Arc::new(parent));
        child.record(TYPE, "b".into(), "String".into());
        child.record(TYPE, "c".into(), "Unit".into());
        child.report("child error".into());

        let mut keys = child.keys(TYPE);
        keys.sort();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert_eq!(child.get(TYPE, &"b".into()), Some("String".into()));
        assert_eq!(
            child.diagnostics(),
            vec!["parent warning".to_string(), "child error".to_string()]
        );
    }

    #[rstest]
    fn safe_trace_forwards_every_operation() {
        let manager = StorageManager::new("trace");
        let trace = manager.create_safe_trace(TestTrace::new("safe"));

        trace.record(TYPE, "x".into(), "Int".into());
        trace.report("unused variable".into());

        assert_eq!(trace.get(TYPE, &"x".into()), Some("Int".into()));
        assert_eq!(trace.keys(TYPE), vec!["x".to_string()]);
        assert_eq!(trace.diagnostics(), vec!["unused variable".to_string()]);

        let inner = trace.into_inner();
        assert_eq!(inner.name(), "safe");
    }
}
