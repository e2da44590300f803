//! The memoization slot behind every lazy value and every memoized key.
//!
//! A cell moves `NotComputed -> Computing -> {Computed | Failed}`. The
//! terminal outcome lives in a `OnceLock`, which gives the lock-free read on
//! the hot path. The progress word is only touched while the manager lock is
//! held; atomics are used for `Sync`, not for ordering.
//!
//! Two transitions go back to `NotComputed`: a computation yielding
//! [`StorageError::Retry`], and a computation that panics.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use tracing::{debug, warn};

use super::error::{StorageError, StorageResult};
use super::manager::StorageContext;

const NOT_COMPUTED: u8 = 0;
const COMPUTING: u8 = 1;

/// Answers a recursive call; the flag is `true` on the first reentry only.
pub(crate) type RecursionHandler<S> = dyn Fn(bool) -> StorageResult<S> + Send + Sync;

/// Runs once on the computed value before it is published.
pub(crate) type PostCompute<S> = dyn Fn(&mut S) + Send + Sync;

/// Optional capabilities applied to one `get_or_compute` call.
pub(crate) struct Hooks<'a, S> {
    pub(crate) on_recursive_call: Option<&'a RecursionHandler<S>>,
    pub(crate) post_compute: Option<&'a PostCompute<S>>,
}

impl<S> Hooks<'_, S> {
    pub(crate) const fn none() -> Self {
        Self {
            on_recursive_call: None,
            post_compute: None,
        }
    }
}

pub(crate) struct Cell<S> {
    outcome: OnceLock<StorageResult<S>>,
    progress: AtomicU8,
    recursion_seen: AtomicBool,
}

impl<S: Clone> Cell<S> {
    pub(crate) const fn new() -> Self {
        Self {
            outcome: OnceLock::new(),
            progress: AtomicU8::new(NOT_COMPUTED),
            recursion_seen: AtomicBool::new(false),
        }
    }

    /// The terminal outcome, without locking or computing.
    #[inline]
    pub(crate) fn outcome(&self) -> Option<StorageResult<S>> {
        self.outcome.get().cloned()
    }

    #[inline]
    pub(crate) fn is_computed(&self) -> bool {
        self.outcome.get().is_some()
    }

    pub(crate) fn is_computing(&self) -> bool {
        !self.is_computed() && self.progress.load(Ordering::Relaxed) == COMPUTING
    }

    /// Returns the memoized outcome, computing it under the manager lock on a miss.
    pub(crate) fn get_or_compute<F>(
        &self,
        context: &StorageContext,
        hooks: Hooks<'_, S>,
        compute: F,
    ) -> StorageResult<S>
    where
        F: FnOnce() -> StorageResult<S>,
    {
        if let Some(outcome) = self.outcome.get() {
            return outcome.clone();
        }

        let _guard = context.lock();

        // Another thread may have finished while we were waiting.
        if let Some(outcome) = self.outcome.get() {
            return outcome.clone();
        }

        // Only the owning thread can see COMPUTING here: any other thread
        // would still be blocked on the lock.
        if self.progress.load(Ordering::Relaxed) == COMPUTING {
            return self.recursion_detected(context, hooks.on_recursive_call);
        }

        self.progress.store(COMPUTING, Ordering::Relaxed);
        let reset = ResetOnUnwind {
            progress: &self.progress,
            context,
            armed: true,
        };

        let result = compute().map(|mut value| {
            if let Some(post_compute) = hooks.post_compute {
                post_compute(&mut value);
            }
            value
        });
        reset.disarm();

        match result {
            Err(StorageError::Retry) => {
                self.progress.store(NOT_COMPUTED, Ordering::Relaxed);
                debug!(manager = %context, "retry requested, cell reset to not computed");
                Err(StorageError::Retry)
            }
            outcome => {
                if let Err(error) = &outcome {
                    debug!(manager = %context, %error, "computation failed, failure memoized");
                    context.report_failure(error);
                }
                if self.outcome.set(outcome.clone()).is_err() {
                    panic!("cell published twice under {context}");
                }
                outcome
            }
        }
    }

    fn recursion_detected(
        &self,
        context: &StorageContext,
        on_recursive_call: Option<&RecursionHandler<S>>,
    ) -> StorageResult<S> {
        let Some(on_recursive_call) = on_recursive_call else {
            debug!(manager = %context, tolerant = false, "recursion detected");
            return Err(StorageError::Reentered);
        };

        let first_attempt = !self.recursion_seen.swap(true, Ordering::Relaxed);
        debug!(manager = %context, tolerant = true, first_attempt, "recursion detected");
        on_recursive_call(first_attempt)
    }
}

/// Puts a cell back to `NotComputed` if its computation unwinds.
struct ResetOnUnwind<'a> {
    progress: &'a AtomicU8,
    context: &'a StorageContext,
    armed: bool,
}

impl ResetOnUnwind<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ResetOnUnwind<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.progress.store(NOT_COMPUTED, Ordering::Relaxed);
            warn!(manager = %self.context, "computation panicked, cell reset to not computed");
        }
    }
}
