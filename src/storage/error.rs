//! Errors produced by lazy values and memoized functions.
//!
//! Every failure travels through [`StorageError`]. User failures are wrapped
//! once in an `Arc` so the memoized failure and every later rethrow are the
//! same instance.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Result type returned by every computation and every `invoke`.
pub type StorageResult<T> = Result<T, StorageError>;

/// The error channel of the storage engine.
///
/// # Examples
///
/// ```rust
/// use lockmemo::storage::StorageError;
///
/// let error = StorageError::message("type mismatch");
/// let rethrown = error.clone();
///
/// // Clones share the underlying failure instance.
/// assert_eq!(error, rethrown);
/// assert_ne!(error, StorageError::message("type mismatch"));
/// ```
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// A value without recursion tolerance was requested again by its own
    /// computation, directly or through other values.
    #[error("lazy value reentered while computing (unexpected cyclic dependency)")]
    Reentered,

    /// A recursion-tolerant value refused to provide a provisional result.
    ///
    /// Never memoized: every cell this signal passes through goes back to the
    /// not-computed state, so the next call starts over.
    #[error("recursion detected on first attempt, computation must be retried")]
    Retry,

    /// A computation failed. The failure is memoized.
    #[error(transparent)]
    Failed(Arc<dyn StdError + Send + Sync + 'static>),
}

impl StorageError {
    /// Wraps a user error as a memoizable failure.
    pub fn failed<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Failed(Arc::new(error))
    }

    /// Creates a failure carrying only a message.
    pub fn message(message: impl Into<String>) -> Self {
        Self::failed(MessageError(message.into()))
    }

    /// Returns `true` for the [`StorageError::Retry`] signal.
    #[inline]
    pub const fn is_retry(&self) -> bool {
        matches!(self, Self::Retry)
    }

    /// Returns `true` for a reentrancy violation.
    #[inline]
    pub const fn is_reentered(&self) -> bool {
        matches!(self, Self::Reentered)
    }

    /// Returns the wrapped user failure, if any.
    pub fn failure(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        match self {
            Self::Failed(error) => Some(error.as_ref()),
            Self::Reentered | Self::Retry => None,
        }
    }
}

/// Failures are equal only when they are the same instance.
impl PartialEq for StorageError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Reentered, Self::Reentered) | (Self::Retry, Self::Retry) => true,
            (Self::Failed(left), Self::Failed(right)) => Arc::ptr_eq(left, right),
            _ => false,
        }
    }
}

impl Eq for StorageError {}

#[derive(Debug)]
struct MessageError(String);

impl fmt::Display for MessageError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl StdError for MessageError {}
