//! Type aliases for shared state passed between the controller, its
//! background workers, and test doubles.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use spotmapper_core::types::*;
//!
//! // Instead of: Arc<Mutex<Vec<String>>>
//! let log: ThreadSafeVec<String> = thread_safe_vec();
//! log.lock().push("moved".to_string());
//! ```

use parking_lot::Mutex;
use std::sync::Arc;

/// A thread-safe, mutex-protected wrapper for cross-thread sharing.
///
/// Uses `parking_lot::Mutex`, which does not poison on panic.
pub type ThreadSafe<T> = Arc<Mutex<T>>;

/// A thread-safe vector, typically an append-only record of activity.
pub type ThreadSafeVec<T> = Arc<Mutex<Vec<T>>>;

/// Create a new `ThreadSafe<T>` from a value.
#[inline]
pub fn thread_safe<T>(value: T) -> ThreadSafe<T> {
    Arc::new(Mutex::new(value))
}

/// Create a new empty `ThreadSafeVec<T>`.
#[inline]
pub fn thread_safe_vec<T>() -> ThreadSafeVec<T> {
    Arc::new(Mutex::new(Vec::new()))
}
