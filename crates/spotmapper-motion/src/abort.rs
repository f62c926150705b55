//! Cooperative abort flag
//!
//! The flag is polled by the motion chunker before every command and by the
//! scan sequencer at every point boundary. It is lock-free so that an abort
//! request from the command thread never waits on an in-flight move.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Abort token shared by the stage and the scan sequencer
///
/// Besides the Clear/Tripped flag, every trip bumps an epoch counter. A scan
/// that records the epoch when it starts can tell that an abort happened
/// even if recovery has already cleared the flag by the time it looks.
#[derive(Debug, Default)]
pub struct AbortController {
    tripped: AtomicBool,
    epoch: AtomicU64,
}

impl AbortController {
    /// Create a cleared controller
    pub fn new() -> Self {
        Self::default()
    }

    /// Trip the flag
    ///
    /// Idempotent. Returns `true` only for the call that actually tripped it.
    pub fn request_abort(&self) -> bool {
        let newly = !self.tripped.swap(true, Ordering::SeqCst);
        if newly {
            self.epoch.fetch_add(1, Ordering::SeqCst);
        }
        newly
    }

    /// Check whether an abort is pending
    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::SeqCst)
    }

    /// Clear the flag; only abort recovery should call this
    pub fn clear(&self) {
        self.tripped.store(false, Ordering::SeqCst);
    }

    /// Number of trips since construction
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Check whether the flag is tripped or has been tripped since `epoch`
    pub fn tripped_since(&self, epoch: u64) -> bool {
        self.is_tripped() || self.epoch() != epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_request_abort_is_idempotent() {
        let abort = AbortController::new();
        assert!(!abort.is_tripped());
        assert!(abort.request_abort());
        assert!(!abort.request_abort());
        assert!(abort.is_tripped());
        assert_eq!(abort.epoch(), 1);

        abort.clear();
        assert!(!abort.is_tripped());
    }

    #[test]
    fn test_tripped_since_survives_clear() {
        let abort = AbortController::new();
        let start = abort.epoch();
        assert!(!abort.tripped_since(start));

        abort.request_abort();
        abort.clear();
        assert!(abort.tripped_since(start));
        assert!(!abort.tripped_since(abort.epoch()));
    }

    #[test]
    fn test_visible_across_threads() {
        let abort = Arc::new(AbortController::new());
        let remote = Arc::clone(&abort);
        std::thread::spawn(move || remote.request_abort())
            .join()
            .unwrap();
        assert!(abort.is_tripped());
    }
}
