//! Dead-reckoned stage position

use parking_lot::Mutex;
use spotmapper_core::{Axis, Position};

/// Tracks the stage position as the sum of delivered step deltas
///
/// Only the motion chunker applies deltas. `reset` is called by abort
/// recovery and by explicit user action while the stage is idle.
#[derive(Debug, Default)]
pub struct PositionTracker {
    position: Mutex<Position>,
}

impl PositionTracker {
    /// Create a tracker at the origin
    pub fn new() -> Self {
        Self::default()
    }

    /// Current tracked position
    pub fn current(&self) -> Position {
        *self.position.lock()
    }

    /// Set every coordinate back to zero
    pub fn reset(&self) {
        *self.position.lock() = Position::ORIGIN;
    }

    pub(crate) fn apply_delta(&self, axis: Axis, steps: i64) {
        let mut pos = self.position.lock();
        *pos = pos.offset(axis, steps);
    }
}
