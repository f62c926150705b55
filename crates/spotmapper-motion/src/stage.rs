//! Stage facade
//!
//! Owns the axis transport, the tracked position and the abort flag of one
//! physical stage. Moves are serialized: only one chunked move runs at a
//! time, while abort requests and position reads never wait on it.

use crate::abort::AbortController;
use crate::chunker::MotionChunker;
use crate::position::PositionTracker;
use crate::sleeper::{Sleeper, ThreadSleeper};
use crate::transport::AxisTransport;
use parking_lot::Mutex;
use spotmapper_core::units::format_steps;
use spotmapper_core::{Axis, MotionError, Position, StageSettings};
use std::sync::Arc;
use std::time::Duration;

/// One motorized stage
pub struct Stage {
    transport: Arc<dyn AxisTransport>,
    settings: StageSettings,
    position: PositionTracker,
    abort: AbortController,
    sleeper: Arc<dyn Sleeper>,
    motion: Mutex<()>,
}

impl Stage {
    /// Create a stage at the origin that sleeps in real time
    pub fn new(transport: Arc<dyn AxisTransport>, settings: StageSettings) -> Self {
        tracing::debug!("Stage on {} transport", transport.name());
        Self {
            transport,
            settings,
            position: PositionTracker::new(),
            abort: AbortController::new(),
            sleeper: Arc::new(ThreadSleeper),
            motion: Mutex::new(()),
        }
    }

    /// Builder method to replace the sleeper used for every delay
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Stage settings
    pub fn settings(&self) -> &StageSettings {
        &self.settings
    }

    /// Abort flag shared with the scan sequencer
    pub fn abort_controller(&self) -> &AbortController {
        &self.abort
    }

    /// Move one axis by a signed number of logical steps
    pub fn move_relative(&self, axis: Axis, steps: i64) -> Result<(), MotionError> {
        let _motion = self.motion.lock();
        tracing::trace!(
            axis = %axis,
            "Moving {}",
            format_steps(steps, self.settings.axis(axis))
        );
        MotionChunker::new(
            self.transport.as_ref(),
            &self.settings,
            &self.position,
            &self.abort,
        )
        .move_relative(axis, steps)
    }

    /// Move one axis by a distance in millimetres, rounded to the nearest step
    pub fn move_mm(&self, axis: Axis, mm: f64) -> Result<(), MotionError> {
        let steps = self
            .settings
            .axis(axis)
            .mm_to_steps(mm)
            .ok_or(MotionError::NotCalibrated { axis })?;
        self.move_relative(axis, steps)
    }

    /// Move to an absolute planar position, X first then Y
    pub fn goto(&self, target: Position) -> Result<(), MotionError> {
        let (dx, dy) = self.position().delta_to(&target);
        tracing::debug!("Moving to {} (dx={}, dy={})", target, dx, dy);
        self.move_relative(Axis::X, dx)?;
        self.move_relative(Axis::Y, dy)
    }

    /// Current tracked position
    pub fn position(&self) -> Position {
        self.position.current()
    }

    /// Declare the current physical location to be the origin
    pub fn reset_position(&self) {
        let _motion = self.motion.lock();
        self.position.reset();
        tracing::info!("Position reset to origin");
    }

    /// Open-loop travel time for a planar displacement
    ///
    /// `(|dx| / vx + |dy| / vy) * travel_margin`
    pub fn estimate_time(&self, dx: i64, dy: i64) -> Duration {
        let secs = dx.unsigned_abs() as f64 / self.settings.x.velocity
            + dy.unsigned_abs() as f64 / self.settings.y.velocity;
        let secs = secs * self.settings.travel_margin;
        if secs.is_finite() && secs > 0.0 {
            Duration::from_secs_f64(secs)
        } else {
            Duration::ZERO
        }
    }

    /// Block the calling thread through the stage's sleeper
    pub fn settle(&self, duration: Duration) {
        self.sleeper.sleep(duration);
    }

    /// Trip the abort flag and halt every driver
    ///
    /// Callable from any thread. Returns `true` if this call tripped the flag.
    pub fn request_abort(&self) -> bool {
        let newly = self.abort.request_abort();
        if newly {
            tracing::warn!(transport = %self.transport.name(), "Abort requested; halting axes");
            for axis in Axis::ALL {
                let address = &self.settings.axis(axis).address;
                if let Err(e) = self.transport.halt(axis, address) {
                    tracing::warn!(axis = %axis, "Failed to halt axis: {}", e);
                }
            }
        }
        newly
    }

    /// Full abort recovery
    ///
    /// Trips the flag, waits the grace delay for in-flight moves to observe
    /// it, then waits for any move still holding the stage to return before
    /// resetting the tracked position to the origin and clearing the flag.
    /// The origin is not re-homed: the physical stage may have moved part of
    /// a chunk before stopping.
    pub fn abort(&self) {
        self.request_abort();
        let grace = self.settings.abort_grace();
        tracing::info!("Waiting {:?} for motion to unwind", grace);
        self.sleeper.sleep(grace);

        // A chunk still inside the transport must unwind before the reset
        let _motion = self.motion.lock();
        self.position.reset();
        self.abort.clear();
        tracing::info!("Abort recovery complete; position reset to origin");
    }
}
