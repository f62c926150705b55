//! Chunked relative moves
//!
//! A requested displacement is delivered as a run of sign-preserving
//! commands no larger than the axis' single-command limit. The tracked
//! position advances after every accepted command, so it always equals the
//! sum of what the drivers actually accepted.

use crate::abort::AbortController;
use crate::position::PositionTracker;
use crate::transport::{AxisCommand, AxisTransport};
use spotmapper_core::{Axis, MotionError, StageSettings};

/// Splits one displacement into hardware-bounded axis commands
pub struct MotionChunker<'a> {
    transport: &'a dyn AxisTransport,
    settings: &'a StageSettings,
    position: &'a PositionTracker,
    abort: &'a AbortController,
}

impl<'a> MotionChunker<'a> {
    /// Create a chunker over borrowed stage state
    pub fn new(
        transport: &'a dyn AxisTransport,
        settings: &'a StageSettings,
        position: &'a PositionTracker,
        abort: &'a AbortController,
    ) -> Self {
        Self {
            transport,
            settings,
            position,
            abort,
        }
    }

    /// Move `axis` by `steps` logical steps
    ///
    /// Blocks until every chunk has been accepted. The abort flag is checked
    /// before each chunk; when it is tripped, or has been tripped at any
    /// time since the move started, no further command is sent, the tracked
    /// position is reset to the origin and `Aborted` is returned. A
    /// transport failure stops the move and keeps the chunks already
    /// delivered in the tracked position.
    pub fn move_relative(&self, axis: Axis, steps: i64) -> Result<(), MotionError> {
        let cfg = self.settings.axis(axis);
        if steps.unsigned_abs() > cfg.max_total_steps.unsigned_abs() {
            return Err(MotionError::ConfigurationError {
                axis,
                requested: steps,
                limit: cfg.max_total_steps,
            });
        }
        if steps == 0 {
            return Ok(());
        }

        let chunk = cfg.max_command_steps.max(1);
        let sign = steps.signum();
        let mut remaining = steps.abs();
        let mut delivered = 0i64;
        let epoch = self.abort.epoch();

        tracing::debug!(
            axis = %axis,
            steps,
            chunks = (remaining + chunk - 1) / chunk,
            "Starting chunked move"
        );

        while remaining > 0 {
            if self.abort.tripped_since(epoch) {
                self.position.reset();
                tracing::warn!(axis = %axis, requested = steps, delivered, "Move aborted");
                return Err(MotionError::Aborted {
                    axis,
                    requested: steps,
                    delivered,
                });
            }

            let delta = sign * remaining.min(chunk);
            let command = AxisCommand {
                axis,
                address: &cfg.address,
                steps: delta * cfg.direction(),
            };
            if let Err(source) = self.transport.send(&command) {
                tracing::error!(
                    axis = %axis,
                    requested = steps,
                    delivered,
                    "Axis command failed: {}",
                    source
                );
                return Err(MotionError::CommandFailure {
                    axis,
                    requested: steps,
                    delivered,
                    source,
                });
            }

            self.position.apply_delta(axis, delta);
            delivered += delta;
            remaining -= delta.abs();
        }

        Ok(())
    }
}
