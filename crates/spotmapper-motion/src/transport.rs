//! Axis command channel
//!
//! The motor drivers accept one bounded relative move per command and report
//! only success or failure. Magnitudes are validated by the caller; a
//! transport never splits or clamps a command.

use spotmapper_core::{thread_safe, thread_safe_vec, Axis, ThreadSafe, ThreadSafeVec, TransportError};
use std::time::Duration;

/// One relative-move command addressed to a single axis driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisCommand<'a> {
    /// Logical axis
    pub axis: Axis,
    /// Driver address from the axis settings
    pub address: &'a str,
    /// Raw signed step count, already corrected for axis inversion
    pub steps: i64,
}

/// Low-level axis driver interface
pub trait AxisTransport: Send + Sync {
    /// Issue one relative move and block until the driver accepts it
    fn send(&self, command: &AxisCommand<'_>) -> Result<(), TransportError>;

    /// Stop the driver as quickly as possible
    ///
    /// Best effort; the default does nothing.
    fn halt(&self, _axis: Axis, _address: &str) -> Result<(), TransportError> {
        Ok(())
    }

    /// Transport name for logging
    fn name(&self) -> String {
        "axis_transport".to_string()
    }
}

/// A command recorded by [`SimulatedTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentCommand {
    /// Logical axis
    pub axis: Axis,
    /// Driver address
    pub address: String,
    /// Raw signed step count
    pub steps: i64,
}

/// In-memory transport that records every command
///
/// Used by the dry-run binary and by tests. A per-command delay stands in
/// for the time the driver takes to execute a move.
pub struct SimulatedTransport {
    sent: ThreadSafeVec<SentCommand>,
    halts: ThreadSafeVec<Axis>,
    delay: Duration,
    fail_after: ThreadSafe<Option<usize>>,
}

impl SimulatedTransport {
    /// Create a transport that accepts every command instantly
    pub fn new() -> Self {
        Self {
            sent: thread_safe_vec(),
            halts: thread_safe_vec(),
            delay: Duration::ZERO,
            fail_after: thread_safe(None),
        }
    }

    /// Builder method to block for `delay` on every command
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Reject every command after the first `count` succeed
    pub fn fail_after(&self, count: usize) {
        *self.fail_after.lock() = Some(count);
    }

    /// Commands accepted so far
    pub fn sent(&self) -> Vec<SentCommand> {
        self.sent.lock().clone()
    }

    /// Number of commands accepted so far
    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }

    /// Axes that received a halt
    pub fn halts(&self) -> Vec<Axis> {
        self.halts.lock().clone()
    }

    /// Forget recorded commands and halts
    pub fn clear(&self) {
        self.sent.lock().clear();
        self.halts.lock().clear();
    }
}

impl Default for SimulatedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl AxisTransport for SimulatedTransport {
    fn send(&self, command: &AxisCommand<'_>) -> Result<(), TransportError> {
        let mut sent = self.sent.lock();
        if let Some(limit) = *self.fail_after.lock() {
            if sent.len() >= limit {
                return Err(TransportError::Rejected {
                    address: command.address.to_string(),
                    steps: command.steps,
                    reason: "simulated failure".to_string(),
                });
            }
        }
        sent.push(SentCommand {
            axis: command.axis,
            address: command.address.to_string(),
            steps: command.steps,
        });
        drop(sent);

        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        Ok(())
    }

    fn halt(&self, axis: Axis, _address: &str) -> Result<(), TransportError> {
        self.halts.lock().push(axis);
        Ok(())
    }

    fn name(&self) -> String {
        "simulated".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_transport_records_commands() {
        let transport = SimulatedTransport::new();
        transport
            .send(&AxisCommand {
                axis: Axis::Y,
                address: "TTL232R2",
                steps: -500,
            })
            .unwrap();

        assert_eq!(
            transport.sent(),
            vec![SentCommand {
                axis: Axis::Y,
                address: "TTL232R2".to_string(),
                steps: -500,
            }]
        );
    }

    #[test]
    fn test_simulated_transport_injected_failure() {
        let transport = SimulatedTransport::new();
        transport.fail_after(1);
        let cmd = AxisCommand {
            axis: Axis::X,
            address: "TTL232R",
            steps: 10,
        };
        assert!(transport.send(&cmd).is_ok());
        let err = transport.send(&cmd).unwrap_err();
        assert!(matches!(err, TransportError::Rejected { steps: 10, .. }));
        assert_eq!(transport.sent_count(), 1);
    }

    #[test]
    fn test_halt_is_recorded() {
        let transport = SimulatedTransport::new();
        transport.halt(Axis::Z, "TTL232R3").unwrap();
        assert_eq!(transport.halts(), vec![Axis::Z]);
        transport.clear();
        assert!(transport.halts().is_empty());
    }

    #[test]
    fn test_delayed_transport_blocks_per_command() {
        let transport = SimulatedTransport::new().with_delay(Duration::from_millis(15));
        let cmd = AxisCommand {
            axis: Axis::X,
            address: "TTL232R",
            steps: 10,
        };
        let started = std::time::Instant::now();
        transport.send(&cmd).unwrap();
        transport.send(&cmd).unwrap();
        assert!(started.elapsed() >= Duration::from_millis(30));
        assert_eq!(transport.name(), "simulated");
    }
}
