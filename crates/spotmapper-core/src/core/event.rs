//! Event system for scan progress
//!
//! Provides:
//! - Event types for scan, capture, stitch, and abort notifications
//! - Event dispatcher for publishing events to subscribers

use crate::data::{Position, ScanKind};
use std::path::PathBuf;
use tokio::sync::broadcast;
use uuid::Uuid;

/// How a scan ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Every point was visited and captured
    Completed {
        /// Number of images written.
        captures: usize,
    },
    /// An abort was observed
    Aborted,
    /// A motion, capture, or filesystem error ended the scan
    Failed(String),
}

impl std::fmt::Display for ScanOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanOutcome::Completed { captures } => write!(f, "completed ({} captures)", captures),
            ScanOutcome::Aborted => write!(f, "aborted"),
            ScanOutcome::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Scan event types
#[derive(Debug, Clone)]
pub enum ScanEvent {
    /// A scan acquired the measurement guard
    ScanStarted {
        /// Identifier shared by every event of this scan.
        scan_id: Uuid,
        /// Kind of scan.
        kind: ScanKind,
        /// Sample name used for output naming.
        sample: String,
    },
    /// An image was written
    PointCaptured {
        /// Scan the capture belongs to.
        scan_id: Uuid,
        /// Point label (grid label or capture index).
        point: String,
        /// Path of the written image.
        path: PathBuf,
        /// Tracked position at capture time.
        position: Position,
    },
    /// A composite job was handed to the stitch coordinator
    StitchSubmitted {
        /// Scan the job belongs to.
        scan_id: Uuid,
        /// Job name.
        job: String,
        /// Composite output path.
        output: PathBuf,
    },
    /// A composite job finished in the background
    StitchFinished {
        /// Job name.
        job: String,
        /// Composite output path.
        output: PathBuf,
        /// Error description when the job failed.
        error: Option<String>,
    },
    /// A scan released the measurement guard
    ScanFinished {
        /// Identifier from [`ScanEvent::ScanStarted`].
        scan_id: Uuid,
        /// Kind of scan.
        kind: ScanKind,
        /// Terminal status.
        outcome: ScanOutcome,
    },
    /// A manual jog moved the stage
    PositionChanged(Position),
    /// The abort flag was raised
    AbortRequested,
    /// Abort recovery completed; the tracked position was reset
    AbortRecovered,
}

impl std::fmt::Display for ScanEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanEvent::ScanStarted { kind, sample, .. } => {
                write!(f, "{} scan of '{}' started", kind, sample)
            }
            ScanEvent::PointCaptured { point, path, .. } => {
                write!(f, "Captured point {} to {:?}", point, path)
            }
            ScanEvent::StitchSubmitted { job, .. } => write!(f, "Stitch job '{}' submitted", job),
            ScanEvent::StitchFinished { job, error, .. } => match error {
                None => write!(f, "Stitch job '{}' finished", job),
                Some(e) => write!(f, "Stitch job '{}' failed: {}", job, e),
            },
            ScanEvent::ScanFinished { kind, outcome, .. } => {
                write!(f, "{} scan {}", kind, outcome)
            }
            ScanEvent::PositionChanged(pos) => write!(f, "Position: {}", pos),
            ScanEvent::AbortRequested => write!(f, "Abort requested"),
            ScanEvent::AbortRecovered => write!(f, "Abort recovered; position reset"),
        }
    }
}

/// Event dispatcher for publishing events to subscribers
#[derive(Clone)]
pub struct EventDispatcher {
    /// Broadcast sender channel for scan events.
    tx: broadcast::Sender<ScanEvent>,
}

impl EventDispatcher {
    /// Create a new event dispatcher
    ///
    /// # Arguments
    /// * `buffer_size` - Size of the broadcast buffer (default 100)
    pub fn new(buffer_size: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer_size.max(1));
        Self { tx }
    }

    /// Create a new event dispatcher with default buffer size
    pub fn default_with_buffer() -> Self {
        Self::new(100)
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.tx.subscribe()
    }

    /// Publish an event to all subscribers
    ///
    /// Returns the number of receivers; having none is not an error.
    pub fn publish(&self, event: ScanEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// Get number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::default_with_buffer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers() {
        let dispatcher = EventDispatcher::default();
        assert_eq!(dispatcher.publish(ScanEvent::AbortRequested), 0);
    }

    #[test]
    fn test_subscriber_receives_events() {
        let dispatcher = EventDispatcher::new(8);
        let mut rx = dispatcher.subscribe();
        assert_eq!(dispatcher.subscriber_count(), 1);

        dispatcher.publish(ScanEvent::PositionChanged(Position::new(5, 6)));
        match rx.try_recv().unwrap() {
            ScanEvent::PositionChanged(p) => assert_eq!(p, Position::new(5, 6)),
            other => panic!("unexpected event {other}"),
        }
    }

    #[test]
    fn test_outcome_display() {
        let finished = ScanEvent::ScanFinished {
            scan_id: Uuid::new_v4(),
            kind: ScanKind::Chip,
            outcome: ScanOutcome::Completed { captures: 9 },
        };
        assert_eq!(finished.to_string(), "chip scan completed (9 captures)");
    }
}
