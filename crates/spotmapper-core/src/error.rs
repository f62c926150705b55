//! Error handling for spotmapper
//!
//! Provides error types for all layers of the stage controller:
//! - Transport errors (a single axis command reported failure)
//! - Motion errors (chunked moves: limits, command failures, aborts)
//! - Capture errors (camera collaborator)
//! - Stitch errors (external compositing collaborator)
//! - Scan errors (sequencer: single-flight guard, output directories)
//!
//! All error types use `thiserror` for ergonomic error handling.

use crate::data::{Axis, Position};
use std::path::PathBuf;
use thiserror::Error;

/// Error reported by the axis command transport
///
/// The transport issues one bounded relative move at a time; any of these
/// is terminal for the enclosing operation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    /// The driver refused the command
    #[error("Axis {address} rejected a move of {steps} steps: {reason}")]
    Rejected {
        /// Driver address of the axis.
        address: String,
        /// Raw signed step count of the refused command.
        steps: i64,
        /// Reason reported by the driver.
        reason: String,
    },

    /// The driver did not answer
    #[error("Axis {address} is not responding: {reason}")]
    NotResponding {
        /// Driver address of the axis.
        address: String,
        /// The reason reported by the transport.
        reason: String,
    },

    /// Generic transport error
    #[error("Transport error: {message}")]
    Other {
        /// The error message.
        message: String,
    },
}

/// Motion error type
///
/// Raised by the motion chunker. The variants carry enough context (axis,
/// requested steps, steps already delivered) to decide on manual recovery.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MotionError {
    /// Requested displacement exceeds the axis' total chunked-move limit.
    /// Nothing was sent to the hardware.
    #[error("Move of {requested} steps on {axis} exceeds the configured maximum of {limit}")]
    ConfigurationError {
        /// The axis of the rejected move.
        axis: Axis,
        /// The requested signed displacement.
        requested: i64,
        /// The configured maximum magnitude.
        limit: i64,
    },

    /// A millimetre move was requested on an axis without a mm calibration
    #[error("Axis {axis} has no steps-per-millimetre calibration")]
    NotCalibrated {
        /// The uncalibrated axis.
        axis: Axis,
    },

    /// The transport reported failure part way through a chunked move.
    /// Already delivered chunks stay reflected in the tracked position.
    #[error("Command failure on {axis} after {delivered} of {requested} steps: {source}")]
    CommandFailure {
        /// The axis being moved.
        axis: Axis,
        /// The requested signed displacement.
        requested: i64,
        /// Signed steps successfully delivered before the failure.
        delivered: i64,
        /// The transport failure.
        #[source]
        source: TransportError,
    },

    /// Cooperative cancellation was observed between chunks
    #[error("Move on {axis} aborted after {delivered} of {requested} steps")]
    Aborted {
        /// The axis being moved.
        axis: Axis,
        /// The requested signed displacement.
        requested: i64,
        /// Signed steps delivered before the abort was observed.
        delivered: i64,
    },
}

impl MotionError {
    /// Check if this error is a cooperative cancellation
    pub fn is_aborted(&self) -> bool {
        matches!(self, MotionError::Aborted { .. })
    }

    /// Check if this error was raised before any command was sent
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            MotionError::ConfigurationError { .. } | MotionError::NotCalibrated { .. }
        )
    }
}

/// Capture error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    /// The camera failed to produce a frame
    #[error("Camera failed to capture a frame: {reason}")]
    FrameUnavailable {
        /// The reason reported by the camera.
        reason: String,
    },

    /// The frame could not be written
    #[error("Failed to write image {path:?}: {reason}")]
    WriteFailed {
        /// Target image path.
        path: PathBuf,
        /// The reason for the write failure.
        reason: String,
    },
}

/// Stitch error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StitchError {
    /// The external tool could not be started
    #[error("Failed to launch stitch tool '{program}': {reason}")]
    LaunchFailed {
        /// The program that failed to start.
        program: String,
        /// The reason reported by the OS.
        reason: String,
    },

    /// The external tool exited unsuccessfully
    #[error("Stitch tool failed for {output:?} (exit code {code:?})")]
    ToolFailed {
        /// Composite that was being produced.
        output: PathBuf,
        /// Process exit code, if any.
        code: Option<i32>,
    },

    /// A job had no inputs to composite
    #[error("Stitch job '{job}' has no placements")]
    EmptyJob {
        /// Name of the empty job.
        job: String,
    },

    /// A job this one depends on failed
    #[error("Stitch job '{job}' skipped: prerequisite failed: {reason}")]
    PrerequisiteFailed {
        /// Name of the skipped job.
        job: String,
        /// Why the prerequisite failed.
        reason: String,
    },

    /// Generic stitch error
    #[error("Stitch error: {message}")]
    Other {
        /// The error message.
        message: String,
    },
}

/// Scan error type
///
/// Terminal status of a scan or jog request issued through the scan controller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScanError {
    /// Another scan or jog holds the single-flight guard
    #[error("A measurement is already in progress")]
    MeasurementInProgress,

    /// An abort is being recovered; new motion is refused until it completes
    #[error("Abort recovery in progress; motion commands are refused")]
    AbortInProgress,

    /// The scan's output directory already exists
    #[error("Output directory already exists: {path:?}")]
    DirectoryConflict {
        /// The conflicting directory.
        path: PathBuf,
    },

    /// The sample name cannot be used in file names
    #[error("Invalid sample name '{name}'")]
    InvalidSample {
        /// The rejected name.
        name: String,
    },

    /// Both area-scan corners are the same position
    #[error("Area corners are identical ({corner})")]
    InvalidCorners {
        /// The duplicated corner.
        corner: Position,
    },

    /// Abort observed at a scan-point boundary
    #[error("Scan aborted before point {point}")]
    Aborted {
        /// Label of the point that was not visited.
        point: String,
    },

    /// Motion failed while moving to a point
    #[error("Motion failed at point {point}: {source}")]
    Motion {
        /// Label of the point being approached.
        point: String,
        /// The motion failure.
        #[source]
        source: MotionError,
    },

    /// Capture failed at a point
    #[error("Capture failed at point {point}: {source}")]
    Capture {
        /// Label of the point being captured.
        point: String,
        /// The capture failure.
        #[source]
        source: CaptureError,
    },

    /// Stitch submission failed
    #[error(transparent)]
    Stitch(#[from] StitchError),

    /// Filesystem error while preparing output
    #[error("I/O error on {path:?}: {reason}")]
    Io {
        /// The path involved.
        path: PathBuf,
        /// The reason for the I/O error.
        reason: String,
    },
}

impl ScanError {
    /// Wrap a motion error with the label of the point being approached
    pub fn motion(point: impl Into<String>, source: MotionError) -> Self {
        ScanError::Motion {
            point: point.into(),
            source,
        }
    }

    /// Wrap a capture error with the label of the point being captured
    pub fn capture(point: impl Into<String>, source: CaptureError) -> Self {
        ScanError::Capture {
            point: point.into(),
            source,
        }
    }

    /// Build an I/O error for a path
    pub fn io(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        ScanError::Io {
            path: path.into(),
            reason: err.to_string(),
        }
    }

    /// Check if the scan ended because of a cooperative abort
    pub fn is_aborted(&self) -> bool {
        match self {
            ScanError::Aborted { .. } => true,
            ScanError::Motion { source, .. } => source.is_aborted(),
            _ => false,
        }
    }

    /// Check if the request was refused because the controller is busy
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            ScanError::MeasurementInProgress | ScanError::AbortInProgress
        )
    }

    /// Check if the hardware state may differ from the tracked position
    pub fn is_command_failure(&self) -> bool {
        matches!(
            self,
            ScanError::Motion {
                source: MotionError::CommandFailure { .. },
                ..
            }
        )
    }
}

/// Main error type for spotmapper
///
/// A unified error type that can represent any error from all layers.
#[derive(Error, Debug)]
pub enum Error {
    /// Transport error
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Motion error
    #[error(transparent)]
    Motion(#[from] MotionError),

    /// Capture error
    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// Stitch error
    #[error(transparent)]
    Stitch(#[from] StitchError),

    /// Scan error
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a cooperative cancellation, at any layer
    pub fn is_aborted(&self) -> bool {
        match self {
            Error::Motion(e) => e.is_aborted(),
            Error::Scan(e) => e.is_aborted(),
            _ => false,
        }
    }

    /// Check if this is a motion error
    pub fn is_motion_error(&self) -> bool {
        matches!(self, Error::Motion(_))
    }

    /// Check if this is a scan error
    pub fn is_scan_error(&self) -> bool {
        matches!(self, Error::Scan(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_motion_error_display() {
        let err = MotionError::ConfigurationError {
            axis: Axis::Y,
            requested: 50_000_000,
            limit: 40_000_000,
        };
        assert_eq!(
            err.to_string(),
            "Move of 50000000 steps on Y exceeds the configured maximum of 40000000"
        );
        assert!(err.is_configuration_error());
        assert!(!err.is_aborted());
    }

    #[test]
    fn test_command_failure_keeps_source() {
        let err = MotionError::CommandFailure {
            axis: Axis::X,
            requested: 90_000,
            delivered: 32_760,
            source: TransportError::NotResponding {
                address: "TTL232R".to_string(),
                reason: "timeout".to_string(),
            },
        };
        assert!(err.to_string().contains("after 32760 of 90000 steps"));
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(
            source.as_deref(),
            Some("Axis TTL232R is not responding: timeout")
        );
    }

    #[test]
    fn test_scan_error_abort_detection() {
        let direct = ScanError::Aborted {
            point: "00x10".to_string(),
        };
        let nested = ScanError::motion(
            "3",
            MotionError::Aborted {
                axis: Axis::X,
                requested: 36_000,
                delivered: 0,
            },
        );
        let busy = ScanError::MeasurementInProgress;

        assert!(direct.is_aborted());
        assert!(nested.is_aborted());
        assert!(!busy.is_aborted());
        assert!(busy.is_busy());
        assert!(ScanError::AbortInProgress.is_busy());
    }

    #[test]
    fn test_error_conversion() {
        let err: Error = ScanError::DirectoryConflict {
            path: PathBuf::from("/data/chip_2024-01-01"),
        }
        .into();
        assert!(err.is_scan_error());
        assert!(!err.is_aborted());

        let err: Error = MotionError::Aborted {
            axis: Axis::Y,
            requested: 10,
            delivered: 0,
        }
        .into();
        assert!(err.is_motion_error());
        assert!(err.is_aborted());
    }
}
