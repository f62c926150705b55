//! # Spotmapper Core
//!
//! Core types, errors, and events shared by the spotmapper crates.
//! Provides the fundamental abstractions for stage axes, dead-reckoned
//! positions, rig calibration, and scan progress notification.

pub mod core;
pub mod data;
pub mod error;
pub mod types;
pub mod units;

pub use core::event::{EventDispatcher, ScanEvent, ScanOutcome};

pub use data::{
    Axis, AxisSettings, CameraSettings, CornerPair, JogAmount, JogDirection, Position, ScanKind,
    ScanSettings, StageSettings, StitchSettings,
};

pub use error::{
    CaptureError, Error, MotionError, Result, ScanError, StitchError, TransportError,
};

pub use types::{thread_safe, thread_safe_vec, ThreadSafe, ThreadSafeVec};
