//! # Spotmapper Scan
//!
//! Multi-point measurement scans over the motorized stage.
//! Builds the chip, wafer, and area scan patterns, sequences moves, settle
//! delays and captures under a single-flight guard, and hands finished
//! image sets to the stitch coordinator.

pub mod camera;
pub mod controller;
pub mod layout;
pub mod naming;
pub mod pattern;
pub mod stitch;

pub use camera::{Camera, SimulatedCamera};
pub use controller::{MeasurementGuard, ScanController, ScanReport, ScanRequest};
pub use pattern::{ScanPattern, ScanPoint};
pub use stitch::{
    ImageStitcher, MagickStitcher, Placement, StitchCoordinator, StitchHandle, StitchJob,
    Stitcher,
};
