//! Rig calibration and scan timing
//!
//! Defaults are the values measured on the SL309 dark spot mapper. They are
//! calibration artifacts of that rig and are expected to be overridden from
//! the configuration file on other hardware.

use super::Axis;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Steps per millimetre measured on the SL309 stage
pub const SL309_STEPS_PER_MM: f64 = 51122.04724409449;
/// X velocity in steps per second
pub const SL309_VELOCITY_X: f64 = 255610.2362204725;
/// Y velocity in steps per second
pub const SL309_VELOCITY_Y: f64 = 97375.3280839895;
/// Largest relative move accepted by one driver command
pub const DEFAULT_MAX_COMMAND_STEPS: i64 = 32_760;
/// Largest displacement accepted by one chunked move
pub const DEFAULT_MAX_TOTAL_STEPS: i64 = 40_000_000;

/// Calibration and limits of one axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisSettings {
    /// Driver address (USB adapter name)
    pub address: String,
    /// Steps per millimetre; `None` when the axis has no mm calibration
    pub steps_per_mm: Option<f64>,
    /// Velocity in steps per second
    pub velocity: f64,
    /// Maximum magnitude of a single driver command
    pub max_command_steps: i64,
    /// Maximum magnitude of one chunked move
    pub max_total_steps: i64,
    /// Raw commands run opposite to the logical direction
    #[serde(default)]
    pub inverted: bool,
}

impl AxisSettings {
    /// Create axis settings with the default command limits
    pub fn new(address: impl Into<String>, steps_per_mm: Option<f64>, velocity: f64) -> Self {
        Self {
            address: address.into(),
            steps_per_mm,
            velocity,
            max_command_steps: DEFAULT_MAX_COMMAND_STEPS,
            max_total_steps: DEFAULT_MAX_TOTAL_STEPS,
            inverted: false,
        }
    }

    /// Builder method to invert the raw command direction
    pub fn inverted(mut self) -> Self {
        self.inverted = true;
        self
    }

    /// Builder method to set the command limits
    pub fn with_limits(mut self, max_command_steps: i64, max_total_steps: i64) -> Self {
        self.max_command_steps = max_command_steps;
        self.max_total_steps = max_total_steps;
        self
    }

    /// Signed multiplier from logical steps to raw command steps
    pub fn direction(&self) -> i64 {
        if self.inverted {
            -1
        } else {
            1
        }
    }

    /// Convert millimetres to the nearest whole step
    pub fn mm_to_steps(&self, mm: f64) -> Option<i64> {
        self.steps_per_mm.map(|k| (mm * k).round() as i64)
    }

    /// Convert steps to millimetres
    pub fn steps_to_mm(&self, steps: i64) -> Option<f64> {
        self.steps_per_mm.map(|k| steps as f64 / k)
    }

    /// Validate the axis, returning a description of the first problem
    pub fn validate(&self, axis: Axis) -> Result<(), String> {
        if self.address.trim().is_empty() {
            return Err(format!("{axis}: address must not be empty"));
        }
        if self.velocity <= 0.0 || !self.velocity.is_finite() {
            return Err(format!("{axis}: velocity must be > 0"));
        }
        if let Some(k) = self.steps_per_mm {
            if k <= 0.0 || !k.is_finite() {
                return Err(format!("{axis}: steps_per_mm must be > 0"));
            }
        }
        if self.max_command_steps <= 0 {
            return Err(format!("{axis}: max_command_steps must be > 0"));
        }
        if self.max_command_steps > self.max_total_steps {
            return Err(format!(
                "{axis}: max_command_steps ({}) exceeds max_total_steps ({})",
                self.max_command_steps, self.max_total_steps
            ));
        }
        Ok(())
    }
}

/// Stage description: three axes plus abort and travel timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSettings {
    /// Horizontal axis
    pub x: AxisSettings,
    /// Vertical axis
    pub y: AxisSettings,
    /// Focus axis
    pub z: AxisSettings,
    /// Time given to in-flight moves to unwind after an abort
    pub abort_grace_ms: u64,
    /// Safety factor applied to travel-time estimates
    pub travel_margin: f64,
}

impl StageSettings {
    /// Settings of one axis
    pub fn axis(&self, axis: Axis) -> &AxisSettings {
        match axis {
            Axis::X => &self.x,
            Axis::Y => &self.y,
            Axis::Z => &self.z,
        }
    }

    /// Abort grace delay as a duration
    pub fn abort_grace(&self) -> Duration {
        Duration::from_millis(self.abort_grace_ms)
    }

    /// Validate all axes and timing values
    pub fn validate(&self) -> Result<(), String> {
        for axis in Axis::ALL {
            self.axis(axis).validate(axis)?;
        }
        if !(self.travel_margin >= 1.0) {
            return Err("travel_margin must be >= 1.0".to_string());
        }
        Ok(())
    }
}

impl Default for StageSettings {
    fn default() -> Self {
        Self {
            // X runs against its driver on the SL309
            x: AxisSettings::new("TTL232R", Some(SL309_STEPS_PER_MM), SL309_VELOCITY_X).inverted(),
            y: AxisSettings::new("TTL232R2", Some(SL309_STEPS_PER_MM), SL309_VELOCITY_Y),
            z: AxisSettings::new("TTL232R3", None, SL309_VELOCITY_Y),
            abort_grace_ms: 10_000,
            travel_margin: 1.5,
        }
    }
}

/// Scan geometry and settle timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSettings {
    /// Grid pitch of chip and area scans in steps
    pub cell_steps: i64,
    /// Settle delay before each chip-grid capture
    pub chip_settle_ms: u64,
    /// Base settle delay after a wafer-cross move
    pub wafer_settle_ms: u64,
    /// Multiplier for wafer moves that change both axes
    pub wafer_diagonal_factor: u32,
    /// Multiplier for wafer moves spanning more than one pitch on one axis
    pub wafer_long_factor: u32,
    /// Pitch of the wafer cross in millimetres
    pub wafer_pitch_mm: f64,
    /// Settle delay before each area-scan capture
    pub area_settle_ms: u64,
    /// Full-wafer reach on each side of the start position in X, in millimetres
    pub full_wafer_half_width_mm: f64,
    /// Full-wafer rectangle total height in millimetres
    pub full_wafer_height_mm: f64,
    /// Default jog in steps
    pub jog_steps: i64,
    /// Default jog in millimetres
    pub jog_mm: f64,
}

impl ScanSettings {
    /// Chip settle delay as a duration
    pub fn chip_settle(&self) -> Duration {
        Duration::from_millis(self.chip_settle_ms)
    }

    /// Wafer settle delay scaled by `factor`
    pub fn wafer_settle(&self, factor: u32) -> Duration {
        Duration::from_millis(self.wafer_settle_ms.saturating_mul(u64::from(factor)))
    }

    /// Area settle delay as a duration
    pub fn area_settle(&self) -> Duration {
        Duration::from_millis(self.area_settle_ms)
    }

    /// Settings with every settle delay set to zero
    pub fn without_delays(mut self) -> Self {
        self.chip_settle_ms = 0;
        self.wafer_settle_ms = 0;
        self.area_settle_ms = 0;
        self
    }

    /// Validate geometry values
    pub fn validate(&self) -> Result<(), String> {
        if self.cell_steps <= 0 {
            return Err("cell_steps must be > 0".to_string());
        }
        if self.wafer_pitch_mm <= 0.0 {
            return Err("wafer_pitch_mm must be > 0".to_string());
        }
        if self.full_wafer_half_width_mm <= 0.0 || self.full_wafer_height_mm <= 0.0 {
            return Err("full wafer dimensions must be > 0".to_string());
        }
        if self.jog_steps <= 0 || self.jog_mm <= 0.0 {
            return Err("jog amounts must be > 0".to_string());
        }
        Ok(())
    }
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            cell_steps: 36_000,
            chip_settle_ms: 1_000,
            wafer_settle_ms: 5_000,
            wafer_diagonal_factor: 3,
            wafer_long_factor: 2,
            wafer_pitch_mm: 10.0,
            area_settle_ms: 1_000,
            full_wafer_half_width_mm: 26.0,
            full_wafer_height_mm: 52.0,
            jog_steps: 18_000,
            jog_mm: 1.0,
        }
    }
}

/// Composite layout and external tool settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StitchSettings {
    /// Stitch tool executable
    pub program: String,
    /// Edge of one chip-grid tile in pixels
    pub chip_tile_px: u32,
    /// Width of one wafer-cross tile in pixels
    pub wafer_tile_width_px: u32,
    /// Height of one wafer-cross tile in pixels
    pub wafer_tile_height_px: u32,
    /// Optional background for chip composites
    #[serde(default)]
    pub chip_background: Option<PathBuf>,
    /// Optional background for wafer composites
    #[serde(default)]
    pub wafer_background: Option<PathBuf>,
}

impl Default for StitchSettings {
    fn default() -> Self {
        Self {
            program: "magick".to_string(),
            chip_tile_px: 760,
            wafer_tile_width_px: 2900,
            wafer_tile_height_px: 2580,
            chip_background: None,
            wafer_background: None,
        }
    }
}

/// Camera output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraSettings {
    /// Image file extension, without the dot
    pub extension: String,
    /// Frame width used by simulated cameras
    pub width: u32,
    /// Frame height used by simulated cameras
    pub height: u32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            extension: "png".to_string(),
            width: 760,
            height: 760,
        }
    }
}
