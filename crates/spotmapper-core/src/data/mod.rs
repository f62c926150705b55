//! Data models for axes, positions, and scan requests
//!
//! This module provides:
//! - Axis identifiers (X, Y, Z)
//! - Dead-reckoned stage positions in steps
//! - Corner pairs bounding an area scan
//! - Jog directions and amounts
//! - Rig calibration and scan settings (see [`settings`])

pub mod settings;

pub use settings::{AxisSettings, CameraSettings, ScanSettings, StageSettings, StitchSettings};

use crate::error::ScanError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stage axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// Horizontal axis ("left"/"right")
    X,
    /// Vertical axis ("up"/"down")
    Y,
    /// Focus axis
    Z,
}

impl Axis {
    /// All axes in command order
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::X => write!(f, "X"),
            Axis::Y => write!(f, "Y"),
            Axis::Z => write!(f, "Z"),
        }
    }
}

/// Dead-reckoned stage position in steps
///
/// Zero at controller start or after a reset. The hardware reports no
/// position, so this is only ever the sum of delivered moves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    /// X-axis position
    pub x: i64,
    /// Y-axis position
    pub y: i64,
    /// Z-axis position
    pub z: i64,
}

impl Position {
    /// The origin
    pub const ORIGIN: Position = Position { x: 0, y: 0, z: 0 };

    /// Create a planar position (Z at zero)
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y, z: 0 }
    }

    /// Get the coordinate of one axis
    pub fn get(&self, axis: Axis) -> i64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    /// Add a signed delta to one axis, saturating at the `i64` range
    pub fn offset(&self, axis: Axis, steps: i64) -> Self {
        let mut next = *self;
        match axis {
            Axis::X => next.x = next.x.saturating_add(steps),
            Axis::Y => next.y = next.y.saturating_add(steps),
            Axis::Z => next.z = next.z.saturating_add(steps),
        }
        next
    }

    /// Planar displacement (dx, dy) needed to reach `target` from here
    ///
    /// Saturates, so an unreachable target yields a displacement beyond any
    /// axis limit rather than wrapping.
    pub fn delta_to(&self, target: &Position) -> (i64, i64) {
        (
            target.x.saturating_sub(self.x),
            target.y.saturating_sub(self.y),
        )
    }

    /// Check if this is the origin
    pub fn is_origin(&self) -> bool {
        *self == Self::ORIGIN
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "X:{} Y:{} Z:{}", self.x, self.y, self.z)
    }
}

/// Two absolute positions bounding an area scan
///
/// Only X and Y are used. A pair whose corners coincide is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CornerPair {
    a: Position,
    b: Position,
}

impl CornerPair {
    /// Create a corner pair, rejecting identical corners
    pub fn new(a: Position, b: Position) -> Result<Self, ScanError> {
        if a.x == b.x && a.y == b.y {
            return Err(ScanError::InvalidCorners { corner: a });
        }
        Ok(Self { a, b })
    }

    /// Rectangle of `width` × `height` steps centred on `center`
    pub fn centered(center: Position, width: i64, height: i64) -> Result<Self, ScanError> {
        let (hw, hh) = (width.saturating_abs() / 2, height.saturating_abs() / 2);
        Self::new(
            Position::new(center.x.saturating_sub(hw), center.y.saturating_sub(hh)),
            Position::new(center.x.saturating_add(hw), center.y.saturating_add(hh)),
        )
    }

    /// First corner
    pub fn a(&self) -> Position {
        self.a
    }

    /// Second corner
    pub fn b(&self) -> Position {
        self.b
    }

    /// Upper-left corner (minimum X, maximum Y; Y grows upward)
    pub fn top_left(&self) -> Position {
        Position::new(self.a.x.min(self.b.x), self.a.y.max(self.b.y))
    }

    /// Width of the rectangle in steps, saturating at `i64::MAX`
    pub fn width(&self) -> i64 {
        extent(self.a.x, self.b.x)
    }

    /// Height of the rectangle in steps, saturating at `i64::MAX`
    pub fn height(&self) -> i64 {
        extent(self.a.y, self.b.y)
    }

    /// Number of grid columns for a cell of `cell` steps
    ///
    /// `ceil(width / cell)`, at least one so a degenerate (line) rectangle
    /// still yields a single column.
    pub fn columns(&self, cell: i64) -> usize {
        cells_spanning(self.width(), cell)
    }

    /// Number of grid rows for a cell of `cell` steps
    pub fn rows(&self, cell: i64) -> usize {
        cells_spanning(self.height(), cell)
    }
}

fn extent(a: i64, b: i64) -> i64 {
    i64::try_from(a.abs_diff(b)).unwrap_or(i64::MAX)
}

fn cells_spanning(extent: i64, cell: i64) -> usize {
    debug_assert!(cell > 0, "cell size must be positive");
    let cell = cell.max(1).unsigned_abs();
    let n = extent.unsigned_abs().div_ceil(cell).max(1);
    usize::try_from(n).unwrap_or(usize::MAX)
}

/// Manual jog direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JogDirection {
    /// +Y
    Up,
    /// -Y
    Down,
    /// -X
    Left,
    /// +X
    Right,
    /// +Z
    ZUp,
    /// -Z
    ZDown,
}

impl JogDirection {
    /// The axis this direction moves
    pub fn axis(&self) -> Axis {
        match self {
            JogDirection::Up | JogDirection::Down => Axis::Y,
            JogDirection::Left | JogDirection::Right => Axis::X,
            JogDirection::ZUp | JogDirection::ZDown => Axis::Z,
        }
    }

    /// Sign of the logical displacement along [`JogDirection::axis`]
    pub fn sign(&self) -> i64 {
        match self {
            JogDirection::Up | JogDirection::Right | JogDirection::ZUp => 1,
            JogDirection::Down | JogDirection::Left | JogDirection::ZDown => -1,
        }
    }
}

impl fmt::Display for JogDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => write!(f, "up"),
            Self::Down => write!(f, "down"),
            Self::Left => write!(f, "left"),
            Self::Right => write!(f, "right"),
            Self::ZUp => write!(f, "z-up"),
            Self::ZDown => write!(f, "z-down"),
        }
    }
}

/// Magnitude of a manual jog
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum JogAmount {
    /// Raw motor steps
    Steps(i64),
    /// Millimetres, converted with the axis calibration
    Millimetres(f64),
}

/// Kind of measurement run by the scan controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanKind {
    /// 3×3 chip grid
    Chip,
    /// 13-point wafer cross of chip grids
    Wafer,
    /// Rectangular raster between two corners
    Area,
    /// Area scan over a rectangle centred on the current position
    FullWafer,
    /// A single picture
    Picture,
}

impl fmt::Display for ScanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chip => write!(f, "chip"),
            Self::Wafer => write!(f, "wafer"),
            Self::Area => write!(f, "area"),
            Self::FullWafer => write!(f, "full-wafer"),
            Self::Picture => write!(f, "picture"),
        }
    }
}
