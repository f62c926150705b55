//! Scan patterns
//!
//! A pattern is an ordered list of points given as step offsets from the
//! stage position at which the pattern starts. The sequencer moves between
//! consecutive offsets, so the total travel of a pattern that returns to
//! its start always sums to zero.

use spotmapper_core::units::{grid_label, padded_index};
use spotmapper_core::{CornerPair, Position, ScanKind, ScanSettings};
use std::time::Duration;

/// Chip grid in visiting order, as (column, row) cell offsets from the
/// centre column of the top row. Rows count downward.
const CHIP_SNAKE: [(i64, i64); 9] = [
    (-1, 0),
    (0, 0),
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, -2),
    (0, -2),
    (1, -2),
];

/// Wafer cross in visiting order, in units of the wafer pitch: the vertical
/// arm bottom to top, then the left arm, then the right arm.
const WAFER_CROSS: [(i64, i64); 13] = [
    (0, -2),
    (0, -1),
    (0, 0),
    (0, 1),
    (0, 2),
    (-1, 1),
    (-1, 0),
    (-2, 0),
    (-1, -1),
    (1, -1),
    (1, 0),
    (2, 0),
    (1, 1),
];

/// One stop of a scan
#[derive(Debug, Clone, PartialEq)]
pub struct ScanPoint {
    /// Label used in logs, errors and file names
    pub label: String,
    /// 1-based capture index within the pattern
    pub index: usize,
    /// Planar offset in steps from the pattern's start position
    pub offset: (i64, i64),
    /// (column, row) of the point's tile in the composite, row 0 on top
    pub cell: (u32, u32),
    /// Delay between arriving at the point and acting on it
    pub settle: Duration,
}

/// Ordered scan points plus the pattern kind
#[derive(Debug, Clone, PartialEq)]
pub struct ScanPattern {
    /// Pattern identifier
    pub kind: ScanKind,
    /// Points in visiting order
    pub points: Vec<ScanPoint>,
    /// Move back to the start position after the last point
    pub return_to_start: bool,
}

impl ScanPattern {
    /// 3×3 chip grid visited in snake order
    ///
    /// `top_row` is the row offset, in cells, of the first row relative to
    /// the start: `0` scans the start row and the two below it (a chip
    /// scan), `1` centres the grid on the start (a wafer point sub-scan).
    pub fn chip_grid(settings: &ScanSettings, top_row: i64) -> Self {
        let cell = settings.cell_steps;
        let points = CHIP_SNAKE
            .iter()
            .enumerate()
            .map(|(i, &(c, r))| ScanPoint {
                label: (i + 1).to_string(),
                index: i + 1,
                offset: (c * cell, (top_row + r) * cell),
                cell: ((c + 1) as u32, (-r) as u32),
                settle: settings.chip_settle(),
            })
            .collect();

        Self {
            kind: ScanKind::Chip,
            points,
            return_to_start: true,
        }
    }

    /// 13-point wafer cross
    ///
    /// `pitch` is the cross pitch in steps per axis; `pitch_mm` names the
    /// points. Each point's settle delay is scaled by the shape of the jump
    /// that reaches it.
    pub fn wafer_cross(settings: &ScanSettings, pitch: (i64, i64), pitch_mm: f64) -> Self {
        let mut prev = (0, 0);
        let points = WAFER_CROSS
            .iter()
            .enumerate()
            .map(|(i, &(kx, ky))| {
                let factor = jump_factor(settings, prev, (kx, ky));
                prev = (kx, ky);
                let (x_mm, y_mm) = (
                    (kx as f64 * pitch_mm).round() as i64,
                    (ky as f64 * pitch_mm).round() as i64,
                );
                ScanPoint {
                    label: grid_label(x_mm, y_mm),
                    index: i + 1,
                    offset: (kx * pitch.0, ky * pitch.1),
                    cell: ((kx + 2) as u32, (2 - ky) as u32),
                    settle: settings.wafer_settle(factor),
                }
            })
            .collect();

        Self {
            kind: ScanKind::Wafer,
            points,
            return_to_start: true,
        }
    }

    /// Boustrophedon raster over a corner pair
    ///
    /// The grid is anchored at the rectangle's top-left corner; rows run
    /// downward and alternate direction. `start` is the stage position the
    /// pattern begins from and `travel` the wait before the first capture.
    pub fn area(
        settings: &ScanSettings,
        corners: &CornerPair,
        start: Position,
        travel: Duration,
    ) -> Self {
        let cell = settings.cell_steps;
        let columns = corners.columns(cell);
        let rows = corners.rows(cell);
        let total = columns.saturating_mul(rows);
        let top_left = corners.top_left();

        let mut points = Vec::with_capacity(total);
        for row in 0..rows {
            for k in 0..columns {
                let col = if row % 2 == 0 { k } else { columns - 1 - k };
                let index = points.len() + 1;
                let x = top_left.x.saturating_add(col as i64 * cell);
                let y = top_left.y.saturating_sub(row as i64 * cell);
                points.push(ScanPoint {
                    label: padded_index(index, total),
                    index,
                    offset: start.delta_to(&Position::new(x, y)),
                    cell: (col as u32, row as u32),
                    settle: if index == 1 {
                        travel
                    } else {
                        settings.area_settle()
                    },
                });
            }
        }

        Self {
            kind: ScanKind::Area,
            points,
            return_to_start: false,
        }
    }

    /// Number of points
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the pattern has no points
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Relative moves the sequencer issues, including the closing move
    pub fn moves(&self) -> Vec<(i64, i64)> {
        let mut at = (0, 0);
        let mut moves: Vec<(i64, i64)> = self
            .points
            .iter()
            .map(|p| {
                let step = (p.offset.0 - at.0, p.offset.1 - at.1);
                at = p.offset;
                step
            })
            .collect();
        if self.return_to_start {
            moves.push((-at.0, -at.1));
        }
        moves
    }
}

/// Settle multiplier for a wafer jump between two cross points
fn jump_factor(settings: &ScanSettings, from: (i64, i64), to: (i64, i64)) -> u32 {
    let (dx, dy) = ((to.0 - from.0).abs(), (to.1 - from.1).abs());
    if dx > 0 && dy > 0 {
        settings.wafer_diagonal_factor
    } else if dx.max(dy) > 1 {
        settings.wafer_long_factor
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chip_grid_starts_left_and_returns() {
        let pattern = ScanPattern::chip_grid(&ScanSettings::default(), 0);
        let moves = pattern.moves();

        assert_eq!(pattern.len(), 9);
        assert_eq!(moves[0], (-36_000, 0));
        assert_eq!(moves[3], (0, -36_000));
        assert_eq!(moves[9], (-36_000, 72_000));
        let sum = moves.iter().fold((0, 0), |a, m| (a.0 + m.0, a.1 + m.1));
        assert_eq!(sum, (0, 0));
    }

    #[test]
    fn test_chip_cells_follow_snake() {
        let pattern = ScanPattern::chip_grid(&ScanSettings::default(), 0);
        let cells: Vec<(u32, u32)> = pattern.points.iter().map(|p| p.cell).collect();
        assert_eq!(
            cells,
            vec![
                (0, 0),
                (1, 0),
                (2, 0),
                (2, 1),
                (1, 1),
                (0, 1),
                (0, 2),
                (1, 2),
                (2, 2),
            ]
        );
    }

    #[test]
    fn test_centred_sub_grid() {
        let pattern = ScanPattern::chip_grid(&ScanSettings::default(), 1);
        assert_eq!(pattern.points[0].offset, (-36_000, 36_000));
        assert_eq!(pattern.points[8].offset, (36_000, -36_000));
        assert_eq!(pattern.moves()[9], (-36_000, 36_000));
    }

    #[test]
    fn test_wafer_cross_labels_and_settle() {
        let settings = ScanSettings::default();
        let pattern = ScanPattern::wafer_cross(&settings, (511_220, 511_220), 10.0);
        let labels: Vec<&str> = pattern.points.iter().map(|p| p.label.as_str()).collect();

        assert_eq!(
            labels,
            vec![
                "00x-20", "00x-10", "00x00", "00x10", "00x20", "-10x10", "-10x00", "-20x00",
                "-10x-10", "10x-10", "10x00", "20x00", "10x10",
            ]
        );
        let secs: Vec<u64> = pattern.points.iter().map(|p| p.settle.as_secs()).collect();
        assert_eq!(secs, vec![10, 5, 5, 5, 5, 15, 5, 5, 15, 10, 5, 5, 15]);
        assert_eq!(pattern.moves().last(), Some(&(-511_220, -511_220)));
    }

    #[test]
    fn test_area_raster_is_boustrophedon() {
        let settings = ScanSettings::default();
        let corners =
            CornerPair::new(Position::new(0, 0), Position::new(72_000, 76_000)).unwrap();
        let pattern = ScanPattern::area(&settings, &corners, Position::ORIGIN, Duration::ZERO);

        assert_eq!(pattern.len(), 6);
        let cells: Vec<(u32, u32)> = pattern.points.iter().map(|p| p.cell).collect();
        assert_eq!(cells, vec![(0, 0), (1, 0), (1, 1), (0, 1), (0, 2), (1, 2)]);
        assert_eq!(pattern.points[0].offset, (0, 76_000));
        assert_eq!(pattern.points[5].offset, (36_000, 4_000));
        assert!(!pattern.return_to_start);
    }
}
