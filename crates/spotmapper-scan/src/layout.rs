//! Composite layouts
//!
//! Tiles are placed by the grid cell of the scan point that produced them:
//! chip composites on a 3×3 grid, the wafer composite on a 5×5 grid keyed
//! by each point's position in the cross.

use crate::pattern::ScanPoint;
use crate::stitch::{Placement, StitchJob};
use spotmapper_core::StitchSettings;
use std::path::PathBuf;

/// Place one input per point at `cell * tile`
///
/// Points and inputs are paired in order; extra entries on either side are
/// ignored.
pub fn grid_placements(points: &[ScanPoint], inputs: &[PathBuf], tile: (u32, u32)) -> Vec<Placement> {
    points
        .iter()
        .zip(inputs)
        .map(|(point, input)| Placement {
            input: input.clone(),
            x: point.cell.0 * tile.0,
            y: point.cell.1 * tile.1,
        })
        .collect()
}

/// 3×3 composite of one chip grid
pub fn chip_job(
    name: impl Into<String>,
    output: PathBuf,
    points: &[ScanPoint],
    captures: &[PathBuf],
    settings: &StitchSettings,
) -> StitchJob {
    let tile = (settings.chip_tile_px, settings.chip_tile_px);
    StitchJob {
        name: name.into(),
        output,
        canvas: (3 * tile.0, 3 * tile.1),
        background: settings.chip_background.clone(),
        placements: grid_placements(points, captures, tile),
    }
}

/// 5×5 composite of the per-point wafer composites
pub fn wafer_job(
    name: impl Into<String>,
    output: PathBuf,
    points: &[ScanPoint],
    composites: &[PathBuf],
    settings: &StitchSettings,
) -> StitchJob {
    let tile = (settings.wafer_tile_width_px, settings.wafer_tile_height_px);
    StitchJob {
        name: name.into(),
        output,
        canvas: (5 * tile.0, 5 * tile.1),
        background: settings.wafer_background.clone(),
        placements: grid_placements(points, composites, tile),
    }
}
