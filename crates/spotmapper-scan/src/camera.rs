//! Capture collaborator
//!
//! A camera writes one frame named `{name}.{ext}` into a directory. The scan
//! sequencer never looks at pixel data, only at the returned path.

use image::{GrayImage, Luma};
use spotmapper_core::{CameraSettings, CaptureError};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Writes one image file per capture
pub trait Camera: Send + Sync {
    /// Capture a frame into `dir` as `{name}.{ext}` and return its path
    fn capture(&self, dir: &Path, name: &str) -> Result<PathBuf, CaptureError>;
}

/// Camera that renders a synthetic frame with a few dark spots
///
/// Frames differ from capture to capture so stitched composites show the
/// tile order.
pub struct SimulatedCamera {
    settings: CameraSettings,
    frames: AtomicUsize,
}

impl SimulatedCamera {
    /// Create a simulated camera
    pub fn new(settings: CameraSettings) -> Self {
        Self {
            settings,
            frames: AtomicUsize::new(0),
        }
    }

    /// Number of frames written so far
    pub fn frames(&self) -> usize {
        self.frames.load(Ordering::SeqCst)
    }

    fn render(&self, seed: usize) -> GrayImage {
        let (w, h) = (self.settings.width.max(1), self.settings.height.max(1));
        let spots: Vec<(i64, i64, i64)> = (0..3)
            .map(|k| {
                let s = (seed * 7 + k * 13) as i64;
                let x = (s * 37) % i64::from(w);
                let y = (s * 53) % i64::from(h);
                let r = 4 + (s % 9);
                (x, y, r)
            })
            .collect();

        GrayImage::from_fn(w, h, |x, y| {
            let (x, y) = (i64::from(x), i64::from(y));
            let dark = spots
                .iter()
                .any(|(sx, sy, r)| (x - sx).pow(2) + (y - sy).pow(2) <= r * r);
            if dark {
                Luma([20])
            } else {
                Luma([180 + ((seed * 11) % 60) as u8])
            }
        })
    }
}

impl Default for SimulatedCamera {
    fn default() -> Self {
        Self::new(CameraSettings::default())
    }
}

impl Camera for SimulatedCamera {
    fn capture(&self, dir: &Path, name: &str) -> Result<PathBuf, CaptureError> {
        let path = dir.join(format!("{}.{}", name, self.settings.extension));
        let seed = self.frames.fetch_add(1, Ordering::SeqCst);
        self.render(seed)
            .save(&path)
            .map_err(|e| CaptureError::WriteFailed {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        tracing::debug!("Simulated frame written to {}", path.display());
        Ok(path)
    }
}
