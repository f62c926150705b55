//! Stitch coordination
//!
//! Compositing runs on background threads so scans never wait for it, but
//! the compositing tool itself must never run twice at once. Every job goes
//! through one [`StitchCoordinator`] whose gate serializes the calls into
//! the [`Stitcher`].

use image::{GrayImage, Luma};
use parking_lot::{Condvar, Mutex};
use spotmapper_core::{EventDispatcher, ScanEvent, StitchError};
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;
use std::thread::JoinHandle;

/// One input image and its top-left pixel offset in the composite
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    /// Input image
    pub input: PathBuf,
    /// Horizontal offset in pixels
    pub x: u32,
    /// Vertical offset in pixels
    pub y: u32,
}

/// A complete compositing request
#[derive(Debug, Clone, PartialEq)]
pub struct StitchJob {
    /// Job name for logs and events
    pub name: String,
    /// Composite file to write
    pub output: PathBuf,
    /// Canvas size in pixels, used when there is no background image
    pub canvas: (u32, u32),
    /// Optional background image drawn first
    pub background: Option<PathBuf>,
    /// Inputs in drawing order
    pub placements: Vec<Placement>,
}

/// Compositing collaborator
///
/// Implementations need not be reentrant; the coordinator never calls
/// `composite` concurrently.
pub trait Stitcher: Send + Sync {
    /// Write `job.output` from the job's placements
    fn composite(&self, job: &StitchJob) -> Result<(), StitchError>;
}

/// Background stitch job
pub struct StitchHandle {
    name: String,
    output: PathBuf,
    thread: JoinHandle<Result<PathBuf, StitchError>>,
}

impl StitchHandle {
    /// Job name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Composite the job will write
    pub fn output(&self) -> &PathBuf {
        &self.output
    }

    /// Check whether the job has finished
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Block until the job finishes
    pub fn join(self) -> Result<PathBuf, StitchError> {
        self.thread.join().unwrap_or_else(|_| {
            Err(StitchError::Other {
                message: format!("stitch thread for '{}' panicked", self.name),
            })
        })
    }
}

/// Serializes every compositing call in the process
pub struct StitchCoordinator {
    stitcher: Arc<dyn Stitcher>,
    gate: Mutex<()>,
    in_flight: Mutex<usize>,
    idle: Condvar,
    events: EventDispatcher,
}

impl StitchCoordinator {
    /// Create a coordinator around a stitcher
    pub fn new(stitcher: Arc<dyn Stitcher>, events: EventDispatcher) -> Arc<Self> {
        Arc::new(Self {
            stitcher,
            gate: Mutex::new(()),
            in_flight: Mutex::new(0),
            idle: Condvar::new(),
            events,
        })
    }

    /// Event dispatcher the coordinator publishes to
    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    /// Run a job on the calling thread, waiting for any other job first
    pub fn stitch(&self, job: &StitchJob) -> Result<(), StitchError> {
        if job.placements.is_empty() {
            return Err(StitchError::EmptyJob {
                job: job.name.clone(),
            });
        }
        let _gate = self.gate.lock();
        tracing::info!(
            job = %job.name,
            inputs = job.placements.len(),
            "Stitching {}",
            job.output.display()
        );
        self.stitcher.composite(job)
    }

    /// Run a job on a background thread
    pub fn submit(self: &Arc<Self>, job: StitchJob) -> Result<StitchHandle, StitchError> {
        self.submit_after(job, Vec::new())
    }

    /// Run a job on a background thread once every prerequisite finished
    ///
    /// If a prerequisite fails the job is skipped with `PrerequisiteFailed`.
    pub fn submit_after(
        self: &Arc<Self>,
        job: StitchJob,
        prerequisites: Vec<StitchHandle>,
    ) -> Result<StitchHandle, StitchError> {
        let name = job.name.clone();
        let output = job.output.clone();
        let coordinator = Arc::clone(self);

        *self.in_flight.lock() += 1;
        let spawned = std::thread::Builder::new()
            .name(format!("stitch-{}", name))
            .spawn(move || {
                let result = coordinator.run_after(&job, prerequisites);
                coordinator.finish(&job, &result);
                result.map(|()| job.output)
            });

        match spawned {
            Ok(thread) => Ok(StitchHandle {
                name,
                output,
                thread,
            }),
            Err(e) => {
                self.release();
                Err(StitchError::Other {
                    message: format!("failed to spawn stitch thread for '{}': {}", name, e),
                })
            }
        }
    }

    /// Block until no submitted job is running
    pub fn wait_idle(&self) {
        let mut in_flight = self.in_flight.lock();
        while *in_flight > 0 {
            self.idle.wait(&mut in_flight);
        }
    }

    /// Number of submitted jobs that have not finished
    pub fn pending(&self) -> usize {
        *self.in_flight.lock()
    }

    fn run_after(&self, job: &StitchJob, prerequisites: Vec<StitchHandle>) -> Result<(), StitchError> {
        let mut failed = None;
        for handle in prerequisites {
            let name = handle.name().to_string();
            if let Err(e) = handle.join() {
                failed.get_or_insert(format!("{}: {}", name, e));
            }
        }
        if let Some(reason) = failed {
            return Err(StitchError::PrerequisiteFailed {
                job: job.name.clone(),
                reason,
            });
        }
        self.stitch(job)
    }

    fn finish(&self, job: &StitchJob, result: &Result<(), StitchError>) {
        match result {
            Ok(()) => tracing::info!(job = %job.name, "Stitch ready"),
            Err(e) => tracing::error!(job = %job.name, "Stitch failed: {}", e),
        }
        self.events.publish(ScanEvent::StitchFinished {
            job: job.name.clone(),
            output: job.output.clone(),
            error: result.as_ref().err().map(|e| e.to_string()),
        });
        self.release();
    }

    fn release(&self) {
        let mut in_flight = self.in_flight.lock();
        *in_flight = in_flight.saturating_sub(1);
        if *in_flight == 0 {
            self.idle.notify_all();
        }
    }
}

/// Composites through the ImageMagick command line
///
/// Runs `magick convert <canvas> <in> -gravity Northwest -geometry +X+Y
/// -composite ... <out>`.
#[derive(Debug, Clone)]
pub struct MagickStitcher {
    program: String,
}

impl MagickStitcher {
    /// Create a stitcher invoking `program`
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Arguments passed to the program for `job`
    pub fn args(&self, job: &StitchJob) -> Vec<String> {
        let mut args = vec!["convert".to_string()];
        match &job.background {
            Some(bg) => args.push(bg.display().to_string()),
            None => {
                args.push("-size".to_string());
                args.push(format!("{}x{}", job.canvas.0, job.canvas.1));
                args.push("xc:black".to_string());
            }
        }
        for (i, p) in job.placements.iter().enumerate() {
            args.push(p.input.display().to_string());
            if i == 0 {
                args.push("-gravity".to_string());
                args.push("Northwest".to_string());
            }
            args.push("-geometry".to_string());
            args.push(format!("+{}+{}", p.x, p.y));
            args.push("-composite".to_string());
        }
        args.push(job.output.display().to_string());
        args
    }
}

impl Default for MagickStitcher {
    fn default() -> Self {
        Self::new("magick")
    }
}

impl Stitcher for MagickStitcher {
    fn composite(&self, job: &StitchJob) -> Result<(), StitchError> {
        let status = Command::new(&self.program)
            .args(self.args(job))
            .status()
            .map_err(|e| StitchError::LaunchFailed {
                program: self.program.clone(),
                reason: e.to_string(),
            })?;
        if !status.success() {
            return Err(StitchError::ToolFailed {
                output: job.output.clone(),
                code: status.code(),
            });
        }
        Ok(())
    }
}

/// Composites in-process with the `image` crate
///
/// Grayscale only. Inputs are loaded one at a time and drawn onto a black
/// canvas, or onto the background image when one is set.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageStitcher;

impl Stitcher for ImageStitcher {
    fn composite(&self, job: &StitchJob) -> Result<(), StitchError> {
        let load = |path: &PathBuf| {
            image::open(path)
                .map(|img| img.to_luma8())
                .map_err(|e| StitchError::Other {
                    message: format!("cannot read {}: {}", path.display(), e),
                })
        };

        let mut canvas = match &job.background {
            Some(bg) => load(bg)?,
            None => GrayImage::from_pixel(job.canvas.0, job.canvas.1, Luma([0])),
        };
        for p in &job.placements {
            let tile = load(&p.input)?;
            image::imageops::overlay(&mut canvas, &tile, i64::from(p.x), i64::from(p.y));
        }
        canvas.save(&job.output).map_err(|e| StitchError::Other {
            message: format!("cannot write {}: {}", job.output.display(), e),
        })
    }
}
