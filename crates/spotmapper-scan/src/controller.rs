//! Scan sequencer
//!
//! [`ScanController`] owns the single-flight measurement guard. Every scan,
//! jog and single picture takes the guard first and is refused immediately
//! when another request holds it or an abort is being recovered.
//!
//! Scans record the abort epoch when they start and check it before every
//! move and after every settle delay, so an abort raised at any point stops
//! the scan at the next boundary even if recovery has already cleared the
//! flag.

use crate::camera::Camera;
use crate::layout;
use crate::naming;
use crate::pattern::{ScanPattern, ScanPoint};
use crate::stitch::{StitchCoordinator, StitchHandle, StitchJob};
use chrono::{Local, NaiveDate};
use spotmapper_core::{
    Axis, CornerPair, EventDispatcher, JogAmount, JogDirection, MotionError, Position,
    ScanError, ScanEvent, ScanKind, ScanOutcome, ScanSettings, StitchSettings,
};
use spotmapper_motion::Stage;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use uuid::Uuid;

/// A scan to run
#[derive(Debug, Clone, PartialEq)]
pub enum ScanRequest {
    /// 3×3 chip grid around the current position
    Chip {
        /// Sample name
        sample: String,
        /// Parent of the scan directory
        out_dir: PathBuf,
    },
    /// 13-point wafer cross of chip grids centred on the current position
    Wafer {
        /// Sample name
        sample: String,
        /// Parent of the scan directory
        out_dir: PathBuf,
    },
    /// Raster between two absolute corners
    Area {
        /// Sample name
        sample: String,
        /// Parent of the scan directory
        out_dir: PathBuf,
        /// First corner
        a: Position,
        /// Second corner
        b: Position,
    },
    /// Area scan over the full-wafer rectangle centred on the current position
    FullWafer {
        /// Sample name
        sample: String,
        /// Parent of the scan directory
        out_dir: PathBuf,
    },
}

impl ScanRequest {
    /// Kind of scan requested
    pub fn kind(&self) -> ScanKind {
        match self {
            ScanRequest::Chip { .. } => ScanKind::Chip,
            ScanRequest::Wafer { .. } => ScanKind::Wafer,
            ScanRequest::Area { .. } => ScanKind::Area,
            ScanRequest::FullWafer { .. } => ScanKind::FullWafer,
        }
    }

    /// Sample name
    pub fn sample(&self) -> &str {
        match self {
            ScanRequest::Chip { sample, .. }
            | ScanRequest::Wafer { sample, .. }
            | ScanRequest::Area { sample, .. }
            | ScanRequest::FullWafer { sample, .. } => sample,
        }
    }
}

/// Result of a completed scan
#[derive(Debug, Clone, PartialEq)]
pub struct ScanReport {
    /// Identifier shared with the scan's events
    pub scan_id: Uuid,
    /// Kind of scan
    pub kind: ScanKind,
    /// Scan directory
    pub directory: PathBuf,
    /// Every image written, in capture order
    pub captures: Vec<PathBuf>,
    /// Composites submitted for background stitching
    pub stitch_outputs: Vec<PathBuf>,
}

/// Held while a scan, jog or picture is running; releases the guard on drop
#[derive(Debug)]
pub struct MeasurementGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for MeasurementGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Drives scans, jogs and single pictures on one stage
pub struct ScanController {
    stage: Arc<Stage>,
    camera: Arc<dyn Camera>,
    stitch: Arc<StitchCoordinator>,
    settings: ScanSettings,
    layout: StitchSettings,
    measuring: Arc<AtomicBool>,
    date: Option<NaiveDate>,
}

impl ScanController {
    /// Create a controller with default scan settings and layouts
    pub fn new(stage: Arc<Stage>, camera: Arc<dyn Camera>, stitch: Arc<StitchCoordinator>) -> Self {
        Self {
            stage,
            camera,
            stitch,
            settings: ScanSettings::default(),
            layout: StitchSettings::default(),
            measuring: Arc::new(AtomicBool::new(false)),
            date: None,
        }
    }

    /// Builder method to set scan geometry and timing
    pub fn with_settings(mut self, settings: ScanSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Builder method to set composite layouts
    pub fn with_layout(mut self, layout: StitchSettings) -> Self {
        self.layout = layout;
        self
    }

    /// Builder method to stamp output names with a fixed date instead of today
    pub fn with_fixed_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// The stage being driven
    pub fn stage(&self) -> &Arc<Stage> {
        &self.stage
    }

    /// The stitch coordinator
    pub fn stitch(&self) -> &Arc<StitchCoordinator> {
        &self.stitch
    }

    /// Scan settings
    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    /// Event dispatcher shared with the stitch coordinator
    pub fn events(&self) -> &EventDispatcher {
        self.stitch.events()
    }

    /// Check whether a scan, jog or picture holds the guard
    pub fn is_measuring(&self) -> bool {
        self.measuring.load(Ordering::SeqCst)
    }

    /// Current tracked position
    pub fn position(&self) -> Position {
        self.stage.position()
    }

    /// Take the single-flight guard
    ///
    /// Fails with `AbortInProgress` while an abort is pending and with
    /// `MeasurementInProgress` while another request holds the guard.
    pub fn try_begin(&self) -> Result<MeasurementGuard, ScanError> {
        if self.stage.abort_controller().is_tripped() {
            return Err(ScanError::AbortInProgress);
        }
        self.measuring
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| ScanError::MeasurementInProgress)?;
        Ok(MeasurementGuard {
            flag: Arc::clone(&self.measuring),
        })
    }

    /// Run a scan on the calling thread
    pub fn run(&self, request: &ScanRequest) -> Result<ScanReport, ScanError> {
        let guard = self.try_begin()?;
        self.execute(request, guard)
    }

    /// Run a 3×3 chip scan
    pub fn run_chip_scan(&self, sample: &str, out_dir: &Path) -> Result<ScanReport, ScanError> {
        self.run(&ScanRequest::Chip {
            sample: sample.to_string(),
            out_dir: out_dir.to_path_buf(),
        })
    }

    /// Run a 13-point wafer scan
    pub fn run_wafer_scan(&self, sample: &str, out_dir: &Path) -> Result<ScanReport, ScanError> {
        self.run(&ScanRequest::Wafer {
            sample: sample.to_string(),
            out_dir: out_dir.to_path_buf(),
        })
    }

    /// Run an area scan between two corners
    pub fn run_area_scan(
        &self,
        sample: &str,
        out_dir: &Path,
        a: Position,
        b: Position,
    ) -> Result<ScanReport, ScanError> {
        self.run(&ScanRequest::Area {
            sample: sample.to_string(),
            out_dir: out_dir.to_path_buf(),
            a,
            b,
        })
    }

    /// Run an area scan over the full-wafer rectangle and return to the start
    pub fn run_full_wafer_scan(&self, sample: &str, out_dir: &Path) -> Result<ScanReport, ScanError> {
        self.run(&ScanRequest::FullWafer {
            sample: sample.to_string(),
            out_dir: out_dir.to_path_buf(),
        })
    }

    /// Corners of the full-wafer rectangle centred on `center`
    ///
    /// X reaches `full_wafer_half_width_mm` to each side; Y spans
    /// `full_wafer_height_mm` in total.
    pub fn full_wafer_corners(&self, center: Position) -> Result<CornerPair, ScanError> {
        let width = self
            .mm_steps(Axis::X, self.settings.full_wafer_half_width_mm)?
            .saturating_mul(2);
        let height = self.mm_steps(Axis::Y, self.settings.full_wafer_height_mm)?;
        CornerPair::centered(center, width, height)
    }

    /// Run a scan on a background thread
    ///
    /// The guard is taken on the calling thread, so a busy controller
    /// refuses the request here rather than in the spawned thread.
    pub fn spawn(
        self: &Arc<Self>,
        request: ScanRequest,
    ) -> Result<JoinHandle<Result<ScanReport, ScanError>>, ScanError> {
        let guard = self.try_begin()?;
        let controller = Arc::clone(self);
        let kind = request.kind();
        std::thread::Builder::new()
            .name(format!("scan-{}", kind))
            .spawn(move || controller.execute(&request, guard))
            .map_err(|e| ScanError::Io {
                path: PathBuf::new(),
                reason: format!("failed to spawn scan thread: {}", e),
            })
    }

    /// Capture one picture outside any pattern
    ///
    /// Reported as a one-point `picture` scan named after the image.
    pub fn take_picture(&self, dir: &Path, name: &str) -> Result<PathBuf, ScanError> {
        let _guard = self.try_begin()?;
        let scan_id = Uuid::new_v4();
        self.events().publish(ScanEvent::ScanStarted {
            scan_id,
            kind: ScanKind::Picture,
            sample: name.to_string(),
        });

        let result = std::fs::create_dir_all(dir)
            .map_err(|e| ScanError::io(dir, &e))
            .and_then(|()| {
                self.camera
                    .capture(dir, name)
                    .map_err(|e| ScanError::capture(name, e))
            });

        let outcome = match &result {
            Ok(path) => {
                self.events().publish(ScanEvent::PointCaptured {
                    scan_id,
                    point: name.to_string(),
                    path: path.clone(),
                    position: self.stage.position(),
                });
                tracing::info!("Picture saved to {}", path.display());
                ScanOutcome::Completed { captures: 1 }
            }
            Err(e) => {
                tracing::error!("Picture failed: {}", e);
                ScanOutcome::Failed(e.to_string())
            }
        };
        self.events().publish(ScanEvent::ScanFinished {
            scan_id,
            kind: ScanKind::Picture,
            outcome,
        });
        result
    }

    /// Move the stage manually
    pub fn jog(&self, direction: JogDirection, amount: JogAmount) -> Result<Position, ScanError> {
        let _guard = self.try_begin()?;
        let axis = direction.axis();
        let moved = match amount {
            JogAmount::Steps(steps) => self.stage.move_relative(axis, direction.sign() * steps),
            JogAmount::Millimetres(mm) => self.stage.move_mm(axis, direction.sign() as f64 * mm),
        };
        moved.map_err(|e| ScanError::motion(direction.to_string(), e))?;

        let position = self.stage.position();
        tracing::debug!("Jog {} -> {}", direction, position);
        self.events().publish(ScanEvent::PositionChanged(position));
        Ok(position)
    }

    /// Declare the current physical location to be the origin
    pub fn reset_position(&self) -> Result<(), ScanError> {
        let _guard = self.try_begin()?;
        self.stage.reset_position();
        self.events()
            .publish(ScanEvent::PositionChanged(Position::ORIGIN));
        Ok(())
    }

    /// Trip the abort flag without waiting for recovery
    pub fn request_abort(&self) -> bool {
        let newly = self.stage.request_abort();
        if newly {
            self.events().publish(ScanEvent::AbortRequested);
        }
        newly
    }

    /// Abort and run the full recovery sequence on the calling thread
    ///
    /// Blocks for the stage's abort grace delay. New requests are refused
    /// until it returns.
    pub fn abort(&self) {
        self.request_abort();
        self.stage.abort();
        self.events().publish(ScanEvent::AbortRecovered);
    }

    fn execute(&self, request: &ScanRequest, guard: MeasurementGuard) -> Result<ScanReport, ScanError> {
        let kind = request.kind();
        let mut run = ScanRun::new(self);
        let scan_id = run.scan_id;

        tracing::info!(%scan_id, "Measuring {} '{}'", kind, request.sample());
        self.events().publish(ScanEvent::ScanStarted {
            scan_id,
            kind,
            sample: request.sample().to_string(),
        });

        let result = match request {
            ScanRequest::Chip { sample, out_dir } => self.chip_scan(&mut run, sample, out_dir),
            ScanRequest::Wafer { sample, out_dir } => self.wafer_scan(&mut run, sample, out_dir),
            ScanRequest::Area {
                sample,
                out_dir,
                a,
                b,
            } => CornerPair::new(*a, *b)
                .and_then(|corners| self.area_scan(&mut run, sample, out_dir, &corners, kind)),
            ScanRequest::FullWafer { sample, out_dir } => {
                self.full_wafer_scan(&mut run, sample, out_dir)
            }
        };

        let outcome = match &result {
            Ok(report) => {
                tracing::info!(%scan_id, "{} ready: {} captures", kind, report.captures.len());
                ScanOutcome::Completed {
                    captures: report.captures.len(),
                }
            }
            Err(e) if e.is_aborted() => {
                tracing::warn!(%scan_id, "{} aborted: {}", kind, e);
                ScanOutcome::Aborted
            }
            Err(e) => {
                tracing::error!(%scan_id, "{} failed: {}", kind, e);
                ScanOutcome::Failed(e.to_string())
            }
        };

        drop(guard);
        self.events().publish(ScanEvent::ScanFinished {
            scan_id,
            kind,
            outcome,
        });
        result
    }

    fn chip_scan(&self, run: &mut ScanRun<'_>, sample: &str, out_dir: &Path) -> Result<ScanReport, ScanError> {
        let stem = self.stem(sample)?;
        let dir = out_dir.join(&stem);
        create_scan_dir(&dir)?;

        let pattern = ScanPattern::chip_grid(&self.settings, 0);
        run.traverse(&pattern, |run, point| {
            run.capture(&dir, &naming::chip_capture(&stem, point.index), &point.label)
        })?;

        let job = layout::chip_job(
            stem.clone(),
            naming::stitch_output(&dir, &stem, None),
            &pattern.points,
            &run.captures,
            &self.layout,
        );
        run.submit(job, Vec::new())?;
        Ok(run.report(ScanKind::Chip, dir))
    }

    fn wafer_scan(&self, run: &mut ScanRun<'_>, sample: &str, out_dir: &Path) -> Result<ScanReport, ScanError> {
        let stem = self.stem(sample)?;
        let pitch = (self.pitch_steps(Axis::X)?, self.pitch_steps(Axis::Y)?);
        let dir = out_dir.join(&stem);
        create_scan_dir(&dir)?;

        let cross = ScanPattern::wafer_cross(&self.settings, pitch, self.settings.wafer_pitch_mm);
        let grid = ScanPattern::chip_grid(&self.settings, 1);
        let mut handles = Vec::with_capacity(cross.len());
        let mut composites = Vec::with_capacity(cross.len());

        run.traverse(&cross, |run, point| {
            let point_dir = dir.join(&point.label);
            std::fs::create_dir(&point_dir).map_err(|e| ScanError::io(&point_dir, &e))?;

            let first = run.captures.len();
            run.traverse(&grid, |run, p| {
                run.capture(
                    &point_dir,
                    &naming::point_capture(&stem, &point.label, p.index),
                    &format!("{}/{}", point.label, p.index),
                )
            })?;

            let output = naming::stitch_output(&point_dir, &stem, Some(&point.label));
            let job = layout::chip_job(
                format!("{}_{}", stem, point.label),
                output.clone(),
                &grid.points,
                &run.captures[first..],
                &self.layout,
            );
            handles.push(run.submit(job, Vec::new())?);
            composites.push(output);
            Ok(())
        })?;

        let job = layout::wafer_job(
            stem.clone(),
            naming::stitch_output(&dir, &stem, None),
            &cross.points,
            &composites,
            &self.layout,
        );
        run.submit(job, handles)?;
        Ok(run.report(ScanKind::Wafer, dir))
    }

    fn area_scan(
        &self,
        run: &mut ScanRun<'_>,
        sample: &str,
        out_dir: &Path,
        corners: &CornerPair,
        kind: ScanKind,
    ) -> Result<ScanReport, ScanError> {
        let stem = self.stem(sample)?;
        self.check_extent(Axis::X, corners.width())?;
        self.check_extent(Axis::Y, corners.height())?;
        let dir = out_dir.join(&stem);
        create_scan_dir(&dir)?;

        let start = self.stage.position();
        let (dx, dy) = start.delta_to(&corners.top_left());
        let travel = self.stage.estimate_time(dx, dy);
        let pattern = ScanPattern::area(&self.settings, corners, start, travel);
        let total = pattern.len();
        tracing::info!(
            columns = corners.columns(self.settings.cell_steps),
            rows = corners.rows(self.settings.cell_steps),
            "Area scan of {} cells, travel estimate {:?}",
            total,
            travel
        );

        run.traverse(&pattern, |run, point| {
            run.capture(&dir, &naming::area_capture(&stem, point.index, total), &point.label)
        })?;
        Ok(run.report(kind, dir))
    }

    fn full_wafer_scan(&self, run: &mut ScanRun<'_>, sample: &str, out_dir: &Path) -> Result<ScanReport, ScanError> {
        let start = self.stage.position();
        let corners = self.full_wafer_corners(start)?;

        let result = self.area_scan(run, sample, out_dir, &corners, ScanKind::FullWafer);
        if let Err(e) = &result {
            if e.is_aborted() || e.is_command_failure() {
                return result;
            }
        }

        match self.stage.goto(start) {
            Ok(()) => result,
            Err(e) if result.is_ok() => Err(ScanError::motion("return", e)),
            Err(e) => {
                tracing::warn!("Return to scan start failed: {}", e);
                result
            }
        }
    }

    fn stem(&self, sample: &str) -> Result<String, ScanError> {
        naming::validate_sample(sample)?;
        let date = self.date.unwrap_or_else(|| Local::now().date_naive());
        Ok(naming::scan_stem(sample, date))
    }

    fn mm_steps(&self, axis: Axis, mm: f64) -> Result<i64, ScanError> {
        self.stage
            .settings()
            .axis(axis)
            .mm_to_steps(mm)
            .ok_or_else(|| ScanError::motion(axis.to_string(), MotionError::NotCalibrated { axis }))
    }

    /// Refuse a rectangle side the axis could never travel in one move
    fn check_extent(&self, axis: Axis, extent: i64) -> Result<(), ScanError> {
        let limit = self.stage.settings().axis(axis).max_total_steps;
        if extent > limit {
            return Err(ScanError::motion(
                "area",
                MotionError::ConfigurationError {
                    axis,
                    requested: extent,
                    limit,
                },
            ));
        }
        Ok(())
    }

    fn pitch_steps(&self, axis: Axis) -> Result<i64, ScanError> {
        self.mm_steps(axis, self.settings.wafer_pitch_mm)
    }
}

/// Create a scan directory, refusing one that already exists
fn create_scan_dir(dir: &Path) -> Result<(), ScanError> {
    if let Some(parent) = dir.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ScanError::io(parent, &e))?;
    }
    match std::fs::create_dir(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            Err(ScanError::DirectoryConflict {
                path: dir.to_path_buf(),
            })
        }
        Err(e) => Err(ScanError::io(dir, &e)),
    }
}

/// State of one running scan
struct ScanRun<'a> {
    controller: &'a ScanController,
    scan_id: Uuid,
    epoch: u64,
    captures: Vec<PathBuf>,
    stitch_outputs: Vec<PathBuf>,
}

impl<'a> ScanRun<'a> {
    fn new(controller: &'a ScanController) -> Self {
        Self {
            controller,
            scan_id: Uuid::new_v4(),
            epoch: controller.stage.abort_controller().epoch(),
            captures: Vec::new(),
            stitch_outputs: Vec::new(),
        }
    }

    fn check_abort(&self, point: &str) -> Result<(), ScanError> {
        if self
            .controller
            .stage
            .abort_controller()
            .tripped_since(self.epoch)
        {
            return Err(ScanError::Aborted {
                point: point.to_string(),
            });
        }
        Ok(())
    }

    fn move_by(&self, point: &str, dx: i64, dy: i64) -> Result<(), ScanError> {
        let stage = &self.controller.stage;
        stage
            .move_relative(Axis::X, dx)
            .and_then(|()| stage.move_relative(Axis::Y, dy))
            .map_err(|e| ScanError::motion(point, e))
    }

    /// Visit every point of `pattern` in order, calling `at_point` after
    /// each settle delay, then move back to the start if the pattern asks.
    fn traverse<F>(&mut self, pattern: &ScanPattern, mut at_point: F) -> Result<(), ScanError>
    where
        F: FnMut(&mut Self, &ScanPoint) -> Result<(), ScanError>,
    {
        let mut at = (0, 0);
        for point in &pattern.points {
            self.check_abort(&point.label)?;
            self.move_by(&point.label, point.offset.0 - at.0, point.offset.1 - at.1)?;
            at = point.offset;

            self.controller.stage.settle(point.settle);
            self.check_abort(&point.label)?;
            at_point(self, point)?;
        }

        if pattern.return_to_start {
            self.check_abort("return")?;
            self.move_by("return", -at.0, -at.1)?;
        }
        Ok(())
    }

    fn capture(&mut self, dir: &Path, name: &str, point: &str) -> Result<(), ScanError> {
        let path = self
            .controller
            .camera
            .capture(dir, name)
            .map_err(|e| ScanError::capture(point, e))?;
        tracing::debug!(point, "Captured {}", path.display());

        self.controller.events().publish(ScanEvent::PointCaptured {
            scan_id: self.scan_id,
            point: point.to_string(),
            path: path.clone(),
            position: self.controller.stage.position(),
        });
        self.captures.push(path);
        Ok(())
    }

    fn submit(&mut self, job: StitchJob, after: Vec<StitchHandle>) -> Result<StitchHandle, ScanError> {
        let name = job.name.clone();
        let output = job.output.clone();
        let handle = self.controller.stitch.submit_after(job, after)?;

        self.controller.events().publish(ScanEvent::StitchSubmitted {
            scan_id: self.scan_id,
            job: name,
            output: output.clone(),
        });
        self.stitch_outputs.push(output);
        Ok(handle)
    }

    fn report(&mut self, kind: ScanKind, directory: PathBuf) -> ScanReport {
        ScanReport {
            scan_id: self.scan_id,
            kind,
            directory,
            captures: std::mem::take(&mut self.captures),
            stitch_outputs: std::mem::take(&mut self.stitch_outputs),
        }
    }
}
