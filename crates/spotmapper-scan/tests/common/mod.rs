#![allow(dead_code)]

use chrono::NaiveDate;
use spotmapper_core::{
    thread_safe_vec, CaptureError, EventDispatcher, ScanSettings, StageSettings, StitchError,
    StitchSettings, ThreadSafeVec,
};
use spotmapper_motion::{SimulatedTransport, Sleeper, Stage};
use spotmapper_scan::{Camera, ScanController, StitchCoordinator, StitchJob, Stitcher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2019, 5, 14).unwrap()
}

// Records every delay instead of sleeping
#[derive(Default)]
pub struct RecordingSleeper {
    pub delays: ThreadSafeVec<Duration>,
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.delays.lock().push(duration);
    }
}

// Records capture requests; writes nothing
pub struct RecordingCamera {
    pub captures: ThreadSafeVec<(PathBuf, String)>,
    fail_at: Option<usize>,
    gate: Option<(Mutex<mpsc::Sender<()>>, Mutex<mpsc::Receiver<()>>)>,
}

impl RecordingCamera {
    pub fn new() -> Self {
        Self {
            captures: thread_safe_vec(),
            fail_at: None,
            gate: None,
        }
    }

    /// Fail the capture with this 1-based number
    pub fn failing_at(n: usize) -> Self {
        Self {
            fail_at: Some(n),
            ..Self::new()
        }
    }

    /// Block inside every capture: signal `started`, wait for `release`
    pub fn gated() -> (Self, mpsc::Receiver<()>, mpsc::Sender<()>) {
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let camera = Self {
            gate: Some((Mutex::new(started_tx), Mutex::new(release_rx))),
            ..Self::new()
        };
        (camera, started_rx, release_tx)
    }

    pub fn names(&self) -> Vec<String> {
        self.captures.lock().iter().map(|(_, n)| n.clone()).collect()
    }
}

impl Camera for RecordingCamera {
    fn capture(&self, dir: &Path, name: &str) -> Result<PathBuf, CaptureError> {
        if let Some((started, release)) = &self.gate {
            let _ = started.lock().unwrap().send(());
            let _ = release.lock().unwrap().recv();
        }
        let mut captures = self.captures.lock();
        if self.fail_at == Some(captures.len() + 1) {
            return Err(CaptureError::FrameUnavailable {
                reason: "sensor timeout".to_string(),
            });
        }
        captures.push((dir.to_path_buf(), name.to_string()));
        Ok(dir.join(format!("{name}.png")))
    }
}

// Records jobs and detects overlapping composite calls
pub struct RecordingStitcher {
    pub jobs: ThreadSafeVec<StitchJob>,
    active: AtomicBool,
    pub overlaps: AtomicUsize,
    hold: Duration,
    fail_job: Option<String>,
}

impl RecordingStitcher {
    pub fn new() -> Self {
        Self::with_hold(Duration::ZERO)
    }

    pub fn with_hold(hold: Duration) -> Self {
        Self {
            jobs: thread_safe_vec(),
            active: AtomicBool::new(false),
            overlaps: AtomicUsize::new(0),
            hold,
            fail_job: None,
        }
    }

    pub fn failing(job: &str) -> Self {
        Self {
            fail_job: Some(job.to_string()),
            ..Self::new()
        }
    }

    pub fn job(&self, name: &str) -> Option<StitchJob> {
        self.jobs.lock().iter().find(|j| j.name == name).cloned()
    }
}

impl Stitcher for RecordingStitcher {
    fn composite(&self, job: &StitchJob) -> Result<(), StitchError> {
        if self.active.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        std::thread::sleep(self.hold);
        self.jobs.lock().push(job.clone());
        self.active.store(false, Ordering::SeqCst);

        if self.fail_job.as_deref() == Some(job.name.as_str()) {
            return Err(StitchError::ToolFailed {
                output: job.output.clone(),
                code: Some(1),
            });
        }
        Ok(())
    }
}

pub struct Rig {
    pub transport: Arc<SimulatedTransport>,
    pub sleeper: Arc<RecordingSleeper>,
    pub camera: Arc<RecordingCamera>,
    pub stitcher: Arc<RecordingStitcher>,
    pub controller: Arc<ScanController>,
}

impl Rig {
    pub fn new() -> Self {
        Self::with(RecordingCamera::new(), RecordingStitcher::new())
    }

    pub fn with(camera: RecordingCamera, stitcher: RecordingStitcher) -> Self {
        let transport = Arc::new(SimulatedTransport::new());
        let sleeper = Arc::new(RecordingSleeper::default());
        let camera = Arc::new(camera);
        let stitcher = Arc::new(stitcher);

        let stage = Stage::new(transport.clone(), StageSettings::default())
            .with_sleeper(sleeper.clone());
        let coordinator = StitchCoordinator::new(stitcher.clone(), EventDispatcher::new(1024));
        let controller = ScanController::new(Arc::new(stage), camera.clone(), coordinator)
            .with_settings(ScanSettings::default())
            .with_layout(StitchSettings::default())
            .with_fixed_date(date());

        Self {
            transport,
            sleeper,
            camera,
            stitcher,
            controller: Arc::new(controller),
        }
    }

    /// Planar moves as (axis, logical steps), one entry per chunk
    pub fn logical_moves(&self) -> Vec<(spotmapper_core::Axis, i64)> {
        let settings = self.controller.stage().settings().clone();
        self.transport
            .sent()
            .iter()
            .map(|c| (c.axis, c.steps * settings.axis(c.axis).direction()))
            .collect()
    }
}
