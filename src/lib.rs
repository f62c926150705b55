//! # Spotmapper
//!
//! Stage motion control and scan sequencing for the dark spot mapper
//! microscope rig:
//! - Dead-reckoned X/Y position over chunked stepper commands
//! - Chip, wafer-cross, area and full-wafer scan patterns
//! - Cooperative abort with position recovery
//! - Background image stitching, one composite at a time
//!
//! ## Architecture
//!
//! Spotmapper is organized as a workspace with multiple crates:
//!
//! 1. **spotmapper-core** - Shared types, calibration, errors, events
//! 2. **spotmapper-motion** - Axis transport, chunker, abort flag, stage facade
//! 3. **spotmapper-scan** - Camera, scan patterns, stitching, scan controller
//! 4. **spotmapper-settings** - Configuration files
//! 5. **spotmapper** - This crate: logging setup and the dry-run binary

use std::path::{Path, PathBuf};

pub use spotmapper_core::{
    Axis, AxisSettings, CameraSettings, CaptureError, CornerPair, Error, EventDispatcher,
    JogAmount, JogDirection, MotionError, Position, Result, ScanError, ScanEvent, ScanKind,
    ScanOutcome, ScanSettings, StageSettings, StitchError, StitchSettings, TransportError,
};

pub use spotmapper_motion::{
    AbortController, AxisTransport, ScaledSleeper, SimulatedTransport, Sleeper, Stage,
    ThreadSleeper,
};

pub use spotmapper_scan::{
    Camera, ImageStitcher, MagickStitcher, ScanController, ScanReport, ScanRequest,
    SimulatedCamera, StitchCoordinator, Stitcher,
};

pub use spotmapper_settings::{default_config_path, Config, OutputSettings};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Console output with target, thread and line information
/// - RUST_LOG environment variable support
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

/// Initialize logging to stdout and to a timestamped file in `dir`
///
/// The file is named `spotmapper_log_{YYYY-MM-DD_HH-MM-SS}.txt`. Returns
/// its path.
pub fn init_logging_with_file(dir: &Path) -> anyhow::Result<PathBuf> {
    use std::fs::OpenOptions;
    use std::sync::Mutex;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    std::fs::create_dir_all(dir)?;
    let path = dir.join(log_file_name(chrono::Local::now().naive_local()));
    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true)
        .with_thread_names(true);
    let file_layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(stdout_layer)
        .with(file_layer)
        .try_init()?;

    tracing::info!("Logging to {}", path.display());
    Ok(path)
}

fn env_filter() -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
}

fn log_file_name(at: chrono::NaiveDateTime) -> String {
    format!("spotmapper_log_{}.txt", at.format("%Y-%m-%d_%H-%M-%S"))
}
