use anyhow::Context;
use clap::{Parser, Subcommand};
use spotmapper::{
    init_logging, init_logging_with_file, Config, EventDispatcher, ImageStitcher,
    MagickStitcher, Position, ScaledSleeper, ScanController, ScanEvent, ScanRequest,
    SimulatedCamera, SimulatedTransport, Stage, StitchCoordinator, Stitcher, BUILD_DATE,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Dark spot mapper scan runner
///
/// Drives the scan sequencer against a simulated stage and camera, writing
/// real images and composites to the output directory.
#[derive(Parser, Debug)]
#[command(name = "spotmapper")]
#[command(version, long_version = concat!(env!("CARGO_PKG_VERSION"), " (built ", env!("BUILD_DATE"), ")"))]
struct Args {
    /// Configuration file (.toml or .json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Parent directory for scan output, overriding the configuration
    #[arg(short, long, global = true)]
    out: Option<PathBuf>,

    /// Also write a timestamped log file to this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Stitch with the configured ImageMagick program instead of in-process
    #[arg(long, global = true)]
    magick: bool,

    /// Scale every settle and abort delay by this factor in 0..=1 (0 = no waiting)
    #[arg(long, global = true, default_value_t = 1.0)]
    time_scale: f64,

    /// Block the simulated drivers this long on every command
    #[arg(long, global = true, default_value_t = 0)]
    command_delay_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 3×3 chip scan around the current position
    Chip {
        /// Sample name used for the scan directory and file names
        sample: String,
    },

    /// 13-point wafer cross of chip scans
    Wafer {
        /// Sample name used for the scan directory and file names
        sample: String,
    },

    /// Raster scan between two corners given in steps
    Area {
        /// Sample name used for the scan directory and file names
        sample: String,

        /// First corner X
        #[arg(long, allow_hyphen_values = true)]
        ax: i64,

        /// First corner Y
        #[arg(long, allow_hyphen_values = true)]
        ay: i64,

        /// Second corner X
        #[arg(long, allow_hyphen_values = true)]
        bx: i64,

        /// Second corner Y
        #[arg(long, allow_hyphen_values = true)]
        by: i64,
    },

    /// Area scan over the full-wafer rectangle, returning to the start
    FullWafer {
        /// Sample name used for the scan directory and file names
        sample: String,
    },

    /// Capture one picture at the current position
    Picture {
        /// Image name, without extension
        name: String,
    },

    /// Write the effective configuration to a file
    WriteConfig {
        /// Destination (.toml or .json)
        path: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match &args.log_dir {
        Some(dir) => {
            init_logging_with_file(dir)?;
        }
        None => init_logging()?,
    }
    tracing::debug!("spotmapper {} built {}", env!("CARGO_PKG_VERSION"), BUILD_DATE);

    let mut config = Config::load_or_default(args.config.as_deref())
        .context("failed to load configuration")?;
    if let Some(out) = &args.out {
        config.output.directory = out.clone();
    }

    let out_dir = config.output.directory.clone();
    let request = match &args.command {
        Command::Chip { sample } => ScanRequest::Chip {
            sample: sample.clone(),
            out_dir,
        },
        Command::Wafer { sample } => ScanRequest::Wafer {
            sample: sample.clone(),
            out_dir,
        },
        Command::Area {
            sample,
            ax,
            ay,
            bx,
            by,
        } => ScanRequest::Area {
            sample: sample.clone(),
            out_dir,
            a: Position::new(*ax, *ay),
            b: Position::new(*bx, *by),
        },
        Command::FullWafer { sample } => ScanRequest::FullWafer {
            sample: sample.clone(),
            out_dir,
        },
        Command::Picture { name } => {
            let controller = build_controller(&config, &args);
            let path = controller
                .take_picture(&out_dir, name)
                .context("picture failed")?;
            println!("Picture saved to {}", path.display());
            return Ok(());
        }
        Command::WriteConfig { path } => {
            config.save_to_file(path)?;
            println!("Wrote {}", path.display());
            return Ok(());
        }
    };

    let controller = build_controller(&config, &args);
    let mut rx = controller.events().subscribe();

    let report = controller.run(&request);
    controller.stitch().wait_idle();

    while let Ok(event) = rx.try_recv() {
        if let ScanEvent::StitchFinished {
            error: Some(error), ..
        } = event
        {
            eprintln!("Stitch failed: {}", error);
        }
    }

    let report = report.with_context(|| format!("{} scan failed", request.kind()))?;
    println!(
        "{} scan of '{}' finished: {} images in {}",
        report.kind,
        request.sample(),
        report.captures.len(),
        report.directory.display()
    );
    for output in &report.stitch_outputs {
        println!("  composite {}", output.display());
    }
    Ok(())
}

fn build_controller(config: &Config, args: &Args) -> Arc<ScanController> {
    let transport = Arc::new(
        SimulatedTransport::new().with_delay(Duration::from_millis(args.command_delay_ms)),
    );
    let stage = Stage::new(transport, config.stage.clone())
        .with_sleeper(Arc::new(ScaledSleeper::new(args.time_scale)));

    let stitcher: Arc<dyn Stitcher> = if args.magick {
        Arc::new(MagickStitcher::new(config.stitch.program.clone()))
    } else {
        Arc::new(ImageStitcher)
    };
    let coordinator = StitchCoordinator::new(stitcher, EventDispatcher::new(8192));
    let camera = SimulatedCamera::new(config.camera.clone());

    Arc::new(
        ScanController::new(Arc::new(stage), Arc::new(camera), coordinator)
            .with_settings(config.scan.clone())
            .with_layout(config.stitch.clone()),
    )
}
