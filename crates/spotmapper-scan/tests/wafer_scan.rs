mod common;

use common::{Rig, RecordingCamera, RecordingStitcher};
use spotmapper_core::{Position, ScanEvent, StitchError};
use std::path::PathBuf;
use std::time::Duration;

const LABELS: [&str; 13] = [
    "00x-20", "00x-10", "00x00", "00x10", "00x20", "-10x10", "-10x00", "-20x00", "-10x-10",
    "10x-10", "10x00", "20x00", "10x10",
];

#[test]
fn test_wafer_scan_visits_cross_of_chip_grids() {
    let out = tempfile::tempdir().unwrap();
    let rig = Rig::new();

    let report = rig.controller.run_wafer_scan("wafer", out.path()).unwrap();
    rig.controller.stitch().wait_idle();

    let dir = out.path().join("wafer_2019-05-14");
    assert_eq!(report.captures.len(), 13 * 9);
    for label in LABELS {
        assert!(dir.join(label).is_dir(), "missing point directory {label}");
    }

    let names = rig.camera.names();
    assert_eq!(names[0], "wafer_2019-05-14_00x-20_1");
    assert_eq!(names[8], "wafer_2019-05-14_00x-20_9");
    assert_eq!(names[9], "wafer_2019-05-14_00x-10_1");
    assert_eq!(names[116], "wafer_2019-05-14_10x10_9");

    let captures = rig.camera.captures.lock().clone();
    assert_eq!(captures[54].0, dir.join("-10x00"));

    assert_eq!(rig.controller.position(), Position::ORIGIN);
}

#[test]
fn test_wafer_settle_delays_scale_with_jump() {
    let out = tempfile::tempdir().unwrap();
    let rig = Rig::new();

    rig.controller.run_wafer_scan("wafer", out.path()).unwrap();

    let outer: Vec<u64> = rig
        .sleeper
        .delays
        .lock()
        .iter()
        .filter(|d| **d >= Duration::from_secs(5))
        .map(|d| d.as_secs())
        .collect();
    assert_eq!(outer, vec![10, 5, 5, 5, 5, 15, 5, 5, 15, 10, 5, 5, 15]);
    let inner = rig
        .sleeper
        .delays
        .lock()
        .iter()
        .filter(|d| **d == Duration::from_secs(1))
        .count();
    assert_eq!(inner, 13 * 9);
}

#[test]
fn test_wafer_stitching_is_two_level() {
    let out = tempfile::tempdir().unwrap();
    let rig = Rig::new();

    let report = rig.controller.run_wafer_scan("wafer", out.path()).unwrap();
    rig.controller.stitch().wait_idle();

    let dir = out.path().join("wafer_2019-05-14");
    let jobs = rig.stitcher.jobs.lock().clone();
    assert_eq!(jobs.len(), 14);
    assert_eq!(report.stitch_outputs.len(), 14);

    let point = rig.stitcher.job("wafer_2019-05-14_-20x00").unwrap();
    assert_eq!(
        point.output,
        dir.join("-20x00").join("wafer_2019-05-14_-20x00_stitch.png")
    );
    assert_eq!(point.placements.len(), 9);

    // The wafer composite runs only after every point composite
    let last = jobs.last().unwrap();
    assert_eq!(last.name, "wafer_2019-05-14");
    assert_eq!(last.output, dir.join("wafer_2019-05-14_stitch.png"));
    assert_eq!(last.placements.len(), 13);
    let top = last
        .placements
        .iter()
        .find(|p| p.input == dir.join("00x20").join("wafer_2019-05-14_00x20_stitch.png"))
        .unwrap();
    assert_eq!((top.x, top.y), (5800, 0));
}

#[test]
fn test_failed_point_composite_skips_wafer_composite() {
    let out = tempfile::tempdir().unwrap();
    let rig = Rig::with(
        RecordingCamera::new(),
        RecordingStitcher::failing("wafer_2019-05-14_00x00"),
    );
    let mut rx = rig.controller.events().subscribe();

    // Stitch failures never fail the scan
    rig.controller.run_wafer_scan("wafer", out.path()).unwrap();
    rig.controller.stitch().wait_idle();

    assert_eq!(rig.stitcher.jobs.lock().len(), 13);
    assert!(rig.stitcher.job("wafer_2019-05-14").is_none());

    let mut final_error = None;
    while let Ok(event) = rx.try_recv() {
        if let ScanEvent::StitchFinished { job, error, .. } = event {
            if job == "wafer_2019-05-14" {
                final_error = error;
            }
        }
    }
    let expected = StitchError::PrerequisiteFailed {
        job: "wafer_2019-05-14".to_string(),
        reason: format!(
            "wafer_2019-05-14_00x00: {}",
            StitchError::ToolFailed {
                output: PathBuf::from(out.path())
                    .join("wafer_2019-05-14")
                    .join("00x00")
                    .join("wafer_2019-05-14_00x00_stitch.png"),
                code: Some(1),
            }
        ),
    };
    assert_eq!(final_error, Some(expected.to_string()));
}
