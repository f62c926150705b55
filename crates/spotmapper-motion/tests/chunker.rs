use proptest::prelude::*;
use spotmapper_core::{Axis, MotionError, Position, StageSettings, TransportError};
use spotmapper_motion::{AxisCommand, AxisTransport, SimulatedTransport, Stage};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

fn settings() -> StageSettings {
    let mut settings = StageSettings::default();
    settings.abort_grace_ms = 0;
    settings
}

fn simulated_stage() -> (Arc<SimulatedTransport>, Stage) {
    let transport = Arc::new(SimulatedTransport::new());
    (transport.clone(), Stage::new(transport, settings()))
}

// Blocks inside every command until the test lets it finish
struct SteppedTransport {
    inner: SimulatedTransport,
    started: mpsc::Sender<i64>,
    proceed: Mutex<mpsc::Receiver<()>>,
}

impl AxisTransport for SteppedTransport {
    fn send(&self, command: &AxisCommand<'_>) -> Result<(), TransportError> {
        let _ = self.started.send(command.steps);
        let _ = self.proceed.lock().unwrap().recv();
        self.inner.send(command)
    }
}

#[test]
fn test_large_move_is_split_into_bounded_chunks() {
    let (transport, stage) = simulated_stage();

    stage.move_relative(Axis::Y, 90_000).unwrap();

    let steps: Vec<i64> = transport.sent().iter().map(|c| c.steps).collect();
    assert_eq!(steps, vec![32_760, 32_760, 24_480]);
    assert_eq!(stage.position(), Position::new(0, 90_000));
}

#[test]
fn test_move_at_chunk_boundary_issues_one_command() {
    let (transport, stage) = simulated_stage();

    stage.move_relative(Axis::Y, 32_760).unwrap();

    assert_eq!(transport.sent_count(), 1);
    assert_eq!(stage.position().y, 32_760);
}

#[test]
fn test_move_beyond_total_limit_is_rejected() {
    let (transport, stage) = simulated_stage();
    stage.move_relative(Axis::X, 1_000).unwrap();

    let err = stage.move_relative(Axis::X, -40_000_001).unwrap_err();

    assert!(err.is_configuration_error());
    assert_eq!(
        err,
        MotionError::ConfigurationError {
            axis: Axis::X,
            requested: -40_000_001,
            limit: 40_000_000,
        }
    );
    assert_eq!(transport.sent_count(), 1);
    assert_eq!(stage.position(), Position::new(1_000, 0));
}

#[test]
fn test_x_commands_are_inverted() {
    let (transport, stage) = simulated_stage();

    stage.move_relative(Axis::X, 40_000).unwrap();
    stage.move_relative(Axis::Y, 40_000).unwrap();

    let raw: Vec<(Axis, i64)> = transport.sent().iter().map(|c| (c.axis, c.steps)).collect();
    assert_eq!(
        raw,
        vec![
            (Axis::X, -32_760),
            (Axis::X, -7_240),
            (Axis::Y, 32_760),
            (Axis::Y, 7_240),
        ]
    );
    assert_eq!(stage.position(), Position::new(40_000, 40_000));
}

#[test]
fn test_command_failure_keeps_delivered_chunks() {
    let (transport, stage) = simulated_stage();
    transport.fail_after(2);

    let err = stage.move_relative(Axis::Y, 90_000).unwrap_err();

    match err {
        MotionError::CommandFailure {
            axis,
            requested,
            delivered,
            ..
        } => {
            assert_eq!(axis, Axis::Y);
            assert_eq!(requested, 90_000);
            assert_eq!(delivered, 65_520);
        }
        other => panic!("expected CommandFailure, got {other:?}"),
    }
    assert_eq!(stage.position().y, 65_520);
}

#[test]
fn test_abort_mid_move_stops_issuing_and_resets() {
    let (started_tx, started_rx) = mpsc::channel();
    let (proceed_tx, proceed_rx) = mpsc::channel();
    let transport = Arc::new(SteppedTransport {
        inner: SimulatedTransport::new(),
        started: started_tx,
        proceed: Mutex::new(proceed_rx),
    });
    let stage = Arc::new(Stage::new(transport.clone(), settings()));

    let mover = {
        let stage = Arc::clone(&stage);
        std::thread::spawn(move || stage.move_relative(Axis::Y, 300_000))
    };

    // First chunk is in flight
    assert_eq!(started_rx.recv().unwrap(), 32_760);
    assert!(stage.request_abort());
    proceed_tx.send(()).unwrap();

    let err = mover.join().unwrap().unwrap_err();
    assert_eq!(
        err,
        MotionError::Aborted {
            axis: Axis::Y,
            requested: 300_000,
            delivered: 32_760,
        }
    );
    assert_eq!(transport.inner.sent_count(), 1);
    assert!(started_rx.try_recv().is_err());

    stage.abort();
    assert_eq!(stage.position(), Position::ORIGIN);
    assert!(!stage.abort_controller().is_tripped());
}

#[test]
fn test_recovery_waits_for_in_flight_chunk() {
    let (started_tx, started_rx) = mpsc::channel();
    let (proceed_tx, proceed_rx) = mpsc::channel();
    let transport = Arc::new(SteppedTransport {
        inner: SimulatedTransport::new(),
        started: started_tx,
        proceed: Mutex::new(proceed_rx),
    });
    let stage = Arc::new(Stage::new(transport.clone(), settings()));

    let mover = {
        let stage = Arc::clone(&stage);
        std::thread::spawn(move || stage.move_relative(Axis::Y, 300_000))
    };
    assert_eq!(started_rx.recv().unwrap(), 32_760);

    let recovery = {
        let stage = Arc::clone(&stage);
        std::thread::spawn(move || stage.abort())
    };
    while !stage.abort_controller().is_tripped() {
        std::thread::yield_now();
    }

    // Recovery cannot finish while the chunk is still in the transport
    std::thread::sleep(std::time::Duration::from_millis(20));
    assert!(!recovery.is_finished());
    proceed_tx.send(()).unwrap();

    let err = mover.join().unwrap().unwrap_err();
    assert!(err.is_aborted());
    recovery.join().unwrap();

    assert_eq!(transport.inner.sent_count(), 1);
    assert!(started_rx.try_recv().is_err());
    assert_eq!(stage.position(), Position::ORIGIN);
    assert!(!stage.abort_controller().is_tripped());
}

proptest! {
    #[test]
    fn prop_position_equals_sum_of_requested_moves(
        moves in prop::collection::vec((any::<bool>(), -200_000i64..200_000), 1..20)
    ) {
        let (transport, stage) = simulated_stage();
        let mut expected = Position::ORIGIN;

        for (on_x, steps) in &moves {
            let axis = if *on_x { Axis::X } else { Axis::Y };
            stage.move_relative(axis, *steps).unwrap();
            expected = expected.offset(axis, *steps);
        }

        prop_assert_eq!(stage.position(), expected);
        for cmd in transport.sent() {
            prop_assert!(cmd.steps != 0);
            prop_assert!(cmd.steps.abs() <= 32_760);
        }
    }
}
