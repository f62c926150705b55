//! # Spotmapper Motion
//!
//! Open-loop motion control for the sample stage.
//! Decomposes requested displacements into hardware-bounded axis commands,
//! dead-reckons the stage position from the commands delivered, and carries
//! the cooperative abort flag shared with the scan sequencer.

pub mod abort;
pub mod chunker;
pub mod position;
pub mod sleeper;
pub mod stage;
pub mod transport;

pub use abort::AbortController;
pub use chunker::MotionChunker;
pub use position::PositionTracker;
pub use sleeper::{ScaledSleeper, Sleeper, ThreadSleeper};
pub use stage::Stage;
pub use transport::{AxisCommand, AxisTransport, SentCommand, SimulatedTransport};
