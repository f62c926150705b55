//! Core controller abstractions
//!
//! - [`event`]: scan progress events and their broadcast dispatcher

pub mod event;
