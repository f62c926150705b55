//! Spotmapper Settings Crate
//!
//! Loads, validates and saves the rig configuration file.

pub mod config;
pub mod error;

pub use config::{default_config_path, Config, OutputSettings};
pub use error::{ConfigError, SettingsError, SettingsResult};
