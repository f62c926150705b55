//! Configuration file handling for the spotmapper rig
//!
//! One file describes the whole rig, organized into sections:
//! - Stage axes, abort grace and travel margin
//! - Scan geometry and settle timing
//! - Composite layouts and the stitch tool
//! - Camera output
//! - Output directory
//!
//! Files are JSON or TOML, chosen by extension. Missing sections fall back
//! to their defaults.

use crate::error::{ConfigError, SettingsError, SettingsResult};
use serde::{Deserialize, Serialize};
use spotmapper_core::{CameraSettings, ScanSettings, StageSettings, StitchSettings};
use std::path::{Path, PathBuf};

/// File name looked up in the platform config directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Where scan directories are created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSettings {
    /// Parent directory of every scan directory
    pub directory: PathBuf,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            directory: dirs::picture_dir()
                .or_else(dirs::home_dir)
                .map(|d| d.join("spotmapper"))
                .unwrap_or_else(|| PathBuf::from("spotmapper")),
        }
    }
}

/// Complete rig configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Stage axes and abort timing
    pub stage: StageSettings,
    /// Scan geometry and settle timing
    pub scan: ScanSettings,
    /// Composite layouts
    pub stitch: StitchSettings,
    /// Camera output
    pub camera: CameraSettings,
    /// Output location
    pub output: OutputSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Toml,
}

fn format_of(path: &Path) -> Result<Format, ConfigError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => Ok(Format::Json),
        Some("toml") => Ok(Format::Toml),
        other => Err(ConfigError::UnsupportedFormat(
            other.unwrap_or("<none>").to_string(),
        )),
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let format = format_of(path)?;
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = match format {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load config from `path` if given, else from the default location if
    /// a file exists there, else defaults
    pub fn load_or_default(path: Option<&Path>) -> SettingsResult<Self> {
        if let Some(path) = path {
            return Self::load_from_file(path);
        }
        match default_config_path() {
            Some(path) if path.is_file() => Self::load_from_file(&path),
            _ => {
                tracing::debug!("No configuration file; using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match format_of(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                SettingsError::ConfigDirectory(format!("{}: {}", parent.display(), e))
            })?;
        }
        std::fs::write(path, content).map_err(|source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::info!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.stage
            .validate()
            .map_err(|reason| ConfigError::invalid("stage", reason))?;
        self.scan
            .validate()
            .map_err(|reason| ConfigError::invalid("scan", reason))?;

        if self.stitch.program.trim().is_empty() {
            return Err(ConfigError::invalid(
                "stitch",
                "program must not be empty".to_string(),
            ));
        }
        if self.stitch.chip_tile_px == 0
            || self.stitch.wafer_tile_width_px == 0
            || self.stitch.wafer_tile_height_px == 0
        {
            return Err(ConfigError::invalid(
                "stitch",
                "tile sizes must be > 0".to_string(),
            ));
        }

        if self.camera.extension.is_empty() || self.camera.extension.starts_with('.') {
            return Err(ConfigError::invalid(
                "camera",
                "extension must be non-empty and without a leading dot".to_string(),
            ));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(ConfigError::invalid(
                "camera",
                "frame dimensions must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Default config file location in the platform config directory
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("spotmapper").join(CONFIG_FILE_NAME))
}
