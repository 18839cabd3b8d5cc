//! Configuration for the filament change post-processor
//!
//! Provides the configuration bundle consumed by the emitter, its defaults,
//! validation, and JSON/TOML file handling.
//!
//! Configuration is organized into two sections:
//! - Filament change options (trigger layer, retraction, parking, purge, toggles)
//! - Machine settings (build volume, used only to clamp the park position)

use crate::error::{ConfigError, SettingsError, SettingsResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Distance kept between the park position and the build volume edges
pub const PARK_MARGIN: f64 = 10.0;

/// Filament change options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilamentChangeSettings {
    /// Layer at which the change happens, counted from the first model layer
    pub layer_number: i64,
    /// Retraction (mm) before the head leaves the print
    pub initial_retraction_amount: f64,
    /// Initial retraction speed (mm/s)
    pub initial_retraction_speed: f64,
    /// Retraction (mm) that pulls the filament out of the hotend
    pub later_retraction_amount: f64,
    /// Unload retraction speed (mm/s)
    pub later_retraction_speed: f64,
    /// Park X position (mm)
    pub head_park_x: f64,
    /// Park Y position (mm)
    pub head_park_y: f64,
    /// Lowest Z (mm) the head may sit at while parked; 0 disables
    pub min_park_z: f64,
    /// Hotend temperature held during the pause
    pub standby_temperature: f64,
    /// Stepper disarm timeout (s) set during the pause; 0 leaves firmware default
    pub disarm_timeout: u32,
    /// Purge the new filament automatically instead of a second manual pause
    pub auto_purge: bool,
    /// Purge length (mm)
    pub purge_amount: f64,
    /// Purge speed (mm/s)
    pub purge_speed: f64,
    /// Disable software endstops so the head may park outside the bed
    pub disable_endstops: bool,
    /// Approach the resume height from below to take up Z backlash
    pub minimize_backlash: bool,
    /// Pause once more after priming so the nozzle can be wiped
    pub wipe_nozzle: bool,
}

impl Default for FilamentChangeSettings {
    fn default() -> Self {
        Self {
            layer_number: 1,
            initial_retraction_amount: 2.0,
            initial_retraction_speed: 25.0,
            later_retraction_amount: 300.0,
            later_retraction_speed: 25.0,
            head_park_x: 10.0,
            head_park_y: 10.0,
            min_park_z: 15.0,
            standby_temperature: 0.0,
            disarm_timeout: 0,
            auto_purge: false,
            purge_amount: 30.0,
            purge_speed: 2.0,
            disable_endstops: false,
            minimize_backlash: false,
            wipe_nozzle: false,
        }
    }
}

impl FilamentChangeSettings {
    /// Whether the new filament is purged without a manual load pause
    pub fn purge_enabled(&self) -> bool {
        self.auto_purge && self.purge_amount != 0.0
    }

    /// Minimum park Z, if one is configured
    pub fn min_park_z(&self) -> Option<f64> {
        (self.min_park_z > 0.0).then_some(self.min_park_z)
    }

    /// Park position, clamped into the build volume unless endstops are disabled
    pub fn park_position(&self, machine: &MachineSettings) -> (f64, f64) {
        if self.disable_endstops {
            (self.head_park_x, self.head_park_y)
        } else {
            (
                machine.clamp_x(self.head_park_x),
                machine.clamp_y(self.head_park_y),
            )
        }
    }

    fn validate(&self) -> SettingsResult<()> {
        let non_negative = [
            ("initial_retraction_amount", self.initial_retraction_amount),
            ("initial_retraction_speed", self.initial_retraction_speed),
            ("later_retraction_amount", self.later_retraction_amount),
            ("later_retraction_speed", self.later_retraction_speed),
            ("head_park_x", self.head_park_x),
            ("head_park_y", self.head_park_y),
            ("min_park_z", self.min_park_z),
            ("standby_temperature", self.standby_temperature),
            ("purge_amount", self.purge_amount),
            ("purge_speed", self.purge_speed),
        ];

        for (key, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(SettingsError::InvalidSetting {
                    key: key.to_string(),
                    reason: format!("must be a non-negative number, got {}", value),
                });
            }
        }

        Ok(())
    }
}

/// Machine settings supplied by the printer profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineSettings {
    /// Build volume width (mm)
    pub width: f64,
    /// Build volume depth (mm)
    pub depth: f64,
}

impl Default for MachineSettings {
    fn default() -> Self {
        Self {
            width: 220.0,
            depth: 220.0,
        }
    }
}

impl MachineSettings {
    /// Clamp an X coordinate into the padded build volume
    pub fn clamp_x(&self, x: f64) -> f64 {
        clamp_padded(x, self.width)
    }

    /// Clamp a Y coordinate into the padded build volume
    pub fn clamp_y(&self, y: f64) -> f64 {
        clamp_padded(y, self.depth)
    }

    fn validate(&self) -> SettingsResult<()> {
        for (key, value) in [("machine.width", self.width), ("machine.depth", self.depth)] {
            if !value.is_finite() || value <= 2.0 * PARK_MARGIN {
                return Err(ConfigError::ValueOutOfRange {
                    key: key.to_string(),
                    value: value.to_string(),
                }
                .into());
            }
        }
        Ok(())
    }
}

// Lower bound first, then upper, so a degenerate volume never panics.
fn clamp_padded(value: f64, extent: f64) -> f64 {
    value.max(PARK_MARGIN).min(extent - PARK_MARGIN)
}

/// Complete configuration
///
/// Aggregates all settings sections and provides file I/O operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Filament change options
    pub filament_change: FilamentChangeSettings,
    /// Machine settings
    pub machine: MachineSettings,
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SettingsError::LoadError(format!("{}: {}", path.display(), e))
        })?;

        let config: Self = match Format::from_path(path)? {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        tracing::debug!("Loaded settings from {}", path.display());
        Ok(config)
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match Format::from_path(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        std::fs::write(path, content).map_err(|e| {
            SettingsError::SaveError(format!("{}: {}", path.display(), e))
        })?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> SettingsResult<()> {
        self.filament_change.validate()?;
        self.machine.validate()?;
        Ok(())
    }
}

enum Format {
    Json,
    Toml,
}

impl Format {
    fn from_path(path: &Path) -> SettingsResult<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(Self::Json),
            Some("toml") => Ok(Self::Toml),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )
            .into()),
        }
    }
}
