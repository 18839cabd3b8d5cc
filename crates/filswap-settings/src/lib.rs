//! filswap Settings Crate
//!
//! Handles the filament change configuration bundle and its persistence.

pub mod config;
pub mod error;

pub use config::{Config, FilamentChangeSettings, MachineSettings, PARK_MARGIN};
pub use error::{ConfigError, SettingsError, SettingsResult};
