//! Transfer Settings
//!
//! Configuration file management for the relay.
//!
//! ## Features
//!
//! - Listen address and optional landing page
//! - Session timeouts (first and second connection)
//! - Cross-platform config file location
//! - JSON serialization with defaults for every field
//!
//! ## Usage
//!
//! ```no_run
//! use transfer_settings::Settings;
//!
//! // Load or create default settings
//! let mut settings = Settings::load_or_default()?;
//!
//! // Modify settings
//! settings.session.second_connection_timeout_secs = 600;
//!
//! // Save settings
//! settings.save()?;
//! # Ok::<(), transfer_settings::SettingsError>(())
//! ```

mod config;
mod paths;

pub use config::{ServerSettings, SessionSettings, Settings};
pub use paths::{default_config_dir, expand_path};

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings: {0}")]
    ReadError(std::io::Error),

    #[error("Failed to write settings: {0}")]
    WriteError(std::io::Error),

    #[error("Failed to parse settings: {0}")]
    ParseError(serde_json::Error),

    #[error("Failed to create config directory: {0}")]
    CreateDirError(std::io::Error),

    #[error("Invalid listen address: {0}")]
    InvalidListenAddr(String),
}

pub type Result<T> = std::result::Result<T, SettingsError>;

/// Get the default settings file path
pub fn default_settings_path() -> PathBuf {
    default_config_dir().join("settings.json")
}
