//! Configuration types

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::info;

use transfer_core::{SessionTimeouts, DEFAULT_FIRST_CONNECTION_TIMEOUT, DEFAULT_SECOND_CONNECTION_TIMEOUT};

use crate::{default_settings_path, Result, SettingsError};

/// Main settings structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerSettings,

    /// Session timing
    #[serde(default)]
    pub session: SessionSettings,

    /// Custom settings file path (not serialized)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

impl Settings {
    /// Load settings from the default path, or create defaults
    pub fn load_or_default() -> Result<Self> {
        Self::load_from(&default_settings_path())
    }

    /// Load settings from a specific path, or create defaults
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path).map_err(SettingsError::ReadError)?;
            let mut settings: Settings =
                serde_json::from_str(&content).map_err(SettingsError::ParseError)?;
            settings.config_path = Some(path.clone());
            info!("Loaded settings from {:?}", path);
            Ok(settings)
        } else {
            let mut settings = Self::default();
            settings.config_path = Some(path.clone());
            Ok(settings)
        }
    }

    /// Save settings to the configured path
    pub fn save(&self) -> Result<()> {
        let path = self.config_path.clone().unwrap_or_else(default_settings_path);
        self.save_to(&path)
    }

    /// Save settings to a specific path
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        // Create parent directory if needed
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(SettingsError::CreateDirError)?;
            }
        }

        let content = serde_json::to_string_pretty(self).map_err(SettingsError::ParseError)?;
        std::fs::write(path, content).map_err(SettingsError::WriteError)?;
        info!("Saved settings to {:?}", path);
        Ok(())
    }

    /// Path these settings were loaded from, if any
    pub fn config_path(&self) -> Option<&PathBuf> {
        self.config_path.as_ref()
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Listen address (host:port)
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// HTML file served at `/`; the built-in page is used when unset
    #[serde(default)]
    pub landing_page: Option<PathBuf>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8085".to_string()
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            landing_page: None,
        }
    }
}

impl ServerSettings {
    /// Parse the listen address
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.listen_addr
            .parse()
            .map_err(|_| SettingsError::InvalidListenAddr(self.listen_addr.clone()))
    }
}

/// Session timing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Seconds a new session waits for its first connection
    #[serde(default = "default_first_timeout")]
    pub first_connection_timeout_secs: u64,

    /// Seconds a half-connected session waits for the other side
    #[serde(default = "default_second_timeout")]
    pub second_connection_timeout_secs: u64,
}

fn default_first_timeout() -> u64 {
    DEFAULT_FIRST_CONNECTION_TIMEOUT.as_secs()
}

fn default_second_timeout() -> u64 {
    DEFAULT_SECOND_CONNECTION_TIMEOUT.as_secs()
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            first_connection_timeout_secs: default_first_timeout(),
            second_connection_timeout_secs: default_second_timeout(),
        }
    }
}

impl SessionSettings {
    pub fn timeouts(&self) -> SessionTimeouts {
        SessionTimeouts::from_secs(
            self.first_connection_timeout_secs,
            self.second_connection_timeout_secs,
        )
    }
}
