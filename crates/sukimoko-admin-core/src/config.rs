//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! backend URL, where the session token is kept, request timeout, and the
//! last email used to sign in.
//!
//! Configuration is stored at `~/.config/sukimoko-admin/config.json`.
//! The session file lives under the local data directory instead.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::auth::{FileTokenStorage, KeyringTokenStorage, TokenStorage};

/// Application name used for config/data directory paths
const APP_NAME: &str = "sukimoko-admin";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Session file name in the data directory
const SESSION_FILE: &str = "session.json";

/// Backend the admin talks to when nothing else is configured
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3001";

/// Environment variable overriding `api_base_url`
pub const API_URL_ENV: &str = "SUKIMOKO_API_URL";

/// Where the session token is persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    /// macOS Keychain, Windows Credential Manager, or the Linux kernel
    /// session keyring (cleared when the login session ends)
    Keyring,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub storage: StorageBackend,
    /// `None` keeps the HTTP client's default
    pub request_timeout_secs: Option<u64>,
    pub proactive_expiry_check: bool,
    pub last_email: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            storage: StorageBackend::default(),
            request_timeout_secs: None,
            proactive_expiry_check: false,
            last_email: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }

    /// Apply the environment override, then an explicit one (e.g. a CLI flag).
    pub fn apply_overrides(&mut self, env_url: Option<String>, explicit_url: Option<String>) {
        for url in [env_url, explicit_url].into_iter().flatten() {
            let url = url.trim();
            if !url.is_empty() {
                self.api_base_url = url.trim_end_matches('/').to_string();
            }
        }
    }

    /// `apply_overrides` with the value of `SUKIMOKO_API_URL`
    pub fn apply_env(&mut self, explicit_url: Option<String>) {
        self.apply_overrides(std::env::var(API_URL_ENV).ok(), explicit_url);
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    pub fn session_path() -> Result<PathBuf> {
        Ok(Self::data_dir()?.join(SESSION_FILE))
    }

    /// Storage adapter selected by `storage`
    pub fn token_storage(&self) -> Result<Arc<dyn TokenStorage>> {
        Ok(match self.storage {
            StorageBackend::File => Arc::new(FileTokenStorage::new(Self::session_path()?)),
            StorageBackend::Keyring => Arc::new(KeyringTokenStorage::new()),
        })
    }
}
