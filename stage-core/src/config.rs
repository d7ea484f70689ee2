//! Workspace configuration via TOML.
//!
//! Stored at `<config_dir>/stage.toml`. Missing or corrupted files yield defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StageError};
use crate::progress::MIN_STEP;

pub const CONFIG_FILE: &str = "stage.toml";
pub const DEFAULT_RECORD_ID: &str = "play-store-app-config";
pub const DEFAULT_APP_NAME: &str = "My App";

/// Which key the configuration record lives under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordScope {
    /// Every device reads and writes the same constant id.
    #[default]
    Shared,
    /// Each device gets its own record, keyed by its session id.
    Session,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    pub record_id: String,
    pub scope: RecordScope,
    /// Shown when no name has been stored.
    pub default_app_name: String,
    /// Suffix a package file name must carry to be accepted.
    pub package_extension: String,
    pub tick_interval_ms: u64,
    pub settle_delay_ms: u64,
    pub min_increment: f32,
    pub max_increment: f32,
    /// Encoded size above which uploads are logged as likely to hit store limits.
    pub max_payload_bytes: u64,
    pub store_dir: PathBuf,
    pub downloads_dir: PathBuf,
}

impl Default for StageConfig {
    fn default() -> Self {
        let dirs = directories::ProjectDirs::from("", "", "apkstage");
        let store_dir = dirs
            .as_ref()
            .map(|d| d.data_dir().join("records"))
            .unwrap_or_else(|| PathBuf::from("apkstage-data/records"));
        let downloads_dir = directories::UserDirs::new()
            .and_then(|u| u.download_dir().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("downloads"));

        Self {
            record_id: DEFAULT_RECORD_ID.to_string(),
            scope: RecordScope::Shared,
            default_app_name: DEFAULT_APP_NAME.to_string(),
            package_extension: ".apk".to_string(),
            tick_interval_ms: 100,
            settle_delay_ms: 1000,
            min_increment: 1.0,
            max_increment: 15.0,
            max_payload_bytes: 50 * 1024 * 1024,
            store_dir,
            downloads_dir,
        }
    }
}

impl StageConfig {
    /// Load from the default config directory.
    pub fn load() -> Self {
        Self::load_from_dir(Self::config_dir())
    }

    /// Load from `config_dir`, falling back to defaults on any problem.
    pub fn load_from_dir(config_dir: PathBuf) -> Self {
        let path = config_dir.join(CONFIG_FILE);
        match std::fs::read_to_string(&path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(cfg) => {
                    tracing::info!(path = %path.display(), "config loaded");
                    cfg
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "corrupted config file, using defaults"
                    );
                    Self::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "config file not found, using defaults");
                Self::default()
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to read config file, using defaults"
                );
                Self::default()
            }
        }
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(contents).map_err(|e| StageError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn save_to_dir(&self, config_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(config_dir)?;
        let contents =
            toml::to_string_pretty(self).map_err(|e| StageError::Config(e.to_string()))?;
        let path = config_dir.join(CONFIG_FILE);
        std::fs::write(&path, contents)?;
        tracing::info!(path = %path.display(), "config saved");
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.record_id.trim().is_empty() {
            return Err(StageError::Config("record_id must not be empty".into()));
        }
        if !self.package_extension.starts_with('.') || self.package_extension.len() < 2 {
            return Err(StageError::Config(format!(
                "package_extension must look like `.apk`, got `{}`",
                self.package_extension
            )));
        }
        if !(self.min_increment >= MIN_STEP
            && self.min_increment <= self.max_increment
            && self.max_increment.is_finite())
        {
            return Err(StageError::Config(format!(
                "need {MIN_STEP} <= min_increment <= max_increment, got {} and {}",
                self.min_increment, self.max_increment
            )));
        }
        if self.tick_interval_ms == 0 {
            return Err(StageError::Config("tick_interval_ms must be positive".into()));
        }
        Ok(())
    }

    /// The record key for this device.
    pub fn record_id_for(&self, session_id: &str) -> String {
        match self.scope {
            RecordScope::Shared => self.record_id.clone(),
            RecordScope::Session => format!("{}:{}", self.record_id, session_id),
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn config_dir() -> PathBuf {
        directories::ProjectDirs::from("", "", "apkstage")
            .map(|d| d.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("apkstage-config"))
    }

    pub fn local_dir() -> PathBuf {
        directories::ProjectDirs::from("", "", "apkstage")
            .map(|d| d.data_local_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("apkstage-local"))
    }
}
