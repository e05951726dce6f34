use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::farm::{DEFAULT_POLL_INTERVAL, RenderOptions, default_pool_size};

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "pagefarm";
const WORKERS_ENV: &str = "PAGEFARM_WORKERS";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("serializing settings: {0}")]
    Serialize(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarmSettings {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Worker units per conversion; unset or 0 means one per hardware thread
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default)]
    pub render: RenderOptions,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL.as_millis() as u64
}

impl Default for FarmSettings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            workers: None,
            poll_interval_ms: default_poll_interval_ms(),
            render: RenderOptions::default(),
        }
    }
}

/// Worker count from config, overridden by the environment, falling back to
/// hardware parallelism. Never 0.
#[must_use]
pub fn resolve_workers(configured: Option<usize>, env_value: Option<&str>) -> usize {
    env_value
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|v| *v > 0)
        .or(configured.filter(|v| *v > 0))
        .unwrap_or_else(default_pool_size)
}

/// `~/.config/pagefarm/config.yaml` or the platform equivalent
#[must_use]
pub fn preferred_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

impl FarmSettings {
    pub fn load_from_path(path: &Path) -> Result<Self, SettingsError> {
        let content = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut settings: Self =
            serde_yaml::from_str(&content).map_err(|source| SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        debug!("Loaded settings from {path:?}");

        if settings.version < CURRENT_VERSION {
            settings.migrate();
        }
        Ok(settings)
    }

    /// Load from the preferred config path; defaults when missing or unreadable
    #[must_use]
    pub fn load_or_default() -> Self {
        let Some(path) = preferred_config_path() else {
            warn!("Could not determine config directory, using default settings");
            return Self::default();
        };
        if !path.exists() {
            info!("Settings file not found at {path:?}, using defaults");
            return Self::default();
        }

        Self::load_from_path(&path).unwrap_or_else(|e| {
            warn!("Ignoring settings file: {e}");
            Self::default()
        })
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|source| SettingsError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let content = serde_yaml::to_string(self)?;
        fs::write(path, content).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Saved settings to {path:?}");
        Ok(())
    }

    fn migrate(&mut self) {
        info!(
            "Migrating settings from v{} to v{}",
            self.version, CURRENT_VERSION
        );
        self.version = CURRENT_VERSION;
    }

    /// Effective worker count, honouring `PAGEFARM_WORKERS`
    #[must_use]
    pub fn resolved_workers(&self) -> usize {
        let env = std::env::var(WORKERS_ENV).ok();
        resolve_workers(self.workers, env.as_deref())
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}
