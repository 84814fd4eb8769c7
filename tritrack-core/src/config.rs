use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::db::{BackendConfig, BackendType};

/// Environment variable pointing at the config file
pub const CONFIG_ENV: &str = "TRITRACK_CONFIG";
/// Environment variable overriding the backend type
pub const BACKEND_ENV: &str = "TRITRACK_BACKEND";
/// Environment variable overriding the backend location
pub const LOCATION_ENV: &str = "TRITRACK_LOCATION";

/// Settings read from the YAML config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Where the board state is persisted
    #[serde(default = "default_backend")]
    pub backend: BackendConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
        }
    }
}

/// File backend in the user's data directory
fn default_backend() -> BackendConfig {
    let location = dirs::data_dir()
        .map(|dir| dir.join("tritrack").join("state.json"))
        .unwrap_or_else(|| PathBuf::from("data/state.json"));
    BackendConfig {
        location: location.display().to_string(),
        ..BackendConfig::default()
    }
}

impl TrackerConfig {
    /// Loads the config from the provided path
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))
    }

    /// Loads the config if the file exists, defaults otherwise
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save the config to the specified path
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(&self)?;

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&path, content)
            .with_context(|| format!("Failed to write config to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Creates a default config file if it doesn't exist
    pub fn create_default<P: AsRef<Path>>(path: P) -> Result<()> {
        if path.as_ref().exists() {
            return Ok(());
        }
        Self::default().save(path)
    }

    /// Overrides the backend type and/or location
    pub fn apply_overrides(&mut self, backend: Option<&str>, location: Option<&str>) -> Result<()> {
        if let Some(backend) = backend {
            self.backend.backend_type = Some(backend.parse::<BackendType>()?);
        }
        if let Some(location) = location {
            self.backend.location = location.to_string();
        }
        Ok(())
    }

    /// Applies `TRITRACK_BACKEND` and `TRITRACK_LOCATION`
    pub fn apply_env(&mut self) -> Result<()> {
        let backend = std::env::var(BACKEND_ENV).ok();
        let location = std::env::var(LOCATION_ENV).ok();
        self.apply_overrides(backend.as_deref(), location.as_deref())
            .with_context(|| format!("Invalid {}", BACKEND_ENV))
    }
}

/// Gets the path to the config file
pub fn get_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return Ok(PathBuf::from(path));
    }

    let config_dir = dirs::config_dir().context("Failed to determine config directory")?;

    Ok(config_dir.join("tritrack").join("config.yaml"))
}

/// Resolves the effective config: file (explicit path or default location),
/// then environment overrides
pub fn resolve_config(path: Option<&Path>) -> Result<TrackerConfig> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => get_config_path()?,
    };
    let mut config = TrackerConfig::load_or_default(&path)?;
    config.apply_env()?;
    Ok(config)
}
