//! Configuration for porter.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $PORTER_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/porter/config.toml
//!   3. ~/.config/porter/config.toml

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PorterConfig {
    pub helper: HelperConfig,
    pub store: StoreConfig,
    pub import: ImportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HelperConfig {
    /// Helper executable. Bare names are resolved through PATH.
    pub command: PathBuf,
    /// Extra arguments placed before the repository path.
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite object store location.
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Importer instances to run in parallel when importing several
    /// revisions. Each lane owns its own helper process.
    pub lanes: u32,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

impl Default for PorterConfig {
    fn default() -> Self {
        Self {
            helper: HelperConfig::default(),
            store: StoreConfig::default(),
            import: ImportConfig::default(),
        }
    }
}

impl Default for HelperConfig {
    fn default() -> Self {
        Self {
            command: PathBuf::from("porter-helper"),
            args: Vec::new(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: data_dir().join("objects.db"),
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self { lanes: 1 }
    }
}

// ── Path helpers ─────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("porter")
}

fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".local").join("share"))
        .join("porter")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ──────────────────────────────────────────────────────────────────

impl PorterConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::file_path())?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from an explicit file path, falling back to defaults if the
    /// file does not exist. Does not apply env overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let text = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
        } else {
            Ok(PorterConfig::default())
        }
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("PORTER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&PorterConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text)
                .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply PORTER_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("PORTER_HELPER__COMMAND") {
            self.helper.command = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("PORTER_STORE__PATH") {
            self.store.path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("PORTER_IMPORT__LANES") {
            if let Ok(n) = v.parse() {
                self.import.lanes = n;
            }
        }
    }
}
