//! Application constants, data directories and the TOML runtime configuration.
//!
//! The config file is selected by:
//! 1. `--config <path>` on the command line
//! 2. `EQUIROUTE_CONFIG` environment variable
//! 3. `config/equiroute.toml`, when present
//!
//! Without a file every section falls back to its defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::pipeline::certificate_extraction::{ExtractionConfig, DEFAULT_VISION_MODEL};

/// Application-level constants
pub const APP_NAME: &str = "EquiRoute";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const CONFIG_ENV_VAR: &str = "EQUIROUTE_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/equiroute.toml";
/// Slack between the model call timeout and stale `processing` recovery.
const STALE_MARGIN_SECS: u64 = 60;

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "equiroute=info,equiroute_lib=info,tower_http=warn"
}

/// ~/EquiRoute/ on all platforms; the working directory when there is no home.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

pub fn default_database_path() -> PathBuf {
    app_data_dir().join("equiroute.db")
}

/// Uploaded certificate images, addressed by `storageRef`.
pub fn default_storage_dir() -> PathBuf {
    app_data_dir().join("certificates")
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Failed to parse config file {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8640".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: PathBuf,
    pub storage_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            storage_dir: default_storage_dir(),
        }
    }
}

/// `path` unset means the catalog bundled into the binary.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: DEFAULT_VISION_MODEL.to_string(),
            timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub catalog: CatalogConfig,
    pub extraction: ExtractionConfig,
    pub ollama: OllamaConfig,
}

impl AppConfig {
    /// Determine config file path from args or environment.
    /// `None` when nothing is configured and the default file is absent.
    pub fn resolve_config_path(args: &[String]) -> Option<PathBuf> {
        for (i, arg) in args.iter().enumerate() {
            if arg == "--config" {
                if let Some(path) = args.get(i + 1) {
                    return Some(PathBuf::from(path));
                }
            }
            if let Some(path) = arg.strip_prefix("--config=") {
                return Some(PathBuf::from(path));
            }
        }

        if let Ok(path) = env::var(CONFIG_ENV_VAR) {
            return Some(PathBuf::from(path));
        }

        let default = PathBuf::from(DEFAULT_CONFIG_PATH);
        default.exists().then_some(default)
    }

    /// Loads the resolved config file, or defaults when there is none.
    pub fn load(args: &[String]) -> Result<Self, ConfigError> {
        match Self::resolve_config_path(args) {
            Some(path) => {
                tracing::info!(path = %path.display(), "Loading configuration");
                Self::from_file(&path)
            }
            None => {
                tracing::info!("No configuration file, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml(&content).map_err(|e| match e {
            ConfigError::Parse { reason, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                reason,
            },
            other => other,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: "<inline>".to_string(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.extraction.max_retries == 0 {
            return Err(ConfigError::Invalid("extraction.max_retries must be at least 1".into()));
        }
        if self.extraction.base_delay_secs > self.extraction.max_delay_secs {
            return Err(ConfigError::Invalid(
                "extraction.base_delay_secs exceeds extraction.max_delay_secs".into(),
            ));
        }
        let min_stale = self.ollama.timeout_secs.saturating_add(STALE_MARGIN_SECS);
        if self.extraction.stale_processing_secs < min_stale {
            return Err(ConfigError::Invalid(format!(
                "extraction.stale_processing_secs must be at least ollama.timeout_secs + {STALE_MARGIN_SECS} ({min_stale})"
            )));
        }
        if self.server.bind.trim().is_empty() {
            return Err(ConfigError::Invalid("server.bind is empty".into()));
        }
        Ok(())
    }
}
