use crate::providers::ProviderKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

const MLCHAT_DIR: &str = ".mlchat";
const DEFAULT_TRACKING_URI: &str = "data/mlruns";
const DEFAULT_MAX_ITERATIONS: usize = 20;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found at {0}. Run 'mlchat init' to set up your configuration.")]
    NotFound(PathBuf),

    #[error("Failed to read config from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config from {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Missing required config key '{0}'")]
    MissingKey(&'static str),

    #[error("Failed to write config to {path}: {message}")]
    Write { path: PathBuf, message: String },
}

/// Generation parameters passed through to the provider. Keys not listed
/// here are forwarded verbatim in the request body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: ProviderKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default)]
    pub params: GenerationParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Local `mlruns` path, `file://` URI, or `http(s)://` tracking server.
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            uri: DEFAULT_TRACKING_URI.to_string(),
            token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    pub llm: LlmConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
}

fn default_max_iterations() -> usize {
    DEFAULT_MAX_ITERATIONS
}

impl Config {
    pub fn new(llm: LlmConfig, tracking: TrackingConfig) -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            llm,
            tracking,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::MissingKey("llm.model"));
        }
        if self.tracking.uri.trim().is_empty() {
            return Err(ConfigError::MissingKey("tracking.uri"));
        }
        Ok(())
    }
}

pub fn get_mlchat_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(MLCHAT_DIR)
}

pub fn get_config_path() -> PathBuf {
    get_mlchat_dir().join("config.toml")
}

pub fn get_history_path() -> PathBuf {
    get_mlchat_dir().join("history")
}

pub fn parse_config(content: &str, path: &Path) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::NotFound(path.to_path_buf())
        } else {
            ConfigError::Read {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;

    parse_config(&content, path)
}

pub fn save_config(config: &Config, path: &Path) -> Result<(), ConfigError> {
    let write_err = |message: String| ConfigError::Write {
        path: path.to_path_buf(),
        message,
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;
    }

    let content = toml::to_string_pretty(config).map_err(|e| write_err(e.to_string()))?;
    std::fs::write(path, content).map_err(|e| write_err(e.to_string()))
}
