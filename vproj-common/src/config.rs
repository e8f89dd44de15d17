//! Configuration loading and setting resolution
//!
//! Settings resolve in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Top-level TOML configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub endpoints: EndpointConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// tracing filter directive used when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// `[endpoints]` section: remote service URLs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub stream_url: Option<String>,
    pub attributes_url: Option<String>,
    pub image_url: Option<String>,
}

/// `[pipeline]` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// LLM model identifier sent with the domain stream request
    pub model: Option<String>,
    /// Cap on concurrent rating calls per arrival batch (unset = unbounded)
    pub max_concurrent_ratings: Option<usize>,
    /// HTTP client timeout in seconds
    pub request_timeout_secs: Option<u64>,
}

/// Default config file location: `<config_dir>/vproj/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("vproj").join("config.toml"))
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Load the config file if present
///
/// An explicit path must exist. Without one, the default location is tried and
/// a missing file falls back to defaults. A file that exists but does not parse
/// is always an error.
pub fn load_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    if let Some(path) = explicit {
        info!("Loading config from {}", path.display());
        return load_toml_config(path);
    }

    match default_config_path() {
        Some(path) if path.exists() => {
            info!("Loading config from {}", path.display());
            load_toml_config(&path)
        }
        _ => {
            debug!("No config file found, using defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Resolve a string setting: CLI → ENV → TOML → default
///
/// Empty or whitespace-only values at any tier are skipped.
pub fn resolve_setting(
    cli_arg: Option<&str>,
    env_var_name: &str,
    toml_value: Option<&str>,
    default: &str,
) -> String {
    if let Some(value) = cli_arg.filter(|v| is_set(v)) {
        return value.to_string();
    }

    if let Ok(value) = std::env::var(env_var_name) {
        if is_set(&value) {
            return value;
        }
    }

    if let Some(value) = toml_value.filter(|v| is_set(v)) {
        return value.to_string();
    }

    default.to_string()
}

/// Resolve a numeric setting: CLI → ENV → TOML
///
/// Unparseable environment values are ignored.
pub fn resolve_number<T>(cli_arg: Option<T>, env_var_name: &str, toml_value: Option<T>) -> Option<T>
where
    T: std::str::FromStr,
{
    cli_arg
        .or_else(|| {
            std::env::var(env_var_name)
                .ok()
                .and_then(|v| v.trim().parse().ok())
        })
        .or(toml_value)
}

fn is_set(value: &str) -> bool {
    !value.trim().is_empty()
}
