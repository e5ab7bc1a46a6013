//! Configuration loader for Leadflow.
//!
//! Resolves `leadflow.toml` and deserializes it into [`LeadflowConfig`].
//! Resolution order: explicit path (`--config`), then the `LEADFLOW_CONFIG`
//! environment variable, then `./leadflow.toml`, then defaults.
//!
//! A file the user named (explicitly or through the environment) must exist
//! and parse. The implicit `./leadflow.toml` falls back to defaults with a
//! warning when it is malformed.

use std::path::{Path, PathBuf};

use leadflow_types::config::LeadflowConfig;

/// Environment variable overriding the config path.
pub const CONFIG_ENV_VAR: &str = "LEADFLOW_CONFIG";

/// File looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "leadflow.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Where the configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Named by `--config` or `LEADFLOW_CONFIG`; must be valid.
    Required(PathBuf),
    /// `./leadflow.toml`; optional.
    Implicit(PathBuf),
}

/// Pick the config file to read, without touching the filesystem.
pub fn resolve_config_source(
    explicit: Option<&Path>,
    env_value: Option<&str>,
    working_dir: &Path,
) -> ConfigSource {
    if let Some(path) = explicit {
        return ConfigSource::Required(path.to_path_buf());
    }
    match env_value.map(str::trim) {
        Some(value) if !value.is_empty() => ConfigSource::Required(PathBuf::from(value)),
        _ => ConfigSource::Implicit(working_dir.join(DEFAULT_CONFIG_FILE)),
    }
}

/// Load configuration for the current process.
pub async fn load_config(explicit: Option<&Path>) -> Result<LeadflowConfig, ConfigError> {
    let env_value = std::env::var(CONFIG_ENV_VAR).ok();
    let source = resolve_config_source(explicit, env_value.as_deref(), Path::new("."));
    load_config_from(&source).await
}

/// Load configuration from a resolved source.
pub async fn load_config_from(source: &ConfigSource) -> Result<LeadflowConfig, ConfigError> {
    match source {
        ConfigSource::Required(path) => {
            let content = match tokio::fs::read_to_string(path).await {
                Ok(content) => content,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    return Err(ConfigError::NotFound(path.clone()));
                }
                Err(source) => {
                    return Err(ConfigError::Read {
                        path: path.clone(),
                        source,
                    });
                }
            };
            let config = toml::from_str::<LeadflowConfig>(&content).map_err(|source| {
                ConfigError::Parse {
                    path: path.clone(),
                    source,
                }
            })?;
            tracing::debug!(path = %path.display(), "loaded config");
            Ok(config)
        }
        ConfigSource::Implicit(path) => Ok(load_optional(path).await),
    }
}

async fn load_optional(path: &Path) -> LeadflowConfig {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No {} found, using defaults", path.display());
            return LeadflowConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", path.display());
            return LeadflowConfig::default();
        }
    };

    match toml::from_str::<LeadflowConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", path.display());
            LeadflowConfig::default()
        }
    }
}
