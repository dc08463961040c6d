//! Service configuration.
//!
//! Uses `figment` for layered configuration: built-in defaults -> TOML file ->
//! environment (`PR_REVIEWER_` prefix, `__` for nesting, e.g.
//! `PR_REVIEWER_REVIEW__MAX_REVIEWERS=3`).

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::services::selection::DEFAULT_MAX_REVIEWERS;

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "PR_REVIEWER_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub review: ReviewConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` wins when set.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Reviewer assignment policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewConfig {
    /// Reviewers per pull request; also the staffing target.
    pub max_reviewers: usize,
    /// Identities allowed to merge any pull request and call admin routes.
    pub admin_ids: Vec<String>,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            max_reviewers: DEFAULT_MAX_REVIEWERS,
            admin_ids: vec!["admin".to_string()],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Database file, required for the sqlite backend.
    pub path: Option<PathBuf>,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.review.max_reviewers == 0 {
            return Err(ConfigError::Invalid(
                "review.max_reviewers must be at least 1".into(),
            ));
        }
        if self.review.admin_ids.iter().all(|id| id.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "review.admin_ids must name at least one admin".into(),
            ));
        }
        if self.storage.backend == StorageBackend::Sqlite && self.storage.path.is_none() {
            return Err(ConfigError::Invalid(
                "storage.path is required for the sqlite backend".into(),
            ));
        }
        Ok(())
    }
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with `PR_REVIEWER_`)
/// 2. The TOML file at `path`, if given
/// 3. Built-in defaults
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

    if let Some(path) = path {
        if !path.exists() {
            return Err(ConfigError::Invalid(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: AppConfig = figment.extract().map_err(Box::new)?;
    config.validate()?;
    Ok(config)
}
