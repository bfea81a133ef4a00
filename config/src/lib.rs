//! Dyno configuration file.
//!
//! ```toml
//! [connection]
//! endpoint = "http://localhost:8000"
//! region = "eu-west-1"
//! access_key_id = "${AWS_ACCESS_KEY_ID}"
//! secret_access_key = "${AWS_SECRET_ACCESS_KEY}"
//!
//! [retry]
//! max_retries = 5
//! initial_delay_ms = 100
//!
//! [[tables]]
//! name = "sample"
//! ```
//!
//! Connection values fall back to the standard `AWS_*` variables and
//! `DYNO_ENDPOINT` when absent.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs, io};

use dyno_client::retry::RetryConfig;
use dyno_client::{ConnectConfig, DynoError};
use dyno_types::Table;
use serde::Deserialize;
use thiserror::Error;
use toml::de::Error as TomlError;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "DYNO_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse { path: PathBuf, source: TomlError },
    #[error("table '{name}' is declared more than once in {}", path.display())]
    DuplicateTable { path: PathBuf, name: String },
    #[error("retry jitter in {} must be a finite number, got {value}", path.display())]
    InvalidJitter { path: PathBuf, value: f64 },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. }
            | ConfigError::Parse { path, .. }
            | ConfigError::DuplicateTable { path, .. }
            | ConfigError::InvalidJitter { path, .. } => path,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DynoConfig {
    pub connection: Option<ConnectionConfig>,
    pub retry: Option<RetrySettings>,
    #[serde(default)]
    pub tables: Vec<Table>,
}

#[derive(Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
}

// Manual Debug impl to keep credentials out of logs.
impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn mask(opt: Option<&String>) -> &'static str {
            if opt.is_some() { "[REDACTED]" } else { "None" }
        }
        f.debug_struct("ConnectionConfig")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &mask(self.secret_access_key.as_ref()))
            .field("session_token", &mask(self.session_token.as_ref()))
            .finish()
    }
}

impl ConnectionConfig {
    /// Resolve against the process environment.
    pub fn connect_config(&self) -> Result<ConnectConfig, DynoError> {
        self.resolve(|name| env::var(name).ok())
    }

    /// Configured values (after `${VAR}` expansion) win over the variables
    /// [`ConnectConfig::from_env`] reads.
    ///
    /// Credentials come from one place: once any credential is configured,
    /// the access key, secret and session token are all taken from the
    /// config and never completed from the environment.
    pub fn resolve(&self, env: impl Fn(&str) -> Option<String>) -> Result<ConnectConfig, DynoError> {
        let env = |name: &str| env(name).filter(|v| !v.is_empty());
        let configured_credentials = self.access_key_id.is_some()
            || self.secret_access_key.is_some()
            || self.session_token.is_some();
        ConnectConfig::from_lookup(|name| {
            let (configured, credential) = match name {
                "DYNO_ENDPOINT" => (self.endpoint.as_deref(), false),
                "AWS_REGION" => (self.region.as_deref(), false),
                "AWS_ACCESS_KEY_ID" => (self.access_key_id.as_deref(), true),
                "AWS_SECRET_ACCESS_KEY" => (self.secret_access_key.as_deref(), true),
                "AWS_SESSION_TOKEN" => (self.session_token.as_deref(), true),
                _ => (None, false),
            };
            let configured = configured
                .map(|value| expand_with(value, &env))
                .filter(|v| !v.is_empty());
            if credential && configured_credentials {
                return configured;
            }
            configured.or_else(|| env(name))
        })
    }
}

/// `[retry]` overrides; unset fields keep the client defaults.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrySettings {
    pub max_retries: Option<u32>,
    pub initial_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    /// Down-jitter factor, clamped to `0.0..=1.0`.
    pub jitter: Option<f64>,
}

impl RetrySettings {
    #[must_use]
    pub fn retry_config(&self) -> RetryConfig {
        let defaults = RetryConfig::default();
        RetryConfig {
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            initial_delay: self
                .initial_delay_ms
                .map_or(defaults.initial_delay, Duration::from_millis),
            max_delay: self.max_delay_ms.map_or(defaults.max_delay, Duration::from_millis),
            jitter_factor: self.jitter.map_or(defaults.jitter_factor, |j| j.clamp(0.0, 1.0)),
        }
    }
}

/// Replace `${VAR}` with the variable's value; unset variables become empty.
pub fn expand_env_vars(value: &str) -> String {
    expand_with(value, |name| env::var(name).ok())
}

fn expand_with(value: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        let Some(end) = rest[start + 2..].find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let var = &rest[start + 2..start + 2 + end];
        if !var.is_empty() {
            out.push_str(&lookup(var).unwrap_or_default());
        }
        rest = &rest[start + 3 + end..];
    }
    out.push_str(rest);
    out
}

impl DynoConfig {
    /// Load from [`config_path`]; `Ok(None)` when there is no file.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            tracing::debug!("No config at {}", path.display());
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| {
            tracing::warn!("Failed to read config at {}: {source}", path.display());
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;
        let config = Self::parse(&content, path)?;
        tracing::debug!(tables = config.tables.len(), "Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse config text; `path` is only used in errors.
    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|source| {
            tracing::warn!("Failed to parse config at {}: {source}", path.display());
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })?;

        if let Some(value) = config.retry.as_ref().and_then(|retry| retry.jitter)
            && !value.is_finite()
        {
            return Err(ConfigError::InvalidJitter {
                path: path.to_path_buf(),
                value,
            });
        }

        let mut seen = BTreeSet::new();
        for table in &config.tables {
            if !seen.insert(table.name()) {
                return Err(ConfigError::DuplicateTable {
                    path: path.to_path_buf(),
                    name: table.name().to_string(),
                });
            }
        }
        Ok(config)
    }

    #[must_use]
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|table| table.name() == name)
    }

    /// Connection from `[connection]`, else from the environment alone.
    pub fn connect_config(&self) -> Result<ConnectConfig, DynoError> {
        match &self.connection {
            Some(connection) => connection.connect_config(),
            None => ConnectConfig::from_env(),
        }
    }

    #[must_use]
    pub fn retry_config(&self) -> RetryConfig {
        self.retry
            .as_ref()
            .map(RetrySettings::retry_config)
            .unwrap_or_default()
    }
}

/// `$DYNO_CONFIG` when set, else `~/.dyno/config.toml`.
#[must_use]
pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".dyno").join("config.toml"))
}
