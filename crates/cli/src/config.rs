//! `pact.toml` configuration with environment overrides.
//!
//! Precedence, lowest first: built-in defaults, the TOML file, `PACT_*`
//! environment variables, command-line flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use pact_executor::ExecutorSettings;
use serde::Deserialize;

/// Default rate limit: 60 requests per minute per IP.
pub(crate) const DEFAULT_RATE_LIMIT: u64 = 60;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct PactConfig {
    pub(crate) server: ServerConfig,
    pub(crate) storage: StorageConfig,
    pub(crate) seed: SeedConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct ServerConfig {
    pub(crate) port: u16,
    /// Requests per minute per client IP.
    pub(crate) rate_limit: u64,
    /// When set, every route except `/health` requires this key.
    pub(crate) api_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            rate_limit: DEFAULT_RATE_LIMIT,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct StorageConfig {
    pub(crate) timeout_ms: u64,
    pub(crate) max_conflict_retries: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let settings = ExecutorSettings::default();
        Self {
            timeout_ms: settings.storage_timeout.as_millis() as u64,
            max_conflict_retries: settings.max_conflict_retries,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct SeedConfig {
    pub(crate) path: Option<PathBuf>,
}

impl PactConfig {
    /// Read `path` if given, then apply `PACT_*` environment overrides.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self, String> {
        let mut config = match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path)
                    .map_err(|e| format!("error reading config '{}': {}", path.display(), e))?;
                Self::parse(&contents)
                    .map_err(|e| format!("error parsing config '{}': {}", path.display(), e))?
            }
            None => PactConfig::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub(crate) fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Apply `PACT_API_KEY`, `PACT_RATE_LIMIT` and `PACT_PORT` as read by `lookup`.
    pub(crate) fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), String> {
        if let Some(key) = lookup("PACT_API_KEY").filter(|k| !k.is_empty()) {
            self.server.api_key = Some(key);
        }
        if let Some(raw) = lookup("PACT_RATE_LIMIT") {
            self.server.rate_limit = raw
                .parse()
                .map_err(|_| format!("PACT_RATE_LIMIT must be an integer, got '{}'", raw))?;
        }
        if let Some(raw) = lookup("PACT_PORT") {
            self.server.port = raw
                .parse()
                .map_err(|_| format!("PACT_PORT must be a port number, got '{}'", raw))?;
        }
        Ok(())
    }

    pub(crate) fn executor_settings(&self) -> ExecutorSettings {
        ExecutorSettings {
            storage_timeout: Duration::from_millis(self.storage.timeout_ms),
            max_conflict_retries: self.storage.max_conflict_retries,
        }
    }
}
