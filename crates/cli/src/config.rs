//! Environment-driven configuration, read once at startup.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tally_core::{Party, PartyRegistry, RegistryError};

pub(crate) const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";
const DEFAULT_STARTUP_RETRIES: usize = 15;
const DEFAULT_STARTUP_BACKOFF_MS: u64 = 2000;

#[derive(Debug, thiserror::Error)]
pub(crate) enum ConfigError {
    #[error("DATABASE_URL is not set (use --store memory to run without a database)")]
    MissingDatabaseUrl,

    #[error("cannot read party registry {}: {source}", path.display())]
    RegistryRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid party registry {}: {source}", path.display())]
    RegistryParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("invalid CORS origin '{origin}'")]
    InvalidOrigin { origin: String },
}

/// Fixed-delay retry policy for the initial store connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RetryPolicy {
    pub(crate) max_attempts: usize,
    pub(crate) backoff: Duration,
}

#[derive(Debug, Clone)]
pub(crate) struct ServeConfig {
    pub(crate) database_url: Option<String>,
    pub(crate) cors_origins: Vec<String>,
    pub(crate) registry_path: Option<PathBuf>,
    pub(crate) startup: RetryPolicy,
    pub(crate) log_json: bool,
}

impl ServeConfig {
    pub(crate) fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()),
            cors_origins: parse_origins(
                &env::var("CORS_ORIGINS").unwrap_or_else(|_| DEFAULT_CORS_ORIGIN.to_string()),
            ),
            registry_path: env::var("TALLY_REGISTRY")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            startup: RetryPolicy {
                max_attempts: env_usize("TALLY_STARTUP_RETRIES", DEFAULT_STARTUP_RETRIES).max(1),
                backoff: Duration::from_millis(env_u64(
                    "TALLY_STARTUP_BACKOFF_MS",
                    DEFAULT_STARTUP_BACKOFF_MS,
                )),
            },
            log_json: env_bool("TALLY_LOG_JSON", false),
        }
    }

    pub(crate) fn database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or(ConfigError::MissingDatabaseUrl)
    }

    /// The configured registry file, or the built-in default registry.
    pub(crate) fn registry(&self) -> Result<PartyRegistry, ConfigError> {
        match &self.registry_path {
            Some(path) => load_registry(path),
            None => Ok(PartyRegistry::default()),
        }
    }
}

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| match v.as_str() {
            "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
            "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}

pub(crate) fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    party: Vec<Party>,
}

/// Parse a registry TOML document of `[[party]]` tables, in file order.
pub(crate) fn parse_registry(source: &str) -> Result<Vec<Party>, toml::de::Error> {
    let file: RegistryFile = toml::from_str(source)?;
    Ok(file.party)
}

pub(crate) fn load_registry(path: &Path) -> Result<PartyRegistry, ConfigError> {
    let source = std::fs::read_to_string(path).map_err(|source| ConfigError::RegistryRead {
        path: path.to_path_buf(),
        source,
    })?;
    let parties = parse_registry(&source).map_err(|source| ConfigError::RegistryParse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(PartyRegistry::new(parties)?)
}
