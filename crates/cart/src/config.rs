//! Cart configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Backend selection
//! - `CART_REMOTE` - `memory`, `postgres`, or `rest` (default: memory)
//!
//! ## Required for `postgres`
//! - `CART_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! ## Required for `rest`
//! - `CART_REST_URL` - Base URL of the table API
//! - `CART_REST_API_KEY` - API key sent as `apikey` and bearer token
//!
//! ## Optional
//! - `CART_SYNC_DEBOUNCE_MS` - Flush coalescing window (default: 300)
//! - `CART_CATALOG_PATH` - JSON catalog file (default: bundled assortment)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag

use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const DEFAULT_SYNC_DEBOUNCE_MS: u64 = 300;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "xxx",
    "todo",
    "put-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Which remote store persists carts.
#[derive(Clone)]
pub enum RemoteBackend {
    /// In-process map; nothing survives a restart.
    Memory,
    /// `PostgreSQL` through `sqlx`.
    Postgres {
        /// Connection URL (contains password)
        database_url: SecretString,
    },
    /// PostgREST-style HTTP table API.
    Rest {
        base_url: Url,
        api_key: SecretString,
    },
}

impl RemoteBackend {
    /// Short name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Postgres { .. } => "postgres",
            Self::Rest { .. } => "rest",
        }
    }
}

impl std::fmt::Debug for RemoteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => f.write_str("Memory"),
            Self::Postgres { .. } => f
                .debug_struct("Postgres")
                .field("database_url", &"[REDACTED]")
                .finish(),
            Self::Rest { base_url, .. } => f
                .debug_struct("Rest")
                .field("base_url", &base_url.as_str())
                .field("api_key", &"[REDACTED]")
                .finish(),
        }
    }
}

/// Cart application configuration.
#[derive(Debug, Clone)]
pub struct CartConfig {
    /// Remote persisted-cart backend
    pub remote: RemoteBackend,
    /// How long the sync worker waits to coalesce flushes
    pub sync_debounce: Duration,
    /// Catalog JSON file; `None` uses the bundled catalog
    pub catalog_path: Option<PathBuf>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
}

impl CartConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable required by the selected backend
    /// is missing, or any variable fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Same as [`CartConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let remote = match env.get_or_default("CART_REMOTE", "memory").as_str() {
            "memory" => RemoteBackend::Memory,
            "postgres" => RemoteBackend::Postgres {
                database_url: env.get_database_url("CART_DATABASE_URL")?,
            },
            "rest" => {
                let raw = env.get_required("CART_REST_URL")?;
                let base_url = Url::parse(&raw).map_err(|e| {
                    ConfigError::InvalidEnvVar("CART_REST_URL".to_string(), e.to_string())
                })?;
                let api_key = env.get_required_secret("CART_REST_API_KEY")?;
                validate_not_placeholder(&api_key, "CART_REST_API_KEY")?;
                RemoteBackend::Rest { base_url, api_key }
            }
            other => {
                return Err(ConfigError::InvalidEnvVar(
                    "CART_REMOTE".to_string(),
                    format!("expected memory, postgres or rest (got '{other}')"),
                ));
            }
        };

        let debounce_ms = env
            .get_or_default("CART_SYNC_DEBOUNCE_MS", &DEFAULT_SYNC_DEBOUNCE_MS.to_string())
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("CART_SYNC_DEBOUNCE_MS".to_string(), e.to_string())
            })?;

        Ok(Self {
            remote,
            sync_debounce: Duration::from_millis(debounce_ms),
            catalog_path: env.get_optional("CART_CATALOG_PATH").map(PathBuf::from),
            sentry_dsn: env.get_optional("SENTRY_DSN"),
            sentry_environment: env.get_optional("SENTRY_ENVIRONMENT"),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Variable source wrapper carrying the lookup helpers.
struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Get a required environment variable.
    fn get_required(&self, key: &str) -> Result<String, ConfigError> {
        (self.0)(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Get a required environment variable as a secret.
    fn get_required_secret(&self, key: &str) -> Result<SecretString, ConfigError> {
        self.get_required(key).map(SecretString::from)
    }

    /// Get database URL with fallback to generic `DATABASE_URL`.
    fn get_database_url(&self, primary_key: &str) -> Result<SecretString, ConfigError> {
        (self.0)(primary_key)
            .or_else(|| (self.0)("DATABASE_URL"))
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar(primary_key.to_string()))
    }

    /// Get an optional environment variable. Empty values count as unset.
    fn get_optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.is_empty())
    }

    /// Get an environment variable with a default value.
    fn get_or_default(&self, key: &str, default: &str) -> String {
        (self.0)(key).unwrap_or_else(|| default.to_string())
    }
}

/// Reject secrets that were obviously copied from a sample `.env`.
fn validate_not_placeholder(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.expose_secret().to_lowercase();
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InvalidEnvVar(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }
    Ok(())
}
