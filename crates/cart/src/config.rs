//! Cart configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required (REST backend, the default)
//! - `SHOPFRONT_DATA_URL` - Base URL of the hosted data service
//! - `SHOPFRONT_DATA_KEY` - Data service API key (server-side key, high entropy)
//!
//! ## Required (Postgres backend)
//! - `SHOPFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! ## Optional
//! - `SHOPFRONT_STORE_BACKEND` - `rest` or `postgres` (default: rest)
//! - `SHOPFRONT_HTTP_TIMEOUT_SECS` - Data service request timeout (default: 10)
//! - `SHOPFRONT_DB_MAX_CONNECTIONS` - Postgres pool size (default: 10)
//! - `SHOPFRONT_CURRENCY` - ISO 4217 display currency (default: USD)
//! - `SHOPFRONT_SHIPPING_FLAT` - Flat checkout shipping charge (default: 5.99)
//! - `SHOPFRONT_TAX_RATE` - Checkout tax rate as a fraction (default: 0.20)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::SecretString;
use shopfront_core::{CheckoutRates, CurrencyCode};
use thiserror::Error;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Cart application configuration.
#[derive(Debug, Clone)]
pub struct CartConfig {
    /// Where cart rows live
    pub store: StoreConfig,
    /// Currency used when displaying totals
    pub currency: CurrencyCode,
    /// Shipping and tax applied to order summaries
    pub checkout: CheckoutRates,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name (e.g. "production")
    pub sentry_environment: Option<String>,
}

/// Selected cart store backend.
#[derive(Debug, Clone)]
pub enum StoreConfig {
    /// Hosted data service over its REST API.
    Rest(DataServiceConfig),
    /// Direct `PostgreSQL` access to the same schema.
    Postgres(PostgresConfig),
}

/// Hosted data service (REST) configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct DataServiceConfig {
    /// Service base URL (e.g. `https://abc.example.co`)
    pub base_url: Url,
    /// API key sent as `apikey` and bearer token
    pub api_key: SecretString,
    /// Per-request timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for DataServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataServiceConfig")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Direct `PostgreSQL` configuration.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// `PostgreSQL` connection URL (contains password)
    pub database_url: SecretString,
    /// Maximum pool connections
    pub max_connections: u32,
}

impl CartConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the data service key fails validation (placeholder detection,
    /// entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_vars(&|key: &str| std::env::var(key).ok())
    }

    fn from_vars(vars: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let backend = get_env_or_default(vars, "SHOPFRONT_STORE_BACKEND", "rest");
        let store = match backend.to_ascii_lowercase().as_str() {
            "rest" => StoreConfig::Rest(DataServiceConfig::from_vars(vars)?),
            "postgres" => StoreConfig::Postgres(PostgresConfig::from_vars(vars)?),
            other => {
                return Err(ConfigError::InvalidEnvVar(
                    "SHOPFRONT_STORE_BACKEND".to_string(),
                    format!("expected 'rest' or 'postgres', got '{other}'"),
                ));
            }
        };

        let currency = parse_env(vars, "SHOPFRONT_CURRENCY", CurrencyCode::USD)?;
        let defaults = CheckoutRates::default();
        let checkout = CheckoutRates {
            shipping_flat: parse_env(vars, "SHOPFRONT_SHIPPING_FLAT", defaults.shipping_flat)?,
            tax_rate: parse_env(vars, "SHOPFRONT_TAX_RATE", defaults.tax_rate)?,
        };
        if checkout.shipping_flat < Decimal::ZERO {
            return Err(ConfigError::InvalidEnvVar(
                "SHOPFRONT_SHIPPING_FLAT".to_string(),
                "must not be negative".to_string(),
            ));
        }
        if checkout.tax_rate < Decimal::ZERO || checkout.tax_rate > Decimal::ONE {
            return Err(ConfigError::InvalidEnvVar(
                "SHOPFRONT_TAX_RATE".to_string(),
                "must be a fraction between 0 and 1".to_string(),
            ));
        }

        Ok(Self {
            store,
            currency,
            checkout,
            sentry_dsn: vars("SENTRY_DSN"),
            sentry_environment: vars("SENTRY_ENVIRONMENT"),
        })
    }
}

impl DataServiceConfig {
    fn from_vars(vars: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw_url = get_required_env(vars, "SHOPFRONT_DATA_URL")?;
        let base_url = Url::parse(&raw_url).map_err(|e| {
            ConfigError::InvalidEnvVar("SHOPFRONT_DATA_URL".to_string(), e.to_string())
        })?;
        if base_url.host_str().is_none() {
            return Err(ConfigError::InvalidEnvVar(
                "SHOPFRONT_DATA_URL".to_string(),
                "must have a host".to_string(),
            ));
        }
        let timeout_secs: u64 = parse_env(vars, "SHOPFRONT_HTTP_TIMEOUT_SECS", 10)?;

        Ok(Self {
            base_url,
            api_key: get_validated_secret(vars, "SHOPFRONT_DATA_KEY")?,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

impl PostgresConfig {
    /// Load only the `PostgreSQL` settings (used by migrations).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if no database URL is set or the pool size is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_vars(&|key: &str| std::env::var(key).ok())
    }

    fn from_vars(vars: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: get_database_url(vars, "SHOPFRONT_DATABASE_URL")?,
            max_connections: parse_env(vars, "SHOPFRONT_DB_MAX_CONNECTIONS", 10)?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(
    vars: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<String, ConfigError> {
    vars(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(
    vars: &impl Fn(&str) -> Option<String>,
    primary_key: &str,
) -> Result<SecretString, ConfigError> {
    vars(primary_key)
        .or_else(|| vars("DATABASE_URL"))
        .map(SecretString::from)
        .ok_or_else(|| ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an environment variable with a default value.
fn get_env_or_default(vars: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    vars(key).unwrap_or_else(|| default.to_string())
}

/// Parse an optional environment variable, falling back to `default` when unset.
fn parse_env<T>(
    vars: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    vars(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the key issued by the data service."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(
    vars: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<SecretString, ConfigError> {
    let value = get_required_env(vars, key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
