//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `ATHLEON_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `ATHLEON_BASE_URL` - Public URL of the storefront web client
//! - `MIDTRANS_SERVER_KEY` - Midtrans server key (server-side only)
//! - `MIDTRANS_CLIENT_KEY` - Midtrans client key (exposed to the Snap widget)
//! - `BITESHIP_API_KEY` - Biteship API key
//! - `BITESHIP_ORIGIN_AREA_ID` - Biteship area id of the warehouse
//! - `BINDERBYTE_API_KEY` - `BinderByte` tracking API key
//!
//! ## Optional
//! - `ATHLEON_HOST` - Bind address (default: 127.0.0.1)
//! - `ATHLEON_PORT` - Listen port (default: 8000)
//! - `ATHLEON_CORS_ORIGINS` - Comma-separated allowed origins (default: base URL)
//! - `MIDTRANS_PRODUCTION` - `true` for the production gateway (default: false)
//! - `BITESHIP_COURIERS` - Courier codes to quote (default: jne,jnt,sicepat,anteraja,pos)
//! - `BITESHIP_BASE_URL` - Override the Biteship API URL
//! - `BINDERBYTE_BASE_URL` - Override the `BinderByte` API URL
//! - `WILAYAH_BASE_URL` - Region API URL (default: <https://wilayah.id/api>)
//! - `LOG_FORMAT` - `json` for structured logs, anything else for pretty output
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::SecretString;
use thiserror::Error;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.0;

const DEFAULT_COURIERS: &str = "jne,jnt,sicepat,anteraja,pos";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "your_",
    "changeme",
    "replace",
    "placeholder",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "put-your",
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

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public URL of the web client, used for payment return links
    pub base_url: String,
    /// Origins allowed by CORS
    pub cors_origins: Vec<String>,
    pub midtrans: MidtransConfig,
    pub biteship: BiteshipConfig,
    pub binderbyte: BinderByteConfig,
    /// Region lookup API base URL
    pub wilayah_base_url: String,
    /// Emit JSON logs
    pub json_logs: bool,
    pub sentry: SentryConfig,
}

/// Midtrans payment gateway configuration.
#[derive(Clone)]
pub struct MidtransConfig {
    pub server_key: SecretString,
    pub client_key: String,
    pub production: bool,
}

impl std::fmt::Debug for MidtransConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MidtransConfig")
            .field("server_key", &"[REDACTED]")
            .field("client_key", &self.client_key)
            .field("production", &self.production)
            .finish()
    }
}

impl MidtransConfig {
    /// Snap API base URL for the configured environment.
    #[must_use]
    pub const fn snap_base_url(&self) -> &'static str {
        if self.production {
            "https://app.midtrans.com/snap/v1"
        } else {
            "https://app.sandbox.midtrans.com/snap/v1"
        }
    }

    /// Core API base URL for the configured environment.
    #[must_use]
    pub const fn core_base_url(&self) -> &'static str {
        if self.production {
            "https://api.midtrans.com/v2"
        } else {
            "https://api.sandbox.midtrans.com/v2"
        }
    }
}

/// Biteship shipping-rate configuration.
#[derive(Clone)]
pub struct BiteshipConfig {
    pub api_key: SecretString,
    /// Area id rates are quoted from.
    pub origin_area_id: String,
    /// Courier codes, comma separated as Biteship expects.
    pub couriers: String,
    pub base_url: String,
}

impl std::fmt::Debug for BiteshipConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BiteshipConfig")
            .field("api_key", &"[REDACTED]")
            .field("origin_area_id", &self.origin_area_id)
            .field("couriers", &self.couriers)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// `BinderByte` courier tracking configuration.
#[derive(Clone)]
pub struct BinderByteConfig {
    pub api_key: SecretString,
    pub base_url: String,
}

impl std::fmt::Debug for BinderByteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinderByteConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Sentry error tracking configuration.
#[derive(Debug, Clone, Default)]
pub struct SentryConfig {
    pub dsn: Option<String>,
    pub environment: Option<String>,
    pub sample_rate: f32,
    pub traces_sample_rate: f32,
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if API keys fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("ATHLEON_DATABASE_URL")?;
        let host = parse_env("ATHLEON_HOST", "127.0.0.1")?;
        let port = parse_env("ATHLEON_PORT", "8000")?;
        let base_url = get_required_env("ATHLEON_BASE_URL")?;
        url::Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("ATHLEON_BASE_URL".to_string(), e.to_string())
        })?;
        let cors_origins = get_optional_env("ATHLEON_CORS_ORIGINS")
            .map_or_else(|| vec![base_url.clone()], |raw| split_list(&raw));

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            cors_origins,
            midtrans: MidtransConfig::from_env()?,
            biteship: BiteshipConfig::from_env()?,
            binderbyte: BinderByteConfig::from_env()?,
            wilayah_base_url: get_env_or_default("WILAYAH_BASE_URL", "https://wilayah.id/api"),
            json_logs: get_optional_env("LOG_FORMAT").is_some_and(|v| v.eq_ignore_ascii_case("json")),
            sentry: SentryConfig::from_env()?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl MidtransConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            server_key: get_validated_secret("MIDTRANS_SERVER_KEY")?,
            client_key: get_required_env("MIDTRANS_CLIENT_KEY")?,
            production: parse_env("MIDTRANS_PRODUCTION", "false")?,
        })
    }
}

impl BiteshipConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_key: get_validated_secret("BITESHIP_API_KEY")?,
            origin_area_id: get_required_env("BITESHIP_ORIGIN_AREA_ID")?,
            couriers: split_list(&get_env_or_default("BITESHIP_COURIERS", DEFAULT_COURIERS))
                .join(","),
            base_url: get_env_or_default("BITESHIP_BASE_URL", "https://api.biteship.com/v1"),
        })
    }
}

impl BinderByteConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_key: get_validated_secret("BINDERBYTE_API_KEY")?,
            base_url: get_env_or_default("BINDERBYTE_BASE_URL", "https://api.binderbyte.com/v1"),
        })
    }
}

impl SentryConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            dsn: get_optional_env("SENTRY_DSN"),
            environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sample_rate: parse_env("SENTRY_SAMPLE_RATE", "1.0")?,
            traces_sample_rate: parse_env("SENTRY_TRACES_SAMPLE_RATE", "0.1")?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    std::env::var(primary_key)
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable (or its default) with `FromStr`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Split a comma-separated list, dropping blanks.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
        .collect()
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
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that an API key is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Copy the key from the provider dashboard."
            ),
        ));
    }

    Ok(())
}

/// Load and validate an API key from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
