//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All optional:
//! - `SHOPIFY_API_VERSION` - Admin API version (default: 2025-04)
//! - `PIC_FINDER_API_FLAVOR` - `graphql` or `rest` product listing (default: graphql)
//! - `PIC_FINDER_RELAY_URL` - Same-origin relay endpoint, tried before any other transport
//! - `PIC_FINDER_CORS_PROXIES` - Comma-separated transport list (`direct`, or a proxy
//!   prefix; append `#encoded` for proxies that need a percent-encoded target)
//! - `PIC_FINDER_REQUEST_TIMEOUT_SECS` - Per-attempt timeout (default: 8)
//! - `PIC_FINDER_CALL_TIMEOUT_SECS` - Whole-operation timeout (default: 30)
//! - `PIC_FINDER_CACHE_TTL_SECS` - Response cache TTL (default: 600)
//! - `PIC_FINDER_BACKOFF_BASE_MS` - Rate-limit backoff base (default: 1000)
//! - `PIC_FINDER_MAX_RATE_LIMIT_RETRIES` - Rate-limit retries per call (default: 5)
//! - `PIC_FINDER_UPSTREAM_SCHEME` - Scheme for upstream URLs (default: https)

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::executor::RetryPolicy;
use crate::transport::{ProxyEncoding, Transport};

/// Default Admin API version.
pub const DEFAULT_API_VERSION: &str = "2025-04";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Which Admin API the product listing uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApiFlavor {
    /// `graphql.json` with `first`/`after`/`query` variables.
    #[default]
    GraphQL,
    /// `products.json` with `Link` header cursors.
    Rest,
}

impl FromStr for ApiFlavor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "graphql" => Ok(Self::GraphQL),
            "rest" => Ok(Self::Rest),
            other => Err(format!("expected 'graphql' or 'rest', got '{other}'")),
        }
    }
}

/// Shopify client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Admin API version (e.g., 2025-04)
    pub api_version: String,
    /// Product listing path
    pub api_flavor: ApiFlavor,
    /// Scheme used to build upstream URLs
    pub upstream_scheme: String,
    /// Same-origin relay endpoint
    pub relay_url: Option<Url>,
    /// Ordered fallback transports tried after the relay
    pub proxies: Vec<Transport>,
    /// Per-attempt timeout
    pub request_timeout: Duration,
    /// Whole-operation timeout
    pub call_timeout: Duration,
    /// Response cache TTL
    pub cache_ttl: Duration,
    /// Maximum number of cached responses
    pub cache_capacity: u64,
    /// Base delay for rate-limit backoff
    pub backoff_base: Duration,
    /// Rate-limit retries allowed per call
    pub max_rate_limit_retries: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_version: DEFAULT_API_VERSION.to_string(),
            api_flavor: ApiFlavor::default(),
            upstream_scheme: "https".to_string(),
            relay_url: None,
            proxies: default_proxies(),
            request_timeout: Duration::from_secs(8),
            call_timeout: Duration::from_secs(30),
            cache_ttl: Duration::from_secs(600),
            cache_capacity: 1000,
            backoff_base: Duration::from_millis(1000),
            max_rate_limit_retries: 5,
        }
    }
}

/// Public CORS proxy mirrors, in order of preference.
#[must_use]
pub fn default_proxies() -> Vec<Transport> {
    vec![
        Transport::Direct,
        Transport::proxy("https://api.allorigins.win/raw?url=", ProxyEncoding::Percent),
        Transport::proxy("https://corsproxy.io/?", ProxyEncoding::Raw),
        Transport::proxy("https://thingproxy.freeboard.io/fetch/", ProxyEncoding::Raw),
        // Often requires prior opt-in on the proxy's own site
        Transport::proxy("https://cors-anywhere.herokuapp.com/", ProxyEncoding::Raw),
    ]
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let defaults = Self::default();

        let relay_url = get_optional_env("PIC_FINDER_RELAY_URL")
            .map(|raw| {
                Url::parse(&raw).map_err(|e| {
                    ConfigError::InvalidEnvVar("PIC_FINDER_RELAY_URL".to_string(), e.to_string())
                })
            })
            .transpose()?;

        let proxies = match get_optional_env("PIC_FINDER_CORS_PROXIES") {
            Some(raw) => parse_transport_list(&raw).map_err(|e| {
                ConfigError::InvalidEnvVar("PIC_FINDER_CORS_PROXIES".to_string(), e)
            })?,
            None => defaults.proxies,
        };

        Ok(Self {
            api_version: get_env_or_default("SHOPIFY_API_VERSION", DEFAULT_API_VERSION),
            api_flavor: parse_env("PIC_FINDER_API_FLAVOR", defaults.api_flavor)?,
            upstream_scheme: get_env_or_default("PIC_FINDER_UPSTREAM_SCHEME", "https"),
            relay_url,
            proxies,
            request_timeout: Duration::from_secs(parse_env(
                "PIC_FINDER_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )?),
            call_timeout: Duration::from_secs(parse_env(
                "PIC_FINDER_CALL_TIMEOUT_SECS",
                defaults.call_timeout.as_secs(),
            )?),
            cache_ttl: Duration::from_secs(parse_env(
                "PIC_FINDER_CACHE_TTL_SECS",
                defaults.cache_ttl.as_secs(),
            )?),
            cache_capacity: defaults.cache_capacity,
            backoff_base: Duration::from_millis(parse_env(
                "PIC_FINDER_BACKOFF_BASE_MS",
                1000_u64,
            )?),
            max_rate_limit_retries: parse_env(
                "PIC_FINDER_MAX_RATE_LIMIT_RETRIES",
                defaults.max_rate_limit_retries,
            )?,
        })
    }

    /// Full ordered transport list: relay first (if configured), then proxies.
    #[must_use]
    pub fn transports(&self) -> Vec<Transport> {
        let mut transports = Vec::with_capacity(self.proxies.len() + 1);
        if let Some(relay) = &self.relay_url {
            transports.push(Transport::Relay {
                endpoint: relay.to_string(),
            });
        }
        transports.extend(self.proxies.iter().cloned());
        transports
    }

    /// Retry policy for idempotent reads: one attempt per transport.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.transports().len().max(1),
            max_rate_limit_retries: self.max_rate_limit_retries,
            backoff_base: self.backoff_base,
            request_timeout: self.request_timeout,
        }
    }
}

/// Parse a comma-separated transport list.
///
/// # Errors
///
/// Returns a description of the first entry that is not a valid transport.
pub fn parse_transport_list(raw: &str) -> Result<Vec<Transport>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(Transport::from_str)
        .collect()
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable, falling back to a default when unset.
fn parse_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}
