//! Shopify Admin API connectivity for Pic Finder.
//!
//! # Architecture
//!
//! - [`ShopifyClient`] is the explicit context object: it owns its own
//!   response cache, cursor tables and transport index, so independent clients
//!   (and tests) never share hidden state
//! - Requests reach the Admin API through an ordered list of transports
//!   (same-origin relay, direct, public CORS proxies) with rotation on failure
//! - Rate limiting is absorbed with exponential backoff on the same transport
//! - Read responses are cached in memory via `moka` (10 minute TTL)
//! - Listing and search pages are cursor-paginated; cursors are kept per page
//!   and per mode (listing vs search)
//!
//! # Example
//!
//! ```rust,ignore
//! use pic_finder_shopify::{ClientConfig, ShopifyClient};
//! use pic_finder_core::Credentials;
//!
//! let client = ShopifyClient::in_memory(ClientConfig::from_env()?)?;
//! client.connect(Credentials::new("shop.myshopify.com", token)).await?;
//!
//! // First page of a search
//! let page = client.fetch_products(1, 50, "zippo").await?;
//!
//! // Push an image into the store as a new product
//! let product_id = client
//!     .create_product_with_image("https://example.com/lighter.jpg", "Lighter")
//!     .await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cache;
mod client;
pub mod config;
pub mod credentials;
pub mod executor;
pub mod notice;
pub mod pagination;
pub mod transport;

pub use cache::{CacheEntry, ResponseCache, graphql_cache_key, rest_cache_key};
pub use client::queries::{GetProducts, get_products};
pub use client::{SearchRelevance, ShopInfo, ShopifyClient, analyze_search_results};
pub use config::{ApiFlavor, ClientConfig, ConfigError};
pub use credentials::{CredentialStore, FileStore, KeyValueStore, MemoryStore};
pub use executor::{ApiRequest, ApiResponse, HttpMethod, RequestExecutor, RetryPolicy, USER_AGENT};
pub use notice::{Notice, NoticeSink, SharedNoticeSink, TracingNotices};
pub use pagination::{
    CursorTable, LinkCursors, PageRequest, PaginationEngine, SearchMode, parse_link_header,
};
pub use transport::{ProxyEncoding, Route, Transport, TransportSelector, upstream_url};

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when talking to the Shopify Admin API.
#[derive(Debug, Error)]
pub enum ShopifyError {
    /// No stored credentials (or stored credentials could not be read).
    #[error("Shopify credentials not found")]
    CredentialsMissing,

    /// Still rate limited after the configured number of backoff retries.
    #[error("Shopify API rate limit exceeded after {retries} retries")]
    RateLimited { retries: u32 },

    /// A single transport attempt failed and no retry was permitted.
    #[error("Connection via {transport} failed: {message}")]
    TransportFailure { transport: String, message: String },

    /// Every transport was tried and failed.
    #[error(
        "All connection methods failed ({}). Last error: {last_error}",
        format_failures(.failures)
    )]
    AllTransportsExhausted {
        failures: Vec<TransportFailureReport>,
        last_error: String,
    },

    /// The Admin API was reached and rejected the request.
    #[error("Shopify API error {status}: {message}")]
    UpstreamRejected { status: u16, message: String },

    /// The caller's timeout elapsed before the operation finished.
    #[error("Request timed out after {} ms", .0.as_millis())]
    Timeout(Duration),

    /// A success response was missing expected fields.
    #[error("Invalid response from Shopify API: {0}")]
    InvalidResponseShape(String),

    /// GraphQL query returned errors.
    #[error("GraphQL errors: {}", format_graphql_errors(.0))]
    GraphQL(Vec<GraphQLError>),

    /// HTTP client could not be built or a request could not be formed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The key-value store backing credentials failed.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl ShopifyError {
    /// Whether retrying the same operation later may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. }
                | Self::TransportFailure { .. }
                | Self::AllTransportsExhausted { .. }
                | Self::Timeout(_)
                | Self::Http(_)
        )
    }

    /// Whether this error came from the caller's timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// A short message suitable for a dismissible notice in the UI.
    #[must_use]
    pub fn user_hint(&self) -> String {
        match self {
            Self::CredentialsMissing => "Connect a Shopify store first.".to_string(),
            Self::RateLimited { .. } => {
                "Shopify API rate limit exceeded. Wait a moment and retry.".to_string()
            }
            Self::TransportFailure { .. } | Self::AllTransportsExhausted { .. } | Self::Http(_) => {
                "Could not reach Shopify through any connection method. This is usually a \
                 connectivity problem rather than your credentials; retry, or set up the relay."
                    .to_string()
            }
            Self::Timeout(_) => "Shopify took too long to respond. Please retry.".to_string(),
            Self::UpstreamRejected { status, .. } if (400..500).contains(status) => format!(
                "Shopify rejected the request ({status}). Check the store domain, access token \
                 and its API permissions."
            ),
            Self::UpstreamRejected { status, .. } => {
                format!("Shopify returned an error ({status}). Please retry later.")
            }
            _ => self.to_string(),
        }
    }
}

/// Why one transport attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportFailureReport {
    /// Transport display name.
    pub transport: String,
    /// Failure reason.
    pub message: String,
}

fn format_failures(failures: &[TransportFailureReport]) -> String {
    if failures.is_empty() {
        return "no attempts made".to_string();
    }
    failures
        .iter()
        .map(|f| format!("{}: {}", f.transport, f.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// A GraphQL error returned by the Shopify Admin API.
#[derive(Debug, Clone)]
pub struct GraphQLError {
    /// Error message.
    pub message: String,
    /// Source locations in the query.
    pub locations: Vec<GraphQLErrorLocation>,
    /// Path to the error in the response.
    pub path: Vec<serde_json::Value>,
}

/// Location in a GraphQL query where an error occurred.
#[derive(Debug, Clone)]
pub struct GraphQLErrorLocation {
    /// Line number (1-indexed).
    pub line: i64,
    /// Column number (1-indexed).
    pub column: i64,
}

fn format_graphql_errors(errors: &[GraphQLError]) -> String {
    if errors.is_empty() {
        return "(no error details provided)".to_string();
    }

    errors
        .iter()
        .enumerate()
        .map(|(i, e)| {
            let mut parts = Vec::new();

            if !e.message.is_empty() {
                parts.push(e.message.clone());
            }

            if !e.path.is_empty() {
                let path_str = e
                    .path
                    .iter()
                    .map(|p| match p {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(".");
                parts.push(format!("path: {path_str}"));
            }

            if let Some(loc) = e.locations.first() {
                parts.push(format!("at line {}:{}", loc.line, loc.column));
            }

            if parts.is_empty() {
                format!("[error {}]: (no details)", i + 1)
            } else {
                parts.join(" ")
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Truncate text for logs and error messages.
pub(crate) fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
