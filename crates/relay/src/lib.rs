//! Pic Finder Relay - same-origin forwarder for the Shopify Admin API.
//!
//! The browser cannot call the Admin API directly (CORS), so the client
//! posts a [`RelayRequest`](pic_finder_core::RelayRequest) here and the relay
//! makes the call server-side.
//!
//! # Routes
//!
//! - `POST /api/shopify-proxy` - forward one request
//! - `GET /api/test` - connectivity check
//! - `GET /health` - liveness

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod proxy;

use std::sync::Arc;

use axum::{
    Router,
    http::{HeaderName, Method, header},
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::{ConfigError, RelayConfig};
pub use error::RelayError;

/// Shared handler state.
#[derive(Clone)]
pub struct RelayState {
    http: reqwest::Client,
    config: Arc<RelayConfig>,
}

impl RelayState {
    /// Build state with a pooled HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: RelayConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(proxy::USER_AGENT)
            .build()?;
        Ok(Self {
            http,
            config: Arc::new(config),
        })
    }

    /// Relay configuration.
    #[must_use]
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }
}

/// Build the relay router.
pub fn router(state: RelayState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-requested-with"),
        ]);

    Router::new()
        .route("/health", get(proxy::health))
        .route("/api/test", get(proxy::api_test))
        .route(
            "/api/shopify-proxy",
            post(proxy::forward).fallback(proxy::method_not_allowed),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
