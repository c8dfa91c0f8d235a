//! Relay handlers.
//!
//! `POST /api/shopify-proxy` accepts a [`RelayRequest`], calls the Admin API
//! with the supplied token and answers with the upstream status and a
//! [`RelayResponse`] envelope.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use pic_finder_core::{RelayRequest, RelayResponse, upstream_url};
use reqwest::{Method, header::CONTENT_TYPE};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

use crate::RelayState;
use crate::error::{RelayError, Result};

/// User agent sent to the Admin API.
pub const USER_AGENT: &str = "DualPicFinder/1.0";

/// Upstream headers copied into the envelope, matched by exact name or prefix.
const PASSTHROUGH_EXACT: &[&str] = &["link", "content-type", "date"];
const PASSTHROUGH_PREFIX: &str = "x-shopify";

/// Forward a relay envelope to the Admin API.
#[instrument(skip(state, body))]
pub async fn forward(State(state): State<RelayState>, body: Bytes) -> Result<Response> {
    let request = parse_request(&body)?;

    let missing = request.missing_fields();
    if !missing.is_empty() {
        return Err(RelayError::MissingParameters(missing));
    }

    let method = Method::from_bytes(request.method_or_default().as_bytes())
        .map_err(|e| RelayError::BadRequest(format!("Invalid method: {e}")))?;
    let url = upstream_url(
        &state.config.upstream_scheme,
        &request.shop_domain,
        &state.config.api_version,
        &request.target_endpoint,
    );
    info!(%method, endpoint = %request.target_endpoint, "Forwarding request");

    let mut builder = state
        .http
        .request(method.clone(), &url)
        .header("X-Shopify-Access-Token", request.access_token.trim())
        .header(CONTENT_TYPE, "application/json")
        .timeout(state.config.upstream_timeout);
    if method != Method::GET
        && let Some(payload) = &request.body
    {
        builder = builder.json(payload);
    }

    let upstream_error = |source: reqwest::Error| RelayError::Upstream {
        endpoint: request.target_endpoint.clone(),
        source,
    };
    let upstream = builder.send().await.map_err(upstream_error)?;

    let status = upstream.status();
    let mut headers = passthrough_headers(upstream.headers());
    headers.insert("x-proxy-status".to_string(), "success".to_string());
    headers.insert(
        "x-proxy-shopify-status".to_string(),
        status.as_u16().to_string(),
    );

    let is_json = headers
        .get("content-type")
        .is_some_and(|ct| ct.contains("application/json"));
    let text = upstream.text().await.map_err(upstream_error)?;
    let data = if is_json {
        serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text))
    } else {
        serde_json::Value::String(text)
    };

    debug!(status = status.as_u16(), "Upstream responded");

    let envelope = RelayResponse {
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or_default().to_string(),
        headers,
        data,
    };
    Ok((status, Json(envelope)).into_response())
}

/// Any method other than POST on the relay endpoint.
pub async fn method_not_allowed() -> RelayError {
    RelayError::MethodNotAllowed
}

/// Connectivity check payload.
#[derive(Debug, Serialize)]
pub struct TestReport {
    pub status: &'static str,
    pub message: &'static str,
    pub timestamp: String,
    pub environment: String,
    pub runtime: &'static str,
}

/// `GET /api/test`.
pub async fn api_test(State(state): State<RelayState>) -> Json<TestReport> {
    Json(TestReport {
        status: "ok",
        message: "API is working correctly",
        timestamp: chrono::Utc::now().to_rfc3339(),
        environment: state
            .config
            .sentry_environment
            .clone()
            .unwrap_or_else(|| "development".to_string()),
        runtime: "rust",
    })
}

/// Liveness health check endpoint.
pub async fn health() -> &'static str {
    "ok"
}

fn parse_request(body: &[u8]) -> Result<RelayRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(RelayRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| RelayError::BadRequest(format!("Invalid JSON: {e}")))
}

fn passthrough_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter(|(name, _)| {
            let name = name.as_str();
            PASSTHROUGH_EXACT.contains(&name) || name.starts_with(PASSTHROUGH_PREFIX)
        })
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}
