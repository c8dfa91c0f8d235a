//! Relay error handling with Sentry integration.
//!
//! Handlers return `Result<T, RelayError>`; every error answers with a JSON
//! [`RelayErrorBody`], and upstream failures are captured to Sentry first.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use pic_finder_core::RelayErrorBody;
use thiserror::Error;

/// Relay-level error type.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Required request fields are missing or empty.
    #[error("Missing required parameters: {}", .0.join(", "))]
    MissingParameters(Vec<&'static str>),

    /// The request body or method could not be used.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Only POST is accepted on the relay endpoint.
    #[error("Method not allowed. Use POST.")]
    MethodNotAllowed,

    /// The store could not be reached.
    #[error("Error sending request to Shopify API: {source}")]
    Upstream {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
}

impl RelayError {
    fn kind(&self) -> Option<String> {
        match self {
            Self::Upstream { source, .. } if source.is_timeout() => Some("TimeoutError".to_string()),
            Self::Upstream { source, .. } if source.is_connect() => Some("ConnectError".to_string()),
            Self::Upstream { .. } => Some("FetchError".to_string()),
            _ => None,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        // Capture upstream failures to Sentry
        if matches!(self, Self::Upstream { .. }) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Relay error"
            );
        }

        let status = match &self {
            Self::MissingParameters(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Upstream { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match &self {
            Self::MissingParameters(missing) => RelayErrorBody {
                error: "Missing required parameters".to_string(),
                message: format!(
                    "shopDomain, accessToken, and targetEndpoint are required (missing: {})",
                    missing.join(", ")
                ),
                kind: None,
                endpoint: None,
            },
            Self::BadRequest(message) => RelayErrorBody {
                error: "Bad request".to_string(),
                message: message.clone(),
                kind: None,
                endpoint: None,
            },
            Self::MethodNotAllowed => RelayErrorBody {
                error: self.to_string(),
                message: "The relay only accepts POST requests".to_string(),
                kind: None,
                endpoint: None,
            },
            Self::Upstream { endpoint, source } => RelayErrorBody {
                error: "Error sending request to Shopify API".to_string(),
                message: source.to_string(),
                kind: self.kind(),
                endpoint: Some(endpoint.clone()),
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `RelayError`.
pub type Result<T> = std::result::Result<T, RelayError>;
