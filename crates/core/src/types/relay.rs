//! Same-origin relay envelope.
//!
//! The client posts a [`RelayRequest`] to the relay instead of calling the
//! Admin API itself; the relay answers with a [`RelayResponse`] that mirrors
//! the upstream status, selected headers and body.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::credential::clean_domain;

/// Build the Admin API URL for an endpoint.
///
/// `domain` may carry a scheme or trailing slash; `endpoint` may start with `/`.
#[must_use]
pub fn upstream_url(scheme: &str, domain: &str, api_version: &str, endpoint: &str) -> String {
    format!(
        "{scheme}://{}/admin/api/{api_version}/{}",
        clean_domain(domain),
        endpoint.trim_start_matches('/')
    )
}

/// Request body accepted by the relay.
///
/// Missing fields deserialize as empty so the relay can answer with a
/// descriptive 400 instead of a deserialization rejection.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayRequest {
    /// Store domain.
    #[serde(default)]
    pub shop_domain: String,
    /// Admin API access token.
    #[serde(default)]
    pub access_token: String,
    /// Endpoint below `/admin/api/{version}/` (e.g. `products.json?limit=50`).
    #[serde(default)]
    pub target_endpoint: String,
    /// HTTP method to use upstream (defaults to GET).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// JSON body for non-GET requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

impl RelayRequest {
    /// Names of required fields that are empty.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.shop_domain.trim().is_empty() {
            missing.push("shopDomain");
        }
        if self.access_token.trim().is_empty() {
            missing.push("accessToken");
        }
        if self.target_endpoint.trim().is_empty() {
            missing.push("targetEndpoint");
        }
        missing
    }

    /// Upstream method, uppercased, defaulting to GET.
    #[must_use]
    pub fn method_or_default(&self) -> String {
        self.method
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .map_or_else(|| "GET".to_string(), str::to_uppercase)
    }
}

impl std::fmt::Debug for RelayRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayRequest")
            .field("shop_domain", &self.shop_domain)
            .field("access_token", &"[REDACTED]")
            .field("target_endpoint", &self.target_endpoint)
            .field("method", &self.method)
            .field("body", &self.body.is_some())
            .finish()
    }
}

/// Response envelope returned by the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayResponse {
    /// Upstream HTTP status.
    pub status: u16,
    /// Upstream status text.
    #[serde(default)]
    pub status_text: String,
    /// Selected upstream headers (lowercased names).
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Upstream body (JSON, or a string for non-JSON bodies).
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Error body returned by the relay when it cannot produce an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayErrorBody {
    /// Short error category.
    pub error: String,
    /// Human-readable detail.
    pub message: String,
    /// Error type name, when the failure came from the upstream fetch.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Target endpoint, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_url_normalizes_domain_and_endpoint() {
        assert_eq!(
            upstream_url("https", "https://shop.myshopify.com/", "2025-04", "/products.json"),
            "https://shop.myshopify.com/admin/api/2025-04/products.json"
        );
    }

    #[test]
    fn test_missing_fields_on_empty_body() {
        let req: RelayRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(
            req.missing_fields(),
            vec!["shopDomain", "accessToken", "targetEndpoint"]
        );
    }

    #[test]
    fn test_method_defaults_to_get() {
        let req = RelayRequest {
            method: Some("post".to_string()),
            ..RelayRequest::default()
        };
        assert_eq!(req.method_or_default(), "POST");
        assert_eq!(RelayRequest::default().method_or_default(), "GET");
    }

    #[test]
    fn test_request_debug_redacts_token() {
        let req = RelayRequest {
            shop_domain: "a.myshopify.com".to_string(),
            access_token: "shpat_hidden".to_string(),
            target_endpoint: "shop.json".to_string(),
            method: None,
            body: None,
        };
        assert!(!format!("{req:?}").contains("shpat_hidden"));
    }

    #[test]
    fn test_response_envelope_wire_names() {
        let json = r#"{"status":200,"statusText":"OK","headers":{"link":"<x>"},"data":{"products":[]}}"#;
        let resp: RelayResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.status_text, "OK");
        assert_eq!(resp.headers.get("link").map(String::as_str), Some("<x>"));
    }
}
