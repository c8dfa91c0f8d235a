//! Integration tests for Pic Finder.
//!
//! Every test runs against a local `wiremock` server standing in for the
//! Admin API, so no store or network access is needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p pic-finder-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `listing` - product listing, search and cursor walks
//! - `resilience` - transport rotation, rate limiting, timeouts
//! - `connection` - connect/disconnect and mutations
//! - `relay` - relay routes and client-through-relay calls

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pic_finder_core::Credentials;
use pic_finder_relay::{RelayConfig, RelayState, router};
use pic_finder_shopify::{ClientConfig, Notice, SharedNoticeSink, ShopifyClient, Transport};
use serde_json::{Value, json};
use wiremock::MockServer;

/// Access token stored by [`connected_client`].
pub const TEST_TOKEN: &str = "shpat_integration";

/// Admin API base path for the default version.
pub const API_BASE: &str = "/admin/api/2025-04";

/// Domain under which `server` is reachable.
#[must_use]
pub fn shop_domain(server: &MockServer) -> String {
    server.address().to_string()
}

/// Configuration calling the mock server directly over plain HTTP.
#[must_use]
pub fn direct_config() -> ClientConfig {
    ClientConfig {
        upstream_scheme: "http".to_string(),
        proxies: vec![Transport::Direct],
        request_timeout: Duration::from_secs(2),
        call_timeout: Duration::from_secs(10),
        backoff_base: Duration::from_millis(1),
        ..ClientConfig::default()
    }
}

/// Client with credentials for `server` already stored.
///
/// # Panics
///
/// Panics if the client cannot be built.
#[must_use]
pub fn connected_client(config: ClientConfig, server: &MockServer) -> ShopifyClient {
    let client = ShopifyClient::in_memory(config).expect("client should build");
    client
        .credentials()
        .save(&Credentials::new(shop_domain(server), TEST_TOKEN))
        .expect("memory store accepts credentials");
    client
}

/// Notice sink recording everything it receives.
#[must_use]
pub fn recording_sink() -> (SharedNoticeSink, Arc<Mutex<Vec<Notice>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink_seen = Arc::clone(&seen);
    let sink: SharedNoticeSink = Arc::new(move |notice: Notice| {
        if let Ok(mut seen) = sink_seen.lock() {
            seen.push(notice);
        }
    });
    (sink, seen)
}

/// A `products.json` entry.
#[must_use]
pub fn rest_product(id: i64, title: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "body_html": format!("<p>{title}</p>"),
        "handle": title.to_lowercase().replace(' ', "-"),
        "admin_graphql_api_id": format!("gid://shopify/Product/{id}"),
        "image": {"id": id * 10, "src": format!("https://cdn.example.com/{id}.jpg"), "alt": null},
    })
}

/// `Link` header pointing at the next page.
#[must_use]
pub fn next_link(server: &MockServer, limit: u32, cursor: &str) -> String {
    format!(
        "<http://{}{API_BASE}/products.json?limit={limit}&page_info={cursor}>; rel=\"next\"",
        shop_domain(server)
    )
}

/// A `GetProducts` response body.
#[must_use]
pub fn graphql_page(products: &[(i64, &str)], end_cursor: Option<&str>) -> Value {
    let edges: Vec<Value> = products
        .iter()
        .map(|(id, title)| {
            json!({
                "cursor": format!("cursor-{id}"),
                "node": {
                    "id": format!("gid://shopify/Product/{id}"),
                    "title": title,
                    "description": "",
                    "handle": null,
                    "images": {"edges": [{"node": {
                        "id": format!("gid://shopify/ProductImage/{id}"),
                        "url": format!("https://cdn.example.com/{id}.jpg"),
                        "altText": null,
                    }}]},
                },
            })
        })
        .collect();
    json!({
        "data": {
            "products": {
                "pageInfo": {
                    "hasNextPage": end_cursor.is_some(),
                    "hasPreviousPage": false,
                    "startCursor": null,
                    "endCursor": end_cursor,
                },
                "edges": edges,
            }
        }
    })
}

/// Relay configuration forwarding to plain-HTTP upstreams.
#[must_use]
pub fn relay_config() -> RelayConfig {
    RelayConfig {
        upstream_scheme: "http".to_string(),
        upstream_timeout: Duration::from_secs(2),
        ..RelayConfig::default()
    }
}

/// Serve the relay on an ephemeral port and return its address.
///
/// # Panics
///
/// Panics if the listener cannot be bound.
pub async fn spawn_relay(config: RelayConfig) -> SocketAddr {
    let state = RelayState::new(config).expect("relay client should build");
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("listener address");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router(state)).await;
    });
    addr
}
