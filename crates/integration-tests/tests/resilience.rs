//! Integration tests for transport rotation, rate limiting and timeouts.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use pic_finder_core::Credentials;
use pic_finder_integration_tests::{
    API_BASE, TEST_TOKEN, connected_client, direct_config, recording_sink, rest_product,
    shop_domain,
};
use pic_finder_shopify::{
    ApiFlavor, ClientConfig, MemoryStore, Notice, ProxyEncoding, ShopifyClient, ShopifyError,
    Transport,
};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn rest_config_with(proxies: Vec<Transport>) -> ClientConfig {
    ClientConfig {
        api_flavor: ApiFlavor::Rest,
        proxies,
        ..direct_config()
    }
}

fn failing_proxy(server: &MockServer) -> Transport {
    Transport::proxy(format!("{}/fetch?url=", server.uri()), ProxyEncoding::Percent)
}

// =============================================================================
// Transport Rotation
// =============================================================================

#[tokio::test]
async fn test_failing_proxy_falls_through_to_direct() {
    let upstream = MockServer::start().await;
    let proxy = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fetch"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .expect(1)
        .mount(&proxy)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{API_BASE}/products.json")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"products": [rest_product(1, "One")]})),
        )
        .expect(1)
        .mount(&upstream)
        .await;

    let client = connected_client(
        rest_config_with(vec![failing_proxy(&proxy), Transport::Direct]),
        &upstream,
    );
    let page = client.fetch_products(1, 10, "").await.unwrap();

    assert_eq!(page.products.len(), 1);
    // The working transport stays current for later calls
    assert_eq!(client.transports().current_index(), 1);
}

#[tokio::test]
async fn test_proxy_receives_encoded_upstream_url() {
    let upstream = MockServer::start().await;
    let proxy = MockServer::start().await;
    let expected = format!(
        "http://{}{API_BASE}/products.json?limit=5",
        shop_domain(&upstream)
    );
    Mock::given(method("GET"))
        .and(path("/fetch"))
        .and(query_param("url", expected.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"products": []})))
        .expect(1)
        .mount(&proxy)
        .await;

    let client = connected_client(rest_config_with(vec![failing_proxy(&proxy)]), &upstream);
    let page = client.fetch_products(1, 5, "").await.unwrap();

    assert!(page.is_empty());
}

#[tokio::test]
async fn test_all_transports_failing_reports_each_attempt() {
    let upstream = MockServer::start().await;
    let proxy = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .expect(1)
        .mount(&proxy)
        .await;

    let client = connected_client(
        rest_config_with(vec![Transport::Direct, failing_proxy(&proxy)]),
        &upstream,
    );
    let err = client.fetch_products(1, 10, "").await.unwrap_err();

    assert!(err.is_retryable());
    match err {
        ShopifyError::AllTransportsExhausted { failures, .. } => {
            assert_eq!(failures.len(), 2);
            assert_eq!(failures.first().map(|f| f.transport.as_str()), Some("direct"));
        }
        other => panic!("expected AllTransportsExhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn test_authoritative_rejection_does_not_rotate() {
    let upstream = MockServer::start().await;
    let proxy = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"errors": "[API] Invalid API key or access token"})),
        )
        .expect(1)
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&proxy)
        .await;

    let client = connected_client(
        rest_config_with(vec![Transport::Direct, failing_proxy(&proxy)]),
        &upstream,
    );
    let err = client.fetch_products(1, 10, "").await.unwrap_err();

    assert!(matches!(err, ShopifyError::UpstreamRejected { status: 401, .. }));
    assert_eq!(client.transports().current_index(), 0);
}

// =============================================================================
// Rate Limiting
// =============================================================================

#[tokio::test]
async fn test_rate_limited_calls_back_off_and_succeed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"products": [rest_product(1, "One")]})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (sink, seen) = recording_sink();
    let client = ShopifyClient::with_notice_sink(
        rest_config_with(vec![Transport::Direct]),
        Arc::new(MemoryStore::new()),
        sink,
    )
    .unwrap();
    client
        .credentials()
        .save(&Credentials::new(shop_domain(&server), TEST_TOKEN))
        .unwrap();

    let page = client.fetch_products(1, 10, "").await.unwrap();

    assert_eq!(page.products.len(), 1);
    assert_eq!(seen.lock().unwrap().as_slice(), &[Notice::RateLimited]);
}

#[tokio::test]
async fn test_rate_limit_retries_are_bounded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&server)
        .await;

    let config = ClientConfig {
        max_rate_limit_retries: 2,
        ..rest_config_with(vec![Transport::Direct])
    };
    let client = connected_client(config, &server);
    let err = client.fetch_products(1, 10, "").await.unwrap_err();

    assert!(matches!(err, ShopifyError::RateLimited { retries: 2 }));
}

// =============================================================================
// Timeouts
// =============================================================================

#[tokio::test]
async fn test_whole_call_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"products": []}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let config = ClientConfig {
        call_timeout: Duration::from_millis(200),
        request_timeout: Duration::from_secs(5),
        ..rest_config_with(vec![Transport::Direct])
    };
    let client = connected_client(config, &server);
    let err = client.fetch_products(1, 10, "").await.unwrap_err();

    assert!(matches!(err, ShopifyError::Timeout(_)));
}

#[tokio::test]
async fn test_calls_without_credentials_fail_fast() {
    let client = ShopifyClient::in_memory(direct_config()).unwrap();
    let err = client.fetch_products(1, 10, "").await.unwrap_err();

    assert!(matches!(err, ShopifyError::CredentialsMissing));
}
