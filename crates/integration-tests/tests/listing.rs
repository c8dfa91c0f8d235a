//! Integration tests for product listing, search and cursor pagination.

#![allow(clippy::unwrap_used)]

use pic_finder_integration_tests::{
    API_BASE, TEST_TOKEN, connected_client, direct_config, graphql_page, next_link,
    recording_sink, rest_product, shop_domain,
};
use pic_finder_core::Credentials;
use pic_finder_shopify::{
    ApiFlavor, ClientConfig, GetProducts, MemoryStore, Notice, SearchMode, ShopifyClient,
    get_products,
};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{
    body_partial_json, header, method, path, query_param, query_param_is_missing,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn rest_config() -> ClientConfig {
    ClientConfig {
        api_flavor: ApiFlavor::Rest,
        ..direct_config()
    }
}

fn products_path() -> String {
    format!("{API_BASE}/products.json")
}

fn graphql_path() -> String {
    format!("{API_BASE}/graphql.json")
}

// =============================================================================
// REST Listing
// =============================================================================

#[tokio::test]
async fn test_rest_first_page_records_next_cursor() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(products_path()))
        .and(query_param("limit", "2"))
        .and(header("X-Shopify-Access-Token", TEST_TOKEN))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Link", next_link(&server, 2, "cursor-two").as_str())
                .set_body_json(json!({
                    "products": [rest_product(1, "Zippo Classic"), rest_product(2, "Brass Lighter")]
                })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = connected_client(rest_config(), &server);
    let page = client.fetch_products(1, 2, "").await.unwrap();

    assert_eq!(page.products.len(), 2);
    assert!(page.has_next_page);
    assert_eq!(page.next_page_cursor.as_deref(), Some("cursor-two"));
    assert_eq!(
        page.products.first().and_then(|p| p.image.as_ref()).map(|i| i.url.as_str()),
        Some("https://cdn.example.com/1.jpg")
    );
    assert_eq!(
        client.pagination().resolve_cursor(2, SearchMode::Listing).await.as_deref(),
        Some("cursor-two")
    );
}

#[tokio::test]
async fn test_rest_walks_cursor_chain_to_requested_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(products_path()))
        .and(query_param_is_missing("page_info"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Link", next_link(&server, 1, "c2").as_str())
                .set_body_json(json!({"products": [rest_product(1, "One")]})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(products_path()))
        .and(query_param("page_info", "c2"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Link", next_link(&server, 1, "c3").as_str())
                .set_body_json(json!({"products": [rest_product(2, "Two")]})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(products_path()))
        .and(query_param("page_info", "c3"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"products": [rest_product(3, "Three")]})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = connected_client(rest_config(), &server);
    let page = client.fetch_products(3, 1, "").await.unwrap();

    assert_eq!(page.products.len(), 1);
    assert_eq!(page.products.first().map(|p| p.title.as_str()), Some("Three"));
    assert!(!page.has_next_page);
    assert!(page.next_page_cursor.is_none());
}

#[tokio::test]
async fn test_rest_page_past_the_end_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(products_path()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"products": [rest_product(1, "Only")]})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = connected_client(rest_config(), &server);
    let page = client.fetch_products(4, 10, "").await.unwrap();

    assert!(page.is_empty());
    assert!(!page.has_next_page);
}

#[tokio::test]
async fn test_rest_search_sends_query_then_cursor_only() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(products_path()))
        .and(query_param("query", "zippo lighter"))
        .and(query_param_is_missing("page_info"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Link", next_link(&server, 1, "s2").as_str())
                .set_body_json(json!({"products": [rest_product(1, "Zippo Lighter")]})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(products_path()))
        .and(query_param("page_info", "s2"))
        .and(query_param_is_missing("query"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"products": [rest_product(2, "Zippo Case")]})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = connected_client(rest_config(), &server);
    let first = client.fetch_products(1, 1, "zippo lighter").await.unwrap();
    let second = client.fetch_products(2, 1, "zippo lighter").await.unwrap();

    assert_eq!(first.products.len(), 1);
    assert_eq!(second.products.first().map(|p| p.title.as_str()), Some("Zippo Case"));
    // Listing cursors are untouched by the search
    assert!(client.pagination().resolve_cursor(2, SearchMode::Listing).await.is_none());
}

#[tokio::test]
async fn test_search_first_page_drops_stale_search_cursors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(products_path()))
        .and(query_param("query", "zippo"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Link", next_link(&server, 1, "fresh-2").as_str())
                .set_body_json(json!({"products": [rest_product(1, "Zippo")]})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = connected_client(rest_config(), &server);
    let pagination = client.pagination();
    pagination.sync_search_query("zippo").await;
    pagination.store_cursor(2, Some("stale-2".to_string()), SearchMode::Search).await;
    pagination.store_cursor(3, Some("stale-3".to_string()), SearchMode::Search).await;
    pagination.store_cursor(2, Some("listing-2".to_string()), SearchMode::Listing).await;

    client.fetch_products(1, 1, "zippo").await.unwrap();

    let cursors = pagination.snapshot().await;
    assert_eq!(cursors.search.len(), 1);
    assert_eq!(cursors.search.get(&2).map(String::as_str), Some("fresh-2"));
    assert_eq!(cursors.regular.get(&2).map(String::as_str), Some("listing-2"));
}

#[tokio::test]
async fn test_empty_search_raises_notice() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(products_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"products": []})))
        .mount(&server)
        .await;

    let (sink, seen) = recording_sink();
    let client =
        ShopifyClient::with_notice_sink(rest_config(), Arc::new(MemoryStore::new()), sink).unwrap();
    client
        .credentials()
        .save(&Credentials::new(shop_domain(&server), TEST_TOKEN))
        .unwrap();

    let page = client.fetch_products(1, 10, " nothing ").await.unwrap();

    assert!(page.is_empty());
    assert_eq!(
        seen.lock().unwrap().as_slice(),
        &[Notice::NoSearchResults {
            query: "nothing".to_string()
        }]
    );
}

#[tokio::test]
async fn test_missing_products_array_is_invalid_shape() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(products_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .mount(&server)
        .await;

    let client = connected_client(rest_config(), &server);
    let err = client.fetch_products(1, 10, "").await.unwrap_err();

    assert!(matches!(
        err,
        pic_finder_shopify::ShopifyError::InvalidResponseShape(_)
    ));
}

// =============================================================================
// Caching
// =============================================================================

#[tokio::test]
async fn test_first_page_is_served_from_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(products_path()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"products": [rest_product(1, "Cached")]})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = connected_client(rest_config(), &server);
    let first = client.fetch_products(1, 10, "").await.unwrap();
    let second = client.fetch_products(1, 10, "").await.unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_different_query_is_not_served_from_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(products_path()))
        .and(query_param("query", "mugs"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"products": [rest_product(1, "Mug")]})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(products_path()))
        .and(query_param("query", "hats"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"products": [rest_product(2, "Hat")]})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = connected_client(rest_config(), &server);
    let mugs = client.fetch_products(1, 10, "mugs").await.unwrap();
    let hats = client.fetch_products(1, 10, "hats").await.unwrap();

    assert_eq!(mugs.products.first().map(|p| p.title.as_str()), Some("Mug"));
    assert_eq!(hats.products.first().map(|p| p.title.as_str()), Some("Hat"));
}

#[tokio::test]
async fn test_refresh_forces_network_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(products_path()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"products": [rest_product(1, "Fresh")]})),
        )
        .expect(2)
        .mount(&server)
        .await;

    let client = connected_client(rest_config(), &server);
    client.fetch_products(1, 10, "").await.unwrap();
    client.refresh(SearchMode::Listing).await;
    client.fetch_products(1, 10, "").await.unwrap();
}

// =============================================================================
// GraphQL Listing
// =============================================================================

#[tokio::test]
async fn test_graphql_listing_and_second_page() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(graphql_path()))
        .and(body_partial_json(json!({
            "operationName": "GetProducts",
            "variables": {"first": 2, "after": null},
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(graphql_page(&[(1, "One"), (2, "Two")], Some("cursor-2"))),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(graphql_path()))
        .and(body_partial_json(json!({"variables": {"first": 2, "after": "cursor-2"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(graphql_page(&[(3, "Three")], None)))
        .expect(1)
        .mount(&server)
        .await;

    let client = connected_client(direct_config(), &server);
    let first = client.fetch_products(1, 2, "").await.unwrap();
    let second = client.fetch_products(2, 2, "").await.unwrap();

    assert_eq!(first.products.len(), 2);
    assert_eq!(first.next_page_cursor.as_deref(), Some("cursor-2"));
    assert_eq!(
        first.products.first().and_then(|p| p.graphql_id.as_deref()),
        Some("gid://shopify/Product/1")
    );
    assert_eq!(second.products.len(), 1);
    assert!(!second.has_next_page);
}

#[tokio::test]
async fn test_graphql_search_combines_query_and_cursor() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(graphql_path()))
        .and(body_partial_json(json!({"variables": {"query": "zippo", "after": null}})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(graphql_page(&[(1, "Zippo")], Some("z2"))),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(graphql_path()))
        .and(body_partial_json(json!({"variables": {"query": "zippo", "after": "z2"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(graphql_page(&[(2, "Zippo Two")], None)))
        .expect(1)
        .mount(&server)
        .await;

    let client = connected_client(direct_config(), &server);
    let page = client.fetch_products(2, 1, "zippo").await.unwrap();

    assert_eq!(page.products.first().map(|p| p.title.as_str()), Some("Zippo Two"));
}

#[tokio::test]
async fn test_graphql_errors_are_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(graphql_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [{"message": "Throttled"}]
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(graphql_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(graphql_page(&[(1, "One")], None)))
        .expect(1)
        .mount(&server)
        .await;

    let client = connected_client(direct_config(), &server);
    let err = client.fetch_products(1, 10, "").await.unwrap_err();
    assert!(matches!(err, pic_finder_shopify::ShopifyError::GraphQL(_)));

    let page = client.fetch_products(1, 10, "").await.unwrap();
    assert_eq!(page.products.len(), 1);
}

#[tokio::test]
async fn test_execute_graphql_returns_typed_data() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(graphql_path()))
        .and(header("X-Shopify-Access-Token", TEST_TOKEN))
        .and(body_partial_json(json!({
            "operationName": "GetProducts",
            "variables": {"first": 5, "query": "zippo"},
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(graphql_page(&[(4, "Zippo")], Some("z5"))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = connected_client(direct_config(), &server);
    let data = client
        .execute_graphql::<GetProducts>(get_products::Variables {
            first: 5,
            after: None,
            query: Some("zippo".to_string()),
        })
        .await
        .unwrap();

    assert_eq!(data.products.edges.len(), 1);
    assert!(data.products.page_info.has_next_page);
    assert_eq!(data.products.page_info.end_cursor.as_deref(), Some("z5"));
}

#[tokio::test]
async fn test_execute_graphql_surfaces_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(graphql_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [{"message": "Field 'bogus' doesn't exist"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = connected_client(direct_config(), &server);
    let err = client
        .execute_graphql::<GetProducts>(get_products::Variables {
            first: 1,
            after: None,
            query: None,
        })
        .await
        .unwrap_err();

    match err {
        pic_finder_shopify::ShopifyError::GraphQL(errors) => {
            assert_eq!(errors.len(), 1);
            assert!(errors.first().unwrap().message.contains("bogus"));
        }
        other => panic!("unexpected error: {other}"),
    }
}
