//! Shopify Admin API client.
//!
//! [`ShopifyClient`] is a cheap-to-clone handle over shared state: the
//! credential store, the request executor (with its transport selector), the
//! response cache and the pagination engine. Product listing lives in
//! `products.rs`, mutations in `mutations.rs`.

mod conversions;
mod mutations;
mod products;
pub mod queries;

pub use products::{SearchRelevance, analyze_search_results};

use std::future::Future;
use std::sync::Arc;

use graphql_client::{GraphQLQuery, Response};
use pic_finder_core::Credentials;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::cache::ResponseCache;
use crate::config::ClientConfig;
use crate::credentials::{CredentialStore, KeyValueStore, MemoryStore};
use crate::executor::{ApiRequest, ApiResponse, RequestExecutor, RetryPolicy};
use crate::notice::{SharedNoticeSink, TracingNotices};
use crate::pagination::{PaginationEngine, SearchMode};
use crate::transport::TransportSelector;
use crate::{GraphQLError, GraphQLErrorLocation, ShopifyError, truncate};

// =============================================================================
// ShopInfo
// =============================================================================

/// Store details returned by `shop.json`, used to validate a connection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ShopInfo {
    pub id: Option<i64>,
    pub name: String,
    pub email: Option<String>,
    pub domain: Option<String>,
    pub myshopify_domain: Option<String>,
    pub currency: Option<String>,
    pub plan_name: Option<String>,
}

// =============================================================================
// ShopifyClient
// =============================================================================

/// Client for the Shopify Admin API.
///
/// Owns all of its mutable state, so independent clients never share a cache,
/// cursor table or transport index.
#[derive(Clone)]
pub struct ShopifyClient {
    inner: Arc<ShopifyClientInner>,
}

struct ShopifyClientInner {
    config: ClientConfig,
    executor: RequestExecutor,
    cache: ResponseCache,
    pagination: PaginationEngine,
    notices: SharedNoticeSink,
}

impl std::fmt::Debug for ShopifyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopifyClient")
            .field("config", &self.inner.config)
            .field("executor", &self.inner.executor)
            .field("cache", &self.inner.cache)
            .finish_non_exhaustive()
    }
}

impl ShopifyClient {
    /// Create a client persisting credentials in `store`.
    ///
    /// Notices go to the tracing log.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: ClientConfig, store: Arc<dyn KeyValueStore>) -> Result<Self, ShopifyError> {
        Self::with_notice_sink(config, store, Arc::new(TracingNotices))
    }

    /// Create a client with credentials held in memory only.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn in_memory(config: ClientConfig) -> Result<Self, ShopifyError> {
        Self::new(config, Arc::new(MemoryStore::new()))
    }

    /// Create a client delivering user notices to `notices`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_notice_sink(
        config: ClientConfig,
        store: Arc<dyn KeyValueStore>,
        notices: SharedNoticeSink,
    ) -> Result<Self, ShopifyError> {
        let transports = TransportSelector::new(
            config.transports(),
            config.upstream_scheme.clone(),
            config.api_version.clone(),
        );
        let executor =
            RequestExecutor::new(CredentialStore::new(store), transports, Arc::clone(&notices))?;
        let cache = ResponseCache::new(config.cache_ttl, config.cache_capacity);

        Ok(Self {
            inner: Arc::new(ShopifyClientInner {
                config,
                executor,
                cache,
                pagination: PaginationEngine::new(),
                notices,
            }),
        })
    }

    /// Client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Stored credentials.
    #[must_use]
    pub fn credentials(&self) -> &CredentialStore {
        self.inner.executor.credentials()
    }

    /// Whether usable credentials are stored.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.credentials().has()
    }

    /// Response cache.
    #[must_use]
    pub fn cache(&self) -> &ResponseCache {
        &self.inner.cache
    }

    /// Cursor tables.
    #[must_use]
    pub fn pagination(&self) -> &PaginationEngine {
        &self.inner.pagination
    }

    /// Transport selector.
    #[must_use]
    pub fn transports(&self) -> &TransportSelector {
        self.inner.executor.transports()
    }

    pub(crate) fn notices(&self) -> &SharedNoticeSink {
        &self.inner.notices
    }

    /// Retry policy for idempotent reads.
    #[must_use]
    pub fn read_policy(&self) -> RetryPolicy {
        self.inner.config.retry_policy()
    }

    // =========================================================================
    // Connection
    // =========================================================================

    /// Validate a credential pair against `shop.json` without storing it.
    ///
    /// # Errors
    ///
    /// Returns `CredentialsMissing` for an incomplete pair, or the executor's
    /// error if the store cannot be reached or rejects the token.
    #[instrument(skip(self, credentials), fields(shop = %credentials.clean_domain()))]
    pub async fn test_connection(&self, credentials: &Credentials) -> Result<ShopInfo, ShopifyError> {
        if !credentials.is_complete() {
            return Err(ShopifyError::CredentialsMissing);
        }
        let request = ApiRequest::get("shop.json").with_credentials(credentials.clone());
        let policy = self.read_policy();
        let response = self
            .with_call_timeout(self.inner.executor.execute(&request, &policy))
            .await?;

        let shop = response.data.get("shop").cloned().ok_or_else(|| {
            ShopifyError::InvalidResponseShape("missing 'shop' in shop.json".to_string())
        })?;
        let shop: ShopInfo = serde_json::from_value(shop)
            .map_err(|e| ShopifyError::InvalidResponseShape(format!("malformed 'shop': {e}")))?;
        info!(shop = %shop.name, "Shopify connection verified");
        Ok(shop)
    }

    /// Validate and store credentials, replacing any previous connection.
    ///
    /// Nothing is stored if validation fails.
    ///
    /// # Errors
    ///
    /// Returns the validation error, or a storage error.
    pub async fn connect(&self, credentials: Credentials) -> Result<ShopInfo, ShopifyError> {
        let shop = self.test_connection(&credentials).await?;
        self.credentials().save(&credentials)?;
        self.inner.cache.invalidate(None).await;
        self.inner.pagination.clear(None).await;
        Ok(shop)
    }

    /// Forget the stored credentials and everything fetched with them.
    ///
    /// # Errors
    ///
    /// Returns an error if the credential store cannot be written.
    pub async fn disconnect(&self) -> Result<(), ShopifyError> {
        self.credentials().clear()?;
        self.inner.cache.invalidate(None).await;
        self.inner.pagination.clear(None).await;
        self.transports().reset();
        info!("Disconnected from Shopify");
        Ok(())
    }

    /// Drop cached responses and the cursors of `mode`, so the next fetch
    /// goes to the network.
    pub async fn refresh(&self, mode: SearchMode) {
        self.inner.cache.invalidate(None).await;
        self.inner.pagination.clear(Some(mode)).await;
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Execute a raw Admin API call.
    ///
    /// # Errors
    ///
    /// See [`RequestExecutor::execute`].
    pub async fn execute(
        &self,
        request: &ApiRequest,
        policy: &RetryPolicy,
    ) -> Result<ApiResponse, ShopifyError> {
        self.inner.executor.execute(request, policy).await
    }

    /// Execute a GraphQL operation against `graphql.json`.
    ///
    /// # Errors
    ///
    /// Returns `GraphQL` if the response carries errors, otherwise the
    /// executor's error.
    pub async fn execute_graphql<Q: GraphQLQuery>(
        &self,
        variables: Q::Variables,
    ) -> Result<Q::ResponseData, ShopifyError>
    where
        Q::Variables: serde::Serialize,
    {
        let request = graphql_request::<Q>(variables)?;
        let response = self.send_graphql(&request, &self.read_policy()).await?;
        parse_graphql::<Q>(&response.data)
    }

    /// Send a prepared `graphql.json` POST and fail on payload errors.
    ///
    /// A response that gets through is only returned if it carries no
    /// `errors`, so callers may cache it.
    pub(crate) async fn send_graphql(
        &self,
        request: &ApiRequest,
        policy: &RetryPolicy,
    ) -> Result<ApiResponse, ShopifyError> {
        let response = self.inner.executor.execute(request, policy).await?;
        check_graphql_errors(&response.data)?;
        Ok(response)
    }

    /// Run `operation` within the configured call timeout.
    pub(crate) async fn with_call_timeout<T, F>(&self, operation: F) -> Result<T, ShopifyError>
    where
        F: Future<Output = Result<T, ShopifyError>>,
    {
        let limit = self.inner.config.call_timeout;
        tokio::time::timeout(limit, operation).await.unwrap_or_else(|_| {
            warn!(timeout_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX), "Shopify call timed out");
            Err(ShopifyError::Timeout(limit))
        })
    }
}

/// Build the `graphql.json` POST for an operation.
pub(crate) fn graphql_request<Q: GraphQLQuery>(
    variables: Q::Variables,
) -> Result<ApiRequest, ShopifyError>
where
    Q::Variables: serde::Serialize,
{
    let body = serde_json::to_value(Q::build_query(variables))?;
    Ok(ApiRequest::post("graphql.json", body))
}

/// Fail with `GraphQL` if a payload carries errors.
pub(crate) fn check_graphql_errors(payload: &Value) -> Result<(), ShopifyError> {
    match payload.get("errors") {
        Some(Value::Array(errors)) if !errors.is_empty() => {
            let errors: Vec<graphql_client::Error> =
                serde_json::from_value(Value::Array(errors.clone()))?;
            Err(ShopifyError::GraphQL(convert_graphql_errors(errors)))
        }
        _ => Ok(()),
    }
}

/// Unwrap `data` from a GraphQL payload.
pub(crate) fn parse_graphql<Q: GraphQLQuery>(payload: &Value) -> Result<Q::ResponseData, ShopifyError> {
    let response: Response<Q::ResponseData> = match serde_json::from_value(payload.clone()) {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(
                error = %e,
                body = %truncate(&payload.to_string(), 500),
                "Failed to parse Shopify GraphQL response"
            );
            return Err(ShopifyError::Parse(e));
        }
    };

    if let Some(errors) = response.errors
        && !errors.is_empty()
    {
        tracing::debug!(errors = ?errors, "GraphQL errors in response");
        return Err(ShopifyError::GraphQL(convert_graphql_errors(errors)));
    }

    response.data.ok_or_else(|| {
        tracing::error!(
            body = %truncate(&payload.to_string(), 500),
            "Shopify GraphQL response has no data and no errors"
        );
        ShopifyError::InvalidResponseShape("No data in GraphQL response".to_string())
    })
}

fn convert_graphql_errors(errors: Vec<graphql_client::Error>) -> Vec<GraphQLError> {
    errors
        .into_iter()
        .map(|e| GraphQLError {
            message: e.message,
            locations: e.locations.map_or_else(Vec::new, |locs| {
                locs.into_iter()
                    .map(|l| GraphQLErrorLocation {
                        line: i64::from(l.line),
                        column: i64::from(l.column),
                    })
                    .collect()
            }),
            path: e.path.map_or_else(Vec::new, |p| {
                p.into_iter()
                    .map(|fragment| match fragment {
                        graphql_client::PathFragment::Key(s) => Value::String(s),
                        graphql_client::PathFragment::Index(i) => Value::Number(i.into()),
                    })
                    .collect()
            }),
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::queries::GetProducts;
    use super::*;

    #[test]
    fn test_graphql_request_body() {
        let request = graphql_request::<GetProducts>(super::queries::get_products::Variables {
            first: 50,
            after: None,
            query: Some("zippo".to_string()),
        })
        .unwrap();
        let body = request.body.unwrap();
        assert_eq!(request.endpoint, "graphql.json");
        assert_eq!(body["operationName"], "GetProducts");
        assert_eq!(body["variables"]["first"], 50);
        assert_eq!(body["variables"]["query"], "zippo");
        assert!(body["query"].as_str().unwrap().contains("sortKey: TITLE"));
    }

    #[test]
    fn test_graphql_errors_are_surfaced() {
        let payload = json!({
            "errors": [{"message": "Throttled", "locations": [{"line": 2, "column": 3}], "path": ["products"]}]
        });
        let err = check_graphql_errors(&payload).unwrap_err();
        assert_eq!(
            err.to_string(),
            "GraphQL errors: Throttled path: products at line 2:3"
        );
        assert!(matches!(
            parse_graphql::<GetProducts>(&payload),
            Err(ShopifyError::GraphQL(_))
        ));
    }

    #[test]
    fn test_graphql_without_data_is_invalid_shape() {
        assert!(matches!(
            parse_graphql::<GetProducts>(&json!({"data": null})),
            Err(ShopifyError::InvalidResponseShape(_))
        ));
        assert!(check_graphql_errors(&json!({"data": {}})).is_ok());
    }

    #[tokio::test]
    async fn test_call_timeout_is_distinct() {
        let config = ClientConfig {
            call_timeout: std::time::Duration::from_millis(10),
            ..ClientConfig::default()
        };
        let client = ShopifyClient::in_memory(config).unwrap();
        let result: Result<(), _> = client
            .with_call_timeout(async {
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(ShopifyError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_connect_rejects_incomplete_credentials() {
        let client = ShopifyClient::in_memory(ClientConfig::default()).unwrap();
        let err = client
            .connect(Credentials::new("", "token"))
            .await
            .unwrap_err();
        assert!(matches!(err, ShopifyError::CredentialsMissing));
        assert!(!client.is_connected());
    }
}
