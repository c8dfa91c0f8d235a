//! Product listing and search.

use pic_finder_core::{Product, ProductsPage};
use tracing::{debug, info, instrument, warn};

use crate::ShopifyError;
use crate::cache::{CacheEntry, graphql_cache_key, rest_cache_key};
use crate::config::ApiFlavor;
use crate::executor::ApiRequest;
use crate::notice::Notice;
use crate::pagination::{PageRequest, SearchMode};

use super::conversions::{convert_graphql_page, convert_rest_page};
use super::queries::{GetProducts, get_products};
use super::{ShopifyClient, graphql_request, parse_graphql};

/// How well a search page matches the search text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRelevance {
    /// Products whose title or description contains the text.
    pub matching: usize,
    /// Products on the page.
    pub total: usize,
    /// Up to five matching titles, or the first five titles if none match.
    pub sample_titles: Vec<String>,
}

/// Case-insensitive substring check of a search page against its text.
///
/// Diagnostic only; never used to filter results.
#[must_use]
pub fn analyze_search_results(products: &[Product], query: &str) -> SearchRelevance {
    let needle = query.trim().to_lowercase();
    let matches = |product: &&Product| {
        product.title.to_lowercase().contains(&needle)
            || product
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&needle))
    };

    let matching: Vec<&Product> = products.iter().filter(matches).collect();
    let sample_titles = if matching.is_empty() {
        products.iter().take(5).map(|p| p.title.clone()).collect()
    } else {
        matching.iter().take(5).map(|p| p.title.clone()).collect()
    };

    SearchRelevance {
        matching: matching.len(),
        total: products.len(),
        sample_titles,
    }
}

impl ShopifyClient {
    /// Fetch one page of products, optionally filtered by `query`.
    ///
    /// Pages are 1-based. Page 1 may be served from cache; later pages always
    /// go to the network. If the cursor for `page` is unknown, the preceding
    /// pages are fetched in order to discover it; if the listing ends before
    /// `page`, an empty page is returned.
    ///
    /// # Errors
    ///
    /// Returns `Timeout` if the whole operation exceeds the call timeout, or
    /// the underlying executor/conversion error.
    #[instrument(skip(self))]
    pub async fn fetch_products(
        &self,
        page: u32,
        limit: u32,
        query: &str,
    ) -> Result<ProductsPage, ShopifyError> {
        self.with_call_timeout(self.fetch_products_inner(page.max(1), limit.max(1), query))
            .await
    }

    async fn fetch_products_inner(
        &self,
        page: u32,
        limit: u32,
        query: &str,
    ) -> Result<ProductsPage, ShopifyError> {
        let mode = SearchMode::for_query(query);
        self.pagination().sync_search_query(query).await;
        if mode == SearchMode::Search && page == 1 {
            // Page 1 starts the search over and re-records the cursor for page 2
            self.pagination().clear(Some(SearchMode::Search)).await;
        }

        let start = self.pagination().chain_start(page, mode).await;
        if start < page {
            debug!(from = start, to = page, ?mode, "Walking pages to discover cursor");
        }
        for intermediate in start..page {
            let fetched = self.fetch_page(intermediate, limit, query, mode).await?;
            if !fetched.has_next_page || fetched.next_page_cursor.is_none() {
                info!(page, last_page = intermediate, "Requested page is past the end");
                return Ok(ProductsPage::empty());
            }
        }

        let result = self.fetch_page(page, limit, query, mode).await?;

        if mode == SearchMode::Search {
            let relevance = analyze_search_results(&result.products, query);
            debug!(
                query,
                matching = relevance.matching,
                total = relevance.total,
                sample = ?relevance.sample_titles,
                "Search relevance"
            );
            if result.is_empty() && page == 1 {
                self.notices().notify(Notice::NoSearchResults {
                    query: query.trim().to_string(),
                });
            }
        }

        Ok(result)
    }

    /// Fetch a single page whose cursor is known (or page 1) and record the
    /// cursor for the page after it.
    async fn fetch_page(
        &self,
        page: u32,
        limit: u32,
        query: &str,
        mode: SearchMode,
    ) -> Result<ProductsPage, ShopifyError> {
        let cursor = self.pagination().resolve_cursor(page, mode).await;
        if page > 1 && cursor.is_none() {
            warn!(page, ?mode, "No cursor for page");
            return Ok(ProductsPage::empty());
        }

        let request = PageRequest::new(limit, cursor, query);
        let cacheable = page == 1;
        let result = match self.config().api_flavor {
            ApiFlavor::Rest => self.fetch_rest_page(&request, cacheable).await?,
            ApiFlavor::GraphQL => self.fetch_graphql_page(request, cacheable).await?,
        };

        let next = result
            .next_page_cursor
            .clone()
            .filter(|_| result.has_next_page);
        self.pagination().store_cursor(page + 1, next, mode).await;
        debug!(
            page,
            products = result.products.len(),
            has_next_page = result.has_next_page,
            "Fetched product page"
        );
        Ok(result)
    }

    async fn fetch_rest_page(
        &self,
        request: &PageRequest,
        cacheable: bool,
    ) -> Result<ProductsPage, ShopifyError> {
        let endpoint = request.rest_endpoint();
        let api_request = ApiRequest::get(endpoint.as_str());
        let policy = self.read_policy();

        let response = if cacheable {
            self.cache()
                .fetch_cached(
                    &rest_cache_key(&endpoint),
                    || self.execute(&api_request, &policy),
                    false,
                )
                .await
                .map(|entry: CacheEntry| entry.to_response())?
        } else {
            self.execute(&api_request, &policy).await?
        };

        convert_rest_page(&response)
    }

    async fn fetch_graphql_page(
        &self,
        request: PageRequest,
        cacheable: bool,
    ) -> Result<ProductsPage, ShopifyError> {
        let variables = request.graphql_variables();
        let key = graphql_cache_key(
            get_products::OPERATION_NAME,
            &serde_json::to_value(&variables)?,
        );
        let api_request = graphql_request::<GetProducts>(variables)?;
        let policy = self.read_policy();

        // Errors must not reach the cache
        let produce = || self.send_graphql(&api_request, &policy);

        let payload = if cacheable {
            self.cache().fetch_cached(&key, produce, false).await?.payload
        } else {
            produce().await?.data
        };

        convert_graphql_page(parse_graphql::<GetProducts>(&payload)?)
    }
}
