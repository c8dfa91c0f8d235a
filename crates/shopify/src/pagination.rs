//! Cursor bookkeeping for page-numbered listing and search.
//!
//! The Admin API only paginates forward with opaque cursors, while the UI asks
//! for page numbers. The engine remembers, per mode, the cursor that leads to
//! each page it has seen. Listing and search cursors never mix, and the search
//! cursors are discarded whenever the search text changes.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tokio::sync::RwLock;
use tracing::debug;

use crate::client::queries::get_products;

static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<[^>]*page_info=([^&>]*)[^>]*>;\s*rel="(next|previous)""#)
        .expect("Invalid regex")
});

/// Which cursor map a request uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchMode {
    /// Unfiltered product listing.
    Listing,
    /// Full-text product search.
    Search,
}

impl SearchMode {
    /// Mode implied by a (possibly empty) search string.
    #[must_use]
    pub fn for_query(query: &str) -> Self {
        if query.trim().is_empty() {
            Self::Listing
        } else {
            Self::Search
        }
    }
}

/// Cursor that leads to each page, per mode.
///
/// `regular[n]` / `search[n]` is the cursor to pass to fetch page `n`.
/// Page 1 never has an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CursorTable {
    pub regular: HashMap<u32, String>,
    pub search: HashMap<u32, String>,
}

impl CursorTable {
    fn map(&self, mode: SearchMode) -> &HashMap<u32, String> {
        match mode {
            SearchMode::Listing => &self.regular,
            SearchMode::Search => &self.search,
        }
    }

    fn map_mut(&mut self, mode: SearchMode) -> &mut HashMap<u32, String> {
        match mode {
            SearchMode::Listing => &mut self.regular,
            SearchMode::Search => &mut self.search,
        }
    }
}

#[derive(Debug, Default)]
struct PaginationState {
    cursors: CursorTable,
    search_query: Option<String>,
}

/// Per-client cursor tables plus the active search text.
#[derive(Debug, Default)]
pub struct PaginationEngine {
    state: RwLock<PaginationState>,
}

impl PaginationEngine {
    /// Create an engine with empty tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cursor for `page`, if known. Page 1 is always `None`.
    pub async fn resolve_cursor(&self, page: u32, mode: SearchMode) -> Option<String> {
        if page <= 1 {
            return None;
        }
        self.state.read().await.cursors.map(mode).get(&page).cloned()
    }

    /// Record the cursor leading to `page`. `None` removes any stale entry.
    pub async fn store_cursor(&self, page: u32, cursor: Option<String>, mode: SearchMode) {
        if page <= 1 {
            return;
        }
        let mut state = self.state.write().await;
        let map = state.cursors.map_mut(mode);
        match cursor {
            Some(cursor) if !cursor.is_empty() => {
                debug!(page, ?mode, "Stored pagination cursor");
                map.insert(page, cursor);
            }
            _ => {
                map.remove(&page);
            }
        }
    }

    /// Clear one mode's cursors, or both.
    pub async fn clear(&self, mode: Option<SearchMode>) {
        let mut state = self.state.write().await;
        match mode {
            Some(mode) => state.cursors.map_mut(mode).clear(),
            None => {
                state.cursors = CursorTable::default();
                state.search_query = None;
            }
        }
        debug!(?mode, "Cleared pagination cursors");
    }

    /// Track the active search text.
    ///
    /// Clears the search cursors when the text changes (or is cleared).
    /// Returns `true` if they were cleared.
    pub async fn sync_search_query(&self, query: &str) -> bool {
        let query = query.trim();
        let next = (!query.is_empty()).then(|| query.to_string());
        let mut state = self.state.write().await;
        if state.search_query == next {
            return false;
        }
        debug!(previous = ?state.search_query, current = ?next, "Search query changed");
        state.search_query = next;
        state.cursors.search.clear();
        true
    }

    /// Active search text, if any.
    pub async fn search_query(&self) -> Option<String> {
        self.state.read().await.search_query.clone()
    }

    /// The highest page `k <= page` that can be fetched directly (page 1, or
    /// a page whose cursor is known). Pages `k..page` must be walked in order.
    pub async fn chain_start(&self, page: u32, mode: SearchMode) -> u32 {
        let state = self.state.read().await;
        state
            .cursors
            .map(mode)
            .keys()
            .copied()
            .filter(|k| *k <= page)
            .max()
            .unwrap_or(1)
    }

    /// Snapshot of both tables.
    pub async fn snapshot(&self) -> CursorTable {
        self.state.read().await.cursors.clone()
    }
}

/// One page fetch: either cursor-driven or query-driven.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: u32,
    pub cursor: Option<String>,
    pub query: Option<String>,
}

impl PageRequest {
    /// Build a request; empty cursors and blank queries are dropped.
    #[must_use]
    pub fn new(limit: u32, cursor: Option<String>, query: &str) -> Self {
        let query = query.trim();
        Self {
            limit,
            cursor: cursor.filter(|c| !c.is_empty()),
            query: (!query.is_empty()).then(|| query.to_string()),
        }
    }

    /// REST endpoint for this page.
    ///
    /// A cursor already encodes the original filter, and the REST API rejects
    /// `page_info` combined with any filter, so a cursor always wins. Cursors
    /// are passed through exactly as they appeared in the `Link` header.
    #[must_use]
    pub fn rest_endpoint(&self) -> String {
        match (&self.cursor, &self.query) {
            (Some(cursor), _) => {
                format!("products.json?limit={}&page_info={cursor}", self.limit)
            }
            (None, Some(query)) => format!(
                "products.json?limit={}&query={}",
                self.limit,
                urlencoding::encode(query)
            ),
            (None, None) => format!("products.json?limit={}", self.limit),
        }
    }

    /// GraphQL variables for this page; `after` and `query` combine natively.
    #[must_use]
    pub fn graphql_variables(&self) -> get_products::Variables {
        get_products::Variables {
            first: i64::from(self.limit),
            after: self.cursor.clone(),
            query: self.query.clone(),
        }
    }
}

/// Cursors extracted from a `Link` header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkCursors {
    pub next: Option<String>,
    pub previous: Option<String>,
}

/// Extract `page_info` tokens for `rel="next"` / `rel="previous"`.
///
/// Tokens are returned exactly as they appear.
#[must_use]
pub fn parse_link_header(header: &str) -> LinkCursors {
    let mut cursors = LinkCursors::default();
    for captures in LINK_RE.captures_iter(header) {
        let (Some(token), Some(rel)) = (captures.get(1), captures.get(2)) else {
            continue;
        };
        let token = token.as_str().to_string();
        match rel.as_str() {
            "next" => cursors.next = Some(token),
            _ => cursors.previous = Some(token),
        }
    }
    cursors
}
