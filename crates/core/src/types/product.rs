//! Normalized product types.
//!
//! REST and GraphQL responses from the Admin API both normalize into these
//! shapes so the UI never sees which API path produced a page.

use serde::{Deserialize, Serialize};

use super::ProductId;

/// Primary image of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImage {
    /// Image ID as returned by the API (numeric or global ID).
    pub id: Option<String>,
    /// Image URL.
    pub url: String,
    /// Alt text for accessibility.
    pub alt: Option<String>,
}

/// A product in the connected store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Numeric product ID.
    pub id: ProductId,
    /// GraphQL global ID (`gid://shopify/Product/...`), when known.
    pub graphql_id: Option<String>,
    /// Product title.
    pub title: String,
    /// Plain text description.
    pub description: Option<String>,
    /// URL handle.
    pub handle: Option<String>,
    /// First product image.
    pub image: Option<ProductImage>,
}

/// One page of products.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductsPage {
    /// Products on this page.
    pub products: Vec<Product>,
    /// Whether another page follows.
    pub has_next_page: bool,
    /// Opaque cursor for the next page.
    pub next_page_cursor: Option<String>,
}

impl ProductsPage {
    /// An empty page with no successor.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether the page has no products.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}
