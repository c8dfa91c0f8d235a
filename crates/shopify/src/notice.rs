//! User-visible notices raised by the client.
//!
//! The client never renders anything itself; it hands notices to a
//! [`NoticeSink`] supplied by the embedding application.

use std::sync::Arc;

/// A transient condition the user should be told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The Admin API started rate limiting this client (raised once).
    RateLimited,
    /// A search returned no products.
    NoSearchResults { query: String },
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimited => write!(
                f,
                "Shopify API rate limit reached. Requests are being retried with backoff."
            ),
            Self::NoSearchResults { query } => write!(f, "No products found matching \"{query}\""),
        }
    }
}

/// Receives notices from the client.
pub trait NoticeSink: Send + Sync {
    /// Deliver a notice. Must not block.
    fn notify(&self, notice: Notice);
}

impl<F> NoticeSink for F
where
    F: Fn(Notice) + Send + Sync,
{
    fn notify(&self, notice: Notice) {
        self(notice);
    }
}

/// Default sink that writes notices to the tracing log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotices;

impl NoticeSink for TracingNotices {
    fn notify(&self, notice: Notice) {
        tracing::warn!(notice = %notice, "User notice");
    }
}

/// Shared handle to a sink.
pub type SharedNoticeSink = Arc<dyn NoticeSink>;
