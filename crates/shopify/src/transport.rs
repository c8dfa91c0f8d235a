//! Transport selection.
//!
//! A transport is a way of reaching the Admin API: the same-origin relay,
//! a direct connection, or a public CORS proxy that rewrites URLs. The
//! selector walks an ordered list, advancing on failure and wrapping back to
//! the start once every entry has been tried.

use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};

pub use pic_finder_core::upstream_url;
use url::Url;

/// How a proxy expects the target URL to be appended to its prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyEncoding {
    /// `{prefix}{url}`
    Raw,
    /// `{prefix}{percent-encoded url}`
    Percent,
}

/// One way of reaching the Admin API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    /// Same-origin relay; receives a structured body instead of a rewritten URL.
    Relay { endpoint: String },
    /// Call the Admin API directly.
    Direct,
    /// URL-rewriting public proxy.
    Proxy {
        prefix: String,
        encoding: ProxyEncoding,
    },
}

static DIRECT: Transport = Transport::Direct;

impl Transport {
    /// Create a proxy transport.
    #[must_use]
    pub fn proxy(prefix: impl Into<String>, encoding: ProxyEncoding) -> Self {
        Self::Proxy {
            prefix: prefix.into(),
            encoding,
        }
    }

    /// Display name used in logs and failure reports.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Relay { endpoint } => endpoint,
            Self::Direct => "direct",
            Self::Proxy { prefix, .. } => prefix,
        }
    }

    /// Whether a response through this transport is the Admin API's own
    /// answer (so a 4xx is the upstream rejecting the request, not a
    /// proxy failing).
    #[must_use]
    pub const fn is_authoritative(&self) -> bool {
        matches!(self, Self::Relay { .. } | Self::Direct)
    }

    /// Wrap an upstream URL for this transport.
    ///
    /// Returns `None` for the relay, which is addressed with a structured body.
    #[must_use]
    pub fn wrap(&self, upstream_url: &str) -> Option<String> {
        match self {
            Self::Relay { .. } => None,
            Self::Direct => Some(upstream_url.to_string()),
            Self::Proxy {
                prefix,
                encoding: ProxyEncoding::Raw,
            } => Some(format!("{prefix}{upstream_url}")),
            Self::Proxy {
                prefix,
                encoding: ProxyEncoding::Percent,
            } => Some(format!("{prefix}{}", urlencoding::encode(upstream_url))),
        }
    }
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Relay { endpoint } => write!(f, "relay {endpoint}"),
            other => f.write_str(other.name()),
        }
    }
}

impl FromStr for Transport {
    type Err = String;

    /// Parse `direct`, `relay:<url>`, `<prefix>` or `<prefix>#encoded`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("direct") {
            return Ok(Self::Direct);
        }
        if let Some(endpoint) = s.strip_prefix("relay:") {
            Url::parse(endpoint).map_err(|e| format!("invalid relay URL '{endpoint}': {e}"))?;
            return Ok(Self::Relay {
                endpoint: endpoint.to_string(),
            });
        }
        let (prefix, encoding) = s
            .strip_suffix("#encoded")
            .map_or((s, ProxyEncoding::Raw), |p| (p, ProxyEncoding::Percent));
        Url::parse(prefix).map_err(|e| format!("invalid proxy prefix '{prefix}': {e}"))?;
        Ok(Self::proxy(prefix, encoding))
    }
}

/// Where the executor should send the current attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Send the request to this (possibly proxied) URL.
    Url(String),
    /// Post a relay envelope to this endpoint.
    Relay(String),
}


/// Ordered transport list with a shared current index.
///
/// The index is always in `[0, len)`; concurrent `advance()` calls may skip a
/// transport but never leave that range.
#[derive(Debug)]
pub struct TransportSelector {
    transports: Vec<Transport>,
    current: AtomicUsize,
    scheme: String,
    api_version: String,
}

impl TransportSelector {
    /// Create a selector. An empty list is treated as `[Direct]`.
    #[must_use]
    pub fn new(
        transports: Vec<Transport>,
        scheme: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Self {
        let transports = if transports.is_empty() {
            vec![Transport::Direct]
        } else {
            transports
        };
        Self {
            transports,
            current: AtomicUsize::new(0),
            scheme: scheme.into(),
            api_version: api_version.into(),
        }
    }

    /// All transports, in preference order.
    #[must_use]
    pub fn transports(&self) -> &[Transport] {
        &self.transports
    }

    /// Number of transports.
    #[must_use]
    pub fn len(&self) -> usize {
        self.transports.len()
    }

    /// Always false; the list is normalized to at least one entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transports.is_empty()
    }

    /// Index of the current transport.
    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    /// The current transport.
    #[must_use]
    pub fn current(&self) -> &Transport {
        self.transports
            .get(self.current_index())
            .or_else(|| self.transports.first())
            .unwrap_or(&DIRECT)
    }

    /// Admin API URL for an endpoint, before any transport wrapping.
    #[must_use]
    pub fn upstream_url(&self, endpoint: &str, domain: &str) -> String {
        upstream_url(&self.scheme, domain, &self.api_version, endpoint)
    }

    /// Route for `endpoint` through the given transport.
    #[must_use]
    pub fn route_for(&self, transport: &Transport, endpoint: &str, domain: &str) -> Route {
        match transport {
            Transport::Relay { endpoint: relay } => Route::Relay(relay.clone()),
            other => {
                let upstream = self.upstream_url(endpoint, domain);
                Route::Url(other.wrap(&upstream).unwrap_or(upstream))
            }
        }
    }

    /// Route for `endpoint` through the current transport.
    #[must_use]
    pub fn resolve(&self, endpoint: &str, domain: &str) -> Route {
        self.route_for(self.current(), endpoint, domain)
    }

    /// URL for `endpoint` through the current transport.
    ///
    /// Returns `None` when the current transport is the relay, whose caller
    /// posts a structured body instead.
    #[must_use]
    pub fn resolve_url(&self, endpoint: &str, domain: &str) -> Option<String> {
        match self.resolve(endpoint, domain) {
            Route::Url(url) => Some(url),
            Route::Relay(_) => None,
        }
    }

    /// Move to the next transport.
    ///
    /// Returns `false` (and resets to the first transport) if the current
    /// transport was the last one, signalling that every transport has been
    /// tried.
    pub fn advance(&self) -> bool {
        let len = self.transports.len();
        let previous = match self.current.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |idx| {
            Some(if idx + 1 < len { idx + 1 } else { 0 })
        }) {
            Ok(prev) | Err(prev) => prev,
        };
        let advanced = previous + 1 < len;
        if advanced {
            tracing::info!(transport = %self.current(), "Switching to next transport");
        } else {
            tracing::debug!("Transport list exhausted, resetting to first transport");
        }
        advanced
    }

    /// Go back to the first transport.
    pub fn reset(&self) {
        self.current.store(0, Ordering::SeqCst);
    }
}
