//! Store connection credentials.
//!
//! One `{shopDomain, accessToken}` pair identifies the single active store
//! connection. The access token is held as a [`SecretString`] and never
//! appears in `Debug` output.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Admin API credentials for one store.
///
/// Implements `Debug` manually to redact the access token.
#[derive(Clone)]
pub struct Credentials {
    /// Store domain (e.g., your-store.myshopify.com).
    pub shop_domain: String,
    /// Admin API access token (redacted in debug output).
    pub access_token: SecretString,
}

impl Credentials {
    /// Create a new credential pair.
    #[must_use]
    pub fn new(shop_domain: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            shop_domain: shop_domain.into(),
            access_token: SecretString::from(access_token.into()),
        }
    }

    /// Whether both fields are non-empty.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.shop_domain.trim().is_empty() && !self.access_token.expose_secret().trim().is_empty()
    }

    /// Store domain without scheme or trailing slash.
    #[must_use]
    pub fn clean_domain(&self) -> &str {
        clean_domain(&self.shop_domain)
    }
}

/// Strip an `http://`/`https://` prefix and trailing slashes from a domain.
#[must_use]
pub fn clean_domain(domain: &str) -> &str {
    let trimmed = domain.trim();
    let lower = trimmed.to_ascii_lowercase();
    let without_scheme = if lower.starts_with("https://") {
        trimmed.get("https://".len()..).unwrap_or(trimmed)
    } else if lower.starts_with("http://") {
        trimmed.get("http://".len()..).unwrap_or(trimmed)
    } else {
        trimmed
    };
    without_scheme.trim_end_matches('/')
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("shop_domain", &self.shop_domain)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

impl PartialEq for Credentials {
    fn eq(&self, other: &Self) -> bool {
        self.shop_domain == other.shop_domain
            && self.access_token.expose_secret() == other.access_token.expose_secret()
    }
}

impl Eq for Credentials {}

/// Persisted JSON layout (`{"shopDomain": ..., "accessToken": ...}`).
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredCredentials {
    #[serde(alias = "storeDomain")]
    shop_domain: String,
    access_token: String,
}

impl Serialize for Credentials {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        StoredCredentials {
            shop_domain: self.shop_domain.clone(),
            access_token: self.access_token.expose_secret().to_string(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Credentials {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let stored = StoredCredentials::deserialize(deserializer)?;
        Ok(Self::new(stored.shop_domain, stored.access_token))
    }
}
