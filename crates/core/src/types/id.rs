//! Newtype IDs for type-safe entity references.
//!
//! Use the `define_id!` macro to create type-safe ID wrappers that prevent
//! accidentally mixing IDs from different entity types.

/// Macro to define a type-safe ID wrapper.
///
/// Creates a newtype wrapper around `i64` (Shopify numeric IDs exceed `i32`) with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`
/// - Conversion methods: `new()`, `as_i64()`
/// - `From<i64>` and `Into<i64>` implementations
///
/// # Example
///
/// ```rust
/// # use pic_finder_core::define_id;
/// define_id!(ProductId);
/// define_id!(ImageId);
///
/// let product_id = ProductId::new(1);
/// let image_id = ImageId::new(1);
///
/// // These are different types, so this won't compile:
/// // let _: ProductId = image_id;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Create a new ID from an i64 value.
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Get the underlying i64 value.
            #[must_use]
            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(ProductId);
define_id!(ImageId);

impl ProductId {
    /// Extract the numeric ID from a GraphQL global ID
    /// (`gid://shopify/Product/1234567890`).
    ///
    /// Returns `None` if the ID is not a product global ID.
    #[must_use]
    pub fn from_gid(gid: &str) -> Option<Self> {
        parse_gid(gid, "Product").map(Self)
    }

    /// Format as a GraphQL global ID.
    #[must_use]
    pub fn to_gid(&self) -> String {
        format!("gid://shopify/Product/{}", self.0)
    }
}

impl ImageId {
    /// Extract the numeric ID from an image or media global ID
    /// (`gid://shopify/ProductImage/123`, `gid://shopify/MediaImage/123`).
    #[must_use]
    pub fn from_gid(gid: &str) -> Option<Self> {
        parse_gid(gid, "ProductImage")
            .or_else(|| parse_gid(gid, "MediaImage"))
            .or_else(|| parse_gid(gid, "ImageSource"))
            .map(Self)
    }
}

fn parse_gid(gid: &str, kind: &str) -> Option<i64> {
    let rest = gid.strip_prefix("gid://shopify/")?;
    let (resource, id) = rest.split_once('/')?;
    if resource != kind {
        return None;
    }
    // Some global IDs carry a query suffix (e.g. `?v=1`)
    let id = id.split('?').next()?;
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    id.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_id_from_gid() {
        assert_eq!(
            ProductId::from_gid("gid://shopify/Product/7234567890123"),
            Some(ProductId::new(7_234_567_890_123))
        );
    }

    #[test]
    fn test_product_id_rejects_other_resources() {
        assert_eq!(ProductId::from_gid("gid://shopify/Order/1"), None);
        assert_eq!(ProductId::from_gid("gid://shopify/Product/abc"), None);
        assert_eq!(ProductId::from_gid("1234"), None);
    }

    #[test]
    fn test_product_id_gid_round_trip() {
        let id = ProductId::new(42);
        assert_eq!(ProductId::from_gid(&id.to_gid()), Some(id));
    }

    #[test]
    fn test_image_id_from_gid_variants() {
        assert_eq!(
            ImageId::from_gid("gid://shopify/ProductImage/9"),
            Some(ImageId::new(9))
        );
        assert_eq!(
            ImageId::from_gid("gid://shopify/MediaImage/10?v=2"),
            Some(ImageId::new(10))
        );
    }

    #[test]
    fn test_id_display() {
        assert_eq!(ProductId::new(123).to_string(), "123");
    }
}
