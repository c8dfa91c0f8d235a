//! Admin API response conversion functions.
//!
//! Both listing paths normalize into [`ProductsPage`]. A success payload
//! missing the fields a page needs is an [`ShopifyError::InvalidResponseShape`].

use pic_finder_core::{ImageId, Product, ProductId, ProductImage, ProductsPage};
use serde::Deserialize;
use serde_json::Value;

use crate::ShopifyError;
use crate::executor::ApiResponse;
use crate::pagination::parse_link_header;

use super::queries::get_products;

// =============================================================================
// REST
// =============================================================================

#[derive(Debug, Deserialize)]
struct RestProduct {
    id: i64,
    title: String,
    body_html: Option<String>,
    handle: Option<String>,
    admin_graphql_api_id: Option<String>,
    image: Option<RestImage>,
    #[serde(default)]
    images: Vec<RestImage>,
}

#[derive(Debug, Clone, Deserialize)]
struct RestImage {
    id: Option<i64>,
    src: String,
    alt: Option<String>,
}

impl From<RestImage> for ProductImage {
    fn from(image: RestImage) -> Self {
        Self {
            id: image.id.map(|id| id.to_string()),
            url: image.src,
            alt: image.alt,
        }
    }
}

/// Convert a `products.json` response (body plus `Link` header).
pub fn convert_rest_page(response: &ApiResponse) -> Result<ProductsPage, ShopifyError> {
    let products = response.data.get("products").cloned().ok_or_else(|| {
        ShopifyError::InvalidResponseShape("missing 'products' in products.json".to_string())
    })?;
    let products: Vec<RestProduct> = serde_json::from_value(products).map_err(|e| {
        ShopifyError::InvalidResponseShape(format!("malformed 'products' array: {e}"))
    })?;

    let cursors = response
        .header("link")
        .map(parse_link_header)
        .unwrap_or_default();

    Ok(ProductsPage {
        products: products.into_iter().map(convert_rest_product).collect(),
        has_next_page: cursors.next.is_some(),
        next_page_cursor: cursors.next,
    })
}

fn convert_rest_product(product: RestProduct) -> Product {
    let image = product
        .image
        .or_else(|| product.images.into_iter().next())
        .map(ProductImage::from);
    Product {
        id: ProductId::new(product.id),
        graphql_id: product.admin_graphql_api_id,
        title: product.title,
        description: product.body_html.filter(|d| !d.is_empty()),
        handle: product.handle,
        image,
    }
}

// =============================================================================
// GraphQL
// =============================================================================

/// Convert a `GetProducts` response.
pub fn convert_graphql_page(
    data: get_products::ResponseData,
) -> Result<ProductsPage, ShopifyError> {
    let connection = data.products;
    let products = connection
        .edges
        .into_iter()
        .map(|edge| convert_graphql_product(edge.node))
        .collect::<Result<Vec<_>, _>>()?;

    let has_next_page = connection.page_info.has_next_page;
    Ok(ProductsPage {
        products,
        has_next_page,
        next_page_cursor: connection
            .page_info
            .end_cursor
            .filter(|_| has_next_page),
    })
}

fn convert_graphql_product(node: get_products::ProductNode) -> Result<Product, ShopifyError> {
    let id = ProductId::from_gid(&node.id).ok_or_else(|| {
        ShopifyError::InvalidResponseShape(format!("unexpected product id '{}'", node.id))
    })?;
    let image = node
        .images
        .and_then(|images| images.edges.into_iter().next())
        .map(|edge| ProductImage {
            id: edge.node.id,
            url: edge.node.url,
            alt: edge.node.alt_text,
        });
    Ok(Product {
        id,
        graphql_id: Some(node.id),
        title: node.title,
        description: node.description.filter(|d| !d.is_empty()),
        handle: node.handle,
        image,
    })
}

// =============================================================================
// Mutations
// =============================================================================

/// Extract `product.id` from a `POST products.json` response.
pub fn created_product_id(data: &Value) -> Result<ProductId, ShopifyError> {
    data.get("product")
        .and_then(|product| product.get("id"))
        .and_then(Value::as_i64)
        .map(ProductId::new)
        .ok_or_else(|| {
            ShopifyError::InvalidResponseShape("missing 'product.id' in create response".to_string())
        })
}

/// Extract `image.id` from a `POST products/{id}/images.json` response.
pub fn created_image_id(data: &Value) -> Result<ImageId, ShopifyError> {
    data.get("image")
        .and_then(|image| image.get("id"))
        .and_then(Value::as_i64)
        .map(ImageId::new)
        .ok_or_else(|| {
            ShopifyError::InvalidResponseShape("missing 'image.id' in image response".to_string())
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;

    use super::*;

    #[test]
    fn test_convert_rest_page_with_link_header() {
        let response = ApiResponse {
            data: json!({
                "products": [{
                    "id": 101,
                    "title": "Zippo Classic",
                    "body_html": "<p>Windproof</p>",
                    "handle": "zippo-classic",
                    "admin_graphql_api_id": "gid://shopify/Product/101",
                    "image": null,
                    "images": [{"id": 5, "src": "https://cdn/z.jpg", "alt": null}]
                }]
            }),
            headers: BTreeMap::from([(
                "link".to_string(),
                "<https://s/admin/api/2025-04/products.json?limit=1&page_info=n2>; rel=\"next\""
                    .to_string(),
            )]),
        };

        let page = convert_rest_page(&response).unwrap();
        assert_eq!(page.products.len(), 1);
        let product = page.products.first().unwrap();
        assert_eq!(product.id, ProductId::new(101));
        assert_eq!(product.image.as_ref().unwrap().url, "https://cdn/z.jpg");
        assert!(page.has_next_page);
        assert_eq!(page.next_page_cursor.as_deref(), Some("n2"));
    }

    #[test]
    fn test_convert_rest_page_requires_products() {
        let response = ApiResponse {
            data: json!({"shop": {}}),
            headers: BTreeMap::new(),
        };
        assert!(matches!(
            convert_rest_page(&response),
            Err(ShopifyError::InvalidResponseShape(_))
        ));
    }

    #[test]
    fn test_convert_graphql_page() {
        let data: get_products::ResponseData = serde_json::from_value(json!({
            "products": {
                "pageInfo": {
                    "hasNextPage": false,
                    "hasPreviousPage": true,
                    "startCursor": "s",
                    "endCursor": "e"
                },
                "edges": [{
                    "cursor": "e",
                    "node": {
                        "id": "gid://shopify/Product/7",
                        "title": "Lighter",
                        "description": "",
                        "handle": "lighter",
                        "images": {"edges": [{"node": {
                            "id": "gid://shopify/ProductImage/3",
                            "url": "https://cdn/l.jpg",
                            "altText": "A lighter"
                        }}]}
                    }
                }]
            }
        }))
        .unwrap();

        let page = convert_graphql_page(data).unwrap();
        let product = page.products.first().unwrap();
        assert_eq!(product.id, ProductId::new(7));
        assert_eq!(product.description, None);
        assert_eq!(product.image.as_ref().unwrap().alt.as_deref(), Some("A lighter"));
        // No next page, so the end cursor is not offered
        assert!(!page.has_next_page);
        assert_eq!(page.next_page_cursor, None);
    }

    #[test]
    fn test_convert_graphql_rejects_bad_id() {
        let data: get_products::ResponseData = serde_json::from_value(json!({
            "products": {
                "pageInfo": {"hasNextPage": false, "startCursor": null, "endCursor": null},
                "edges": [{"cursor": "c", "node": {"id": "nope", "title": "x", "description": null, "handle": null, "images": null}}]
            }
        }))
        .unwrap();
        assert!(matches!(
            convert_graphql_page(data),
            Err(ShopifyError::InvalidResponseShape(_))
        ));
    }

    #[test]
    fn test_created_ids() {
        assert_eq!(
            created_product_id(&json!({"product": {"id": 9}})).unwrap(),
            ProductId::new(9)
        );
        assert!(created_product_id(&json!({"errors": "x"})).is_err());
        assert_eq!(
            created_image_id(&json!({"image": {"id": 4}})).unwrap().as_i64(),
            4
        );
        assert!(created_image_id(&json!({})).is_err());
    }
}
