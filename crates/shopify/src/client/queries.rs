//! GraphQL operations against the Admin API.
//!
//! Written out by hand in the shape `graphql_client`'s derive generates
//! (operation struct + module with `Variables`/`ResponseData`), since only a
//! single small query is needed and no schema file ships with the crate.

use graphql_client::{GraphQLQuery, QueryBody};

/// Paginated, optionally filtered product listing sorted by title.
pub struct GetProducts;

pub mod get_products {
    use serde::{Deserialize, Serialize};

    pub const OPERATION_NAME: &str = "GetProducts";

    pub const QUERY: &str = r"query GetProducts($first: Int!, $after: String, $query: String) {
  products(first: $first, after: $after, query: $query, sortKey: TITLE) {
    pageInfo {
      hasNextPage
      hasPreviousPage
      startCursor
      endCursor
    }
    edges {
      cursor
      node {
        id
        title
        description
        handle
        images(first: 1) {
          edges {
            node {
              id
              url
              altText
            }
          }
        }
      }
    }
  }
}";

    #[derive(Debug, Clone, PartialEq, Eq, Serialize)]
    pub struct Variables {
        pub first: i64,
        pub after: Option<String>,
        pub query: Option<String>,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct ResponseData {
        pub products: Products,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Products {
        pub page_info: PageInfo,
        #[serde(default)]
        pub edges: Vec<ProductEdge>,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct PageInfo {
        pub has_next_page: bool,
        #[serde(default)]
        pub has_previous_page: bool,
        pub start_cursor: Option<String>,
        pub end_cursor: Option<String>,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct ProductEdge {
        pub cursor: String,
        pub node: ProductNode,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct ProductNode {
        pub id: String,
        pub title: String,
        pub description: Option<String>,
        pub handle: Option<String>,
        pub images: Option<ImageConnection>,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct ImageConnection {
        #[serde(default)]
        pub edges: Vec<ImageEdge>,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct ImageEdge {
        pub node: ImageNode,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ImageNode {
        pub id: Option<String>,
        pub url: String,
        pub alt_text: Option<String>,
    }
}

impl GraphQLQuery for GetProducts {
    type Variables = get_products::Variables;
    type ResponseData = get_products::ResponseData;

    fn build_query(variables: Self::Variables) -> QueryBody<Self::Variables> {
        QueryBody {
            variables,
            query: get_products::QUERY,
            operation_name: get_products::OPERATION_NAME,
        }
    }
}
