//! Product and image creation.
//!
//! Both calls are sent exactly once: they are not idempotent, and a retry
//! after a lost response would create a duplicate.

use pic_finder_core::{ImageId, ProductId};
use serde_json::json;
use tracing::{info, instrument};

use crate::ShopifyError;
use crate::executor::ApiRequest;

use super::ShopifyClient;
use super::conversions::{created_image_id, created_product_id};

/// Title used when the caller supplies none.
pub const DEFAULT_PRODUCT_TITLE: &str = "Imported Product";

const IMPORT_VENDOR: &str = "Image Finder";
const IMPORT_PRODUCT_TYPE: &str = "Imported";
const IMPORT_BODY_HTML: &str = "<p>Product imported from Image Finder</p>";
const IMPORT_IMAGE_ALT: &str = "Uploaded from Image Finder";

impl ShopifyClient {
    /// Create a product whose first image is `image_url`.
    ///
    /// A blank `title` falls back to "Imported Product". On success the
    /// response cache is cleared so listings show the new product.
    ///
    /// # Errors
    ///
    /// Returns the executor's error (never retried), or
    /// `InvalidResponseShape` if the response has no `product`.
    #[instrument(skip(self))]
    pub async fn create_product_with_image(
        &self,
        image_url: &str,
        title: &str,
    ) -> Result<ProductId, ShopifyError> {
        let title = match title.trim() {
            "" => DEFAULT_PRODUCT_TITLE,
            t => t,
        };
        let body = json!({
            "product": {
                "title": title,
                "body_html": IMPORT_BODY_HTML,
                "vendor": IMPORT_VENDOR,
                "product_type": IMPORT_PRODUCT_TYPE,
                "images": [{
                    "src": image_url,
                    "position": 1,
                    "alt": IMPORT_IMAGE_ALT,
                }],
            }
        });

        let request = ApiRequest::post("products.json", body);
        let policy = self.read_policy().single_shot();
        let response = self
            .with_call_timeout(self.execute(&request, &policy))
            .await?;
        let product_id = created_product_id(&response.data)?;

        self.cache().invalidate(None).await;
        info!(product_id = %product_id, "Created product from image");
        Ok(product_id)
    }

    /// Attach `image_url` to an existing product as its first image.
    ///
    /// On success the response cache is cleared.
    ///
    /// # Errors
    ///
    /// Returns the executor's error (never retried), or
    /// `InvalidResponseShape` if the response has no `image`.
    #[instrument(skip(self))]
    pub async fn add_image_to_product(
        &self,
        product_id: ProductId,
        image_url: &str,
    ) -> Result<ImageId, ShopifyError> {
        let body = json!({
            "image": {
                "src": image_url,
                "position": 1,
                "alt": IMPORT_IMAGE_ALT,
            }
        });

        let request = ApiRequest::post(format!("products/{product_id}/images.json"), body);
        let policy = self.read_policy().single_shot();
        let response = self
            .with_call_timeout(self.execute(&request, &policy))
            .await?;
        let image_id = created_image_id(&response.data)?;

        self.cache().invalidate(None).await;
        info!(image_id = %image_id, "Added image to product");
        Ok(image_id)
    }
}
