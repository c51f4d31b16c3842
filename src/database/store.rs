use async_trait::async_trait;

use crate::{
    error::Result,
    models::{NewProduct, Product, ProductChanges, ProductFilter, ProductImage, ProductVariant},
    services::variant_validator::VariantSpec,
};

/// Read access to the catalog plus the entry point for transactional writes.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn CatalogTx>>;

    async fn ping(&self) -> Result<()>;

    async fn category_exists(&self, category_id: i32) -> Result<bool>;

    async fn find_product(&self, product_id: i32) -> Result<Option<Product>>;

    /// Products matching `filter`, ordered by id.
    async fn list_products(&self, filter: ProductFilter) -> Result<Vec<Product>>;

    async fn variants_for(&self, product_ids: &[i32]) -> Result<Vec<ProductVariant>>;

    async fn images_for(&self, variant_ids: &[i32]) -> Result<Vec<ProductImage>>;
}

/// One unit of work. Dropping it without `commit` discards every write.
#[async_trait]
pub trait CatalogTx: Send {
    async fn category_exists(&mut self, category_id: i32) -> Result<bool>;

    async fn find_product(&mut self, product_id: i32) -> Result<Option<Product>>;

    async fn insert_product(&mut self, product: &NewProduct) -> Result<Product>;

    async fn update_product(
        &mut self,
        product_id: i32,
        changes: &ProductChanges,
    ) -> Result<Option<Product>>;

    async fn insert_variant(&mut self, product_id: i32, spec: &VariantSpec) -> Result<ProductVariant>;

    async fn insert_image(&mut self, variant_id: i32, image_url: &str) -> Result<ProductImage>;

    /// Removes every variant of the product with its images and returns the
    /// URLs of the removed images.
    async fn delete_variants(&mut self, product_id: i32) -> Result<Vec<String>>;

    /// Removes the product with its reviews, variants and images. Returns the
    /// removed image URLs, or `None` when the product does not exist.
    async fn delete_product(&mut self, product_id: i32) -> Result<Option<Vec<String>>>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}
