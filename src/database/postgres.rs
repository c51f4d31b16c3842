use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use crate::{
    database::{CatalogStore, CatalogTx, connection},
    error::Result,
    models::{NewProduct, Product, ProductChanges, ProductFilter, ProductImage, ProductVariant},
    queries::product_queries,
    services::variant_validator::VariantSpec,
};

#[derive(Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub struct PgCatalogTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn begin(&self) -> Result<Box<dyn CatalogTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgCatalogTx { tx }))
    }

    async fn ping(&self) -> Result<()> {
        connection::check_health(&self.pool).await
    }

    async fn category_exists(&self, category_id: i32) -> Result<bool> {
        product_queries::category_exists(&self.pool, category_id).await
    }

    async fn find_product(&self, product_id: i32) -> Result<Option<Product>> {
        product_queries::find_by_id(&self.pool, product_id).await
    }

    async fn list_products(&self, filter: ProductFilter) -> Result<Vec<Product>> {
        product_queries::list(&self.pool, filter).await
    }

    async fn variants_for(&self, product_ids: &[i32]) -> Result<Vec<ProductVariant>> {
        product_queries::find_variants(&self.pool, product_ids).await
    }

    async fn images_for(&self, variant_ids: &[i32]) -> Result<Vec<ProductImage>> {
        product_queries::find_images(&self.pool, variant_ids).await
    }
}

#[async_trait]
impl CatalogTx for PgCatalogTx {
    async fn category_exists(&mut self, category_id: i32) -> Result<bool> {
        product_queries::category_exists(&mut *self.tx, category_id).await
    }

    async fn find_product(&mut self, product_id: i32) -> Result<Option<Product>> {
        product_queries::find_by_id(&mut *self.tx, product_id).await
    }

    async fn insert_product(&mut self, product: &NewProduct) -> Result<Product> {
        product_queries::create_product(&mut *self.tx, product).await
    }

    async fn update_product(
        &mut self,
        product_id: i32,
        changes: &ProductChanges,
    ) -> Result<Option<Product>> {
        product_queries::update_product(&mut *self.tx, product_id, changes).await
    }

    async fn insert_variant(&mut self, product_id: i32, spec: &VariantSpec) -> Result<ProductVariant> {
        product_queries::create_variant(&mut *self.tx, product_id, spec).await
    }

    async fn insert_image(&mut self, variant_id: i32, image_url: &str) -> Result<ProductImage> {
        product_queries::add_image(&mut *self.tx, variant_id, image_url).await
    }

    async fn delete_variants(&mut self, product_id: i32) -> Result<Vec<String>> {
        let urls = product_queries::delete_images_of_product(&mut *self.tx, product_id).await?;
        product_queries::delete_variants_of_product(&mut *self.tx, product_id).await?;
        Ok(urls)
    }

    async fn delete_product(&mut self, product_id: i32) -> Result<Option<Vec<String>>> {
        if product_queries::find_by_id(&mut *self.tx, product_id)
            .await?
            .is_none()
        {
            return Ok(None);
        }

        product_queries::delete_reviews_of_product(&mut *self.tx, product_id).await?;
        let urls = self.delete_variants(product_id).await?;
        product_queries::delete_product(&mut *self.tx, product_id).await?;

        Ok(Some(urls))
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let this = *self;
        this.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let this = *self;
        this.tx.rollback().await?;
        Ok(())
    }
}
