use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    database::{CatalogStore, CatalogTx},
    error::Result,
    models::{
        NewProduct, Product, ProductChanges, ProductFilter, ProductImage, ProductVariant, Review,
    },
    services::variant_validator::VariantSpec,
};

#[derive(Debug, Clone, Default)]
struct CatalogState {
    categories: BTreeSet<i32>,
    products: BTreeMap<i32, Product>,
    variants: BTreeMap<i32, ProductVariant>,
    images: BTreeMap<i32, ProductImage>,
    reviews: Vec<Review>,
    product_seq: i32,
    variant_seq: i32,
    image_seq: i32,
    review_seq: i32,
}

impl CatalogState {
    fn average_rating(&self, product_id: i32) -> Option<f64> {
        let ratings: Vec<i32> = self
            .reviews
            .iter()
            .filter(|r| r.product_id == product_id)
            .map(|r| r.rating)
            .collect();

        if ratings.is_empty() {
            return None;
        }
        Some(ratings.iter().map(|r| f64::from(*r)).sum::<f64>() / ratings.len() as f64)
    }

    fn delete_variants(&mut self, product_id: i32) -> Vec<String> {
        let variant_ids: BTreeSet<i32> = self
            .variants
            .values()
            .filter(|v| v.product_id == product_id)
            .map(|v| v.id)
            .collect();

        let urls = self
            .images
            .values()
            .filter(|img| variant_ids.contains(&img.variant_id))
            .map(|img| img.image_url.clone())
            .collect();

        self.images.retain(|_, img| !variant_ids.contains(&img.variant_id));
        self.variants.retain(|id, _| !variant_ids.contains(id));

        urls
    }
}

/// Record store kept in process memory. Each transaction holds the store
/// lock until it commits or rolls back, so writers are fully serialized.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalogStore {
    state: Arc<Mutex<CatalogState>>,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_category(&self, category_id: i32) {
        self.state.lock().await.categories.insert(category_id);
    }

    pub async fn add_review(&self, product_id: i32, rating: i32) -> Review {
        let mut state = self.state.lock().await;
        state.review_seq += 1;
        let review = Review {
            id: state.review_seq,
            product_id,
            rating,
        };
        state.reviews.push(review.clone());
        review
    }

    pub async fn reviews_for(&self, product_id: i32) -> Vec<Review> {
        let state = self.state.lock().await;
        state
            .reviews
            .iter()
            .filter(|r| r.product_id == product_id)
            .cloned()
            .collect()
    }

    /// Record counts as (products, variants, images).
    pub async fn counts(&self) -> (usize, usize, usize) {
        let state = self.state.lock().await;
        (state.products.len(), state.variants.len(), state.images.len())
    }
}

pub struct MemoryCatalogTx {
    guard: OwnedMutexGuard<CatalogState>,
    snapshot: Option<CatalogState>,
}

impl Drop for MemoryCatalogTx {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            *self.guard = snapshot;
        }
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn begin(&self) -> Result<Box<dyn CatalogTx>> {
        let guard = self.state.clone().lock_owned().await;
        let snapshot = Some(guard.clone());
        Ok(Box::new(MemoryCatalogTx { guard, snapshot }))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn category_exists(&self, category_id: i32) -> Result<bool> {
        Ok(self.state.lock().await.categories.contains(&category_id))
    }

    async fn find_product(&self, product_id: i32) -> Result<Option<Product>> {
        Ok(self.state.lock().await.products.get(&product_id).cloned())
    }

    async fn list_products(&self, filter: ProductFilter) -> Result<Vec<Product>> {
        let state = self.state.lock().await;
        let products = state
            .products
            .values()
            .filter(|p| match filter {
                ProductFilter::All => true,
                ProductFilter::Featured => p.is_feature,
                ProductFilter::Category(category_id) => p.category_id == category_id,
                ProductFilter::MinRating(min_rating) => state
                    .average_rating(p.id)
                    .is_some_and(|avg| avg >= min_rating),
            })
            .cloned()
            .collect();

        Ok(products)
    }

    async fn variants_for(&self, product_ids: &[i32]) -> Result<Vec<ProductVariant>> {
        let state = self.state.lock().await;
        Ok(state
            .variants
            .values()
            .filter(|v| product_ids.contains(&v.product_id))
            .cloned()
            .collect())
    }

    async fn images_for(&self, variant_ids: &[i32]) -> Result<Vec<ProductImage>> {
        let state = self.state.lock().await;
        Ok(state
            .images
            .values()
            .filter(|img| variant_ids.contains(&img.variant_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CatalogTx for MemoryCatalogTx {
    async fn category_exists(&mut self, category_id: i32) -> Result<bool> {
        Ok(self.guard.categories.contains(&category_id))
    }

    async fn find_product(&mut self, product_id: i32) -> Result<Option<Product>> {
        Ok(self.guard.products.get(&product_id).cloned())
    }

    async fn insert_product(&mut self, product: &NewProduct) -> Result<Product> {
        let state = &mut *self.guard;
        state.product_seq += 1;
        let now = Utc::now();
        let stored = Product {
            id: state.product_seq,
            sku: product.sku.clone(),
            product_name: product.product_name.clone(),
            brand: product.brand.clone(),
            is_feature: product.is_feature,
            category_id: product.category_id,
            description: product.description.clone(),
            admin_id: product.admin_id,
            created_at: now,
            updated_at: now,
        };
        state.products.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update_product(
        &mut self,
        product_id: i32,
        changes: &ProductChanges,
    ) -> Result<Option<Product>> {
        let Some(product) = self.guard.products.get_mut(&product_id) else {
            return Ok(None);
        };

        if let Some(ref name) = changes.product_name {
            product.product_name = name.clone();
        }
        if let Some(ref brand) = changes.brand {
            product.brand = brand.clone();
        }
        if let Some(is_feature) = changes.is_feature {
            product.is_feature = is_feature;
        }
        if let Some(category_id) = changes.category_id {
            product.category_id = category_id;
        }
        if let Some(ref description) = changes.description {
            product.description = description.clone();
        }
        product.updated_at = Utc::now();

        Ok(Some(product.clone()))
    }

    async fn insert_variant(&mut self, product_id: i32, spec: &VariantSpec) -> Result<ProductVariant> {
        let state = &mut *self.guard;
        state.variant_seq += 1;
        let variant = ProductVariant {
            id: state.variant_seq,
            product_id,
            price: spec.price,
            stock: spec.stock,
            discount: spec.discount,
            shipping_time: spec.shipping_time,
            attributes: spec.attributes.to_value(),
            image_count: spec.image_count as i32,
        };
        state.variants.insert(variant.id, variant.clone());
        Ok(variant)
    }

    async fn insert_image(&mut self, variant_id: i32, image_url: &str) -> Result<ProductImage> {
        let state = &mut *self.guard;
        state.image_seq += 1;
        let image = ProductImage {
            id: state.image_seq,
            variant_id,
            image_url: image_url.to_string(),
        };
        state.images.insert(image.id, image.clone());
        Ok(image)
    }

    async fn delete_variants(&mut self, product_id: i32) -> Result<Vec<String>> {
        Ok(self.guard.delete_variants(product_id))
    }

    async fn delete_product(&mut self, product_id: i32) -> Result<Option<Vec<String>>> {
        let state = &mut *self.guard;
        if !state.products.contains_key(&product_id) {
            return Ok(None);
        }

        state.reviews.retain(|r| r.product_id != product_id);
        let urls = state.delete_variants(product_id);
        state.products.remove(&product_id);

        Ok(Some(urls))
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let mut this = self;
        this.snapshot = None;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        drop(self);
        Ok(())
    }
}
