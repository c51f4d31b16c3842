use std::collections::HashMap;

use uuid::Uuid;

use crate::{
    database::CatalogTx,
    error::Result,
    models::{NewProduct, Product},
};

/// Identifies one product within an import: the same name under the same
/// category is the same product.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProductKey {
    pub product_name: String,
    pub category_id: i32,
}

impl ProductKey {
    pub fn of(product: &NewProduct) -> Self {
        Self {
            product_name: product.product_name.clone(),
            category_id: product.category_id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedProduct {
    pub product: Product,
    pub created: bool,
}

/// Products already committed during the current import request.
#[derive(Debug, Default)]
pub struct ProductCache {
    products: HashMap<ProductKey, Product>,
}

impl ProductCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    /// Returns the cached product for this key, or inserts a new one in `tx`.
    /// A new product is not cached here; call [`ProductCache::remember`] once
    /// the row that created it has committed.
    pub async fn resolve(&self, tx: &mut dyn CatalogTx, candidate: NewProduct) -> Result<ResolvedProduct> {
        if let Some(product) = self.products.get(&ProductKey::of(&candidate)) {
            return Ok(ResolvedProduct {
                product: product.clone(),
                created: false,
            });
        }

        let product = tx.insert_product(&candidate).await?;
        Ok(ResolvedProduct {
            product,
            created: true,
        })
    }

    pub fn remember(&mut self, product: Product) {
        let key = ProductKey {
            product_name: product.product_name.clone(),
            category_id: product.category_id,
        };
        self.products.entry(key).or_insert(product);
    }
}

pub fn new_sku() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{CatalogStore, MemoryCatalogStore};

    fn candidate(name: &str, category_id: i32) -> NewProduct {
        NewProduct {
            sku: new_sku(),
            product_name: name.to_string(),
            brand: "Acme".to_string(),
            is_feature: false,
            category_id,
            description: "desc".to_string(),
            admin_id: 1,
        }
    }

    #[tokio::test]
    async fn reuses_remembered_products() {
        let store = MemoryCatalogStore::new();
        let mut cache = ProductCache::new();

        let mut tx = store.begin().await.unwrap();
        let first = cache.resolve(tx.as_mut(), candidate("Tee", 1)).await.unwrap();
        tx.commit().await.unwrap();
        assert!(first.created);
        cache.remember(first.product.clone());

        let mut tx = store.begin().await.unwrap();
        let second = cache.resolve(tx.as_mut(), candidate("Tee", 1)).await.unwrap();
        tx.commit().await.unwrap();
        assert!(!second.created);
        assert_eq!(second.product.id, first.product.id);

        let mut tx = store.begin().await.unwrap();
        let other = cache.resolve(tx.as_mut(), candidate("Tee", 2)).await.unwrap();
        tx.commit().await.unwrap();
        assert!(other.created);

        assert_eq!(store.counts().await.0, 2);
    }

    #[tokio::test]
    async fn unremembered_products_are_created_again() {
        let store = MemoryCatalogStore::new();
        let cache = ProductCache::new();

        let mut tx = store.begin().await.unwrap();
        let first = cache.resolve(tx.as_mut(), candidate("Tee", 1)).await.unwrap();
        tx.rollback().await.unwrap();
        assert!(first.created);
        assert_eq!(cache.len(), 0);

        let mut tx = store.begin().await.unwrap();
        let retry = cache.resolve(tx.as_mut(), candidate("Tee", 1)).await.unwrap();
        assert!(retry.created);
    }

    #[test]
    fn skus_are_unique() {
        assert_ne!(new_sku(), new_sku());
    }
}
