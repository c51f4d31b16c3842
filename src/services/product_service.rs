use std::collections::HashMap;

use crate::{
    database::{CatalogStore, CatalogTx},
    error::{AppError, Result},
    models::{
        Identity, NewProduct, Product, ProductChanges, ProductFilter, ProductResponse,
        VariantResponse,
    },
    services::{
        image_binder::{ImageBatch, MediaStorage, assign_positional},
        product_grouper::new_sku,
        variant_validator::{VariantLocator, VariantSpec, parse_variant_json},
    },
    utils::multipart::{UploadedFile, strip_quotes},
};

/// A new product as submitted in one request.
#[derive(Debug, Clone)]
pub struct ProductSubmission {
    pub product_name: String,
    pub brand: String,
    pub is_feature: bool,
    pub category_id: i32,
    pub description: String,
    pub variants: Vec<String>,
    pub images: Vec<UploadedFile>,
}

/// Partial update; absent fields keep their stored value. `variants`, when
/// present, replaces every existing variant and image.
#[derive(Debug, Clone, Default)]
pub struct ProductUpdate {
    pub product_name: Option<String>,
    pub brand: Option<String>,
    pub is_feature: Option<bool>,
    pub category_id: Option<i32>,
    pub description: Option<String>,
    pub variants: Option<Vec<String>>,
    pub images: Vec<UploadedFile>,
}

fn parse_variants(raw: &[String]) -> Result<Vec<VariantSpec>> {
    raw.iter()
        .enumerate()
        .map(|(idx, text)| {
            parse_variant_json(text, VariantLocator::Index(idx)).map_err(AppError::from)
        })
        .collect()
}

async fn write_variants(
    tx: &mut dyn CatalogTx,
    batch: &mut ImageBatch<'_>,
    product_id: i32,
    specs: &[VariantSpec],
    assigned: &[&[UploadedFile]],
) -> Result<Vec<VariantResponse>> {
    let mut variants = Vec::with_capacity(specs.len());
    for (spec, files) in specs.iter().zip(assigned) {
        let variant = tx.insert_variant(product_id, spec).await?;
        let files: Vec<&UploadedFile> = files.iter().collect();
        let urls = batch.bind(tx, variant.id, &files).await?;
        variants.push(VariantResponse::new(variant, urls));
    }
    Ok(variants)
}

pub async fn create_product(
    store: &dyn CatalogStore,
    media: &MediaStorage,
    admin: &Identity,
    submission: ProductSubmission,
) -> Result<ProductResponse> {
    if !store.category_exists(submission.category_id).await? {
        return Err(AppError::BadRequest(format!(
            "Category ID {} does not exist",
            submission.category_id
        )));
    }

    if submission.variants.is_empty() {
        return Err(AppError::BadRequest(
            "At least one variant is required".to_string(),
        ));
    }
    let specs = parse_variants(&submission.variants)?;
    let counts: Vec<u32> = specs.iter().map(|s| s.image_count).collect();
    let assigned = assign_positional(&submission.images, &counts)?;

    let new_product = NewProduct {
        sku: new_sku(),
        product_name: strip_quotes(&submission.product_name),
        brand: strip_quotes(&submission.brand),
        is_feature: submission.is_feature,
        category_id: submission.category_id,
        description: strip_quotes(&submission.description),
        admin_id: admin.user_id,
    };

    let mut tx = store.begin().await?;
    let mut batch = ImageBatch::new(media);
    let outcome = async {
        let product = tx.insert_product(&new_product).await?;
        let variants = write_variants(tx.as_mut(), &mut batch, product.id, &specs, &assigned).await?;
        Ok::<_, AppError>(ProductResponse { product, variants })
    }
    .await;
    let created = batch.settle(tx, outcome).await?;

    tracing::info!(
        "Product {} created by admin {} with {} variants",
        created.product.id,
        admin.user_id,
        created.variants.len()
    );
    Ok(created)
}

/// Blank text is rejected; an empty field counts as not sent.
fn changed_text(value: Option<String>, field: &str) -> Result<Option<String>> {
    match value {
        None => Ok(None),
        Some(v) if v.is_empty() => Ok(None),
        Some(v) => {
            let cleaned = strip_quotes(v.trim());
            if cleaned.trim().is_empty() {
                return Err(AppError::BadRequest(format!("Invalid {}", field)));
            }
            Ok(Some(cleaned))
        }
    }
}

pub async fn update_product(
    store: &dyn CatalogStore,
    media: &MediaStorage,
    product_id: i32,
    update: ProductUpdate,
) -> Result<ProductResponse> {
    if store.find_product(product_id).await?.is_none() {
        return Err(AppError::NotFound("Product not found".to_string()));
    }

    let changes = ProductChanges {
        product_name: changed_text(update.product_name, "product name")?,
        brand: changed_text(update.brand, "brand")?,
        is_feature: update.is_feature,
        category_id: update.category_id,
        description: changed_text(update.description, "description")?,
    };

    let specs = match update.variants {
        Some(raw) if !raw.is_empty() => Some(parse_variants(&raw)?),
        _ => None,
    };
    let assigned = match specs {
        Some(ref specs) => {
            let counts: Vec<u32> = specs.iter().map(|s| s.image_count).collect();
            assign_positional(&update.images, &counts)?
        }
        None => Vec::new(),
    };

    let mut tx = store.begin().await?;
    let mut batch = ImageBatch::new(media);
    let outcome = async {
        if let Some(category_id) = changes.category_id {
            if !tx.category_exists(category_id).await? {
                return Err(AppError::BadRequest("Category not found".to_string()));
            }
        }

        let Some(product) = tx.update_product(product_id, &changes).await? else {
            return Err(AppError::NotFound("Product not found".to_string()));
        };

        let mut replaced = Vec::new();
        if let Some(ref specs) = specs {
            replaced = tx.delete_variants(product.id).await?;
            write_variants(tx.as_mut(), &mut batch, product.id, specs, &assigned).await?;
        }
        Ok::<_, AppError>(replaced)
    }
    .await;
    let replaced = batch.settle(tx, outcome).await?;

    media.remove_urls(&replaced).await;
    tracing::info!("Product {} updated", product_id);

    get_product(store, product_id).await
}

pub async fn delete_product(
    store: &dyn CatalogStore,
    media: &MediaStorage,
    product_id: i32,
) -> Result<()> {
    let mut tx = store.begin().await?;
    let Some(urls) = tx.delete_product(product_id).await? else {
        tx.rollback().await?;
        return Err(AppError::NotFound("Product not found".to_string()));
    };
    tx.commit().await?;

    media.remove_urls(&urls).await;
    tracing::info!("Product {} deleted", product_id);
    Ok(())
}

pub async fn get_product(store: &dyn CatalogStore, product_id: i32) -> Result<ProductResponse> {
    if product_id < 1 {
        return Err(AppError::BadRequest(
            "Product id must be a positive integer".to_string(),
        ));
    }

    let product = store
        .find_product(product_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    let mut assembled = assemble(store, vec![product]).await?;
    assembled
        .pop()
        .ok_or_else(|| AppError::InternalError("Product vanished while loading".to_string()))
}

pub async fn list_products(
    store: &dyn CatalogStore,
    filter: ProductFilter,
) -> Result<Vec<ProductResponse>> {
    match filter {
        ProductFilter::Category(category_id) => {
            if category_id < 1 {
                return Err(AppError::BadRequest(
                    "Category id must be a positive integer".to_string(),
                ));
            }
            if !store.category_exists(category_id).await? {
                return Err(AppError::NotFound(format!(
                    "Category with ID {} does not exist.",
                    category_id
                )));
            }
        }
        ProductFilter::MinRating(min_rating) => {
            if !(0.0..=5.0).contains(&min_rating) {
                return Err(AppError::BadRequest(
                    "min_rating must be between 0 and 5".to_string(),
                ));
            }
        }
        ProductFilter::All | ProductFilter::Featured => {}
    }

    let products = store.list_products(filter).await?;
    assemble(store, products).await
}

/// Loads variants and image URLs for `products` with two batched lookups.
async fn assemble(
    store: &dyn CatalogStore,
    products: Vec<Product>,
) -> Result<Vec<ProductResponse>> {
    let product_ids: Vec<i32> = products.iter().map(|p| p.id).collect();
    let variants = store.variants_for(&product_ids).await?;

    let variant_ids: Vec<i32> = variants.iter().map(|v| v.id).collect();
    let mut images: HashMap<i32, Vec<String>> = HashMap::new();
    for image in store.images_for(&variant_ids).await? {
        images.entry(image.variant_id).or_default().push(image.image_url);
    }

    let mut by_product: HashMap<i32, Vec<VariantResponse>> = HashMap::new();
    for variant in variants {
        let urls = images.remove(&variant.id).unwrap_or_default();
        by_product
            .entry(variant.product_id)
            .or_default()
            .push(VariantResponse::new(variant, urls));
    }

    Ok(products
        .into_iter()
        .map(|product| {
            let variants = by_product.remove(&product.id).unwrap_or_default();
            ProductResponse { product, variants }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_update_text_is_rejected() {
        assert_eq!(changed_text(None, "brand").unwrap(), None);
        assert_eq!(changed_text(Some(String::new()), "brand").unwrap(), None);
        assert_eq!(
            changed_text(Some("\"Acme\"".to_string()), "brand").unwrap(),
            Some("Acme".to_string())
        );

        let err = changed_text(Some("   ".to_string()), "brand").unwrap_err();
        assert_eq!(err.to_string(), "Invalid brand");
        assert!(changed_text(Some("\"\"".to_string()), "brand").is_err());
    }

    #[test]
    fn variants_are_located_by_index() {
        let raw = vec![
            r#"{"price": 10, "stock": 1, "attributes": {"color": "red"}, "image_count": 1}"#
                .to_string(),
            r#"{"price": 10, "stock": 1, "discount": 150, "attributes": {"color": "red"}, "image_count": 1}"#
                .to_string(),
        ];
        let err = parse_variants(&raw).unwrap_err();
        assert!(err.to_string().contains("variant at index 1"));
    }
}
