use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: i32,
    pub sku: String,
    pub product_name: String,
    pub brand: String,
    pub is_feature: bool,
    pub category_id: i32,
    pub description: String,
    pub admin_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProductVariant {
    pub id: i32,
    pub product_id: i32,
    pub price: Decimal,
    pub stock: i32,
    pub discount: i32,
    pub shipping_time: Option<i32>,
    pub attributes: serde_json::Value,
    pub image_count: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProductImage {
    pub id: i32,
    pub variant_id: i32,
    pub image_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Review {
    pub id: i32,
    pub product_id: i32,
    pub rating: i32,
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub sku: String,
    pub product_name: String,
    pub brand: String,
    pub is_feature: bool,
    pub category_id: i32,
    pub description: String,
    pub admin_id: i32,
}

/// Scalar fields of a partial update; `None` leaves the stored value alone.
#[derive(Debug, Clone, Default)]
pub struct ProductChanges {
    pub product_name: Option<String>,
    pub brand: Option<String>,
    pub is_feature: Option<bool>,
    pub category_id: Option<i32>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProductFilter {
    All,
    Featured,
    Category(i32),
    MinRating(f64),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantResponse {
    pub id: i32,
    pub price: Decimal,
    pub stock: i32,
    pub discount: i32,
    pub shipping_time: Option<i32>,
    pub attributes: serde_json::Value,
    pub image_count: i32,
    pub images: Vec<String>,
}

impl VariantResponse {
    pub fn new(variant: ProductVariant, images: Vec<String>) -> Self {
        Self {
            id: variant.id,
            price: variant.price,
            stock: variant.stock,
            discount: variant.discount,
            shipping_time: variant.shipping_time,
            attributes: variant.attributes,
            image_count: variant.image_count,
            images,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductResponse {
    #[serde(flatten)]
    pub product: Product,
    pub variants: Vec<VariantResponse>,
}

#[derive(Debug, Deserialize)]
pub struct RatingQuery {
    pub min_rating: Option<f64>,
}
