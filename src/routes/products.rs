use axum::{
    Extension, Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
};
use serde_json::{Value, json};

use crate::{
    AppState,
    error::{AppError, Result},
    models::{BulkImportReport, Identity, ProductFilter, ProductResponse, RatingQuery},
    services::{
        bulk_importer,
        product_service::{self, ProductSubmission, ProductUpdate},
    },
    utils::multipart::{FormData, parse_bool, parse_int},
};

fn submission_from(mut form: FormData) -> Result<ProductSubmission> {
    Ok(ProductSubmission {
        product_name: form.require_text("product_name")?.to_string(),
        brand: form.require_text("brand")?.to_string(),
        is_feature: parse_bool("is_feature", form.require_text("is_feature")?)?,
        category_id: parse_int("category_id", form.require_text("category_id")?)?,
        description: form.require_text("description")?.to_string(),
        variants: form.texts("variants"),
        images: form.take_files("variant_images"),
    })
}

fn update_from(mut form: FormData) -> Result<ProductUpdate> {
    let sent = |form: &FormData, name: &str| {
        form.text(name)
            .filter(|v| !v.trim().is_empty())
            .map(str::to_string)
    };

    let is_feature = sent(&form, "is_feature")
        .map(|v| parse_bool("is_feature", &v))
        .transpose()?;
    let category_id = sent(&form, "category_id")
        .map(|v| parse_int("category_id", &v))
        .transpose()?;
    let variants = form.texts("variants");

    Ok(ProductUpdate {
        product_name: form.text("product_name").map(str::to_string),
        brand: form.text("brand").map(str::to_string),
        is_feature,
        category_id,
        description: form.text("description").map(str::to_string),
        variants: (!variants.is_empty()).then_some(variants),
        images: form.take_files("variant_images"),
    })
}

pub async fn create_product(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ProductResponse>)> {
    let form = FormData::read(multipart).await?;
    let submission = submission_from(form)?;

    let product =
        product_service::create_product(state.store.as_ref(), &state.media, &identity, submission)
            .await?;

    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn bulk_upload(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<BulkImportReport>)> {
    let mut form = FormData::read(multipart).await?;

    let csv_file = form
        .take_files("file")
        .into_iter()
        .next()
        .ok_or_else(|| AppError::BadRequest("CSV file is required".to_string()))?;
    if !csv_file.file_name.to_lowercase().ends_with(".csv") {
        return Err(AppError::BadRequest("File must be a CSV".to_string()));
    }
    let images = form.take_files("images");

    let report = bulk_importer::import_csv(
        state.store.as_ref(),
        &state.media,
        &identity,
        &csv_file.data,
        &images,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(report)))
}

pub async fn update_product(
    State(state): State<AppState>,
    Path(product_id): Path<i32>,
    multipart: Multipart,
) -> Result<Json<ProductResponse>> {
    let form = FormData::read(multipart).await?;
    let update = update_from(form)?;

    let product =
        product_service::update_product(state.store.as_ref(), &state.media, product_id, update)
            .await?;

    Ok(Json(product))
}

pub async fn delete_product(
    State(state): State<AppState>,
    Path(product_id): Path<i32>,
) -> Result<Json<Value>> {
    product_service::delete_product(state.store.as_ref(), &state.media, product_id).await?;

    Ok(Json(json!({ "detail": "Product deleted successfully" })))
}

pub async fn all_products(State(state): State<AppState>) -> Result<Json<Vec<ProductResponse>>> {
    let products = product_service::list_products(state.store.as_ref(), ProductFilter::All).await?;
    Ok(Json(products))
}

pub async fn featured_products(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProductResponse>>> {
    let products =
        product_service::list_products(state.store.as_ref(), ProductFilter::Featured).await?;
    Ok(Json(products))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<i32>,
) -> Result<Json<ProductResponse>> {
    let product = product_service::get_product(state.store.as_ref(), product_id).await?;
    Ok(Json(product))
}

pub async fn products_by_category(
    State(state): State<AppState>,
    Path(category_id): Path<i32>,
) -> Result<Json<Vec<ProductResponse>>> {
    let products = product_service::list_products(
        state.store.as_ref(),
        ProductFilter::Category(category_id),
    )
    .await?;
    Ok(Json(products))
}

pub async fn products_by_rating(
    State(state): State<AppState>,
    Query(params): Query<RatingQuery>,
) -> Result<Json<Vec<ProductResponse>>> {
    let min_rating = params.min_rating.unwrap_or(0.0);
    let products = product_service::list_products(
        state.store.as_ref(),
        ProductFilter::MinRating(min_rating),
    )
    .await?;
    Ok(Json(products))
}
