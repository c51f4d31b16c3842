//! CSV driven product import.
//!
//! Every data row becomes one variant. Rows run one after another, each in
//! its own transaction; a failing row is recorded with its original cells and
//! never stops the rows after it.

use serde_json::{Map, Value};

use crate::{
    database::{CatalogStore, CatalogTx},
    error::{AppError, Result},
    models::{BulkImportReport, ErrorRow, Identity, NewProduct, Product},
    services::{
        image_binder::{ImageBatch, MediaStorage, NamedImages, split_file_names},
        product_grouper::{ProductCache, new_sku},
        variant_validator::{ValidationError, VariantLocator, VariantSpec, validate_variant},
    },
    utils::multipart::UploadedFile,
};

pub const REQUIRED_COLUMNS: [&str; 9] = [
    "product_name",
    "brand",
    "is_feature",
    "category_id",
    "description",
    "price",
    "stock",
    "attributes",
    "image_filenames",
];

const NUMERIC_COLUMNS: [&str; 5] = ["price", "stock", "discount", "shipping_time", "image_count"];

const ERROR_SAMPLE_LIMIT: usize = 5;

#[derive(Debug)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl CsvTable {
    pub fn parse(content: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(content)
            .map_err(|_| AppError::BadRequest("CSV file must be UTF-8 encoded".to_string()))?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let rows = reader
            .records()
            .map(|record| record.map(|r| r.iter().map(str::to_string).collect()))
            .collect::<std::result::Result<Vec<Vec<String>>, csv::Error>>()?;

        Ok(Self { headers, rows })
    }

    fn row(&self, idx: usize) -> CsvRow<'_> {
        CsvRow {
            number: idx + 1,
            headers: &self.headers,
            values: &self.rows[idx],
        }
    }
}

/// One data row; `number` counts data rows from 1.
pub struct CsvRow<'a> {
    pub number: usize,
    headers: &'a [String],
    values: &'a [String],
}

impl<'a> CsvRow<'a> {
    pub fn get(&self, column: &str) -> Option<&'a str> {
        let idx = self.headers.iter().position(|h| h == column)?;
        self.values.get(idx).map(String::as_str)
    }

    /// Non-blank cell, trimmed.
    fn filled(&self, column: &str) -> Option<&'a str> {
        self.get(column).map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn original_fields(&self) -> Vec<(String, String)> {
        self.headers
            .iter()
            .enumerate()
            .map(|(idx, header)| {
                let value = self.values.get(idx).cloned().unwrap_or_default();
                (header.clone(), value)
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct ParsedRow {
    pub product: NewProduct,
    pub variant: VariantSpec,
    pub image_names: Vec<String>,
}

/// Required columns, coercion and variant validation for one row.
pub fn parse_row(row: &CsvRow<'_>, admin_id: i32) -> Result<ParsedRow> {
    let at = VariantLocator::Row(row.number);

    for column in REQUIRED_COLUMNS {
        if row.filled(column).is_none() {
            return Err(ValidationError::new(
                at,
                column,
                format!("Missing required field '{}' in {}", column, at),
            )
            .into());
        }
    }
    let required = |column: &str| row.filled(column).unwrap_or_default();

    let category_id = required("category_id").parse::<i32>().map_err(|_| {
        ValidationError::new(at, "category_id", format!("Invalid 'category_id' in {}", at))
    })?;

    let attributes = match serde_json::from_str::<Value>(required("attributes")) {
        Ok(Value::Object(map)) => map,
        _ => {
            return Err(ValidationError::new(
                at,
                "attributes",
                format!("'attributes' must be a JSON object in {}", at),
            )
            .into());
        }
    };

    let image_names = split_file_names(required("image_filenames"));

    let mut record = Map::new();
    record.insert("attributes".to_string(), Value::Object(attributes));
    for column in NUMERIC_COLUMNS {
        if let Some(cell) = row.filled(column) {
            record.insert(column.to_string(), coerce_number(cell));
        }
    }
    let declared_count = record.contains_key("image_count");
    if !declared_count {
        record.insert("image_count".to_string(), Value::from(image_names.len()));
    }

    let variant = validate_variant(&record, at)?;

    if declared_count && variant.image_count as usize != image_names.len() {
        return Err(AppError::ImageCountMismatch(format!(
            "{} declares {} images but lists {} file names",
            at,
            variant.image_count,
            image_names.len()
        )));
    }

    Ok(ParsedRow {
        product: NewProduct {
            sku: new_sku(),
            product_name: required("product_name").to_string(),
            brand: required("brand").to_string(),
            is_feature: required("is_feature").eq_ignore_ascii_case("true"),
            category_id,
            description: required("description").to_string(),
            admin_id,
        },
        variant,
        image_names,
    })
}

/// Numbers become JSON numbers; anything else stays text for the validator
/// to reject by field name.
fn coerce_number(cell: &str) -> Value {
    if let Ok(n) = cell.parse::<i64>() {
        return Value::from(n);
    }
    cell.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(cell.to_string()))
}

pub async fn import_csv(
    store: &dyn CatalogStore,
    media: &MediaStorage,
    admin: &Identity,
    content: &[u8],
    images: &[UploadedFile],
) -> Result<BulkImportReport> {
    let table = CsvTable::parse(content)?;
    let named = NamedImages::new(images);
    let mut cache = ProductCache::new();
    let mut failed: Vec<ErrorRow> = Vec::new();
    let mut uploaded = 0;

    for idx in 0..table.rows.len() {
        let row = table.row(idx);
        match import_row(store, media, &named, &mut cache, &row, admin).await {
            Ok(()) => uploaded += 1,
            Err(e) => {
                tracing::warn!("Bulk import row {} failed: {}", row.number, e);
                failed.push(ErrorRow {
                    fields: row.original_fields(),
                    error: e.to_string(),
                });
            }
        }
    }

    let error_file = if failed.is_empty() {
        None
    } else {
        let report = render_error_report(&table.headers, &failed)?;
        let path = media.write_error_report(&report).await?;
        Some(path.display().to_string())
    };

    tracing::info!(
        "Bulk import by admin {}: {} variants uploaded, {} rows failed, {} products created",
        admin.user_id,
        uploaded,
        failed.len(),
        cache.len()
    );

    let errors = failed.len();
    failed.truncate(ERROR_SAMPLE_LIMIT);

    Ok(BulkImportReport {
        message: format!("{} variants uploaded successfully", uploaded),
        uploaded,
        errors,
        error_file,
        error_details: failed,
    })
}

async fn import_row(
    store: &dyn CatalogStore,
    media: &MediaStorage,
    named: &NamedImages<'_>,
    cache: &mut ProductCache,
    row: &CsvRow<'_>,
    admin: &Identity,
) -> Result<()> {
    let parsed = parse_row(row, admin.user_id)?;
    let files = named.resolve(&parsed.image_names)?;

    let mut tx = store.begin().await?;
    let mut batch = ImageBatch::new(media);
    let outcome = persist_row(tx.as_mut(), &mut batch, cache, parsed, &files).await;

    if let Some(product) = batch.settle(tx, outcome).await? {
        cache.remember(product);
    }
    Ok(())
}

/// Returns the product when this row created it.
async fn persist_row(
    tx: &mut dyn CatalogTx,
    batch: &mut ImageBatch<'_>,
    cache: &ProductCache,
    parsed: ParsedRow,
    files: &[&UploadedFile],
) -> Result<Option<Product>> {
    let category_id = parsed.product.category_id;
    if !tx.category_exists(category_id).await? {
        return Err(AppError::BadRequest(format!(
            "Category ID {} does not exist",
            category_id
        )));
    }

    let resolved = cache.resolve(tx, parsed.product).await?;
    let variant = tx.insert_variant(resolved.product.id, &parsed.variant).await?;
    batch.bind(tx, variant.id, files).await?;

    Ok(resolved.created.then_some(resolved.product))
}

pub fn render_error_report(headers: &[String], rows: &[ErrorRow]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer.write_record(headers.iter().map(String::as_str).chain(["error"]))?;
    for row in rows {
        writer.write_record(
            row.fields
                .iter()
                .map(|(_, value)| value.as_str())
                .chain([row.error.as_str()]),
        )?;
    }

    writer
        .into_inner()
        .map_err(|e| AppError::InternalError(format!("Failed to write error report: {}", e)))
}
