use sqlx::{PgExecutor, Postgres, QueryBuilder};

use crate::{
    error::Result,
    models::{NewProduct, Product, ProductChanges, ProductFilter, ProductImage, ProductVariant},
    services::variant_validator::VariantSpec,
};

pub async fn category_exists<'e, E: PgExecutor<'e>>(executor: E, id: i32) -> Result<bool> {
    let exists =
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM categories WHERE id = $1)")
            .bind(id)
            .fetch_one(executor)
            .await?;

    Ok(exists)
}

pub async fn find_by_id<'e, E: PgExecutor<'e>>(executor: E, id: i32) -> Result<Option<Product>> {
    let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await?;

    Ok(product)
}

pub async fn list<'e, E: PgExecutor<'e>>(executor: E, filter: ProductFilter) -> Result<Vec<Product>> {
    let mut query: QueryBuilder<Postgres> = QueryBuilder::new("SELECT p.* FROM products p");

    match filter {
        ProductFilter::All => {}
        ProductFilter::Featured => {
            query.push(" WHERE p.is_feature = TRUE");
        }
        ProductFilter::Category(category_id) => {
            query.push(" WHERE p.category_id = ");
            query.push_bind(category_id);
        }
        // inner join drops products without reviews
        ProductFilter::MinRating(min_rating) => {
            query.push(
                " JOIN (SELECT product_id, AVG(rating)::float8 AS avg_rating \
                 FROM reviews GROUP BY product_id) r ON r.product_id = p.id \
                 WHERE r.avg_rating >= ",
            );
            query.push_bind(min_rating);
        }
    }

    query.push(" ORDER BY p.id");

    let products = query
        .build_query_as::<Product>()
        .fetch_all(executor)
        .await?;

    Ok(products)
}

pub async fn find_variants<'e, E: PgExecutor<'e>>(
    executor: E,
    product_ids: &[i32],
) -> Result<Vec<ProductVariant>> {
    let variants = sqlx::query_as::<_, ProductVariant>(
        "SELECT * FROM product_variants WHERE product_id = ANY($1) ORDER BY id",
    )
    .bind(product_ids)
    .fetch_all(executor)
    .await?;

    Ok(variants)
}

pub async fn find_images<'e, E: PgExecutor<'e>>(
    executor: E,
    variant_ids: &[i32],
) -> Result<Vec<ProductImage>> {
    let images = sqlx::query_as::<_, ProductImage>(
        "SELECT id, variant_id, image_url FROM product_images WHERE variant_id = ANY($1) ORDER BY id",
    )
    .bind(variant_ids)
    .fetch_all(executor)
    .await?;

    Ok(images)
}

pub async fn create_product<'e, E: PgExecutor<'e>>(executor: E, req: &NewProduct) -> Result<Product> {
    let product = sqlx::query_as::<_, Product>(
        r#"
        INSERT INTO products (
            sku, product_name, brand, is_feature, category_id, description, admin_id
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(&req.sku)
    .bind(&req.product_name)
    .bind(&req.brand)
    .bind(req.is_feature)
    .bind(req.category_id)
    .bind(&req.description)
    .bind(req.admin_id)
    .fetch_one(executor)
    .await?;

    Ok(product)
}

pub async fn update_product<'e, E: PgExecutor<'e>>(
    executor: E,
    id: i32,
    changes: &ProductChanges,
) -> Result<Option<Product>> {
    let product = sqlx::query_as::<_, Product>(
        r#"
        UPDATE products
        SET
            product_name = COALESCE($1, product_name),
            brand = COALESCE($2, brand),
            is_feature = COALESCE($3, is_feature),
            category_id = COALESCE($4, category_id),
            description = COALESCE($5, description),
            updated_at = NOW()
        WHERE id = $6
        RETURNING *
        "#,
    )
    .bind(&changes.product_name)
    .bind(&changes.brand)
    .bind(changes.is_feature)
    .bind(changes.category_id)
    .bind(&changes.description)
    .bind(id)
    .fetch_optional(executor)
    .await?;

    Ok(product)
}

pub async fn create_variant<'e, E: PgExecutor<'e>>(
    executor: E,
    product_id: i32,
    spec: &VariantSpec,
) -> Result<ProductVariant> {
    let variant = sqlx::query_as::<_, ProductVariant>(
        r#"
        INSERT INTO product_variants (
            product_id, price, stock, discount, shipping_time, attributes, image_count
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(product_id)
    .bind(spec.price)
    .bind(spec.stock)
    .bind(spec.discount)
    .bind(spec.shipping_time)
    .bind(spec.attributes.to_value())
    .bind(spec.image_count as i32)
    .fetch_one(executor)
    .await?;

    Ok(variant)
}

pub async fn add_image<'e, E: PgExecutor<'e>>(
    executor: E,
    variant_id: i32,
    image_url: &str,
) -> Result<ProductImage> {
    let image = sqlx::query_as::<_, ProductImage>(
        r#"
        INSERT INTO product_images (variant_id, image_url)
        VALUES ($1, $2)
        RETURNING id, variant_id, image_url
        "#,
    )
    .bind(variant_id)
    .bind(image_url)
    .fetch_one(executor)
    .await?;

    Ok(image)
}

pub async fn delete_images_of_product<'e, E: PgExecutor<'e>>(
    executor: E,
    product_id: i32,
) -> Result<Vec<String>> {
    let urls = sqlx::query_scalar::<_, String>(
        r#"
        DELETE FROM product_images
        WHERE variant_id IN (SELECT id FROM product_variants WHERE product_id = $1)
        RETURNING image_url
        "#,
    )
    .bind(product_id)
    .fetch_all(executor)
    .await?;

    Ok(urls)
}

pub async fn delete_variants_of_product<'e, E: PgExecutor<'e>>(
    executor: E,
    product_id: i32,
) -> Result<u64> {
    let result = sqlx::query("DELETE FROM product_variants WHERE product_id = $1")
        .bind(product_id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}

pub async fn delete_reviews_of_product<'e, E: PgExecutor<'e>>(
    executor: E,
    product_id: i32,
) -> Result<u64> {
    let result = sqlx::query("DELETE FROM reviews WHERE product_id = $1")
        .bind(product_id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}

pub async fn delete_product<'e, E: PgExecutor<'e>>(executor: E, id: i32) -> Result<u64> {
    let result = sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}
