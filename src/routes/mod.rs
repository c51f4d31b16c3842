mod health;
mod products;

use axum::{
    Router, middleware,
    routing::{get, post, put},
};

use crate::{AppState, middleware::admin_middleware};

pub fn create_router(state: AppState) -> Router<AppState> {
    let admin_routes = Router::new()
        .route("/products", post(products::create_product))
        .route("/products/", post(products::create_product))
        .route("/products/bulk-upload", post(products::bulk_upload))
        .route(
            "/products/products/{product_id}",
            put(products::update_product).delete(products::delete_product),
        )
        .route_layer(middleware::from_fn_with_state(state, admin_middleware));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check))
        .route("/products/allproducts", get(products::all_products))
        .route("/products/featuredproducts", get(products::featured_products))
        .route("/products/{product_id}", get(products::get_product))
        .route(
            "/products/category/{category_id}",
            get(products::products_by_category),
        )
        .route("/products/rating/by-rating", get(products::products_by_rating))
        .merge(admin_routes)
}
