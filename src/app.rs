use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::{
    config::{AppConfig, MediaConfig},
    database::{self, CatalogStore, PgCatalogStore},
    error::{AppError, Result},
    routes,
    services::image_binder::MediaStorage,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CatalogStore>,
    pub media: MediaStorage,
    pub jwt_secret: Arc<str>,
}

impl AppState {
    pub fn new(store: Arc<dyn CatalogStore>, media: MediaStorage, jwt_secret: &str) -> Self {
        Self {
            store,
            media,
            jwt_secret: Arc::from(jwt_secret),
        }
    }
}

/// API routes plus the media directory, without transport concerns.
pub fn router(state: AppState, media: &MediaConfig) -> Router {
    routes::create_router(state.clone())
        .nest_service(&media.url_prefix, ServeDir::new(&media.root))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn build(config: &AppConfig) -> Result<Router> {
    let pool = database::create_pool(&config.database).await?;
    let media = MediaStorage::new(&config.media);
    media.ensure_dirs().await?;

    let state = AppState::new(
        Arc::new(PgCatalogStore::new(pool)),
        media,
        &config.auth.jwt_secret,
    );

    let allowed_origins: Vec<HeaderValue> = config
        .cors
        .allowed_origins
        .iter()
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .map_err(|_| AppError::ConfigError(format!("Invalid CORS origin: {}", origin)))
        })
        .collect::<Result<Vec<_>>>()?;

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([http::header::CONTENT_TYPE, http::header::AUTHORIZATION])
        .allow_origin(allowed_origins);

    let app = router(state, &config.media)
        .layer(DefaultBodyLimit::max(config.server.max_body_size))
        .layer(cors);

    Ok(app)
}
