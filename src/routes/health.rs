use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::{AppState, error::Result};

pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "catalog" }))
}

/// Ready once the record store answers and both media directories exist.
pub async fn readiness_check(State(state): State<AppState>) -> Result<Json<Value>> {
    state.store.ping().await?;
    state.media.check_ready().await?;

    Ok(Json(json!({
        "status": "ready",
        "database": "connected",
        "media": {
            "uploads": state.media.upload_dir().display().to_string(),
            "errors": state.media.error_dir().display().to_string(),
        }
    })))
}
