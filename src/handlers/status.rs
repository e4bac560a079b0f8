use std::sync::Arc;

use axum::extract::State;
use chrono::Utc;
use serde_json::{json, Value};

use crate::api::{ApiResponse, ApiResult};
use crate::server::AppState;

pub async fn root() -> ApiResponse<Value> {
    ApiResponse::success(json!({
        "name": "Warp API (Rust)",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /health - probes the query facade
pub async fn health(State(state): State<Arc<AppState>>) -> ApiResult {
    state.query.ping().await?;
    Ok(ApiResponse::success(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
    })))
}
