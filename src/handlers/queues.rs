use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Extension,
};

use crate::api::{ApiResponse, ApiResult};
use crate::auth::Credentials;
use crate::server::AppState;

/// POST /queues/:name - master key only; runs the job once
pub async fn run(
    State(state): State<Arc<AppState>>,
    Extension(credentials): Extension<Credentials>,
    Path(name): Path<String>,
) -> ApiResult {
    state.gate.require_master(&credentials)?;
    let queue = state.queues.resolve(&name)?;
    tracing::info!("Running queue {}", queue.name);
    Ok(ApiResponse::success(queue.run().await?))
}
