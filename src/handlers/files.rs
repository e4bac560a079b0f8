use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Multipart, State},
    Extension, Json,
};
use serde::Deserialize;

use super::query::body_as;
use crate::api::{ApiResponse, ApiResult};
use crate::auth::Credentials;
use crate::error::WarpError;
use crate::server::AppState;
use crate::storage::{DestroyedFile, StoredFile};

#[derive(Debug, Deserialize)]
pub struct DestroyFileRequest {
    pub key: String,
}

/// POST /files - multipart field `file`
pub async fn upload(
    State(state): State<Arc<AppState>>,
    Extension(credentials): Extension<Credentials>,
    mut multipart: Multipart,
) -> ApiResult<StoredFile> {
    state.authorize(&credentials).await?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| WarpError::invalid_parameter(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| WarpError::invalid_parameter("file must have a filename"))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| WarpError::invalid_parameter(e.body_text()))?;
        let stored = state.storage.upload(&name, &bytes).await?;
        return Ok(ApiResponse::success(stored));
    }
    Err(WarpError::invalid_parameter("file must be set"))
}

/// DELETE /files - body `{ "key": ... }`
pub async fn destroy(
    State(state): State<Arc<AppState>>,
    Extension(credentials): Extension<Credentials>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> ApiResult<DestroyedFile> {
    state.authorize(&credentials).await?;
    let request: DestroyFileRequest = body_as(body)?;
    let destroyed = state.storage.destroy(&request.key).await?;
    Ok(ApiResponse::success(destroyed))
}
