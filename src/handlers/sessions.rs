use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Extension,
};
use serde_json::Value;

use super::query::{find_options, include_list, parse_id, QueryParams};
use crate::api::{ApiResponse, ApiResult};
use crate::auth::Credentials;
use crate::server::AppState;

/// GET /sessions - master key only
pub async fn find(
    State(state): State<Arc<AppState>>,
    Extension(credentials): Extension<Credentials>,
    Query(params): Query<QueryParams>,
) -> ApiResult {
    state.gate.require_master(&credentials)?;
    let options = find_options(&params)?;
    let service = state.session_service()?;
    let sessions = service.sessions().find(&options).await?;
    Ok(ApiResponse::success(Value::Array(sessions)))
}

/// GET /sessions/:id - master key only
pub async fn first(
    State(state): State<Arc<AppState>>,
    Extension(credentials): Extension<Credentials>,
    Path(id): Path<String>,
    Query(params): Query<QueryParams>,
) -> ApiResult {
    state.gate.require_master(&credentials)?;
    let id = parse_id(&id)?;
    let include = include_list(&params)?;
    let service = state.session_service()?;
    let session = service.sessions().first(id, &include).await?;
    Ok(ApiResponse::success(session.unwrap_or(Value::Null)))
}
