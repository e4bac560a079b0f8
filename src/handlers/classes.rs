use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Extension, Json,
};
use serde_json::Value;

use super::query::{body_object, find_options, include_list, parse_id, QueryParams};
use crate::api::{ApiResponse, ApiResult};
use crate::auth::Credentials;
use crate::query::ClientContext;
use crate::server::AppState;

/// GET /classes/:class
pub async fn find(
    State(state): State<Arc<AppState>>,
    Path(class_name): Path<String>,
    Query(params): Query<QueryParams>,
) -> ApiResult {
    let resource = state.resource(&class_name)?;
    let options = find_options(&params)?;
    let rows = resource.find(&options).await?;
    Ok(ApiResponse::success(Value::Array(rows)))
}

/// GET /classes/:class/:id
pub async fn first(
    State(state): State<Arc<AppState>>,
    Path((class_name, id)): Path<(String, String)>,
    Query(params): Query<QueryParams>,
) -> ApiResult {
    let resource = state.resource(&class_name)?;
    let id = parse_id(&id)?;
    let include = include_list(&params)?;
    let row = resource.first(id, &include).await?;
    Ok(ApiResponse::success(row.unwrap_or(Value::Null)))
}

/// GET /classes/:class/keys - master key only
pub async fn keys(
    State(state): State<Arc<AppState>>,
    Extension(credentials): Extension<Credentials>,
    Path(class_name): Path<String>,
) -> ApiResult {
    state.gate.require_master(&credentials)?;
    let resource = state.resource(&class_name)?;
    Ok(ApiResponse::success(resource.keys()))
}

/// POST /classes/:class
pub async fn create(
    State(state): State<Arc<AppState>>,
    Extension(client): Extension<ClientContext>,
    Path(class_name): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult {
    let resource = state.resource(&class_name)?;
    let fields = body_object(body)?;
    Ok(ApiResponse::success(resource.create(fields, &client).await?))
}

/// PUT /classes/:class/:id
pub async fn update(
    State(state): State<Arc<AppState>>,
    Extension(client): Extension<ClientContext>,
    Path((class_name, id)): Path<(String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult {
    let resource = state.resource(&class_name)?;
    let id = parse_id(&id)?;
    let fields = body_object(body)?;
    Ok(ApiResponse::success(resource.update(id, fields, &client).await?))
}

/// DELETE /classes/:class/:id
pub async fn destroy(
    State(state): State<Arc<AppState>>,
    Extension(client): Extension<ClientContext>,
    Path((class_name, id)): Path<(String, String)>,
) -> ApiResult {
    let resource = state.resource(&class_name)?;
    let id = parse_id(&id)?;
    Ok(ApiResponse::success(resource.destroy(id, &client).await?))
}
