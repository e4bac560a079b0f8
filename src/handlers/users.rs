//! `/users`, `/login`, `/logout`

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Extension, Json,
};
use serde_json::Value;

use super::query::{body_as, body_object, find_options, include_list, parse_id, QueryParams};
use crate::api::{ApiResponse, ApiResult};
use crate::auth::Credentials;
use crate::query::ClientContext;
use crate::server::AppState;
use crate::session::{ChangePasswordRequest, LoginRequest};

/// GET /users
pub async fn find(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QueryParams>,
) -> ApiResult {
    let options = find_options(&params)?;
    let users = state.users()?.find(&options).await?;
    Ok(ApiResponse::success(Value::Array(users)))
}

/// GET /users/:id - `null` result when the id does not exist
pub async fn first(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<QueryParams>,
) -> ApiResult {
    let id = parse_id(&id)?;
    let include = include_list(&params)?;
    let user = state.users()?.first(id, &include).await?;
    Ok(ApiResponse::success(user.unwrap_or(Value::Null)))
}

/// GET /users/me
pub async fn me(
    State(state): State<Arc<AppState>>,
    Extension(credentials): Extension<Credentials>,
    Query(params): Query<QueryParams>,
) -> ApiResult {
    let include = include_list(&params)?;
    let sessions = state.session_service()?;
    let user = sessions.who_am_i(credentials.session_token(), &include).await?;
    Ok(ApiResponse::success(user))
}

/// GET /users/keys - master key only
pub async fn keys(
    State(state): State<Arc<AppState>>,
    Extension(credentials): Extension<Credentials>,
) -> ApiResult {
    state.gate.require_master(&credentials)?;
    Ok(ApiResponse::success(state.users()?.keys()))
}

/// POST /users
pub async fn create(
    State(state): State<Arc<AppState>>,
    Extension(client): Extension<ClientContext>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult {
    let fields = body_object(body)?;
    let user = state.users()?.create_user(fields, &client).await?;
    Ok(ApiResponse::success(user))
}

/// PUT /users/:id - own record only, unless master key
pub async fn update(
    State(state): State<Arc<AppState>>,
    Extension(credentials): Extension<Credentials>,
    Extension(client): Extension<ClientContext>,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult {
    let id = parse_id(&id)?;
    let context = state.authorize(&credentials).await?;
    state.gate.require_owner(&context, id, "edit")?;

    let fields = body_object(body)?;
    let user = state.users()?.update(id, fields, &client).await?;
    Ok(ApiResponse::success(user))
}

/// DELETE /users/:id - own record only, unless master key
pub async fn destroy(
    State(state): State<Arc<AppState>>,
    Extension(credentials): Extension<Credentials>,
    Extension(client): Extension<ClientContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let id = parse_id(&id)?;
    let context = state.authorize(&credentials).await?;
    state.gate.require_owner(&context, id, "destroy")?;

    let destroyed = state.users()?.destroy(id, &client).await?;
    Ok(ApiResponse::success(destroyed))
}

/// POST /users/change-password
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(credentials): Extension<Credentials>,
    Extension(client): Extension<ClientContext>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<()> {
    let request: ChangePasswordRequest = body_as(body)?;
    state
        .session_service()?
        .change_password(credentials.session_token(), &request, &client)
        .await?;
    Ok(ApiResponse::acknowledged())
}

/// POST /login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Extension(credentials): Extension<Credentials>,
    Extension(client): Extension<ClientContext>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult {
    let request: LoginRequest = body_as(body)?;
    let session = state
        .session_service()?
        .login(&request, credentials.origin.as_deref(), &client)
        .await?;
    Ok(ApiResponse::success(session))
}

/// GET /logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(credentials): Extension<Credentials>,
    Extension(client): Extension<ClientContext>,
) -> ApiResult {
    let session = state
        .session_service()?
        .logout(credentials.session_token(), &client)
        .await?;
    Ok(ApiResponse::success(session))
}
