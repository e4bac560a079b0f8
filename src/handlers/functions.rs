use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    Extension,
};
use serde_json::Value;

use crate::api::{ApiResponse, ApiResult};
use crate::auth::Credentials;
use crate::error::WarpError;
use crate::query::ClientContext;
use crate::registry::FunctionRequest;
use crate::server::AppState;

/// POST /functions/:name - body is passed through as the function's params
pub async fn run(
    State(state): State<Arc<AppState>>,
    Extension(credentials): Extension<Credentials>,
    Extension(client): Extension<ClientContext>,
    Path(name): Path<String>,
    body: Bytes,
) -> ApiResult {
    let function = state.functions.resolve(&name)?;
    if function.master_required {
        state.gate.require_master(&credentials)?;
    }

    let params = function_params(&body)?;
    let result = function
        .run(FunctionRequest {
            params,
            master: state.gate.is_master(&credentials),
            client,
        })
        .await?;
    Ok(ApiResponse::success(result))
}

/// Empty body means no params; anything else must be valid JSON.
fn function_params(body: &[u8]) -> Result<Value, WarpError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body)
        .map_err(|e| WarpError::invalid_parameter(format!("Failed to parse the request body as JSON: {}", e)))
}
