use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use super::context::{header, API_KEY_HEADER};
use crate::error::WarpError;
use crate::server::AppState;

pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, WarpError> {
    let key = header(request.headers(), API_KEY_HEADER);
    match key {
        Some(key) if key == state.api_key => Ok(next.run(request).await),
        _ => {
            tracing::warn!("Rejected request to {} with invalid API key", request.uri().path());
            Err(WarpError::InvalidApiKey)
        }
    }
}
