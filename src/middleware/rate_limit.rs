use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::WarpError;
use crate::server::AppState;

/// Runs before the API key check, so throttled requests cost nothing else.
pub async fn throttle(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, WarpError> {
    state.rate.try_acquire()?;
    Ok(next.run(request).await)
}
