use axum::{extract::Request, http::HeaderMap, middleware::Next, response::Response};

use crate::auth::Credentials;
use crate::query::ClientContext;

pub const API_KEY_HEADER: &str = "X-Warp-API-Key";
pub const MASTER_KEY_HEADER: &str = "X-Warp-Master-Key";
pub const SESSION_TOKEN_HEADER: &str = "X-Warp-Session-Token";
pub const ORIGIN_HEADER: &str = "X-Warp-Origin";
pub const CLIENT_HEADER: &str = "X-Warp-Client";
pub const SDK_VERSION_HEADER: &str = "X-Warp-Client-Version";
pub const APP_VERSION_HEADER: &str = "X-App-Version";

pub(crate) fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Always runs; an absent token is recorded as `None`.
pub async fn extract_credentials(mut request: Request, next: Next) -> Response {
    let headers = request.headers();
    let credentials = Credentials {
        session_token: header(headers, SESSION_TOKEN_HEADER),
        master_key: header(headers, MASTER_KEY_HEADER),
        origin: header(headers, ORIGIN_HEADER),
    };
    request.extensions_mut().insert(credentials);
    next.run(request).await
}

pub async fn extract_client(mut request: Request, next: Next) -> Response {
    let headers = request.headers();
    let client = ClientContext {
        client: header(headers, CLIENT_HEADER),
        sdk_version: header(headers, SDK_VERSION_HEADER),
        app_version: header(headers, APP_VERSION_HEADER),
    };
    request.extensions_mut().insert(client);
    next.run(request).await
}
