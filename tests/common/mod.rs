#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use axum::{
    body::{to_bytes, Body},
    http::{request::Builder, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use warp_api_rust::config::AppConfig;
use warp_api_rust::query::{MemoryQueryFacade, Row};
use warp_api_rust::registry::ModelManifest;
use warp_api_rust::security::PasswordHasher;
use warp_api_rust::storage::LocalStorage;
use warp_api_rust::WarpServer;

pub const API_KEY: &str = "test-api-key";
pub const MASTER_KEY: &str = "test-master-key";
/// Cheapest cost bcrypt accepts.
pub const PASSWORD_COST: u32 = 4;

pub struct TestApp {
    pub router: Router,
    pub query: Arc<MemoryQueryFacade>,
    pub storage_dir: TempDir,
}

pub fn config(throttle_limit: u32) -> AppConfig {
    let limit = throttle_limit.to_string();
    AppConfig::from_source(move |key| {
        match key {
            "DATABASE_URL" => Some("postgres://unused/warp".to_string()),
            "WARP_API_KEY" => Some(API_KEY.to_string()),
            "WARP_MASTER_KEY" => Some(MASTER_KEY.to_string()),
            "WARP_THROTTLE_LIMIT" => Some(limit.clone()),
            "WARP_PASSWORD_COST" => Some(PASSWORD_COST.to_string()),
            _ => None,
        }
    })
    .expect("test config")
}

/// Server with the built-in user/session models and whatever `configure` adds.
pub fn spawn_with(throttle_limit: u32, configure: impl FnOnce(&mut WarpServer)) -> TestApp {
    let query = Arc::new(MemoryQueryFacade::new());
    let storage_dir = tempfile::tempdir().expect("tempdir");
    let storage = Arc::new(LocalStorage::new(storage_dir.path()));

    let mut server = WarpServer::new(config(throttle_limit), query.clone(), storage);
    server.register_manifest(ModelManifest::auth_only());
    configure(&mut server);

    TestApp {
        router: server.into_router(),
        query,
        storage_dir,
    }
}

pub fn spawn() -> TestApp {
    spawn_with(1000, |_| {})
}

impl TestApp {
    pub async fn seed_user(&self, id: i64, username: &str, password: &str) -> Result<()> {
        let hashed = PasswordHasher::new(PASSWORD_COST).hash(password).await?;
        self.query.insert(
            "user",
            row(json!({
                "id": id,
                "username": username,
                "email": format!("{}@example.com", username),
                "password": hashed,
            })),
        );
        Ok(())
    }

    /// Log in and return the session token.
    pub async fn login(&self, username: &str, password: &str) -> Result<String> {
        let (status, body) = self
            .send(post("/login", json!({ "username": username, "password": password })))
            .await?;
        anyhow::ensure!(status == StatusCode::OK, "login failed: {}", body);
        body["result"]["session_token"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("no session token in {}", body))
    }

    pub async fn send(&self, request: Request<Body>) -> Result<(StatusCode, Value)> {
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, body))
    }
}

pub fn row(value: Value) -> Row {
    value.as_object().cloned().expect("object")
}

/// Request builder carrying the API key.
pub fn request(method: Method, uri: &str) -> Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("X-Warp-API-Key", API_KEY)
}

pub fn get(uri: &str) -> Request<Body> {
    request(Method::GET, uri).body(Body::empty()).expect("request")
}

pub fn post(uri: &str, body: Value) -> Request<Body> {
    json_request(request(Method::POST, uri), body)
}

pub fn json_request(builder: Builder, body: Value) -> Request<Body> {
    builder
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}
