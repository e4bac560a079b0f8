mod common;

use anyhow::Result;
use axum::{
    body::Body,
    http::{Method, StatusCode},
};
use serde_json::{json, Value};

use common::{json_request, post, request, TestApp, MASTER_KEY};
use warp_api_rust::error::WarpError;
use warp_api_rust::registry::{FunctionDefinition, FunctionRequest, QueueDefinition};

fn spawn_with_jobs() -> TestApp {
    common::spawn_with(1000, |server| {
        server
            .register_function(FunctionDefinition::new("echo", |req: FunctionRequest| async move {
                Ok(json!({ "params": req.params, "master": req.master, "client": req.client.client }))
            }))
            .register_function(
                FunctionDefinition::new("purge", |_req: FunctionRequest| async move {
                    Ok(json!("purged"))
                })
                .master_required(),
            )
            .register_function(FunctionDefinition::new("fail", |_req: FunctionRequest| async move {
                Err::<Value, _>(WarpError::invalid_parameter("amount must be positive"))
            }))
            .register_queue(QueueDefinition::new("digest", || async { Ok(json!({ "sent": 3 })) }));
    })
}

#[tokio::test]
async fn function_receives_body_and_client() -> Result<()> {
    let app = spawn_with_jobs();

    let call = json_request(
        request(Method::POST, "/functions/echo").header("X-Warp-Client", "web"),
        json!({ "n": 1 }),
    );
    let (status, body) = app.send(call).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["params"], json!({ "n": 1 }));
    assert_eq!(body["result"]["master"], false);
    assert_eq!(body["result"]["client"], "web");

    let empty = request(Method::POST, "/functions/echo").body(Body::empty())?;
    let (status, body) = app.send(empty).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body["result"]["params"].is_null());
    Ok(())
}

#[tokio::test]
async fn unknown_function_is_not_found() -> Result<()> {
    let app = spawn_with_jobs();
    let (status, body) = app.send(post("/functions/nope", json!({}))).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "FunctionNotFound");
    Ok(())
}

#[tokio::test]
async fn malformed_function_body_is_rejected() -> Result<()> {
    let app = spawn_with_jobs();
    let call = request(Method::POST, "/functions/echo")
        .header("content-type", "application/json")
        .body(Body::from("{oops"))?;
    let (status, body) = app.send(call).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "InvalidParameter");
    Ok(())
}

#[tokio::test]
async fn function_errors_use_the_error_envelope() -> Result<()> {
    let app = spawn_with_jobs();
    let (status, body) = app.send(post("/functions/fail", json!({}))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "code": "InvalidParameter", "message": "amount must be positive" }));
    Ok(())
}

#[tokio::test]
async fn master_only_function_checks_the_key() -> Result<()> {
    let app = spawn_with_jobs();

    let (status, body) = app.send(post("/functions/purge", json!({}))).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Forbidden Master Operation");

    let call = json_request(
        request(Method::POST, "/functions/purge").header("X-Warp-Master-Key", MASTER_KEY),
        json!({}),
    );
    let (status, body) = app.send(call).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "purged");
    Ok(())
}

#[tokio::test]
async fn queues_run_with_master_key_only() -> Result<()> {
    let app = spawn_with_jobs();

    let anonymous = request(Method::POST, "/queues/digest").body(Body::empty())?;
    let (status, _) = app.send(anonymous).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let master = request(Method::POST, "/queues/digest")
        .header("X-Warp-Master-Key", MASTER_KEY)
        .body(Body::empty())?;
    let (status, body) = app.send(master).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], json!({ "sent": 3 }));

    let missing = request(Method::POST, "/queues/weekly")
        .header("X-Warp-Master-Key", MASTER_KEY)
        .body(Body::empty())?;
    let (status, body) = app.send(missing).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "QueueNotFound");
    Ok(())
}

const BOUNDARY: &str = "warp-test-boundary";

fn multipart_upload(field: &str, filename: &str, contents: &str) -> String {
    format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: text/plain\r\n\r\n{contents}\r\n--{b}--\r\n",
        b = BOUNDARY,
    )
}

#[tokio::test]
async fn files_upload_and_delete() -> Result<()> {
    let app = spawn_with_jobs();
    app.seed_user(7, "alice", "pw").await?;
    let token = app.login("alice", "pw").await?;

    let anonymous = request(Method::POST, "/files")
        .header("content-type", format!("multipart/form-data; boundary={}", BOUNDARY))
        .body(Body::from(multipart_upload("file", "notes.txt", "hello")))?;
    let (status, body) = app.send(anonymous).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "InvalidSessionToken");

    let upload = request(Method::POST, "/files")
        .header("X-Warp-Session-Token", &token)
        .header("content-type", format!("multipart/form-data; boundary={}", BOUNDARY))
        .body(Body::from(multipart_upload("file", "notes.txt", "hello")))?;
    let (status, body) = app.send(upload).await?;
    assert_eq!(status, StatusCode::OK);
    let key = body["result"]["key"].as_str().unwrap().to_string();
    assert!(key.ends_with("-notes.txt"));
    assert!(body["result"]["url"].is_string());
    let stored = app.storage_dir.path().join(&key);
    assert_eq!(std::fs::read_to_string(&stored)?, "hello");

    let destroy = json_request(
        request(Method::DELETE, "/files").header("X-Warp-Session-Token", &token),
        json!({ "key": key }),
    );
    let (status, body) = app.send(destroy).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["key"], key.as_str());
    assert!(body["result"]["deleted_at"].is_string());
    assert!(!stored.exists());
    Ok(())
}

#[tokio::test]
async fn upload_without_file_field_is_invalid() -> Result<()> {
    let app = spawn_with_jobs();
    let upload = request(Method::POST, "/files")
        .header("X-Warp-Master-Key", MASTER_KEY)
        .header("content-type", format!("multipart/form-data; boundary={}", BOUNDARY))
        .body(Body::from(multipart_upload("attachment", "notes.txt", "hello")))?;
    let (status, body) = app.send(upload).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "file must be set");
    Ok(())
}
