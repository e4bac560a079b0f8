mod common;

use anyhow::Result;
use axum::{
    body::Body,
    http::{Method, StatusCode},
};
use serde_json::json;

use common::{get, json_request, request, MASTER_KEY};

fn with_token(method: Method, uri: &str, token: &str) -> axum::http::request::Builder {
    request(method, uri).header("X-Warp-Session-Token", token)
}

#[tokio::test]
async fn logout_expires_the_session_once() -> Result<()> {
    let app = common::spawn();
    app.seed_user(7, "alice", "secret").await?;
    let token = app.login("alice", "secret").await?;

    let (status, body) = app
        .send(with_token(Method::GET, "/logout", &token).body(Body::empty())?)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body["result"]["expires_at"].is_string());

    let (status, body) = app
        .send(with_token(Method::GET, "/users/me", &token).body(Body::empty())?)
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "InvalidSessionToken");

    let (status, body) = app
        .send(with_token(Method::GET, "/logout", &token).body(Body::empty())?)
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "InvalidSessionToken");
    Ok(())
}

#[tokio::test]
async fn change_password_requires_old_password() -> Result<()> {
    let app = common::spawn();
    app.seed_user(7, "alice", "secret").await?;
    let token = app.login("alice", "secret").await?;

    let wrong = json_request(
        with_token(Method::POST, "/users/change-password", &token),
        json!({ "old_password": "guess", "new_password": "next" }),
    );
    let (status, body) = app.send(wrong).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "InvalidCredentials");

    let right = json_request(
        with_token(Method::POST, "/users/change-password", &token),
        json!({ "old_password": "secret", "new_password": "next" }),
    );
    let (status, body) = app.send(right).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": 200, "message": "Success" }));

    assert!(app.login("alice", "next").await.is_ok());
    assert!(app.login("alice", "secret").await.is_err());
    Ok(())
}

#[tokio::test]
async fn change_password_for_deleted_user_is_rejected() -> Result<()> {
    let app = common::spawn();
    app.seed_user(7, "alice", "secret").await?;
    let token = app.login("alice", "secret").await?;

    let destroy = request(Method::DELETE, "/users/7")
        .header("X-Warp-Master-Key", MASTER_KEY)
        .body(Body::empty())?;
    let (status, _) = app.send(destroy).await?;
    assert_eq!(status, StatusCode::OK);

    let change = json_request(
        with_token(Method::POST, "/users/change-password", &token),
        json!({ "old_password": "secret", "new_password": "next" }),
    );
    let (status, body) = app.send(change).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "InvalidSessionToken");
    assert_eq!(body["message"], "User does not exist");
    Ok(())
}

#[tokio::test]
async fn session_listing_requires_master_key() -> Result<()> {
    let app = common::spawn();
    app.seed_user(7, "alice", "secret").await?;
    let token = app.login("alice", "secret").await?;

    let (status, body) = app
        .send(with_token(Method::GET, "/sessions", &token).body(Body::empty())?)
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Forbidden Master Operation");

    let master = request(Method::GET, "/sessions")
        .header("X-Warp-Master-Key", MASTER_KEY)
        .body(Body::empty())?;
    let (status, body) = app.send(master).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["result"][0]["session_token"], token.as_str());

    let (status, _) = app.send(get("/classes/session")).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}
