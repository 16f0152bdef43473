//! Shared fixtures for the integration tests

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::Arc;

use clicklens::analytics::{build_click, ClickInput, DeviceType};
use clicklens::api::create_api_router;
use clicklens::auth::AuthService;
use clicklens::config::{AuthConfig, AuthMode, SecretConfig, SessionConfig};
use clicklens::storage::{SqliteStorage, Storage};

pub const JWT_SECRET: &str = "integration-secret";

/// Fresh in-memory database; a single connection keeps every query on the same database
pub async fn create_test_storage() -> Arc<dyn Storage> {
    let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

pub fn token_for(user: &str) -> String {
    encode(
        &Header::new(Algorithm::HS256),
        &json!({ "sub": user, "exp": Utc::now().timestamp() + 3600 }),
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

/// API router authenticating with HS256 tokens signed by `JWT_SECRET`
pub async fn api_router(storage: Arc<dyn Storage>) -> Router {
    let auth = AuthConfig {
        mode: AuthMode::Secret,
        dev_user_id: "dev".to_string(),
        oauth: None,
        secret: Some(SecretConfig {
            jwt_secret: JWT_SECRET.to_string(),
            audience: None,
        }),
    };
    let session = SessionConfig::default();
    let identity = Arc::new(AuthService::new(&auth, &session).await.unwrap());
    create_api_router(storage, identity, session)
}

pub fn get(uri: &str, user: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(user) = user {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token_for(user)));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn json_request(method: &str, uri: &str, user: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(user) = user {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token_for(user)));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Store a click for `link_id` at `at` with the given attributes
pub async fn record(
    storage: &Arc<dyn Storage>,
    link_id: i64,
    at: DateTime<Utc>,
    referer: Option<&str>,
    os: &str,
    device: DeviceType,
    country: Option<&str>,
) {
    let click = build_click(
        link_id,
        ClickInput {
            referer: referer.map(str::to_string),
            os: Some(os.to_string()),
            device_type: Some(device),
            country: country.map(str::to_string),
            ..Default::default()
        },
        at,
    );
    assert!(storage.record_click(&click).await.unwrap());
}
