pub mod oauth;
pub mod secret;
pub mod session;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::config::{AuthConfig, AuthMode, SessionConfig};
use oauth::OAuthValidator;
use secret::SecretValidator;

/// Identifier of an authenticated user (`sub` claim)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolves the caller of a request
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The authenticated user, or `None` when the request carries no valid credential
    async fn current_user(&self, headers: &HeaderMap) -> Option<UserId>;
}

enum Verifier {
    None,
    Oauth(OAuthValidator),
    Secret(SecretValidator),
}

pub struct AuthService {
    verifier: Verifier,
    dev_user_id: String,
    access_cookie: String,
}

impl AuthService {
    pub async fn new(config: &AuthConfig, session: &SessionConfig) -> Result<Self> {
        let verifier = match config.mode {
            AuthMode::None => Verifier::None,
            AuthMode::Oauth => {
                let oauth = config
                    .oauth
                    .as_ref()
                    .context("OAuth configuration missing while AUTH_MODE=oauth")?;
                Verifier::Oauth(OAuthValidator::from_config(oauth).await?)
            }
            AuthMode::Secret => {
                let secret = config
                    .secret
                    .as_ref()
                    .context("JWT secret missing while AUTH_MODE=secret")?;
                Verifier::Secret(SecretValidator::from_config(secret))
            }
        };

        Ok(Self {
            verifier,
            dev_user_id: config.dev_user_id.clone(),
            access_cookie: session.access_cookie.clone(),
        })
    }

    async fn verify(&self, token: &str) -> Result<Value> {
        match &self.verifier {
            Verifier::None => Ok(json!({ "sub": self.dev_user_id })),
            Verifier::Oauth(validator) => validator.validate(token).await,
            Verifier::Secret(validator) => validator.validate(token),
        }
    }
}

#[async_trait]
impl IdentityProvider for AuthService {
    async fn current_user(&self, headers: &HeaderMap) -> Option<UserId> {
        if matches!(self.verifier, Verifier::None) {
            return Some(UserId(self.dev_user_id.clone()));
        }

        let token = extract_token(headers, &self.access_cookie)?;
        match self.verify(&token).await {
            Ok(claims) => subject(&claims),
            Err(e) => {
                debug!("Rejected access token: {e:#}");
                None
            }
        }
    }
}

/// Bearer token from `Authorization`, else the access-token cookie
pub fn extract_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    session::cookie_value(headers, cookie_name)
}

fn subject(claims: &Value) -> Option<UserId> {
    claims
        .get("sub")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(|s| UserId(s.to_string()))
}

/// Route guard: rejects anonymous requests and exposes the caller as an `Extension<UserId>`
pub async fn require_user(
    State(identity): State<Arc<dyn IdentityProvider>>,
    mut request: Request,
    next: Next,
) -> Response {
    match identity.current_user(request.headers()).await {
        Some(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        None => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Unauthorized" })),
        )
            .into_response(),
    }
}
