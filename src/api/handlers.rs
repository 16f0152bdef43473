use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Extension, Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use url::Url;

use super::error::ApiError;
use crate::analytics::{build_click, ClickAnalyticsAggregator, ClickInput, DeviceType};
use crate::auth::session::{
    append_cookies, clear_session_cookies, session_cookies, SessionEvent, SessionSyncRequest,
};
use crate::auth::{IdentityProvider, UserId};
use crate::config::SessionConfig;
use crate::models::{CreateLinkRequest, LinkWithClicks};
use crate::storage::{Storage, StorageError};

const ALIAS_MAX_LEN: usize = 32;
const GENERATED_ALIAS_LEN: usize = 6;
const GENERATED_ALIAS_ATTEMPTS: usize = 5;
const ALIAS_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub identity: Arc<dyn IdentityProvider>,
    pub aggregator: ClickAnalyticsAggregator,
    pub session: SessionConfig,
}

#[derive(Serialize)]
pub struct DataResponse<T> {
    pub data: T,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Deserialize)]
pub struct DeleteLinkParams {
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackRequest {
    pub link_id: Option<i64>,
    pub user_agent: Option<String>,
    pub os: Option<String>,
    pub device_type: Option<DeviceType>,
    pub referer: Option<String>,
    pub country: Option<String>,
}

fn generate_alias() -> String {
    use rand::Rng;
    let mut rng = rand::rng();
    (0..GENERATED_ALIAS_LEN)
        .map(|_| ALIAS_ALPHABET[rng.random_range(0..ALIAS_ALPHABET.len())] as char)
        .collect()
}

/// Trimmed, lowercased custom alias; `None` when the caller left it blank
fn normalize_alias(alias: Option<&str>) -> Result<Option<String>, ApiError> {
    let alias = alias.map(|a| a.trim().to_lowercase()).unwrap_or_default();
    if alias.is_empty() {
        return Ok(None);
    }

    let valid_chars = alias
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if alias.len() > ALIAS_MAX_LEN || !valid_chars {
        return Err(ApiError::InvalidParameter(format!(
            "Alias must be 1-{ALIAS_MAX_LEN} characters of a-z, 0-9, '-' or '_'"
        )));
    }

    Ok(Some(alias))
}

/// Destination must be an absolute http(s) URL; the parsed form is what gets stored
fn validate_destination(raw: &str) -> Result<String, ApiError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ApiError::MissingParameter("url"));
    }

    match Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => Ok(url.into()),
        _ => Err(ApiError::InvalidParameter("Invalid destination URL".to_string())),
    }
}

/// Links owned by the caller, newest first
pub async fn list_links(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<UserId>,
) -> Result<Json<DataResponse<Vec<LinkWithClicks>>>, ApiError> {
    let links = state.storage.list_links(user.as_str()).await?;
    Ok(Json(DataResponse { data: links }))
}

/// Create a link under a custom or generated alias
pub async fn create_link(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<UserId>,
    Json(payload): Json<CreateLinkRequest>,
) -> Result<(StatusCode, Json<DataResponse<LinkWithClicks>>), ApiError> {
    let original_url = validate_destination(&payload.url)?;

    let link = match normalize_alias(payload.alias.as_deref())? {
        Some(alias) => {
            state
                .storage
                .create_link(&alias, &original_url, user.as_str())
                .await?
        }
        None => {
            let mut attempts = 0;
            loop {
                let alias = generate_alias();
                match state
                    .storage
                    .create_link(&alias, &original_url, user.as_str())
                    .await
                {
                    Ok(link) => break link,
                    Err(StorageError::Conflict) if attempts + 1 < GENERATED_ALIAS_ATTEMPTS => {
                        attempts += 1;
                    }
                    Err(StorageError::Conflict) => {
                        return Err(ApiError::UpstreamFailure(anyhow::anyhow!(
                            "no free alias after {GENERATED_ALIAS_ATTEMPTS} attempts"
                        )));
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }
    };

    info!(alias = %link.alias, owner = %user, "Created link");

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: LinkWithClicks { link, clicks: 0 },
        }),
    ))
}

/// Delete one of the caller's links together with its clicks
pub async fn delete_link(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<UserId>,
    Query(params): Query<DeleteLinkParams>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let raw_id = params
        .id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or(ApiError::MissingParameter("id"))?;
    let id = raw_id
        .parse::<i64>()
        .map_err(|_| ApiError::InvalidParameter(format!("Invalid id '{raw_id}'")))?;

    if !state.storage.delete_link(id, user.as_str()).await? {
        return Err(ApiError::NotFound("Link not found"));
    }

    info!(id, owner = %user, "Deleted link");
    Ok(Json(SuccessResponse { success: true }))
}

/// Record a click reported by a client rather than the redirect server
pub async fn track_click(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<TrackRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let link_id = payload.link_id.ok_or(ApiError::MissingParameter("linkId"))?;

    let click = build_click(
        link_id,
        ClickInput {
            user_agent: payload.user_agent,
            referer: payload.referer,
            os: payload.os,
            device_type: payload.device_type,
            country: payload.country,
        },
        Utc::now(),
    );

    if !state.storage.record_click(&click).await? {
        return Err(ApiError::NotFound("Link not found"));
    }

    Ok(Json(SuccessResponse { success: true }))
}

/// Mirror a browser auth state change into HttpOnly session cookies
pub async fn sync_session(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SessionSyncRequest>,
) -> Result<(HeaderMap, Json<SuccessResponse>), ApiError> {
    let cookies = match (SessionEvent::parse(&payload.event), &payload.session) {
        (Some(SessionEvent::SignedIn | SessionEvent::TokenRefreshed), Some(tokens)) => {
            session_cookies(&state.session, tokens)
        }
        (Some(SessionEvent::SignedOut), _) => clear_session_cookies(&state.session),
        _ => return Err(ApiError::InvalidParameter("Invalid request".to_string())),
    };

    let mut headers = HeaderMap::new();
    append_cookies(&mut headers, cookies);
    Ok((headers, Json(SuccessResponse { success: true })))
}

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "OK" }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_are_trimmed_and_lowercased() {
        assert_eq!(
            normalize_alias(Some("  My-Link_1 ")).unwrap().as_deref(),
            Some("my-link_1")
        );
    }

    #[test]
    fn blank_alias_means_generate() {
        assert!(normalize_alias(None).unwrap().is_none());
        assert!(normalize_alias(Some("   ")).unwrap().is_none());
    }

    #[test]
    fn aliases_reject_other_characters_and_long_values() {
        assert!(normalize_alias(Some("has space")).is_err());
        assert!(normalize_alias(Some("slash/alias")).is_err());
        assert!(normalize_alias(Some(&"a".repeat(33))).is_err());
        assert!(normalize_alias(Some(&"a".repeat(32))).is_ok());
    }

    #[test]
    fn generated_aliases_use_the_alias_alphabet() {
        for _ in 0..50 {
            let alias = generate_alias();
            assert_eq!(alias.len(), GENERATED_ALIAS_LEN);
            assert!(alias.bytes().all(|b| ALIAS_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn destinations_must_be_http_urls() {
        assert_eq!(
            validate_destination(" https://example.com/a?b=1 ").unwrap(),
            "https://example.com/a?b=1"
        );
        assert_eq!(
            validate_destination("http://example.com").unwrap(),
            "http://example.com/"
        );
        assert_eq!(
            validate_destination("https://example.com/a\nb\tc").unwrap(),
            "https://example.com/abc"
        );
        assert!(validate_destination("ftp://example.com").is_err());
        assert!(validate_destination("javascript:alert(1)").is_err());
        assert!(validate_destination("example.com").is_err());
        assert!(matches!(
            validate_destination(""),
            Err(ApiError::MissingParameter("url"))
        ));
    }
}
