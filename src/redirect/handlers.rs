use axum::{
    extract::{ConnectInfo, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, warn};

use crate::analytics::{build_click, ClickInput, CountryResolver};
use crate::storage::Storage;

pub struct RedirectState {
    pub storage: Arc<dyn Storage>,
    pub countries: CountryResolver,
}

fn header_text(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Redirect to the link's destination and record the click in the background
///
/// Redirects are temporary so browsers come back through here on every visit.
pub async fn redirect_link(
    State(state): State<Arc<RedirectState>>,
    Path(alias): Path<String>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let alias = alias.trim().to_lowercase();

    let link = match state.storage.get_link_by_alias(&alias).await {
        Ok(Some(link)) => link,
        Ok(None) => return (StatusCode::NOT_FOUND, "Link not found").into_response(),
        Err(err) => {
            error!(alias = %alias, "Alias lookup failed: {err:#}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response();
        }
    };

    let response = Redirect::temporary(&link.original_url).into_response();
    if !response.status().is_redirection() {
        error!(alias = %alias, "Destination is not a valid Location header");
        return response;
    }

    let input = ClickInput {
        user_agent: header_text(&headers, header::USER_AGENT),
        referer: header_text(&headers, header::REFERER),
        country: state.countries.resolve(&headers, addr.ip()),
        ..Default::default()
    };
    let click = build_click(link.id, input, Utc::now());

    let storage = Arc::clone(&state.storage);
    tokio::spawn(async move {
        match storage.record_click(&click).await {
            Ok(true) => {}
            Ok(false) => warn!(link_id = click.link_id, "Link vanished before click was stored"),
            Err(err) => warn!(link_id = click.link_id, "Failed to record click: {err:#}"),
        }
    });

    response
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    #[derive(Serialize)]
    struct HealthResponse {
        status: &'static str,
    }

    Json(HealthResponse { status: "OK" })
}
