use axum::{
    http::{header, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::analytics::ClickAnalyticsAggregator;
use crate::auth::{require_user, IdentityProvider};
use crate::config::SessionConfig;
use crate::storage::Storage;

use super::analytics::get_analytics;
use super::handlers::{
    create_link, delete_link, health_check, list_links, sync_session, track_click, AppState,
};

pub fn create_api_router(
    storage: Arc<dyn Storage>,
    identity: Arc<dyn IdentityProvider>,
    session: SessionConfig,
) -> Router {
    let state = Arc::new(AppState {
        storage,
        identity: Arc::clone(&identity),
        aggregator: ClickAnalyticsAggregator::new(),
        session,
    });

    let protected_routes = Router::new()
        .route(
            "/api/links",
            get(list_links).post(create_link).delete(delete_link),
        )
        .route_layer(middleware::from_fn_with_state(identity, require_user))
        .with_state(Arc::clone(&state));

    // Tracking calls come from pages on other origins.
    let track_cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/analytics", get(get_analytics))
        .route("/api/track", post(track_click).layer(track_cors))
        .route("/api/auth/session", post(sync_session))
        .with_state(state)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
}
