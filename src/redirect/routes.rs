use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::analytics::CountryResolver;
use crate::storage::Storage;

use super::handlers::{health_check, redirect_link, RedirectState};

pub fn create_redirect_router(storage: Arc<dyn Storage>, countries: CountryResolver) -> Router {
    let state = Arc::new(RedirectState { storage, countries });

    Router::new()
        .route("/", get(health_check))
        .route("/{alias}", get(redirect_link))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
