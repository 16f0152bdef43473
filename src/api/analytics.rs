//! Analytics API handler

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use chrono::Local;
use serde::Deserialize;
use std::sync::Arc;

use super::error::ApiError;
use super::handlers::{AppState, DataResponse};
use crate::analytics::{window_start, AnalyticsReport};

#[derive(Debug, Deserialize)]
pub struct AnalyticsQueryParams {
    pub link_id: Option<String>,
}

/// Seven-day report for one of the caller's links
///
/// The parameter is checked before the caller, and both before any data is
/// fetched.
pub async fn get_analytics(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AnalyticsQueryParams>,
    headers: HeaderMap,
) -> Result<Json<DataResponse<AnalyticsReport>>, ApiError> {
    let raw_id = params
        .link_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or(ApiError::MissingParameter("link_id"))?;
    let link_id = raw_id
        .parse::<i64>()
        .map_err(|_| ApiError::InvalidParameter(format!("Invalid link_id '{raw_id}'")))?;

    let user = state
        .identity
        .current_user(&headers)
        .await
        .ok_or(ApiError::Unauthorized)?;

    let now = Local::now();
    let clicks = state
        .storage
        .fetch_clicks_for_link(link_id, user.as_str(), window_start(&now))
        .await?;

    tracing::debug!(link_id, user = %user, clicks = clicks.len(), "Aggregating click analytics");

    Ok(Json(DataResponse {
        data: state.aggregator.aggregate(&clicks, &now),
    }))
}
