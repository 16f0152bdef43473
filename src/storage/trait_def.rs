use crate::analytics::{ClickEvent, DeviceType, NewClick};
use crate::models::{Link, LinkWithClicks};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("alias already exists")]
    Conflict,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait Storage: Send + Sync {
    /// Initialize the storage (create tables and indexes)
    async fn init(&self) -> Result<()>;

    /// Create a link; `StorageError::Conflict` when the alias is taken
    async fn create_link(
        &self,
        alias: &str,
        original_url: &str,
        owner_id: &str,
    ) -> StorageResult<Link>;

    /// Look up a link by alias (redirect path)
    async fn get_link_by_alias(&self, alias: &str) -> Result<Option<Link>>;

    /// Links owned by `owner_id`, newest first, with their click totals
    async fn list_links(&self, owner_id: &str) -> Result<Vec<LinkWithClicks>>;

    /// Delete a link and its clicks; false when no such link is owned by `owner_id`
    async fn delete_link(&self, id: i64, owner_id: &str) -> Result<bool>;

    /// Store a click; false when the link does not exist
    async fn record_click(&self, click: &NewClick) -> Result<bool>;

    /// Clicks of `link_id` at or after `since`, oldest first.
    ///
    /// Only links owned by `owner_id` yield rows; anything else is empty.
    async fn fetch_clicks_for_link(
        &self,
        link_id: i64,
        owner_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<ClickEvent>>;

    /// Delete clicks older than `before`, returning how many were removed
    async fn prune_clicks(&self, before: DateTime<Utc>) -> Result<u64>;
}

/// Click row as stored by the SQL backends
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct ClickRow {
    pub created_at: i64,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
    pub os: Option<String>,
    pub device_type: Option<String>,
    pub country: Option<String>,
}

impl From<ClickRow> for ClickEvent {
    fn from(row: ClickRow) -> Self {
        ClickEvent {
            timestamp: DateTime::from_timestamp(row.created_at, 0).unwrap_or_default(),
            user_agent: row.user_agent,
            referer: row.referer,
            os: row.os,
            // Values outside Desktop/Mobile/Tablet are reported without a device type.
            device_type: row
                .device_type
                .as_deref()
                .and_then(|d| d.parse::<DeviceType>().ok()),
            country: row.country,
        }
    }
}

pub(crate) fn now_secs() -> Result<i64> {
    Ok(std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)?
        .as_secs() as i64)
}
