use crate::analytics::{ClickEvent, NewClick};
use crate::models::{Link, LinkWithClicks};
use crate::storage::{Storage, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Storage wrapper with a read-through cache for alias lookups on the redirect path
pub struct CachedStorage {
    inner: Arc<dyn Storage>,
    /// Alias → link, including negative (`None`) results
    read_cache: Cache<String, Option<Link>>,
}

impl CachedStorage {
    pub fn new(inner: Arc<dyn Storage>, max_cache_entries: u64, ttl_secs: u64) -> Self {
        let read_cache = Cache::builder()
            .max_capacity(max_cache_entries)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();

        Self { inner, read_cache }
    }
}

#[async_trait]
impl Storage for CachedStorage {
    async fn init(&self) -> Result<()> {
        self.inner.init().await
    }

    async fn create_link(
        &self,
        alias: &str,
        original_url: &str,
        owner_id: &str,
    ) -> StorageResult<Link> {
        let link = self.inner.create_link(alias, original_url, owner_id).await?;

        // Replaces any cached miss for this alias
        self.read_cache
            .insert(alias.to_string(), Some(link.clone()))
            .await;

        Ok(link)
    }

    async fn get_link_by_alias(&self, alias: &str) -> Result<Option<Link>> {
        if let Some(cached) = self.read_cache.get(alias).await {
            return Ok(cached);
        }

        let result = self.inner.get_link_by_alias(alias).await?;
        self.read_cache
            .insert(alias.to_string(), result.clone())
            .await;

        Ok(result)
    }

    async fn list_links(&self, owner_id: &str) -> Result<Vec<LinkWithClicks>> {
        self.inner.list_links(owner_id).await
    }

    async fn delete_link(&self, id: i64, owner_id: &str) -> Result<bool> {
        let deleted = self.inner.delete_link(id, owner_id).await?;

        if deleted {
            // Only the id is known here, not the alias
            self.read_cache.invalidate_all();
        }

        Ok(deleted)
    }

    async fn record_click(&self, click: &NewClick) -> Result<bool> {
        self.inner.record_click(click).await
    }

    async fn fetch_clicks_for_link(
        &self,
        link_id: i64,
        owner_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<ClickEvent>> {
        self.inner
            .fetch_clicks_for_link(link_id, owner_id, since)
            .await
    }

    async fn prune_clicks(&self, before: DateTime<Utc>) -> Result<u64> {
        self.inner.prune_clicks(before).await
    }
}
