use crate::analytics::{ClickEvent, NewClick};
use crate::models::{Link, LinkWithClicks};
use crate::storage::trait_def::{now_secs, ClickRow};
use crate::storage::{Storage, StorageError, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;

pub struct PostgresStorage {
    pool: Arc<PgPool>,
}

impl PostgresStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS links (
                id BIGSERIAL PRIMARY KEY,
                alias TEXT NOT NULL UNIQUE,
                original_url TEXT NOT NULL,
                owner_id TEXT NOT NULL,
                created_at BIGINT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_links_owner ON links(owner_id)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS clicks (
                id BIGSERIAL PRIMARY KEY,
                link_id BIGINT NOT NULL REFERENCES links(id) ON DELETE CASCADE,
                created_at BIGINT NOT NULL,
                user_agent TEXT,
                referer TEXT,
                os TEXT,
                device_type TEXT,
                country TEXT
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_clicks_link_time ON clicks(link_id, created_at)",
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn create_link(
        &self,
        alias: &str,
        original_url: &str,
        owner_id: &str,
    ) -> StorageResult<Link> {
        let created_at = now_secs()?;

        let link = sqlx::query_as::<_, Link>(
            r#"
            INSERT INTO links (alias, original_url, owner_id, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (alias) DO NOTHING
            RETURNING id, alias, original_url, owner_id, created_at
            "#,
        )
        .bind(alias)
        .bind(original_url)
        .bind(owner_id)
        .bind(created_at)
        .fetch_optional(self.pool.as_ref())
        .await
        .map_err(|e| StorageError::Other(e.into()))?;

        link.ok_or(StorageError::Conflict)
    }

    async fn get_link_by_alias(&self, alias: &str) -> Result<Option<Link>> {
        let link = sqlx::query_as::<_, Link>(
            r#"
            SELECT id, alias, original_url, owner_id, created_at
            FROM links
            WHERE alias = $1
            "#,
        )
        .bind(alias)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(link)
    }

    async fn list_links(&self, owner_id: &str) -> Result<Vec<LinkWithClicks>> {
        let links = sqlx::query_as::<_, LinkWithClicks>(
            r#"
            SELECT l.id, l.alias, l.original_url, l.owner_id, l.created_at,
                   COUNT(c.id) AS clicks
            FROM links l
            LEFT JOIN clicks c ON c.link_id = l.id
            WHERE l.owner_id = $1
            GROUP BY l.id
            ORDER BY l.created_at DESC, l.id DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(links)
    }

    async fn delete_link(&self, id: i64, owner_id: &str) -> Result<bool> {
        // Clicks go with the link through ON DELETE CASCADE.
        let result = sqlx::query(
            r#"
            DELETE FROM links
            WHERE id = $1 AND owner_id = $2
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn record_click(&self, click: &NewClick) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO clicks (link_id, created_at, user_agent, referer, os, device_type, country)
            SELECT $1::BIGINT, $2::BIGINT, $3::TEXT, $4::TEXT, $5::TEXT, $6::TEXT, $7::TEXT
            WHERE EXISTS (SELECT 1 FROM links WHERE id = $1)
            "#,
        )
        .bind(click.link_id)
        .bind(click.timestamp.timestamp())
        .bind(click.user_agent.as_deref())
        .bind(click.referer.as_str())
        .bind(click.os.as_deref())
        .bind(click.device_type.map(|d| d.as_str()))
        .bind(click.country.as_deref())
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn fetch_clicks_for_link(
        &self,
        link_id: i64,
        owner_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<ClickEvent>> {
        let rows = sqlx::query_as::<_, ClickRow>(
            r#"
            SELECT c.created_at, c.user_agent, c.referer, c.os, c.device_type, c.country
            FROM clicks c
            JOIN links l ON l.id = c.link_id
            WHERE c.link_id = $1 AND l.owner_id = $2 AND c.created_at >= $3
            ORDER BY c.created_at ASC, c.id ASC
            "#,
        )
        .bind(link_id)
        .bind(owner_id)
        .bind(since.timestamp())
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows.into_iter().map(ClickEvent::from).collect())
    }

    async fn prune_clicks(&self, before: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM clicks WHERE created_at < $1")
            .bind(before.timestamp())
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected())
    }
}
