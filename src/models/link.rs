use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A short alias owned by one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Link {
    pub id: i64,
    pub alias: String,
    pub original_url: String,
    pub owner_id: String,
    pub created_at: i64,
}

/// Link row as listed on the dashboard, with its lifetime click total
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LinkWithClicks {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub link: Link,
    pub clicks: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateLinkRequest {
    pub url: String,
    #[serde(default)]
    pub alias: Option<String>,
}
