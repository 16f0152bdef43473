//! Data models for click analytics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Device category recorded alongside the operating system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DeviceType {
    Desktop,
    Mobile,
    Tablet,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Desktop => "Desktop",
            DeviceType::Mobile => "Mobile",
            DeviceType::Tablet => "Tablet",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "desktop" => Ok(DeviceType::Desktop),
            "mobile" => Ok(DeviceType::Mobile),
            "tablet" => Ok(DeviceType::Tablet),
            other => Err(anyhow::anyhow!("unknown device type '{other}'")),
        }
    }
}

/// Accepts the same spellings as `FromStr`
impl<'de> Deserialize<'de> for DeviceType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

/// A single recorded redirect, as read back for reporting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickEvent {
    pub timestamp: DateTime<Utc>,
    pub user_agent: Option<String>,
    /// Referring URL, or the literal `Direct`
    pub referer: Option<String>,
    pub os: Option<String>,
    pub device_type: Option<DeviceType>,
    pub country: Option<String>,
}

/// A click about to be stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewClick {
    pub link_id: i64,
    pub timestamp: DateTime<Utc>,
    pub user_agent: Option<String>,
    pub referer: String,
    pub os: Option<String>,
    pub device_type: Option<DeviceType>,
    pub country: Option<String>,
}

impl NewClick {
    /// The stored form of this click, as `fetch_clicks_for_link` returns it
    pub fn to_event(&self) -> ClickEvent {
        ClickEvent {
            timestamp: self.timestamp,
            user_agent: self.user_agent.clone(),
            referer: Some(self.referer.clone()),
            os: self.os.clone(),
            device_type: self.device_type,
            country: self.country.clone(),
        }
    }
}

/// Click count for one calendar day of the timeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyBucket {
    pub date: String,
    pub clics: u64,
}

/// Click count for one label of a ranked dimension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRanking {
    pub name: String,
    pub count: u64,
}

/// Everything the dashboard needs to chart one link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub timeline: Vec<DailyBucket>,
    pub referers: Vec<CategoryRanking>,
    pub devices: Vec<CategoryRanking>,
    pub countries: Vec<CategoryRanking>,
}
