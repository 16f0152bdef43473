//! Normalisation of tracking input into storable clicks

use chrono::{DateTime, Utc};

use crate::analytics::classify::{classify_user_agent, DIRECT};
use crate::analytics::models::{DeviceType, NewClick};

/// Raw attributes of a click as received from a redirect or the tracking API
#[derive(Debug, Clone, Default)]
pub struct ClickInput {
    pub user_agent: Option<String>,
    pub referer: Option<String>,
    pub os: Option<String>,
    pub device_type: Option<DeviceType>,
    pub country: Option<String>,
}

/// Build the row to store for one click.
///
/// Blank values count as missing. A missing referer is stored as `Direct`.
/// OS and device type supplied by the caller win; otherwise they are derived
/// from the user agent when one is present.
pub fn build_click(link_id: i64, input: ClickInput, timestamp: DateTime<Utc>) -> NewClick {
    let user_agent = non_blank(input.user_agent);
    let referer = non_blank(input.referer).unwrap_or_else(|| DIRECT.to_string());

    let parsed = user_agent.as_deref().map(classify_user_agent);
    let os = non_blank(input.os).or_else(|| parsed.map(|(os, _)| os.to_string()));
    let device_type = input.device_type.or_else(|| parsed.map(|(_, device)| device));

    NewClick {
        link_id,
        timestamp,
        user_agent,
        referer,
        os,
        device_type,
        country: non_blank(input.country),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
