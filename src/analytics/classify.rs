//! Classification rules that turn raw click attributes into report labels

use url::Url;

use crate::analytics::models::{ClickEvent, DeviceType};

/// Referer value stored when a click carried no referer
pub const DIRECT: &str = "Direct";

/// Label used for a missing OS or country
pub const UNKNOWN: &str = "Unknown";

/// Known traffic sources, checked in order; the first matching marker wins
const REFERRER_SOURCES: &[(&[&str], &str)] = &[
    (
        &[
            "youtube.com",
            "youtu.be",
            "android-app://com.google.android.youtube",
        ],
        "YouTube",
    ),
    (&["t.co", "twitter.com"], "X / Twitter"),
    (&["instagram.com"], "Instagram"),
    (
        &["facebook.com", "fb.com", "android-app://com.facebook.katana"],
        "Facebook",
    ),
    (&["tiktok.com"], "TikTok"),
    (&["linkedin.com"], "LinkedIn"),
];

/// Map a raw referer to a source name.
///
/// Matching is case-sensitive substring matching against [`REFERRER_SOURCES`].
/// Anything else that parses as an absolute URL collapses to its host
/// (without a leading `www.`); unparsable values are kept verbatim.
pub fn classify_referrer(referer: Option<&str>) -> String {
    let raw = referer.unwrap_or(DIRECT);

    for (markers, label) in REFERRER_SOURCES {
        if markers.iter().any(|marker| raw.contains(marker)) {
            return (*label).to_string();
        }
    }

    if raw == DIRECT {
        return DIRECT.to_string();
    }

    match Url::parse(raw) {
        Ok(url) => match url.host_str() {
            Some(host) => host.strip_prefix("www.").unwrap_or(host).to_string(),
            None => raw.to_string(),
        },
        Err(_) => raw.to_string(),
    }
}

/// `os`, or `os (DeviceType)` when the device type was recorded
pub fn device_label(event: &ClickEvent) -> String {
    let os = event.os.as_deref().unwrap_or(UNKNOWN);
    match event.device_type {
        Some(device) => format!("{os} ({device})"),
        None => os.to_string(),
    }
}

/// Country value as recorded, `Unknown` when absent
pub fn country_label(event: &ClickEvent) -> String {
    event
        .country
        .clone()
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Derive `(os, device type)` from a user-agent string at recording time.
///
/// iOS and Android are checked before macOS and Linux since their
/// user agents also mention `Mac OS X` and `Linux`.
pub fn classify_user_agent(user_agent: &str) -> (&'static str, DeviceType) {
    let ua = user_agent.to_lowercase();

    if ua.contains("ipad") {
        ("iOS", DeviceType::Tablet)
    } else if ua.contains("iphone") {
        ("iOS", DeviceType::Mobile)
    } else if ua.contains("android") {
        if ua.contains("mobile") {
            ("Android", DeviceType::Mobile)
        } else {
            ("Android", DeviceType::Tablet)
        }
    } else if ua.contains("windows") {
        ("Windows", DeviceType::Desktop)
    } else if ua.contains("mac") {
        ("macOS", DeviceType::Desktop)
    } else if ua.contains("linux") {
        ("Linux", DeviceType::Desktop)
    } else {
        ("Other", DeviceType::Desktop)
    }
}
