//! Click analytics
//!
//! Recording-side normalisation of click attributes, country resolution,
//! and the seven-day report served to the dashboard.

pub mod aggregator;
pub mod classify;
pub mod geoip;
pub mod ip_extractor;
pub mod models;
pub mod recorder;

pub use aggregator::{window_start, ClickAnalyticsAggregator, TOP_N, WINDOW_DAYS};
pub use classify::{classify_referrer, classify_user_agent, device_label};
pub use geoip::{CountryResolver, GeoIpService};
pub use models::{
    AnalyticsReport, CategoryRanking, ClickEvent, DailyBucket, DeviceType, NewClick,
};
pub use recorder::{build_click, ClickInput};
