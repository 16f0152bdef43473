//! Seven-day click report for a single link
//!
//! Buckets already-fetched click events into a daily timeline and ranks
//! referrers, devices and countries. Pure and synchronous: the caller fetches
//! the rows and supplies `now`, whose time zone defines the calendar.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use std::collections::HashMap;

use crate::analytics::classify::{classify_referrer, country_label, device_label};
use crate::analytics::models::{AnalyticsReport, CategoryRanking, ClickEvent, DailyBucket};

/// Number of calendar days in the timeline, today included
pub const WINDOW_DAYS: i64 = 7;

/// Entries kept per ranked dimension
pub const TOP_N: usize = 5;

/// Timeline label for a calendar day, e.g. `Jan 5`
pub fn day_label(day: NaiveDate) -> String {
    day.format("%b %-d").to_string()
}

/// First instant of the reporting window: local midnight `WINDOW_DAYS - 1` days before `now`
pub fn window_start<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Utc> {
    let first_day = now.date_naive() - Duration::days(WINDOW_DAYS - 1);
    let midnight = first_day.and_time(chrono::NaiveTime::MIN);

    let tz = now.timezone();
    // Midnight may be skipped by a DST transition; the day then starts at the first valid hour.
    (0..=3)
        .find_map(|hour| {
            tz.from_local_datetime(&(midnight + Duration::hours(hour)))
                .earliest()
        })
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}

#[derive(Debug, Clone, Copy)]
pub struct ClickAnalyticsAggregator {
    top_n: usize,
}

impl ClickAnalyticsAggregator {
    pub fn new() -> Self {
        Self::with_top_n(TOP_N)
    }

    pub fn with_top_n(top_n: usize) -> Self {
        Self { top_n }
    }

    /// Build the report for `events` relative to `now`.
    pub fn aggregate<Tz: TimeZone>(
        &self,
        events: &[ClickEvent],
        now: &DateTime<Tz>,
    ) -> AnalyticsReport {
        AnalyticsReport {
            timeline: self.timeline(events, now),
            referers: self.rank(events.iter().map(|e| classify_referrer(e.referer.as_deref()))),
            devices: self.rank(events.iter().map(device_label)),
            countries: self.rank(events.iter().map(country_label)),
        }
    }

    /// Exactly `WINDOW_DAYS` buckets, oldest first.
    ///
    /// Events are matched to buckets by their formatted label only. An event
    /// whose label matches none of the buckets is dropped.
    pub fn timeline<Tz: TimeZone>(
        &self,
        events: &[ClickEvent],
        now: &DateTime<Tz>,
    ) -> Vec<DailyBucket> {
        let today = now.date_naive();
        let tz = now.timezone();

        let mut buckets = Vec::with_capacity(WINDOW_DAYS as usize);
        let mut index: HashMap<String, usize> = HashMap::with_capacity(WINDOW_DAYS as usize);

        for offset in (0..WINDOW_DAYS).rev() {
            let label = day_label(today - Duration::days(offset));
            index.insert(label.clone(), buckets.len());
            buckets.push(DailyBucket {
                date: label,
                clics: 0,
            });
        }

        for event in events {
            let local_day = event.timestamp.with_timezone(&tz).date_naive();
            if let Some(&slot) = index.get(&day_label(local_day)) {
                buckets[slot].clics += 1;
            }
        }

        buckets
    }

    /// Count labels, sort by descending count and keep the top entries.
    ///
    /// The sort is stable, so ties stay in first-seen order.
    pub fn rank<I>(&self, labels: I) -> Vec<CategoryRanking>
    where
        I: IntoIterator<Item = String>,
    {
        let mut ranked: Vec<CategoryRanking> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for label in labels {
            match index.get(&label) {
                Some(&slot) => ranked[slot].count += 1,
                None => {
                    index.insert(label.clone(), ranked.len());
                    ranked.push(CategoryRanking {
                        name: label,
                        count: 1,
                    });
                }
            }
        }

        ranked.sort_by(|a, b| b.count.cmp(&a.count));
        ranked.truncate(self.top_n);
        ranked
    }
}

impl Default for ClickAnalyticsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::models::DeviceType;
    use chrono::{FixedOffset, LocalResult, NaiveDateTime, NaiveTime};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 15, 30, 0).unwrap()
    }

    fn click_at(timestamp: DateTime<Utc>) -> ClickEvent {
        ClickEvent {
            timestamp,
            user_agent: None,
            referer: None,
            os: None,
            device_type: None,
            country: None,
        }
    }

    fn click(referer: &str, os: &str, device: Option<DeviceType>, country: Option<&str>) -> ClickEvent {
        ClickEvent {
            timestamp: now(),
            user_agent: None,
            referer: Some(referer.to_string()),
            os: Some(os.to_string()),
            device_type: device,
            country: country.map(str::to_string),
        }
    }

    #[test]
    fn empty_input_yields_seven_zero_buckets_and_empty_rankings() {
        let report = ClickAnalyticsAggregator::new().aggregate(&[], &now());

        assert_eq!(report.timeline.len(), 7);
        assert!(report.timeline.iter().all(|b| b.clics == 0));
        assert!(report.referers.is_empty());
        assert!(report.devices.is_empty());
        assert!(report.countries.is_empty());
    }

    #[test]
    fn timeline_labels_run_oldest_to_today() {
        let timeline = ClickAnalyticsAggregator::new().timeline(&[], &now());
        let labels: Vec<&str> = timeline.iter().map(|b| b.date.as_str()).collect();

        assert_eq!(
            labels,
            vec!["Mar 4", "Mar 5", "Mar 6", "Mar 7", "Mar 8", "Mar 9", "Mar 10"]
        );
    }

    #[test]
    fn events_are_counted_on_their_day() {
        let events = vec![
            click_at(Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap()),
            click_at(Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap()),
            click_at(Utc.with_ymd_and_hms(2024, 3, 9, 23, 59, 59).unwrap()),
            click_at(Utc.with_ymd_and_hms(2024, 3, 10, 1, 0, 0).unwrap()),
        ];

        let timeline = ClickAnalyticsAggregator::new().timeline(&events, &now());
        let counts: Vec<u64> = timeline.iter().map(|b| b.clics).collect();

        assert_eq!(counts, vec![1, 0, 0, 0, 0, 2, 1]);
        assert_eq!(counts.iter().sum::<u64>(), events.len() as u64);
    }

    #[test]
    fn events_outside_the_window_are_dropped() {
        let events = vec![
            click_at(Utc.with_ymd_and_hms(2024, 3, 3, 23, 59, 59).unwrap()),
            click_at(Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap()),
            click_at(Utc.with_ymd_and_hms(2024, 3, 8, 8, 0, 0).unwrap()),
        ];

        let timeline = ClickAnalyticsAggregator::new().timeline(&events, &now());

        assert_eq!(timeline.len(), 7);
        assert_eq!(timeline.iter().map(|b| b.clics).sum::<u64>(), 1);
    }

    #[test]
    fn same_month_day_of_another_year_lands_in_the_bucket() {
        // Buckets are keyed by "month day" only.
        let events = vec![click_at(Utc.with_ymd_and_hms(2023, 3, 10, 9, 0, 0).unwrap())];

        let timeline = ClickAnalyticsAggregator::new().timeline(&events, &now());

        assert_eq!(timeline[6].clics, 1);
    }

    #[test]
    fn days_follow_the_calendar_of_now() {
        // 23:30 UTC on Mar 9 is already Mar 10 at UTC+2.
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let local_now = now().with_timezone(&plus_two);
        let events = vec![click_at(Utc.with_ymd_and_hms(2024, 3, 9, 23, 30, 0).unwrap())];

        let timeline = ClickAnalyticsAggregator::new().timeline(&events, &local_now);

        assert_eq!(timeline[6].date, "Mar 10");
        assert_eq!(timeline[6].clics, 1);
        assert_eq!(timeline[5].clics, 0);
    }

    #[test]
    fn window_crossing_new_year_keeps_seven_distinct_buckets() {
        let new_year = Utc.with_ymd_and_hms(2025, 1, 2, 10, 0, 0).unwrap();
        let timeline = ClickAnalyticsAggregator::new().timeline(&[], &new_year);
        let labels: Vec<&str> = timeline.iter().map(|b| b.date.as_str()).collect();

        assert_eq!(
            labels,
            vec!["Dec 27", "Dec 28", "Dec 29", "Dec 30", "Dec 31", "Jan 1", "Jan 2"]
        );
    }

    #[test]
    fn window_start_is_local_midnight_six_days_back() {
        assert_eq!(
            window_start(&now()),
            Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap()
        );

        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        assert_eq!(
            window_start(&now().with_timezone(&plus_two)),
            Utc.with_ymd_and_hms(2024, 3, 3, 22, 0, 0).unwrap()
        );
    }

    /// +02:00 until 2024-03-31, then +03:00; local 00:00-01:00 that day does not exist
    #[derive(Debug, Clone, Copy)]
    struct MidnightGap;

    impl MidnightGap {
        fn switch_day() -> NaiveDate {
            NaiveDate::from_ymd_opt(2024, 3, 31).unwrap()
        }

        fn offset(hours: i32) -> FixedOffset {
            FixedOffset::east_opt(hours * 3600).unwrap()
        }
    }

    impl TimeZone for MidnightGap {
        type Offset = FixedOffset;

        fn from_offset(_: &FixedOffset) -> Self {
            MidnightGap
        }

        fn offset_from_local_date(&self, local: &NaiveDate) -> LocalResult<FixedOffset> {
            self.offset_from_local_datetime(&local.and_time(NaiveTime::MIN))
        }

        fn offset_from_local_datetime(&self, local: &NaiveDateTime) -> LocalResult<FixedOffset> {
            let gap_start = Self::switch_day().and_time(NaiveTime::MIN);
            if *local < gap_start {
                LocalResult::Single(Self::offset(2))
            } else if *local < gap_start + Duration::hours(1) {
                LocalResult::None
            } else {
                LocalResult::Single(Self::offset(3))
            }
        }

        fn offset_from_utc_date(&self, utc: &NaiveDate) -> FixedOffset {
            self.offset_from_utc_datetime(&utc.and_time(NaiveTime::MIN))
        }

        fn offset_from_utc_datetime(&self, utc: &NaiveDateTime) -> FixedOffset {
            let switch = Self::switch_day().and_time(NaiveTime::MIN) - Duration::hours(2);
            if *utc < switch {
                Self::offset(2)
            } else {
                Self::offset(3)
            }
        }
    }

    #[test]
    fn window_starting_on_a_skipped_midnight_begins_at_the_first_valid_hour() {
        let now = MidnightGap
            .from_local_datetime(
                &(MidnightGap::switch_day() + Duration::days(6))
                    .and_hms_opt(12, 0, 0)
                    .unwrap(),
            )
            .single()
            .unwrap();

        // Local 01:00 (+03:00) on the switch day
        assert_eq!(
            window_start(&now),
            Utc.with_ymd_and_hms(2024, 3, 30, 22, 0, 0).unwrap()
        );
    }

    #[test]
    fn rankings_sort_descending_and_keep_first_seen_order_on_ties() {
        let aggregator = ClickAnalyticsAggregator::new();
        let labels = ["b", "a", "c", "a", "b", "d", "a"]
            .into_iter()
            .map(String::from);

        let ranked = aggregator.rank(labels);
        let pairs: Vec<(&str, u64)> = ranked.iter().map(|r| (r.name.as_str(), r.count)).collect();

        assert_eq!(pairs, vec![("a", 3), ("b", 2), ("c", 1), ("d", 1)]);
    }

    #[test]
    fn rankings_are_truncated_to_top_five() {
        let labels = (0..8).map(|i| format!("label-{i}"));
        let ranked = ClickAnalyticsAggregator::new().rank(labels);

        assert_eq!(ranked.len(), 5);
        assert_eq!(ranked[0].name, "label-0");
        assert_eq!(ranked[4].name, "label-4");
    }

    #[test]
    fn report_classifies_every_dimension() {
        let events = vec![
            click("https://www.youtube.com/watch?v=x", "iOS", Some(DeviceType::Mobile), Some("ES")),
            click("Direct", "iOS", Some(DeviceType::Mobile), Some("ES")),
            click("https://youtu.be/x", "Windows", Some(DeviceType::Desktop), None),
            click("https://blog.example.com/post", "Linux", None, Some("MX")),
        ];

        let report = ClickAnalyticsAggregator::new().aggregate(&events, &now());

        assert_eq!(report.timeline[6].clics, 4);
        assert_eq!(report.referers[0].name, "YouTube");
        assert_eq!(report.referers[0].count, 2);
        assert_eq!(report.referers[1].name, "Direct");
        assert_eq!(report.referers[2].name, "blog.example.com");
        assert_eq!(report.devices[0].name, "iOS (Mobile)");
        assert_eq!(report.devices[0].count, 2);
        assert_eq!(report.devices[2].name, "Linux");
        assert_eq!(report.countries[0].name, "ES");
        assert_eq!(report.countries[1].name, "Unknown");
        assert_eq!(report.countries[2].name, "MX");
    }

    #[test]
    fn identical_input_gives_identical_output() {
        let events: Vec<ClickEvent> = ["https://a.example", "https://b.example", "https://c.example"]
            .iter()
            .map(|r| click(r, "Android", Some(DeviceType::Mobile), Some("AR")))
            .collect();
        let aggregator = ClickAnalyticsAggregator::new();

        assert_eq!(
            aggregator.aggregate(&events, &now()),
            aggregator.aggregate(&events, &now())
        );
    }
}
