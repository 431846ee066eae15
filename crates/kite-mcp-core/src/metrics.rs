//! Lock-free, bounded, per-process counters with a plain-text scrape
//! format.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info};

pub const DEFAULT_CLEANUP_HOUR_UTC: u32 = 3;
pub const DEFAULT_CLEANUP_WEEKDAY: Weekday = Weekday::Sat;
pub const DEFAULT_CLEANUP_RETENTION_DAYS: i64 = 30;

/// A counter key: either a bare name or a name carrying a UTC date
/// dimension plus an optional fixed label set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterKey {
    name: &'static str,
    date: Option<NaiveDate>,
    labels: Vec<(&'static str, String)>,
}

impl CounterKey {
    pub fn simple(name: &'static str) -> Self {
        CounterKey { name, date: None, labels: Vec::new() }
    }

    pub fn daily(name: &'static str, date: NaiveDate) -> Self {
        CounterKey { name, date: Some(date), labels: Vec::new() }
    }

    pub fn with_label(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.labels.push((key, value.into()));
        self
    }

    fn cache_key(&self) -> String {
        let mut s = String::from(self.name);
        if let Some(date) = self.date {
            s.push('|');
            s.push_str(&date.to_string());
        }
        for (k, v) in &self.labels {
            s.push('|');
            s.push_str(k);
            s.push('=');
            s.push_str(v);
        }
        s
    }
}

struct Counter {
    key: CounterKey,
    value: AtomicI64,
}

/// Per-day set of unique user ids with an atomic cardinality counter.
#[derive(Default)]
struct UserSet {
    users: DashSet<String>,
    count: AtomicI64,
}

impl UserSet {
    fn record(&self, user_id: &str) {
        if self.users.insert(user_id.to_string()) {
            self.count.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn cardinality(&self) -> i64 {
        self.count.load(Ordering::Relaxed)
    }
}

/// Bounded in-memory counters with date-partitioned keys and weekly GC.
pub struct MetricsSink {
    service: String,
    counters: DashMap<String, Arc<Counter>>,
    daily_users: DashMap<NaiveDate, Arc<UserSet>>,
    cleanup_retention_days: i64,
    last_swept: Mutex<Option<NaiveDate>>,
}

pub const DEFAULT_SWEEPER_TICK: StdDuration = StdDuration::from_secs(60 * 60);

/// Handle to the metrics sweeper background task.
pub struct MetricsSweeperHandle {
    cancel: watch::Sender<bool>,
    join: tokio::task::JoinHandle<()>,
}

impl MetricsSweeperHandle {
    pub async fn stop(self) {
        let _ = self.cancel.send(true);
        let _ = self.join.await;
    }
}

impl MetricsSink {
    pub fn new(service: impl Into<String>) -> Self {
        MetricsSink {
            service: service.into(),
            counters: DashMap::new(),
            daily_users: DashMap::new(),
            cleanup_retention_days: DEFAULT_CLEANUP_RETENTION_DAYS,
            last_swept: Mutex::new(None),
        }
    }

    /// Background loop: wakes every `tick`, sweeps `daily_users` once
    /// per calendar day the weekly cleanup slot is observed in.
    pub fn start_sweeper(self: &Arc<Self>, tick: StdDuration) -> MetricsSweeperHandle {
        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        let sink = self.clone();

        let join = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(tick) => {
                        let now = Utc::now();
                        if sink.is_cleanup_time(now) {
                            let today = now.date_naive();
                            let mut last = sink.last_swept.lock();
                            if *last != Some(today) {
                                let removed = sink.sweep_daily_users(now);
                                debug!(removed, "metrics sweeper cleaned up stale daily-user entries");
                                *last = Some(today);
                            }
                        }
                    }
                    _ = cancel_rx.changed() => {
                        if *cancel_rx.borrow() {
                            info!("metrics sweeper stopping");
                            break;
                        }
                    }
                }
            }
        });

        MetricsSweeperHandle { cancel: cancel_tx, join }
    }

    /// Increments (load-or-store + `fetch_add`) the counter for `key`.
    pub fn incr(&self, key: CounterKey) {
        let cache_key = key.cache_key();
        let counter = self
            .counters
            .entry(cache_key)
            .or_insert_with(|| Arc::new(Counter { key, value: AtomicI64::new(0) }))
            .clone();
        counter.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn value(&self, key: &CounterKey) -> i64 {
        self.counters
            .get(&key.cache_key())
            .map(|c| c.value.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Records a user as seen today (UTC), incrementing the daily
    /// unique-user cardinality counter the first time that id is seen
    /// on that date.
    pub fn record_daily_user(&self, date: NaiveDate, user_id: &str) {
        let set = self
            .daily_users
            .entry(date)
            .or_insert_with(|| Arc::new(UserSet::default()))
            .clone();
        set.record(user_id);
    }

    pub fn daily_user_count(&self, date: NaiveDate) -> i64 {
        self.daily_users.get(&date).map(|s| s.cardinality()).unwrap_or(0)
    }

    /// Weekly sweeper: deletes `daily_users` entries older than
    /// `cleanup_retention_days`. Counter cells are never swept — bounded
    /// by label cardinality times the retention window of emitted
    /// dates.
    pub fn sweep_daily_users(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now.date_naive() - Duration::days(self.cleanup_retention_days);
        let stale: Vec<NaiveDate> = self
            .daily_users
            .iter()
            .filter(|entry| *entry.key() < cutoff)
            .map(|entry| *entry.key())
            .collect();
        for date in &stale {
            self.daily_users.remove(date);
        }
        stale.len()
    }

    /// Whether `now` (UTC) falls on the weekly cleanup slot.
    pub fn is_cleanup_time(&self, now: DateTime<Utc>) -> bool {
        now.weekday() == DEFAULT_CLEANUP_WEEKDAY && now.hour_matches(DEFAULT_CLEANUP_HOUR_UTC)
    }

    /// Plain-text exposition, label-sorted for deterministic output.
    pub fn render(&self) -> String {
        let mut lines = Vec::new();

        for entry in self.counters.iter() {
            let counter = entry.value();
            let mut labels: BTreeMap<&str, String> = BTreeMap::new();
            if let Some(date) = counter.key.date {
                labels.insert("date", date.to_string());
            }
            for (k, v) in &counter.key.labels {
                labels.insert(k, v.clone());
            }
            labels.insert("service", self.service.clone());

            let label_str = labels
                .iter()
                .map(|(k, v)| format!("{k}=\"{v}\""))
                .collect::<Vec<_>>()
                .join(",");

            lines.push(format!(
                "{}_total{{{}}} {}",
                counter.key.name,
                label_str,
                counter.value.load(Ordering::Relaxed)
            ));
        }

        for entry in self.daily_users.iter() {
            let date = *entry.key();
            let count = entry.value().cardinality();
            lines.push(format!(
                "daily_unique_users_total{{date=\"{date}\",service=\"{}\"}} {count}",
                self.service
            ));
        }

        lines.sort();
        lines.join("\n") + if lines.is_empty() { "" } else { "\n" }
    }
}

trait HourMatch {
    fn hour_matches(&self, hour: u32) -> bool;
}

impl HourMatch for DateTime<Utc> {
    fn hour_matches(&self, hour: u32) -> bool {
        use chrono::Timelike;
        self.hour() == hour
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn counters_never_decrease_and_render_with_date_label() {
        let sink = MetricsSink::new("kite-mcp");
        let date = NaiveDate::from_ymd_opt(2026, 7, 27).unwrap();
        let key = CounterKey::daily("user_logins", date);

        sink.incr(key.clone());
        sink.incr(key.clone());
        assert_eq!(sink.value(&key), 2);

        let rendered = sink.render();
        assert!(rendered.contains("user_logins_total{date=\"2026-07-27\",service=\"kite-mcp\"} 2"));
    }

    #[test]
    fn non_daily_counter_omits_date_label() {
        let sink = MetricsSink::new("kite-mcp");
        let key = CounterKey::simple("startup_count");
        sink.incr(key.clone());
        let rendered = sink.render();
        assert!(rendered.contains("startup_count_total{service=\"kite-mcp\"} 1"));
        assert!(!rendered.contains("startup_count_total{date"));
    }

    #[test]
    fn daily_user_cardinality_counts_unique_only() {
        let sink = MetricsSink::new("kite-mcp");
        let date = NaiveDate::from_ymd_opt(2026, 7, 27).unwrap();
        sink.record_daily_user(date, "U1");
        sink.record_daily_user(date, "U1");
        sink.record_daily_user(date, "U2");
        assert_eq!(sink.daily_user_count(date), 2);
    }

    #[test]
    fn sweep_removes_entries_older_than_retention() {
        let sink = MetricsSink::new("kite-mcp");
        let now = Utc.with_ymd_and_hms(2026, 7, 27, 3, 0, 0).unwrap();
        let old_date = (now - Duration::days(40)).date_naive();
        sink.record_daily_user(old_date, "U1");
        let removed = sink.sweep_daily_users(now);
        assert_eq!(removed, 1);
        assert_eq!(sink.daily_user_count(old_date), 0);
    }

    #[test]
    fn tool_error_counter_carries_labels() {
        let sink = MetricsSink::new("kite-mcp");
        let date = NaiveDate::from_ymd_opt(2026, 7, 27).unwrap();
        let key = CounterKey::daily("tool_errors", date)
            .with_label("tool", "get_profile")
            .with_label("error_type", "api_error")
            .with_label("session_type", "mcp");
        sink.incr(key.clone());
        let rendered = sink.render();
        assert!(rendered.contains("tool_errors_total{"));
        assert!(rendered.contains("tool=\"get_profile\""));
        assert!(rendered.contains("error_type=\"api_error\""));
    }
}
