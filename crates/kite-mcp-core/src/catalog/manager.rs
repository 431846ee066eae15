use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::{error, info, warn};

use super::error::CatalogError;
use super::fetch::{fetch_body, parse_jsonlines};
use super::indexes::CatalogIndexes;
use super::instrument::Instrument;
use super::stats::CatalogStats;

pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY: StdDuration = StdDuration::from_secs(3);
pub const DEFAULT_SCHEDULER_TICK: StdDuration = StdDuration::from_secs(5 * 60);
pub const DEFAULT_UPDATE_HOUR: u32 = 8;
pub const DEFAULT_UPDATE_MINUTE: u32 = 0;

#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub source_url: String,
    pub timezone: Tz,
    pub update_hour: u32,
    pub update_minute: u32,
    pub retry_attempts: u32,
    pub retry_delay: StdDuration,
    pub scheduler_tick: StdDuration,
}

impl CatalogConfig {
    pub fn new(source_url: impl Into<String>) -> Self {
        CatalogConfig {
            source_url: source_url.into(),
            timezone: chrono_tz::Asia::Kolkata,
            update_hour: DEFAULT_UPDATE_HOUR,
            update_minute: DEFAULT_UPDATE_MINUTE,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            scheduler_tick: DEFAULT_SCHEDULER_TICK,
        }
    }
}

/// Scheduled, concurrency-safe instrument-catalog refresher. Serves
/// point lookups and filter scans under a reader/writer lock; rebuilds
/// all five indexes atomically from a remote JSON-lines payload on a
/// daily boundary in a fixed timezone, with retries.
pub struct InstrumentCatalog {
    indexes: RwLock<Arc<CatalogIndexes>>,
    stats: RwLock<CatalogStats>,
    config: CatalogConfig,
    client: reqwest::Client,
}

impl InstrumentCatalog {
    pub fn new(config: CatalogConfig) -> Arc<Self> {
        Arc::new(InstrumentCatalog {
            indexes: RwLock::new(Arc::new(CatalogIndexes::default())),
            stats: RwLock::new(CatalogStats::default()),
            config,
            client: reqwest::Client::new(),
        })
    }

    /// `LoadMap(tokenMap)`: seeds the catalog from a caller-provided
    /// snapshot, bypassing the network fetch entirely.
    pub fn load_map(&self, indexes: CatalogIndexes) {
        let count = indexes.len();
        *self.indexes.write() = Arc::new(indexes);
        let mut stats = self.stats.write();
        stats.last_update_time = Some(Utc::now());
        stats.last_update_count = count;
        stats.total_updates += 1;
    }

    /// `Insert(instrument)`: insert a single record; all five indexes
    /// are updated consistently via copy-on-write.
    pub fn insert(&self, instrument: Instrument) {
        let mut guard = self.indexes.write();
        let mut next = (**guard).clone();
        next.insert(instrument);
        *guard = Arc::new(next);
    }

    fn same_business_day(&self, a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
        a.with_timezone(&self.config.timezone).date_naive() == b.with_timezone(&self.config.timezone).date_naive()
    }

    /// `UpdateIfNeeded()`.
    pub async fn update_if_needed(&self) -> Result<usize, CatalogError> {
        {
            let stats = self.stats.read();
            if let Some(last) = stats.last_update_time {
                let count = self.indexes.read().len();
                if count > 0 && self.same_business_day(last, Utc::now()) {
                    return Ok(count);
                }
            }
        }
        self.force_update().await
    }

    /// `ForceUpdate()`: unconditional fetch and rebuild.
    pub async fn force_update(&self) -> Result<usize, CatalogError> {
        let mut last_err = None;

        for attempt in 1..=self.config.retry_attempts {
            match self.fetch_and_build().await {
                Ok(indexes) => {
                    let count = indexes.len();
                    *self.indexes.write() = Arc::new(indexes);

                    let mut stats = self.stats.write();
                    stats.last_update_time = Some(Utc::now());
                    stats.last_update_count = count;
                    stats.total_updates += 1;
                    return Ok(count);
                }
                Err(e) => {
                    warn!(attempt, error = %e, "instrument catalog refresh attempt failed");
                    self.stats.write().failed_updates += 1;
                    last_err = Some(e);
                    if attempt < self.config.retry_attempts {
                        tokio::time::sleep(self.config.retry_delay).await;
                    }
                }
            }
        }

        let last_error = last_err.map(|e| e.to_string()).unwrap_or_default();
        error!(attempts = self.config.retry_attempts, %last_error, "instrument catalog refresh exhausted retries");
        Err(CatalogError::RetriesExhausted {
            attempts: self.config.retry_attempts,
            last_error,
        })
    }

    async fn fetch_and_build(&self) -> Result<CatalogIndexes, CatalogError> {
        let body = fetch_body(&self.client, &self.config.source_url).await?;
        let instruments = parse_jsonlines(&body)?;
        Ok(CatalogIndexes::from_snapshot(instruments))
    }

    pub fn get_by_id(&self, id: &str) -> Option<Instrument> {
        self.indexes.read().by_id.get(id).cloned()
    }

    pub fn get_by_tradingsymbol(&self, exchange: &str, tradingsymbol: &str) -> Option<Instrument> {
        self.get_by_id(&format!("{exchange}:{tradingsymbol}"))
    }

    pub fn get_by_isin(&self, isin: &str) -> Vec<Instrument> {
        self.indexes.read().by_isin.get(isin).cloned().unwrap_or_default()
    }

    pub fn get_by_instrument_token(&self, token: u32) -> Option<Instrument> {
        self.indexes.read().by_token.get(&token).cloned()
    }

    pub fn get_by_exchange_token(&self, segment: &str, exchange_token: u32) -> Option<Instrument> {
        let indexes = self.indexes.read();
        let segment_id = *indexes.segment_to_id.get(segment)?;
        let token = Instrument::token_from_exchange_token(segment_id, exchange_token);
        indexes.by_token.get(&token).cloned()
    }

    pub fn filter(&self, predicate: impl Fn(&Instrument) -> bool) -> Vec<Instrument> {
        self.indexes
            .read()
            .by_token
            .values()
            .filter(|i| predicate(i))
            .cloned()
            .collect()
    }

    pub fn get_all_by_underlying(&self, exchange: &str, name: &str) -> Vec<Instrument> {
        self.filter(|i| i.exchange == exchange && i.name == name)
    }

    pub fn count(&self) -> usize {
        self.indexes.read().len()
    }

    pub fn stats(&self) -> CatalogStats {
        self.stats.read().clone()
    }

    pub fn next_scheduled_update(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let local_now = now.with_timezone(&self.config.timezone);
        let today = local_now
            .date_naive()
            .and_hms_opt(self.config.update_hour, self.config.update_minute, 0)
            .expect("valid update hour/minute");
        let today_local = self
            .config
            .timezone
            .from_local_datetime(&today)
            .single()
            .unwrap_or(local_now);

        let next_local = if today_local > local_now {
            today_local
        } else {
            today_local + chrono::Duration::days(1)
        };
        next_local.with_timezone(&Utc)
    }

    /// `StartSweeper`-equivalent for the catalog: a loop that wakes
    /// every `scheduler_tick` and calls `ForceUpdate` once the
    /// configured hour/minute has passed for the current business day.
    pub fn start_scheduler(self: &Arc<Self>) -> CatalogSchedulerHandle {
        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        let catalog = self.clone();

        let join = tokio::spawn(async move {
            let mut last_run_day = None;
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(catalog.config.scheduler_tick) => {
                        let now = Utc::now();
                        let local_now = now.with_timezone(&catalog.config.timezone);
                        let boundary_passed = local_now.time()
                            >= chrono::NaiveTime::from_hms_opt(catalog.config.update_hour, catalog.config.update_minute, 0).unwrap();
                        let today = local_now.date_naive();

                        if boundary_passed && last_run_day != Some(today) {
                            match catalog.force_update().await {
                                Ok(count) => info!(count, "scheduled instrument catalog refresh completed"),
                                Err(e) => error!(error = %e, "scheduled instrument catalog refresh failed"),
                            }
                            last_run_day = Some(today);
                        }
                    }
                    _ = cancel_rx.changed() => {
                        if *cancel_rx.borrow() {
                            info!("instrument catalog scheduler stopping");
                            break;
                        }
                    }
                }
            }
        });

        CatalogSchedulerHandle { cancel: cancel_tx, join }
    }
}

pub struct CatalogSchedulerHandle {
    cancel: watch::Sender<bool>,
    join: tokio::task::JoinHandle<()>,
}

impl CatalogSchedulerHandle {
    /// `Shutdown()`: cancel scheduler, wait for it to observe
    /// cancellation.
    pub async fn shutdown(self) {
        let _ = self.cancel.send(true);
        let _ = self.join.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc as StdArc;

    fn sample_line(token: u32, symbol: &str) -> String {
        format!(
            "{{\"instrument_token\":{token},\"exchange_token\":{etoken},\"tradingsymbol\":\"{symbol}\",\"name\":\"{symbol}\",\"last_price\":1.0,\"tick_size\":0.05,\"lot_size\":1,\"instrument_type\":\"EQ\",\"segment\":\"NSE\",\"exchange\":\"NSE\"}}",
            etoken = token >> 8,
        )
    }

    #[tokio::test]
    async fn update_if_needed_is_noop_same_business_day() {
        let mut server = mockito::Server::new_async().await;
        let hit_count = StdArc::new(AtomicUsize::new(0));
        let hit_count2 = hit_count.clone();
        let body = format!("{}\n{}\n", sample_line(779521, "SBIN"), sample_line(738561, "RELIANCE"));
        let _mock = server
            .mock("GET", "/instruments")
            .with_status(200)
            .with_body(body)
            .expect_at_least(1)
            .create_async()
            .await;
        hit_count2.fetch_add(0, Ordering::SeqCst);

        let catalog = InstrumentCatalog::new(CatalogConfig::new(format!("{}/instruments", server.url())));
        let first = catalog.update_if_needed().await.unwrap();
        assert_eq!(first, 2);

        let second = catalog.update_if_needed().await.unwrap();
        assert_eq!(second, 2);
        assert_eq!(catalog.stats().total_updates, 1);
    }

    #[tokio::test]
    async fn force_update_always_refetches() {
        let mut server = mockito::Server::new_async().await;
        let body = sample_line(779521, "SBIN");
        let _mock = server
            .mock("GET", "/instruments")
            .with_status(200)
            .with_body(body)
            .expect_at_least(2)
            .create_async()
            .await;

        let catalog = InstrumentCatalog::new(CatalogConfig::new(format!("{}/instruments", server.url())));
        catalog.force_update().await.unwrap();
        catalog.force_update().await.unwrap();
        assert_eq!(catalog.stats().total_updates, 2);
    }

    #[tokio::test]
    async fn retries_exhaust_and_preserve_previous_snapshot() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/instruments")
            .with_status(500)
            .expect_at_least(1)
            .create_async()
            .await;

        let mut config = CatalogConfig::new(format!("{}/instruments", server.url()));
        config.retry_attempts = 2;
        config.retry_delay = StdDuration::from_millis(1);
        let catalog = InstrumentCatalog::new(config);

        catalog.load_map(CatalogIndexes::from_snapshot(vec![]));
        let seeded = vec![{
            let mut i: Instrument = serde_json::from_str(&sample_line(1, "X")).unwrap();
            i.instrument_token = 1;
            i
        }];
        catalog.load_map(CatalogIndexes::from_snapshot(seeded));

        let result = catalog.force_update().await;
        assert!(result.is_err());
        // Previous snapshot (seeded, count 1) must still be fully valid.
        assert_eq!(catalog.count(), 1);
    }

    #[tokio::test]
    async fn concurrent_readers_see_whole_snapshots_never_mixed() {
        let catalog = InstrumentCatalog::new(CatalogConfig::new("http://unused.invalid"));
        let initial: Instrument = serde_json::from_str(&sample_line(779521, "SBIN")).unwrap();
        catalog.load_map(CatalogIndexes::from_snapshot(vec![initial]));

        let mut handles = Vec::new();
        for _ in 0..100 {
            let catalog = catalog.clone();
            handles.push(tokio::spawn(async move { catalog.get_by_id("NSE:SBIN") }));
        }

        // Concurrently replace with a snapshot containing only SBIN
        // (as in scenario S4) while readers are in flight.
        let replace_catalog = catalog.clone();
        let replacer = tokio::spawn(async move {
            let fresh: Instrument = serde_json::from_str(&sample_line(779521, "SBIN")).unwrap();
            replace_catalog.load_map(CatalogIndexes::from_snapshot(vec![fresh]));
        });

        for handle in handles {
            let result = handle.await.unwrap();
            if let Some(instrument) = result {
                assert_eq!(instrument.instrument_token, 779521);
            }
        }
        replacer.await.unwrap();
    }
}
