use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct CatalogStats {
    pub last_update_time: Option<DateTime<Utc>>,
    pub last_update_count: usize,
    pub total_updates: u64,
    pub failed_updates: u64,
    pub next_scheduled_update: Option<DateTime<Utc>>,
}
