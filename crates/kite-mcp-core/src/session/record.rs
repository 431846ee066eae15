use chrono::{DateTime, Duration, Utc};

use super::data::SessionData;
use super::id::SessionKind;

/// A single session record. Owned exclusively by the registry; callers
/// only ever see clones, never a live pointer into the map (see
/// DESIGN.md for why this implementation clones rather than loans).
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub terminated: bool,
    pub kind: SessionKind,
    pub data: SessionData,
}

impl Session {
    pub fn new(id: String, kind: SessionKind, now: DateTime<Utc>, duration: Duration) -> Self {
        debug_assert!(duration > Duration::zero());
        Session {
            id,
            created_at: now,
            expires_at: now + duration,
            terminated: false,
            kind,
            data: SessionData::Empty,
        }
    }

    pub fn with_data(mut self, data: SessionData) -> Self {
        self.data = data;
        self
    }

    /// Invariant (c): expiration is a property evaluated against wall
    /// clock, not a cached flag — so it's checked on every read.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        !self.terminated && !self.is_expired(now)
    }
}
