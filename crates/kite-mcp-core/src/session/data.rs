use chrono::{DateTime, Utc};

/// Opaque per-session payload. Modeled as a tagged sum type per the
/// "opaque session payload via tagged variants" design note: a wrong
/// variant on read is a programmer error, not a user error, so callers
/// match exhaustively rather than probing with `is_*`/`as_*` guesses.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionData {
    Empty,
    Brokerage(BrokerageBinding),
    PendingAuthorize(PendingAuthorize),
}

impl Default for SessionData {
    fn default() -> Self {
        SessionData::Empty
    }
}

impl SessionData {
    /// `Some` credentials iff this session holds a brokerage binding
    /// with stored credentials; `None` in every other case (including
    /// `Brokerage` with no credentials yet, and both other variants).
    pub fn brokerage_credentials(&self) -> Option<&BrokerageCredentials> {
        match self {
            SessionData::Brokerage(b) => b.credentials.as_ref(),
            _ => None,
        }
    }
}

/// Long-lived brokerage credentials minted by `CompleteLogin`.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerageCredentials {
    pub access_token: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

impl BrokerageCredentials {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// The tool-flow session's binding to a brokerage account. Holds
/// credentials only — the live client handle is constructed fresh per
/// call by the Brokerage Gateway and never stored back into the session
/// (see DESIGN.md).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BrokerageBinding {
    pub credentials: Option<BrokerageCredentials>,
}

/// Captured state for the OAuth-server session-manager variant
/// considered and rejected in favor of the tool-centric model (see
/// DESIGN.md). Not exercised by any operation this core exposes, kept
/// so the variant exists in the type for callers who need the
/// symmetry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingAuthorize {
    pub request_token: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}
