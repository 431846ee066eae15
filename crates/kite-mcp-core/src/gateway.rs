//! Turns a session id into an authenticated brokerage client, and
//! completes the external login exchange.

use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::metrics::{CounterKey, MetricsSink};
use crate::session::{
    BrokerageBinding, SessionData, SessionError, SessionKind, SessionRegistry,
};
use crate::signer::{RedirectSigner, SignerError};

pub use crate::session::BrokerageCredentials;

pub const CREDENTIAL_LIFETIME_HOURS: i64 = 24;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("session id must not be empty")]
    EmptyId,
    #[error("not logged in. Please use the login tool")]
    NotLoggedIn,
    #[error("Kite session has expired (24-hour limit). Please use the login tool to refresh")]
    CredentialsExpired,
    #[error("session error: {0}")]
    Session(#[from] SessionError),
    #[error("signer error: {0}")]
    Signer(#[from] SignerError),
    #[error("brokerage client error: {0}")]
    Client(String),
}

/// The out-of-scope "brokerage SDK itself" boundary: a per-session
/// authenticated handle plus the one-time login exchange. Implementors
/// are cheap to clone — `with_access_token` is expected to copy
/// connection config and swap in a token, not open a new connection.
#[async_trait::async_trait]
pub trait BrokerageClient: Clone + Send + Sync + 'static {
    /// Returns a clone of `self` carrying `token` as its per-request
    /// auth credential.
    fn with_access_token(&self, token: &str) -> Self;

    /// The SDK-provided base login URL this client was constructed
    /// against (API key embedded, no redirect params yet).
    fn login_url(&self) -> String;

    /// Exchanges a one-time request token for long-lived credentials.
    async fn generate_session(
        &self,
        request_token: &str,
        api_secret: &str,
    ) -> Result<RawSession, GatewayError>;
}

/// What a brokerage's session-generation call hands back, before the
/// gateway stamps an expiry onto it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSession {
    pub access_token: String,
    pub user_id: String,
}

/// Minimal [`BrokerageClient`] for tests and demo runs without live
/// brokerage credentials. Recognizes exactly one request token,
/// `"valid-token"`, and fails everything else with a client error —
/// enough to drive the dispatcher pipeline end to end.
#[derive(Debug, Clone)]
pub struct StubBrokerageClient {
    api_key: String,
    access_token: Option<String>,
}

impl StubBrokerageClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        StubBrokerageClient { api_key: api_key.into(), access_token: None }
    }
}

#[async_trait::async_trait]
impl BrokerageClient for StubBrokerageClient {
    fn with_access_token(&self, token: &str) -> Self {
        StubBrokerageClient { api_key: self.api_key.clone(), access_token: Some(token.to_string()) }
    }

    fn login_url(&self) -> String {
        format!("https://kite.zerodha.com/connect/login?v=3&api_key={}", self.api_key)
    }

    async fn generate_session(
        &self,
        request_token: &str,
        _api_secret: &str,
    ) -> Result<RawSession, GatewayError> {
        if request_token == "valid-token" {
            Ok(RawSession { access_token: "stub-access-token".to_string(), user_id: "STUB001".to_string() })
        } else {
            Err(GatewayError::Client(format!("invalid request token: {request_token}")))
        }
    }
}

/// Wraps a brokerage client per session. Never reaches into the
/// [`SessionRegistry`]'s internal map — every state transition goes
/// through registry operations, and credentials live inside
/// `session.data`, not inside the gateway.
pub struct BrokerageGateway<C: BrokerageClient> {
    base_client: C,
    api_secret: String,
    registry: Arc<SessionRegistry>,
    metrics: Arc<MetricsSink>,
    signer: Arc<RedirectSigner>,
}

impl<C: BrokerageClient> BrokerageGateway<C> {
    pub fn new(
        base_client: C,
        api_secret: impl Into<String>,
        registry: Arc<SessionRegistry>,
        metrics: Arc<MetricsSink>,
        signer: Arc<RedirectSigner>,
    ) -> Self {
        BrokerageGateway { base_client, api_secret: api_secret.into(), registry, metrics, signer }
    }

    /// `GetAuthenticatedClient(sessionID) -> (client, err)`.
    pub fn get_authenticated_client(&self, session_id: &str) -> Result<C, GatewayError> {
        if session_id.is_empty() {
            return Err(GatewayError::EmptyId);
        }
        let (session, _is_new) = self.registry.get_or_create(session_id, SessionKind::Unknown)?;

        let credentials = match session.data.brokerage_credentials() {
            Some(creds) => creds.clone(),
            None => return Err(GatewayError::NotLoggedIn),
        };

        if credentials.is_expired(Utc::now()) {
            return Err(GatewayError::CredentialsExpired);
        }

        Ok(self.base_client.with_access_token(&credentials.access_token))
    }

    /// `CompleteLogin(requestToken) -> (credentials, err)`. Stores
    /// nothing by itself — the caller writes the returned credentials
    /// into whichever session they belong to via
    /// [`SessionRegistry::update_data`].
    pub async fn complete_login(&self, request_token: &str) -> Result<BrokerageCredentials, GatewayError> {
        let raw = self.base_client.generate_session(request_token, &self.api_secret).await?;
        let credentials = BrokerageCredentials {
            access_token: raw.access_token,
            user_id: raw.user_id.clone(),
            expires_at: Utc::now() + Duration::hours(CREDENTIAL_LIFETIME_HOURS),
        };

        let today = Utc::now().date_naive();
        self.metrics.incr(CounterKey::daily("user_logins", today));
        self.metrics.record_daily_user(today, &raw.user_id);

        Ok(credentials)
    }

    /// Convenience wrapper combining `CompleteLogin` with the registry
    /// write the caller would otherwise have to perform manually.
    pub async fn complete_login_and_store(
        &self,
        session_id: &str,
        request_token: &str,
    ) -> Result<BrokerageCredentials, GatewayError> {
        let credentials = self.complete_login(request_token).await?;
        self.registry.update_data(
            session_id,
            SessionData::Brokerage(BrokerageBinding { credentials: Some(credentials.clone()) }),
        )?;
        Ok(credentials)
    }

    /// `GenerateLoginURL(sessionID) -> (url, err)`.
    pub fn generate_login_url(&self, session_id: &str) -> Result<String, GatewayError> {
        let signed = self.signer.sign_redirect(session_id)?;
        let escaped = urlencoding_escape(&signed);
        Ok(format!("{}&redirect_params={escaped}", self.base_client.login_url()))
    }
}

/// Minimal query-string escaping sufficient for a signer fragment
/// (`session_id=<id>|<ts>.<mac>`), which contains only URL-safe
/// base64, digits, a pipe, and a dot. Pulled in-crate rather than
/// depending on a full URL-encoding crate for one call site.
fn urlencoding_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(b as char),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}
