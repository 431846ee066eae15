use uuid::Uuid;

use super::error::SessionError;

const MINTED_PREFIX: &str = "kitemcp-";

/// Which transport handed us a client. Captured at mint/get-or-create
/// time so the dispatcher's `session_type` metric label has something
/// to read without threading the transport kind through every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Sse,
    Mcp,
    Stdio,
    Unknown,
}

impl SessionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKind::Sse => "sse",
            SessionKind::Mcp => "mcp",
            SessionKind::Stdio => "stdio",
            SessionKind::Unknown => "unknown",
        }
    }
}

/// A validated session identifier: either self-minted
/// (`kitemcp-<uuid-v4>`) or a bare UUID-v4 supplied by a transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Mints a new self-generated id. Always carries the prefix.
    pub fn mint() -> Self {
        SessionId(format!("{MINTED_PREFIX}{}", Uuid::new_v4()))
    }

    /// Validates and wraps an externally-supplied id.
    pub fn parse(raw: &str) -> Result<Self, SessionError> {
        validate_id_shape(raw)?;
        Ok(SessionId(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Checks that `raw` is either `kitemcp-<uuid-v4>` or a bare UUID-v4.
/// Does not check existence — only shape.
pub fn validate_id_shape(raw: &str) -> Result<(), SessionError> {
    if raw.is_empty() {
        return Err(SessionError::EmptyId);
    }

    let candidate = raw.strip_prefix(MINTED_PREFIX).unwrap_or(raw);

    match Uuid::parse_str(candidate) {
        Ok(_) => Ok(()),
        Err(_) => Err(SessionError::InvalidFormat(raw.to_string())),
    }
}
