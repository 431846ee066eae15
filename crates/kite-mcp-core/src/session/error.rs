/// Failure kinds surfaced by [`super::SessionRegistry`] operations.
///
/// Expiration is folded into `NotFound` for external callers — expired
/// sessions are indistinguishable from terminated ones once observed —
/// but `Validate` still reports the distinction internally.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("session id must not be empty")]
    EmptyId,
    #[error("session id has invalid format: {0}")]
    InvalidFormat(String),
    #[error("session not found")]
    NotFound,
    #[error("session is terminated")]
    Terminated,
}
