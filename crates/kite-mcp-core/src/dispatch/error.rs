use crate::gateway::GatewayError;

/// Classifies a dispatch failure for the `error_type` metrics label.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Auth(String),
    #[error("tool not found: {0}")]
    UnknownTool(String),
    #[error("{0}")]
    ApiError(String),
    #[error("already authenticated")]
    AlreadyAuthenticated,
}

impl DispatchError {
    /// The `error_type` label value recorded against `tool_errors`.
    pub fn label(&self) -> &'static str {
        match self {
            DispatchError::Validation(_) => "validation_error",
            DispatchError::Auth(_) => "auth_error",
            DispatchError::UnknownTool(_) => "unknown_tool",
            DispatchError::ApiError(_) => "api_error",
            DispatchError::AlreadyAuthenticated => "already_authenticated",
        }
    }
}

impl From<GatewayError> for DispatchError {
    fn from(err: GatewayError) -> Self {
        DispatchError::Auth(err.to_string())
    }
}
