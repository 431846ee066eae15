//! Receives a named tool call with a JSON object of arguments,
//! dispatches it to the tool's handler with an authenticated client,
//! and returns a structured result.

mod coerce;
mod error;
mod pagination;
mod schema;
mod tool;

pub use coerce::{coerce_args, validate_required};
pub use error::DispatchError;
pub use pagination::{Paginated, Pagination};
pub use schema::{ParamType, ToolSchema};
pub use tool::Tool;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::gateway::{BrokerageClient, BrokerageGateway, GatewayError};
use crate::metrics::{CounterKey, MetricsSink};
use crate::session::SessionKind;

const LOGIN_TOOL_NAME: &str = "login";

#[derive(Debug, Clone, Serialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: String,
}

/// The transport's uniform "text content" envelope. Always a success
/// shape at the wire level — failures are carried inside `content` as
/// text, with `is_error` set, never as a framework-level exception.
#[derive(Debug, Clone, Serialize)]
pub struct ToolCallResult {
    pub content: Vec<ContentBlock>,
    pub is_error: bool,
}

impl ToolCallResult {
    fn ok(value: Value) -> Self {
        let text = serde_json::to_string(&value).unwrap_or_else(|_| "null".to_string());
        ToolCallResult { content: vec![ContentBlock { kind: "text", text }], is_error: false }
    }

    fn err(message: impl Into<String>) -> Self {
        ToolCallResult {
            content: vec![ContentBlock { kind: "text", text: message.into() }],
            is_error: true,
        }
    }
}

/// Ties the Session Registry, Brokerage Gateway, Metrics Sink, and a
/// fixed tool registry together into the per-call pipeline.
pub struct Dispatcher<C: BrokerageClient> {
    gateway: Arc<BrokerageGateway<C>>,
    metrics: Arc<MetricsSink>,
    tools: HashMap<&'static str, Box<dyn Tool<C>>>,
    excluded: HashSet<String>,
}

impl<C: BrokerageClient> Dispatcher<C> {
    pub fn new(gateway: Arc<BrokerageGateway<C>>, metrics: Arc<MetricsSink>, excluded: HashSet<String>) -> Self {
        Dispatcher { gateway, metrics, tools: HashMap::new(), excluded }
    }

    /// Registers a tool unless its name appears in the exclude list.
    /// Returns whether it was registered.
    pub fn register(&mut self, tool: Box<dyn Tool<C>>) -> bool {
        let name = tool.schema().name;
        if self.excluded.contains(name) {
            return false;
        }
        self.tools.insert(name, tool);
        true
    }

    pub fn schemas(&self) -> Vec<&ToolSchema> {
        self.tools.values().map(|t| t.schema()).collect()
    }

    fn record_error(&self, tool: &str, session_type: SessionKind, label: &str) {
        let today = chrono::Utc::now().date_naive();
        self.metrics.incr(
            CounterKey::daily("tool_errors", today)
                .with_label("tool", tool)
                .with_label("error_type", label)
                .with_label("session_type", session_type.as_str()),
        );
    }

    /// Runs the full per-call pipeline for `tool_name`.
    pub async fn dispatch(
        &self,
        tool_name: &str,
        session_id: &str,
        session_type: SessionKind,
        args: Value,
    ) -> ToolCallResult {
        let today = chrono::Utc::now().date_naive();
        self.metrics.incr(
            CounterKey::daily("tool_calls", today)
                .with_label("tool", tool_name)
                .with_label("session_type", session_type.as_str()),
        );

        if tool_name == LOGIN_TOOL_NAME {
            return self.dispatch_login(session_id, session_type).await;
        }

        let Some(tool) = self.tools.get(tool_name) else {
            self.record_error(tool_name, session_type, "unknown_tool");
            return ToolCallResult::err(DispatchError::UnknownTool(tool_name.to_string()).to_string());
        };

        let client = match self.gateway.get_authenticated_client(session_id) {
            Ok(client) => client,
            Err(gateway_err) => {
                self.record_error(tool_name, session_type, gateway_label(&gateway_err));
                return ToolCallResult::err(gateway_err.to_string());
            }
        };

        let schema = tool.schema();
        if let Err(validation_err) = validate_required(schema, &args) {
            self.record_error(tool_name, session_type, validation_err.label());
            return ToolCallResult::err(validation_err.to_string());
        }

        let coerced = match coerce_args(schema, &args) {
            Ok(coerced) => coerced,
            Err(coercion_err) => {
                self.record_error(tool_name, session_type, coercion_err.label());
                return ToolCallResult::err(coercion_err.to_string());
            }
        };

        match tool.call(&client, coerced).await {
            Ok(value) => ToolCallResult::ok(value),
            Err(handler_err) => {
                self.record_error(tool_name, session_type, "api_error");
                ToolCallResult::err(format!("{tool_name} failed: {handler_err}"))
            }
        }
    }

    /// The `login` tool is decorated specially: a session that already
    /// holds valid credentials is rejected rather than handed a fresh
    /// login URL.
    async fn dispatch_login(&self, session_id: &str, session_type: SessionKind) -> ToolCallResult {
        if self.gateway.get_authenticated_client(session_id).is_ok() {
            self.record_error(LOGIN_TOOL_NAME, session_type, "already_authenticated");
            return ToolCallResult::err("already authenticated. Log out before requesting a new login URL");
        }

        match self.gateway.generate_login_url(session_id) {
            Ok(url) => ToolCallResult::ok(serde_json::json!({ "login_url": url })),
            Err(gateway_err) => {
                self.record_error(LOGIN_TOOL_NAME, session_type, "api_error");
                ToolCallResult::err(gateway_err.to_string())
            }
        }
    }
}

fn gateway_label(err: &GatewayError) -> &'static str {
    match err {
        GatewayError::EmptyId => "invalid_session",
        GatewayError::NotLoggedIn => "not_logged_in",
        GatewayError::CredentialsExpired => "credentials_expired",
        GatewayError::Session(_) => "session_error",
        GatewayError::Signer(_) => "signer_error",
        GatewayError::Client(_) => "api_error",
    }
}
