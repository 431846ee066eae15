use serde_json::Value;

use super::error::DispatchError;
use super::schema::ToolSchema;
use crate::gateway::BrokerageClient;

/// A single named, schema-checked operation. `call` receives an
/// already-authenticated client and already-validated, already-coerced
/// arguments — the dispatcher owns every cross-cutting concern named in
/// the per-call pipeline; a `Tool` impl is just the handler body.
#[async_trait::async_trait]
pub trait Tool<C: BrokerageClient>: Send + Sync {
    fn schema(&self) -> &ToolSchema;

    async fn call(&self, client: &C, args: Value) -> Result<Value, DispatchError>;
}
