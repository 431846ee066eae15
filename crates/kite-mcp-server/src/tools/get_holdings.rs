use async_trait::async_trait;
use kite_mcp_core::dispatch::{DispatchError, Tool, ToolSchema};
use serde_json::Value;

use crate::brokerage_client::KiteConnectClient;

pub struct GetHoldingsTool;

#[async_trait]
impl Tool<KiteConnectClient> for GetHoldingsTool {
    fn schema(&self) -> &ToolSchema {
        static SCHEMA: ToolSchema = ToolSchema {
            name: "get_holdings",
            description: "Fetches the logged-in user's long-term equity holdings",
            required: &[],
            param_types: &[],
        };
        &SCHEMA
    }

    async fn call(&self, client: &KiteConnectClient, _args: Value) -> Result<Value, DispatchError> {
        client.get("/portfolio/holdings", &[]).await.map_err(|e| DispatchError::ApiError(e.to_string()))
    }
}
