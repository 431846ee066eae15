use async_trait::async_trait;
use kite_mcp_core::dispatch::{DispatchError, ParamType, Tool, ToolSchema};
use serde_json::Value;

use crate::brokerage_client::KiteConnectClient;

pub struct GetQuoteTool;

#[async_trait]
impl Tool<KiteConnectClient> for GetQuoteTool {
    fn schema(&self) -> &ToolSchema {
        static SCHEMA: ToolSchema = ToolSchema {
            name: "get_quote",
            description: "Fetches real-time quotes for one or more tradingsymbols (exchange:tradingsymbol)",
            required: &["instruments"],
            param_types: &[("instruments", ParamType::StringArray)],
        };
        &SCHEMA
    }

    async fn call(&self, client: &KiteConnectClient, args: Value) -> Result<Value, DispatchError> {
        let instruments = args["instruments"]
            .as_array()
            .ok_or_else(|| DispatchError::Validation("instruments must be an array".to_string()))?
            .iter()
            .filter_map(|v| v.as_str().map(|s| ("i", s.to_string())))
            .collect::<Vec<_>>();

        client.get("/quote", &instruments).await.map_err(|e| DispatchError::ApiError(e.to_string()))
    }
}
