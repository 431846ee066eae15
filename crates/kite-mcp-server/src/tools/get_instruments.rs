use std::sync::Arc;

use async_trait::async_trait;
use kite_mcp_core::dispatch::{DispatchError, Pagination, ParamType, Tool, ToolSchema};
use kite_mcp_core::InstrumentCatalog;
use serde_json::Value;

use crate::brokerage_client::KiteConnectClient;

/// Paginated instrument lookup, backed by the Instrument Catalog's
/// `filter`. `exchange` narrows the scan; `from`/`limit` apply the
/// shared pagination envelope.
pub struct GetInstrumentsTool {
    catalog: Arc<InstrumentCatalog>,
}

impl GetInstrumentsTool {
    pub fn new(catalog: Arc<InstrumentCatalog>) -> Self {
        GetInstrumentsTool { catalog }
    }
}

#[async_trait]
impl Tool<KiteConnectClient> for GetInstrumentsTool {
    fn schema(&self) -> &ToolSchema {
        static SCHEMA: ToolSchema = ToolSchema {
            name: "get_instruments",
            description: "Lists tradable instruments, optionally narrowed by exchange, with pagination",
            required: &[],
            param_types: &[
                ("exchange", ParamType::String),
                ("from", ParamType::Int),
                ("limit", ParamType::Int),
            ],
        };
        &SCHEMA
    }

    async fn call(&self, _client: &KiteConnectClient, args: Value) -> Result<Value, DispatchError> {
        let exchange = args.get("exchange").and_then(Value::as_str).map(str::to_string);
        let from = args.get("from").and_then(Value::as_i64).unwrap_or(0).max(0) as usize;
        let limit = args.get("limit").and_then(Value::as_i64).unwrap_or(0);

        let instruments = match &exchange {
            Some(ex) => self.catalog.filter(|i| i.exchange == *ex),
            None => self.catalog.filter(|_| true),
        };

        let page = Pagination::new(from, limit).apply(&instruments);
        Ok(page.into_response())
    }
}
