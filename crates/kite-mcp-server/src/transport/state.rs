use std::sync::Arc;

use kite_mcp_core::dispatch::Dispatcher;
use kite_mcp_core::gateway::BrokerageGateway;
use kite_mcp_core::{InstrumentCatalog, MetricsSink, RedirectSigner, SessionRegistry};

use crate::brokerage_client::KiteConnectClient;

/// Shared state for every route, regardless of which `APP_MODE` routes
/// are mounted on top of it.
pub struct AppState {
    pub dispatcher: Arc<Dispatcher<KiteConnectClient>>,
    pub gateway: Arc<BrokerageGateway<KiteConnectClient>>,
    pub signer: Arc<RedirectSigner>,
    pub registry: Arc<SessionRegistry>,
    pub metrics: Arc<MetricsSink>,
    pub catalog: Arc<InstrumentCatalog>,
    pub admin_secret: Option<String>,
}
