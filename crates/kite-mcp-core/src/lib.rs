//! Authentication, session-lifecycle, and dispatch substrate for a
//! protocol-bridging server that exposes a brokerage HTTP API as a set
//! of named, schema-checked tools.
//!
//! This crate holds no transport code and no concrete per-tool API call
//! bodies — those are the job of the binary crate that depends on it.

pub mod catalog;
pub mod dispatch;
pub mod gateway;
pub mod metrics;
pub mod session;
pub mod signer;

pub use catalog::{Instrument, InstrumentCatalog};
pub use dispatch::{ContentBlock, Dispatcher, Paginated, Pagination, Tool, ToolCallResult, ToolSchema};
pub use gateway::{BrokerageClient, BrokerageCredentials, BrokerageGateway, GatewayError};
pub use metrics::{MetricsSink, MetricsSweeperHandle};
pub use session::{SessionData, SessionId, SessionKind, SessionRegistry};
pub use signer::{RedirectSigner, SignerError};
