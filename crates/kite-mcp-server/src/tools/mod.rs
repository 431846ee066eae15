//! The fixed tool catalog this server registers with the dispatcher.
//! Enough tools to exercise every dispatcher invariant end-to-end, not
//! a full Kite Connect tool surface.

mod get_holdings;
mod get_instruments;
mod get_positions;
mod get_profile;
mod get_quote;

pub use get_holdings::GetHoldingsTool;
pub use get_instruments::GetInstrumentsTool;
pub use get_positions::GetPositionsTool;
pub use get_profile::GetProfileTool;
pub use get_quote::GetQuoteTool;

use kite_mcp_core::dispatch::ToolSchema;

/// `login` is executed by the dispatcher's own decorated pipeline, not
/// by a registered [`kite_mcp_core::dispatch::Tool`] impl — it needs to
/// run before an authenticated client exists. This schema exists only
/// so transports can advertise it alongside the registered tools.
pub const LOGIN_SCHEMA: ToolSchema = ToolSchema {
    name: "login",
    description: "Generates a Kite Connect login URL for this session, unless already authenticated",
    required: &[],
    param_types: &[],
};
