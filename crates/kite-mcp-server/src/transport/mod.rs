//! Single HTTP multiplexer mounted regardless of `APP_MODE`, plus the
//! transport-specific routes and the stdio request loop that mode
//! calls for.

mod handlers;
mod router;
pub mod state;
pub mod stdio;

pub use router::build_router;
pub use state::AppState;
