use std::sync::Arc;

use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::AppMode;

use super::handlers::{admin_metrics, callback, list_tools, mcp_call, sse_handshake, sse_message, status_page};
use super::state::AppState;

/// Builds the single axum router mounted regardless of `APP_MODE`,
/// plus whichever transport-specific routes that mode calls for.
/// `stdio` mode mounts no HTTP routes beyond the always-present ones —
/// its own request loop is a separate task (see
/// [`crate::transport::stdio::run`]).
pub fn build_router(state: Arc<AppState>, mode: AppMode) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods([Method::GET, Method::POST]).allow_headers(Any);

    let mut router = Router::new()
        .route("/", get(status_page))
        .route("/callback", get(callback));

    // No admin route is registered at all when no secret is configured;
    // axum's default 404 covers every `/admin/*` path in that case.
    if state.admin_secret.is_some() {
        router = router.route("/admin/:secret/metrics", get(admin_metrics));
    }

    router = match mode {
        AppMode::Http | AppMode::Hybrid => router.route("/mcp", post(mcp_call)).route("/mcp/tools", get(list_tools)),
        _ => router,
    };

    router = match mode {
        AppMode::Sse | AppMode::Hybrid => router.route("/sse", get(sse_handshake)).route("/message", post(sse_message)),
        _ => router,
    };

    router.layer(cors).layer(TraceLayer::new_for_http()).with_state(state)
}
