use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use kite_mcp_core::session::SessionKind;
use serde::Deserialize;
use serde_json::Value;

use super::state::AppState;

/// `GET /` — minimal inline status page. No templating engine: a
/// placeholder string is all the out-of-scope HTML surface needs.
pub async fn status_page(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(format!(
        "<html><body><h1>kite-mcp-server</h1><p>catalog size: {}</p></body></html>",
        state.catalog.count()
    ))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub request_token: Option<String>,
    pub status: Option<String>,
    pub session_id: Option<String>,
}

/// `GET /callback` — OAuth/login completion. Kite echoes the login
/// URL's `redirect_params` blob back as literal extra query params on
/// this redirect, so the signed session id arrives here as its own
/// `session_id=<signed>` pair, not wrapped in a `redirect_params` key.
pub async fn callback(State(state): State<Arc<AppState>>, Query(query): Query<CallbackQuery>) -> Response {
    if query.status.as_deref() == Some("cancelled") {
        return Html("<html><body><h1>Login cancelled</h1></body></html>".to_string()).into_response();
    }

    let (Some(request_token), Some(signed_session_id)) = (query.request_token, query.session_id) else {
        return (StatusCode::BAD_REQUEST, "missing request_token or session_id").into_response();
    };

    let fragment = format!("session_id={signed_session_id}");
    let session_id = match state.signer.verify_redirect(&fragment) {
        Ok(id) => id,
        Err(_) => return (StatusCode::BAD_REQUEST, "Invalid or tampered session parameter").into_response(),
    };

    match state.gateway.complete_login_and_store(&session_id, &request_token).await {
        Ok(_credentials) => Html("<html><body><h1>Login successful</h1></body></html>".to_string()).into_response(),
        Err(e) => (StatusCode::BAD_GATEWAY, format!("login failed: {e}")).into_response(),
    }
}

/// `GET /admin/:secret/metrics` — plain-text counters exposition. A
/// wrong secret returns 404; when no secret is configured the route
/// isn't registered at all, so every `/admin/*` path 404s via axum's
/// default fallback.
pub async fn admin_metrics(State(state): State<Arc<AppState>>, Path(secret): Path<String>) -> Response {
    match &state.admin_secret {
        Some(configured) if *configured == secret => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            state.metrics.render(),
        )
            .into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct ToolCallRequest {
    pub session_id: String,
    pub tool: String,
    #[serde(default)]
    pub arguments: Value,
}

/// `POST /mcp` — streamable tool-invocation endpoint. One request, one
/// response; no multi-message streaming framing on top, since the
/// dispatcher's own result is already a single JSON value.
pub async fn mcp_call(State(state): State<Arc<AppState>>, Json(request): Json<ToolCallRequest>) -> Response {
    dispatch_and_respond(&state, &request, SessionKind::Mcp).await
}

/// `POST /message` — the companion endpoint to `/sse`; same dispatch
/// path, tagged with the `sse` session type for metrics.
pub async fn sse_message(State(state): State<Arc<AppState>>, Json(request): Json<ToolCallRequest>) -> Response {
    dispatch_and_respond(&state, &request, SessionKind::Sse).await
}

/// `GET /sse` — handshake endpoint. Mints a fresh session id the
/// client will attach to subsequent `/message` posts. A full
/// server-sent-events stream is out of scope for this core; this
/// returns the session id as a single `text/event-stream` frame.
pub async fn sse_handshake(State(state): State<Arc<AppState>>) -> Response {
    let id = kite_mcp_core::SessionId::mint();
    let _ = state.registry.get_or_create(id.as_str(), SessionKind::Sse);
    (
        [(header::CONTENT_TYPE, "text/event-stream")],
        format!("event: session\ndata: {}\n\n", id.as_str()),
    )
        .into_response()
}

async fn dispatch_and_respond(state: &Arc<AppState>, request: &ToolCallRequest, session_type: SessionKind) -> Response {
    let result = state
        .dispatcher
        .dispatch(&request.tool, &request.session_id, session_type, request.arguments.clone())
        .await;
    Json(result).into_response()
}

/// Query-parameter form for manual `curl`-driven tool calls, e.g.
/// `GET /mcp/tools` to list the registered schemas.
pub async fn list_tools(State(state): State<Arc<AppState>>) -> Json<Vec<ToolDescriptor>> {
    let mut descriptors: Vec<ToolDescriptor> = state
        .dispatcher
        .schemas()
        .into_iter()
        .map(|s| ToolDescriptor {
            name: s.name,
            description: s.description,
            required: s.required.to_vec(),
        })
        .collect();
    descriptors.push(ToolDescriptor {
        name: crate::tools::LOGIN_SCHEMA.name,
        description: crate::tools::LOGIN_SCHEMA.description,
        required: crate::tools::LOGIN_SCHEMA.required.to_vec(),
    });
    Json(descriptors)
}

#[derive(Debug, serde::Serialize)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub required: Vec<&'static str>,
}
