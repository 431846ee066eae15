use std::sync::Arc;

use kite_mcp_core::session::SessionKind;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use super::state::AppState;

#[derive(Debug, Deserialize)]
struct StdioRequest {
    session_id: String,
    tool: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

/// Reads newline-delimited JSON tool-call requests from stdin and
/// writes newline-delimited JSON responses to stdout, reusing the same
/// dispatcher every other transport runs through.
pub async fn run(state: Arc<AppState>, cancel: tokio::sync::watch::Receiver<bool>) {
    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();
    let mut stdout = tokio::io::stdout();
    let mut cancel = cancel;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Ok(Some(line)) = line else { break };
                if line.trim().is_empty() {
                    continue;
                }
                let response = handle_line(&state, &line).await;
                if stdout.write_all(response.as_bytes()).await.is_err() {
                    break;
                }
                if stdout.write_all(b"\n").await.is_err() {
                    break;
                }
                let _ = stdout.flush().await;
            }
            _ = cancel.changed() => {
                if *cancel.borrow() {
                    break;
                }
            }
        }
    }
}

async fn handle_line(state: &Arc<AppState>, line: &str) -> String {
    let request: StdioRequest = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => return serde_json::json!({"is_error": true, "content": [{"type": "text", "text": format!("malformed request: {e}")}]}).to_string(),
    };

    let result = state
        .dispatcher
        .dispatch(&request.tool, &request.session_id, SessionKind::Stdio, request.arguments)
        .await;
    serde_json::to_string(&result).unwrap_or_else(|_| "{}".to_string())
}
