//! Concrete Kite Connect HTTP client. This is the "brokerage SDK
//! itself" boundary — just enough surface for the six tools this
//! server exposes, not a full Kite Connect binding.

use kite_mcp_core::gateway::{BrokerageClient, GatewayError, RawSession};
use serde::Deserialize;
use serde_json::Value;

const KITE_BASE_URL: &str = "https://api.kite.trade";
const KITE_LOGIN_URL: &str = "https://kite.zerodha.com/connect/login";

#[derive(Debug, Clone)]
pub struct KiteConnectClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    access_token: Option<String>,
}

impl KiteConnectClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        KiteConnectClient {
            http: reqwest::Client::new(),
            base_url: KITE_BASE_URL.to_string(),
            api_key: api_key.into(),
            access_token: None,
        }
    }

    /// Overrides the API origin. Used by tests to point at a mock server;
    /// production always runs with the default `api.kite.trade`.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn auth_header(&self) -> Result<String, GatewayError> {
        let token = self
            .access_token
            .as_deref()
            .ok_or_else(|| GatewayError::Client("client has no access token set".to_string()))?;
        Ok(format!("token {}:{}", self.api_key, token))
    }

    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, GatewayError> {
        let response = self
            .http
            .get(format!("{}{path}", self.base_url))
            .header("Authorization", self.auth_header()?)
            .header("X-Kite-Version", "3")
            .query(query)
            .send()
            .await
            .map_err(|e| GatewayError::Client(e.to_string()))?;

        let status = response.status();
        let body: Value = response.json().await.map_err(|e| GatewayError::Client(e.to_string()))?;

        if !status.is_success() {
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("brokerage request failed")
                .to_string();
            return Err(GatewayError::Client(message));
        }

        Ok(body.get("data").cloned().unwrap_or(body))
    }
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    data: SessionResponseData,
}

#[derive(Debug, Deserialize)]
struct SessionResponseData {
    access_token: String,
    user_id: String,
}

#[async_trait::async_trait]
impl BrokerageClient for KiteConnectClient {
    fn with_access_token(&self, token: &str) -> Self {
        KiteConnectClient {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            access_token: Some(token.to_string()),
        }
    }

    fn login_url(&self) -> String {
        format!("{KITE_LOGIN_URL}?v=3&api_key={}", self.api_key)
    }

    async fn generate_session(&self, request_token: &str, api_secret: &str) -> Result<RawSession, GatewayError> {
        let checksum = session_checksum(&self.api_key, request_token, api_secret);

        let response = self
            .http
            .post(format!("{}/session/token", self.base_url))
            .form(&[
                ("api_key", self.api_key.as_str()),
                ("request_token", request_token),
                ("checksum", checksum.as_str()),
            ])
            .send()
            .await
            .map_err(|e| GatewayError::Client(e.to_string()))?;

        if !response.status().is_success() {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("session exchange failed")
                .to_string();
            return Err(GatewayError::Client(message));
        }

        let parsed: SessionResponse = response.json().await.map_err(|e| GatewayError::Client(e.to_string()))?;
        Ok(RawSession { access_token: parsed.data.access_token, user_id: parsed.data.user_id })
    }
}

/// Kite Connect's login checksum: `sha256(api_key + request_token + api_secret)`.
fn session_checksum(api_key: &str, request_token: &str, api_secret: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(api_key.as_bytes());
    hasher.update(request_token.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_url_embeds_api_key() {
        let client = KiteConnectClient::new("my-key");
        assert_eq!(client.login_url(), "https://kite.zerodha.com/connect/login?v=3&api_key=my-key");
    }

    #[test]
    fn with_access_token_is_a_pure_clone_plus_token() {
        let client = KiteConnectClient::new("my-key").with_access_token("tok123");
        assert_eq!(client.access_token.as_deref(), Some("tok123"));
        assert_eq!(client.api_key, "my-key");
    }

    #[test]
    fn with_base_url_and_access_token_compose() {
        let client = KiteConnectClient::new("my-key").with_base_url("http://127.0.0.1:1/x").with_access_token("tok123");
        assert_eq!(client.base_url, "http://127.0.0.1:1/x");
        assert_eq!(client.access_token.as_deref(), Some("tok123"));
    }

    #[test]
    fn checksum_is_deterministic_sha256_hex() {
        let checksum = session_checksum("key", "token", "secret");
        assert_eq!(checksum.len(), 64);
        assert_eq!(checksum, session_checksum("key", "token", "secret"));
        assert_ne!(checksum, session_checksum("key", "token", "other-secret"));
    }
}
