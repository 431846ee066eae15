//! Process configuration, loaded entirely from the environment.

use anyhow::{Context, Result};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    Stdio,
    Sse,
    Http,
    Hybrid,
}

impl std::str::FromStr for AppMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "stdio" => Ok(AppMode::Stdio),
            "sse" => Ok(AppMode::Sse),
            "http" => Ok(AppMode::Http),
            "hybrid" => Ok(AppMode::Hybrid),
            other => anyhow::bail!("invalid APP_MODE: {other} (expected stdio, sse, http, or hybrid)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub app_mode: AppMode,
    pub host: String,
    pub port: u16,

    pub kite_api_key: String,
    pub kite_api_secret: String,

    /// Tool names skipped at registration time.
    pub excluded_tools: HashSet<String>,

    /// `/admin/<secret>/metrics` is mounted only when this is set.
    pub admin_endpoint_secret_path: Option<String>,

    pub instrument_source_url: String,

    /// Overrides the Kite Connect API origin. Unset in production.
    pub kite_api_base_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            app_mode: std::env::var("APP_MODE")
                .unwrap_or_else(|_| "http".into())
                .parse()
                .context("invalid APP_MODE")?,
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "localhost".into()),
            port: std::env::var("APP_PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()
                .context("invalid APP_PORT")?,
            kite_api_key: std::env::var("KITE_API_KEY").context("KITE_API_KEY is required")?,
            kite_api_secret: std::env::var("KITE_API_SECRET").context("KITE_API_SECRET is required")?,
            excluded_tools: std::env::var("EXCLUDED_TOOLS")
                .ok()
                .map(|raw| raw.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
                .unwrap_or_default(),
            admin_endpoint_secret_path: std::env::var("ADMIN_ENDPOINT_SECRET_PATH").ok(),
            instrument_source_url: std::env::var("KITE_INSTRUMENTS_URL")
                .unwrap_or_else(|_| "https://api.kite.trade/instruments".into()),
            kite_api_base_url: std::env::var("KITE_API_BASE_URL").ok(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_mode_parses_all_four_variants() {
        assert_eq!("stdio".parse::<AppMode>().unwrap(), AppMode::Stdio);
        assert_eq!("sse".parse::<AppMode>().unwrap(), AppMode::Sse);
        assert_eq!("http".parse::<AppMode>().unwrap(), AppMode::Http);
        assert_eq!("hybrid".parse::<AppMode>().unwrap(), AppMode::Hybrid);
        assert!("bogus".parse::<AppMode>().is_err());
    }
}
