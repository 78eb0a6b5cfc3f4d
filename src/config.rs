use std::net::SocketAddr;

use anyhow::Context;

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub provider_config_url: Option<String>,
    pub provider_api_token: String,
    pub result_ttl_secs: u64,
    pub result_idle_secs: u64,
    pub provider_ttl_secs: u64,
    pub poster_probe_timeout_ms: u64,
    pub poster_concurrency: usize,
    pub http_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 =
            std::env::var("PORT").unwrap_or_else(|_| "3000".to_string()).parse().context("PORT")?;

        let provider_config_url = std::env::var("PROVIDER_CONFIG_URL")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let provider_api_token =
            std::env::var("PROVIDER_API_TOKEN").unwrap_or_else(|_| "".to_string());

        let result_ttl_secs: u64 =
            std::env::var("RESULT_TTL_SECS").ok().and_then(|s| s.parse().ok()).unwrap_or(300);

        let result_idle_secs: u64 =
            std::env::var("RESULT_IDLE_SECS").ok().and_then(|s| s.parse().ok()).unwrap_or(120);

        let provider_ttl_secs: u64 =
            std::env::var("PROVIDER_TTL_SECS").ok().and_then(|s| s.parse().ok()).unwrap_or(900);

        let poster_probe_timeout_ms: u64 = std::env::var("POSTER_PROBE_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1500);

        let poster_concurrency: usize =
            std::env::var("POSTER_CONCURRENCY").ok().and_then(|s| s.parse().ok()).unwrap_or(4);

        let http_timeout_secs: u64 =
            std::env::var("HTTP_TIMEOUT_SECS").ok().and_then(|s| s.parse().ok()).unwrap_or(30);

        Ok(Self {
            addr: format!("{host}:{port}").parse().context("HOST/PORT")?,
            provider_config_url,
            provider_api_token,
            result_ttl_secs,
            result_idle_secs,
            provider_ttl_secs,
            poster_probe_timeout_ms,
            poster_concurrency,
            http_timeout_secs,
        })
    }
}
