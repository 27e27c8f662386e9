//! Environment-driven configuration.
//!
//! Built once in `main` and passed down explicitly; nothing reads the
//! environment after startup.

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub c2s_base_url: String,
    pub c2s_api_token: String,
    pub lookup_base_url: String,
    pub lookup_api_key: String,
    pub sweep_interval_secs: u64,
    pub sweep_concurrency: usize,
    pub sweep_batch_size: i64,
}

fn var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let sweep_interval_secs = var_or("SWEEP_INTERVAL_SECS", "300")
            .parse()
            .context("SWEEP_INTERVAL_SECS must be an integer")?;
        let sweep_concurrency = var_or("SWEEP_CONCURRENCY", "4")
            .parse()
            .context("SWEEP_CONCURRENCY must be an integer")?;
        let sweep_batch_size: i64 = var_or("SWEEP_BATCH_SIZE", "100")
            .parse()
            .context("SWEEP_BATCH_SIZE must be an integer")?;

        Ok(Self {
            database_url: var_or("DATABASE_URL", "postgresql:///c2s_enrichment"),
            bind_addr: var_or("BIND_ADDR", "0.0.0.0:8080"),
            c2s_base_url: var_or("C2S_BASE_URL", "https://api.contact2sale.com"),
            c2s_api_token: var_or("C2S_API_TOKEN", ""),
            lookup_base_url: var_or("LOOKUP_BASE_URL", "http://localhost:9090"),
            lookup_api_key: var_or("LOOKUP_API_KEY", ""),
            sweep_interval_secs,
            sweep_concurrency,
            sweep_batch_size,
        })
    }
}
