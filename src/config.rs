use anyhow::{Context, Result};
use std::time::Duration;

mod logging;

pub use logging::LoggingConfig;

// ============================================================================
// Configuration Constants
// ============================================================================

const DEFAULT_PORT: u16 = 8082;
const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
const DEFAULT_REDIS_KEY_PREFIX: &str = "push:";
const DEFAULT_NODE_TIMEOUT_SECS: u64 = 3;
const DEFAULT_MAX_DATA_BYTES: usize = 4096;

pub const SECONDS_PER_HOUR: i64 = 3600;
pub const RECEIPT_KEY_LEN: usize = 32;

// ============================================================================
// Configuration Structures
// ============================================================================

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    /// Public base URL of this endpoint; message locations hang off it
    pub endpoint_url: String,
    /// Base URL receipt endpoints are issued under
    pub receipts_url: String,
    /// HMAC key for receipt tokens (32 bytes)
    pub receipt_secret_key: Vec<u8>,
    pub redis_url: String,
    pub redis_key_prefix: String,
    pub rust_log: String,
    pub node_timeout_secs: u64,
    pub dead_node_cache_size: usize,
    /// Largest accepted payload, in bytes, before encoding
    pub max_data_bytes: usize,
    pub logging: LoggingConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let endpoint_url = std::env::var("ENDPOINT_URL")
            .context("ENDPOINT_URL must be set")?
            .trim_end_matches('/')
            .to_string();

        let receipts_url = std::env::var("RECEIPTS_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| endpoint_url.clone());

        let receipt_secret_key = {
            let key_hex = std::env::var("RECEIPT_SECRET_KEY")
                .context("RECEIPT_SECRET_KEY must be set")?;
            let key = hex::decode(key_hex.trim()).context("RECEIPT_SECRET_KEY must be valid hex")?;
            if key.len() != RECEIPT_KEY_LEN {
                anyhow::bail!("RECEIPT_SECRET_KEY must be 32 bytes (64 hex chars)");
            }
            key
        };

        Ok(Self {
            port: env_or("PORT", DEFAULT_PORT),
            endpoint_url,
            receipts_url,
            receipt_secret_key,
            redis_url: std::env::var("REDIS_URL").unwrap_or_else(|_| DEFAULT_REDIS_URL.to_string()),
            redis_key_prefix: std::env::var("REDIS_KEY_PREFIX")
                .unwrap_or_else(|_| DEFAULT_REDIS_KEY_PREFIX.to_string()),
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            node_timeout_secs: env_or("NODE_TIMEOUT_SECS", DEFAULT_NODE_TIMEOUT_SECS),
            dead_node_cache_size: env_or(
                "DEAD_NODE_CACHE_SIZE",
                crate::dead_nodes::DEFAULT_DEAD_NODE_CACHE_SIZE,
            ),
            max_data_bytes: env_or("MAX_DATA_BYTES", DEFAULT_MAX_DATA_BYTES),
            logging: LoggingConfig::from_env()?,
        })
    }

    pub fn node_timeout(&self) -> Duration {
        Duration::from_secs(self.node_timeout_secs)
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
