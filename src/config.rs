//! Configuration management for the dispute monitor

use crate::monitor::DEFAULT_POLL_INTERVAL;
use crate::services::retry::RetryConfig;
use alloy::primitives::Address;
use anyhow::Result;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Monitor configuration loaded from environment
#[derive(Debug, Clone)]
pub struct Config {
    /// L1 JSON-RPC endpoint
    pub rpc_url: String,

    /// Dispute game factory contract (required to discover games)
    pub game_factory: Option<Address>,

    /// Wait between polling cycles
    pub poll_interval: Duration,

    /// Per-request HTTP timeout for RPC calls
    pub rpc_timeout: Duration,

    /// Retries for transient RPC failures
    pub rpc_max_retries: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let rpc_url = var("L1_RPC_URL").unwrap_or_else(|| "http://localhost:8545".to_string());

        let game_factory = var("GAME_FACTORY_ADDRESS")
            .map(|v| parse_address(&v))
            .transpose()
            .map_err(|e| anyhow::anyhow!("GAME_FACTORY_ADDRESS: {}", e))?;

        let poll_interval = match var("POLL_INTERVAL_MS") {
            Some(v) => Duration::from_millis(parse_number("POLL_INTERVAL_MS", &v)?),
            None => DEFAULT_POLL_INTERVAL,
        };

        let rpc_timeout = Duration::from_secs(match var("RPC_TIMEOUT_SECS") {
            Some(v) => parse_number("RPC_TIMEOUT_SECS", &v)?,
            None => 30,
        });

        let rpc_max_retries = match var("RPC_MAX_RETRIES") {
            Some(v) => parse_number("RPC_MAX_RETRIES", &v)?,
            None => 3,
        };

        if poll_interval.is_zero() {
            anyhow::bail!("POLL_INTERVAL_MS must be greater than zero");
        }

        Ok(Self {
            rpc_url,
            game_factory,
            poll_interval,
            rpc_timeout,
            rpc_max_retries,
        })
    }

    /// Factory address, or an error explaining how to set it
    pub fn require_factory(&self) -> Result<Address> {
        self.game_factory.ok_or_else(|| {
            anyhow::anyhow!("GAME_FACTORY_ADDRESS (or --factory) is required to discover games")
        })
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.rpc_max_retries,
            ..RetryConfig::default()
        }
    }
}

/// Parse a 0x-prefixed hex address
pub fn parse_address(value: &str) -> Result<Address> {
    Address::from_str(value.trim()).map_err(|e| anyhow::anyhow!("invalid address {}: {}", value, e))
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("{} must be a number, got {:?}: {}", key, value, e))
}
