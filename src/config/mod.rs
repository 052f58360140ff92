//! Configuration for the swap engine
//!
//! Non-secret settings live in an optional JSON file. Secrets (the signing key and
//! RPC endpoints, which often embed provider keys) are read from the environment only.

pub mod rpc;

use crate::chain::gas::GasTier;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// Re-export RPC config
pub use rpc::RpcConfig;

/// Environment variable holding the agent's private key
pub const DEFAULT_WALLET_KEY_ENV: &str = "AGENT_PRIVATE_KEY";

/// Per-call RPC settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcSettings {
    /// Timeout applied to every individual RPC call
    pub timeout_secs: u64,
}

impl Default for RpcSettings {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

/// Receipt polling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptSettings {
    /// Overall wait budget for one transaction
    pub timeout_secs: u64,
    /// Delay between `eth_getTransactionReceipt` polls
    pub poll_interval_ms: u64,
}

impl ReceiptSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Number of polls that fit into the timeout (at least one).
    pub fn max_attempts(&self) -> u64 {
        (self.timeout_secs * 1000 / self.poll_interval_ms.max(1)).max(1)
    }
}

impl Default for ReceiptSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 180,
            poll_interval_ms: 2_000,
        }
    }
}

/// USD price feed settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceFeedSettings {
    /// Query the remote feed at all (static table otherwise)
    pub enabled: bool,
    /// CoinGecko-compatible API root
    pub base_url: String,
    /// Request timeout
    pub timeout_secs: u64,
}

impl Default for PriceFeedSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.coingecko.com/api/v3".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding `chains.json` and `tokens.json`
    pub data_dir: PathBuf,
    /// JSON file mapping recipient names to addresses
    pub recipients_path: Option<PathBuf>,
    /// Path to audit log file
    pub audit_log_path: Option<PathBuf>,
    /// RPC call settings
    pub rpc: RpcSettings,
    /// Receipt polling settings
    pub receipt: ReceiptSettings,
    /// USD price feed
    pub price_feed: PriceFeedSettings,
    /// Gas tier used until changed with `gas <tier>`
    pub gas_tier: GasTier,
    /// Name of the environment variable that holds the private key
    pub wallet_key_env: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            recipients_path: Some(PathBuf::from("recipients.json")),
            audit_log_path: Some(PathBuf::from("audit.jsonl")),
            rpc: RpcSettings::default(),
            receipt: ReceiptSettings::default(),
            price_feed: PriceFeedSettings::default(),
            gas_tier: GasTier::Medium,
            wallet_key_env: DEFAULT_WALLET_KEY_ENV.to_string(),
        }
    }
}

impl Config {
    /// Load from a JSON file, or fall back to defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    Error::InvalidArgument(format!("cannot read {}: {}", path.display(), e))
                })?;
                Ok(serde_json::from_str(&content)?)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let value = serde_json::json!({
            "data_dir": "/var/lib/swap-agent",
            "gas_tier": "high",
            "receipt": { "timeout_secs": 60, "poll_interval_ms": 500 }
        });
        let parsed: Config = serde_json::from_value(value).expect("parse config");
        assert_eq!(parsed.data_dir, PathBuf::from("/var/lib/swap-agent"));
        assert_eq!(parsed.gas_tier, GasTier::High);
        assert_eq!(parsed.receipt.max_attempts(), 120);
        assert_eq!(parsed.rpc.timeout_secs, 10);
        assert_eq!(parsed.wallet_key_env, DEFAULT_WALLET_KEY_ENV);
    }

    #[test]
    fn unknown_gas_tier_is_rejected() {
        let value = serde_json::json!({ "gas_tier": "ultra" });
        assert!(serde_json::from_value::<Config>(value).is_err());
    }

    #[test]
    fn load_without_path_uses_defaults() {
        let config = Config::load(None).unwrap();
        assert_eq!(config.receipt.timeout_secs, 180);
        assert!(config.price_feed.enabled);
    }
}
