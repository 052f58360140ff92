//! Chain definitions

use alloy::primitives::{address, Address};
use serde::{Deserialize, Serialize};

fn default_native_decimals() -> u8 {
    18
}

/// Uniswap-V2-style router used for swaps on a chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DexConfig {
    /// Display name (e.g. "BaseSwap")
    pub name: String,
    /// Router02 contract
    pub router: Address,
    /// Factory the router must report; checked before quoting
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factory: Option<Address>,
    /// Wrapped native token; read from `router.WETH()` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weth: Option<Address>,
}

/// A supported EVM chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    pub name: String,
    pub chain_id: u64,
    /// Never persisted; resolved from the environment or supplied at registration
    #[serde(skip)]
    pub rpc_url: Option<String>,
    pub native_symbol: String,
    #[serde(default = "default_native_decimals")]
    pub native_decimals: u8,
    pub explorer_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dex: Option<DexConfig>,
}

impl ChainConfig {
    /// Block explorer link for a transaction hash.
    pub fn explorer_tx_url(&self, hash: impl std::fmt::Display) -> String {
        format!("{}/tx/{}", self.explorer_url.trim_end_matches('/'), hash)
    }

    pub fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name.trim())
    }

    pub fn is_native_symbol(&self, symbol: &str) -> bool {
        self.native_symbol.eq_ignore_ascii_case(symbol.trim())
    }
}

/// Chains seeded into a fresh data directory.
pub fn default_chains() -> Vec<ChainConfig> {
    vec![
        ChainConfig {
            name: "Base".to_string(),
            chain_id: 8453,
            rpc_url: None,
            native_symbol: "ETH".to_string(),
            native_decimals: 18,
            explorer_url: "https://basescan.org".to_string(),
            dex: Some(DexConfig {
                name: "BaseSwap".to_string(),
                router: address!("327Df1E6de05895d2ab08513aaDD9313Fe505d86"),
                factory: Some(address!("FDa619b6d20975be80A10332cD39b9a4b0FAa8BB")),
                weth: Some(address!("4200000000000000000000000000000000000006")),
            }),
        },
        ChainConfig {
            name: "Ethereum".to_string(),
            chain_id: 1,
            rpc_url: None,
            native_symbol: "ETH".to_string(),
            native_decimals: 18,
            explorer_url: "https://etherscan.io".to_string(),
            dex: Some(DexConfig {
                name: "Uniswap V2".to_string(),
                router: address!("7a250d5630B4cF539739dF2C5dAcb4c659F2488D"),
                factory: Some(address!("5C69bEe701ef814a2B6a3EDD4B1652CB9cc5aA6f")),
                weth: Some(address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2")),
            }),
        },
        ChainConfig {
            name: "Polygon".to_string(),
            chain_id: 137,
            rpc_url: None,
            native_symbol: "MATIC".to_string(),
            native_decimals: 18,
            explorer_url: "https://polygonscan.com".to_string(),
            dex: Some(DexConfig {
                name: "QuickSwap".to_string(),
                router: address!("a5E0829CaCEd8fFDD4De3c43696c57F7D7A678ff"),
                factory: Some(address!("5757371414417b8C6CAad45bAeF941aBc7d3Ab32")),
                weth: Some(address!("0d500B1d8E8eF31E21C99d1Db9A6444d3ADf1270")),
            }),
        },
    ]
}
