//! Token definitions and asset resolution

use crate::error::ConfigError;
use alloy::primitives::{address, Address};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Verified deployment of a token on one chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDeployment {
    pub address: Address,
    /// Cached from `symbol()` at registration
    pub symbol: String,
    /// Cached from `decimals()` at registration
    pub decimals: u8,
}

/// A logical token that may be deployed on several chains
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenConfig {
    pub name: String,
    /// Chain name -> deployment
    pub deployments: BTreeMap<String, TokenDeployment>,
}

impl TokenConfig {
    pub fn deployment_on(&self, chain: &str) -> Option<&TokenDeployment> {
        self.deployments
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(chain))
            .map(|(_, d)| d)
    }

    pub fn is_on(&self, chain: &str) -> bool {
        self.deployment_on(chain).is_some()
    }

    /// Match by logical name, or by symbol on the given chain.
    pub fn matches(&self, query: &str, chain: Option<&str>) -> bool {
        let query = query.trim();
        if self.name.eq_ignore_ascii_case(query) {
            return true;
        }
        match chain {
            Some(chain) => self
                .deployment_on(chain)
                .is_some_and(|d| d.symbol.eq_ignore_ascii_case(query)),
            None => self
                .deployments
                .values()
                .any(|d| d.symbol.eq_ignore_ascii_case(query)),
        }
    }
}

/// Something a wallet can hold on a chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Asset {
    Native {
        symbol: String,
        decimals: u8,
    },
    Erc20 {
        name: String,
        symbol: String,
        address: Address,
        decimals: u8,
    },
}

impl Asset {
    pub fn symbol(&self) -> &str {
        match self {
            Asset::Native { symbol, .. } | Asset::Erc20 { symbol, .. } => symbol,
        }
    }

    pub fn decimals(&self) -> u8 {
        match self {
            Asset::Native { decimals, .. } | Asset::Erc20 { decimals, .. } => *decimals,
        }
    }

    /// Contract address, `None` for the native coin.
    pub fn address(&self) -> Option<Address> {
        match self {
            Asset::Native { .. } => None,
            Asset::Erc20 { address, .. } => Some(*address),
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Asset::Native { .. })
    }
}

/// Parse a 0x address. Mixed-case input must carry a valid EIP-55 checksum.
pub fn parse_address(text: &str) -> Result<Address, ConfigError> {
    let text = text.trim();
    let hex = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .ok_or_else(|| ConfigError::InvalidAddress(text.to_string()))?;

    if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ConfigError::InvalidAddress(text.to_string()));
    }

    let has_lower = hex.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = hex.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper {
        Address::parse_checksummed(format!("0x{}", hex), None)
            .map_err(|_| ConfigError::InvalidAddress(format!("{} (bad checksum)", text)))
    } else {
        Address::from_str(hex).map_err(|_| ConfigError::InvalidAddress(text.to_string()))
    }
}

/// Tokens seeded into a fresh data directory.
pub fn default_tokens() -> Vec<TokenConfig> {
    let degen = TokenConfig {
        name: "Degen".to_string(),
        deployments: BTreeMap::from([(
            "Base".to_string(),
            TokenDeployment {
                address: address!("4ed4e862860bed51a9570b96d89af5e1b0efefed"),
                symbol: "DEGEN".to_string(),
                decimals: 18,
            },
        )]),
    };

    let usdc = |addr: Address| TokenDeployment {
        address: addr,
        symbol: "USDC".to_string(),
        decimals: 6,
    };
    let usdc = TokenConfig {
        name: "USDC".to_string(),
        deployments: BTreeMap::from([
            (
                "Base".to_string(),
                usdc(address!("833589fcd6edb6e08f4c7c32d4f71b54bda02913")),
            ),
            (
                "Ethereum".to_string(),
                usdc(address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48")),
            ),
            (
                "Polygon".to_string(),
                usdc(address!("2791bca1f2de4661ed88a30c99a7a9449aa84174")),
            ),
        ]),
    };

    vec![degen, usdc]
}
