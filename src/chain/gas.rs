//! Gas price tiers

use super::ChainClient;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::sync::RwLock;

/// Multiplier applied to the network gas price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GasTier {
    /// 0.8x
    Low,
    /// 1.0x
    #[default]
    Medium,
    /// 1.5x
    High,
}

impl GasTier {
    /// Scale a network price with integer math (no float rounding).
    pub fn apply(self, network_price: u128) -> u128 {
        match self {
            GasTier::Low => network_price.saturating_mul(8) / 10,
            GasTier::Medium => network_price,
            GasTier::High => network_price.saturating_mul(15) / 10,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GasTier::Low => "low",
            GasTier::Medium => "medium",
            GasTier::High => "high",
        }
    }
}

impl fmt::Display for GasTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GasTier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(GasTier::Low),
            "medium" => Ok(GasTier::Medium),
            "high" => Ok(GasTier::High),
            _ => Err(Error::InvalidGasTier(s.trim().to_string())),
        }
    }
}

/// Current tier plus price lookup
#[derive(Debug, Default)]
pub struct GasStrategy {
    tier: RwLock<GasTier>,
}

impl GasStrategy {
    pub fn new(tier: GasTier) -> Self {
        Self {
            tier: RwLock::new(tier),
        }
    }

    pub async fn tier(&self) -> GasTier {
        *self.tier.read().await
    }

    /// Parse and switch the tier. An unknown tier leaves the current one in place.
    pub async fn set_tier(&self, tier: &str) -> Result<GasTier> {
        let parsed: GasTier = tier.parse()?;
        let mut current = self.tier.write().await;
        tracing::info!(from = %*current, to = %parsed, "Gas tier changed");
        *current = parsed;
        Ok(parsed)
    }

    /// Gas price for `tier` on the client's chain.
    pub async fn price(&self, client: &dyn ChainClient, tier: GasTier) -> Result<u128> {
        let network = client.gas_price().await?;
        let price = tier.apply(network);
        tracing::debug!(
            chain = client.chain_name(),
            network_price = network,
            tier = %tier,
            price,
            "Gas price selected"
        );
        Ok(price)
    }

    /// Gas price for the current tier.
    pub async fn current_price(&self, client: &dyn ChainClient) -> Result<u128> {
        let tier = self.tier().await;
        self.price(client, tier).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_scale_network_price() {
        let network = 10_000_000_000u128;
        assert_eq!(GasTier::Low.apply(network), 8_000_000_000);
        assert_eq!(GasTier::Medium.apply(network), network);
        assert_eq!(GasTier::High.apply(network), 15_000_000_000);
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("HIGH".parse::<GasTier>().unwrap(), GasTier::High);
        assert_eq!(" low ".parse::<GasTier>().unwrap(), GasTier::Low);
    }

    #[tokio::test]
    async fn unknown_tier_keeps_current() {
        let strategy = GasStrategy::new(GasTier::High);
        let err = strategy.set_tier("ultra").await.unwrap_err();
        assert!(matches!(err, Error::InvalidGasTier(ref t) if t == "ultra"));
        assert_eq!(strategy.tier().await, GasTier::High);

        strategy.set_tier("low").await.unwrap();
        assert_eq!(strategy.tier().await, GasTier::Low);
    }
}
