//! USD price lookup
//!
//! USD figures are advisory. When the remote feed fails, prices come from a static
//! table and the quote still goes ahead.

use crate::config::PriceFeedSettings;
use crate::{Error, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Where a USD figure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    Feed,
    Fallback,
    Unavailable,
}

#[async_trait]
pub trait UsdPriceFeed: Send + Sync {
    fn name(&self) -> &str;

    /// Price of one unit of `symbol` in USD.
    async fn usd_price(&self, symbol: &str) -> Result<f64>;
}

/// CoinGecko `simple/price` client
pub struct CoinGeckoFeed {
    client: reqwest::Client,
    base_url: String,
    ids: HashMap<String, String>,
}

impl CoinGeckoFeed {
    pub fn new(settings: &PriceFeedSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        let ids = [
            ("ETH", "ethereum"),
            ("WETH", "weth"),
            ("DEGEN", "degen-base"),
            ("USDC", "usd-coin"),
            ("MATIC", "matic-network"),
            ("POL", "polygon-ecosystem-token"),
        ]
        .into_iter()
        .map(|(s, id)| (s.to_string(), id.to_string()))
        .collect();

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            ids,
        })
    }

    /// CoinGecko id for a symbol; unknown symbols are tried lower-cased.
    pub fn coin_id(&self, symbol: &str) -> String {
        self.ids
            .get(&symbol.to_uppercase())
            .cloned()
            .unwrap_or_else(|| symbol.to_lowercase())
    }
}

#[async_trait]
impl UsdPriceFeed for CoinGeckoFeed {
    fn name(&self) -> &str {
        "coingecko"
    }

    async fn usd_price(&self, symbol: &str) -> Result<f64> {
        let id = self.coin_id(symbol);
        let url = format!("{}/simple/price", self.base_url);

        let body: HashMap<String, HashMap<String, f64>> = self
            .client
            .get(&url)
            .query(&[("ids", id.as_str()), ("vs_currencies", "usd")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        body.get(&id)
            .and_then(|prices| prices.get("usd"))
            .copied()
            .ok_or_else(|| Error::PriceUnavailable(format!("no USD price for {}", symbol)))
    }
}

/// Fixed prices used when the feed is down
#[derive(Debug, Clone)]
pub struct StaticPriceTable {
    prices: HashMap<String, f64>,
}

impl StaticPriceTable {
    pub fn new(prices: impl IntoIterator<Item = (String, f64)>) -> Self {
        Self {
            prices: prices
                .into_iter()
                .map(|(s, p)| (s.to_uppercase(), p))
                .collect(),
        }
    }

    pub fn get(&self, symbol: &str) -> Option<f64> {
        self.prices.get(&symbol.to_uppercase()).copied()
    }
}

impl Default for StaticPriceTable {
    fn default() -> Self {
        Self::new([
            ("ETH".to_string(), 2000.0),
            ("WETH".to_string(), 2000.0),
            ("DEGEN".to_string(), 0.01),
            ("USDC".to_string(), 1.0),
            ("USDT".to_string(), 1.0),
            ("DAI".to_string(), 1.0),
        ])
    }
}

/// Feed with a static fallback
pub struct UsdPricer {
    feed: Option<Arc<dyn UsdPriceFeed>>,
    fallback: StaticPriceTable,
}

impl UsdPricer {
    pub fn new(feed: Option<Arc<dyn UsdPriceFeed>>, fallback: StaticPriceTable) -> Self {
        Self { feed, fallback }
    }

    /// Static table only.
    pub fn offline() -> Self {
        Self::new(None, StaticPriceTable::default())
    }

    pub async fn price(&self, symbol: &str) -> (Option<f64>, PriceSource) {
        if let Some(feed) = &self.feed {
            match feed.usd_price(symbol).await {
                Ok(price) => return (Some(price), PriceSource::Feed),
                Err(e) => {
                    tracing::warn!(
                        feed = feed.name(),
                        symbol = %symbol,
                        error = %e,
                        "USD price feed failed, using fallback price"
                    );
                }
            }
        }

        match self.fallback.get(symbol) {
            Some(price) => (Some(price), PriceSource::Fallback),
            None => (None, PriceSource::Unavailable),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenFeed;

    #[async_trait]
    impl UsdPriceFeed for BrokenFeed {
        fn name(&self) -> &str {
            "broken"
        }

        async fn usd_price(&self, _symbol: &str) -> Result<f64> {
            Err(Error::PriceUnavailable("feed down".to_string()))
        }
    }

    #[tokio::test]
    async fn falls_back_to_static_table() {
        let pricer = UsdPricer::new(Some(Arc::new(BrokenFeed)), StaticPriceTable::default());

        let (price, source) = pricer.price("eth").await;
        assert_eq!(price, Some(2000.0));
        assert_eq!(source, PriceSource::Fallback);

        let (price, source) = pricer.price("PEPE").await;
        assert_eq!(price, None);
        assert_eq!(source, PriceSource::Unavailable);
    }

    #[test]
    fn coin_ids() {
        let feed = CoinGeckoFeed::new(&PriceFeedSettings::default()).unwrap();
        assert_eq!(feed.coin_id("usdc"), "usd-coin");
        assert_eq!(feed.coin_id("AERO"), "aero");
    }
}
