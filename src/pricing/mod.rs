//! Swap price discovery against Uniswap-V2-style routers
//!
//! Quotes are computed on integer base units straight from the router's
//! `getAmountsIn` / `getAmountsOut`. Decimal strings and floats appear only in the
//! display fields (formatted amounts, exchange rate, USD estimates).

pub mod usd;

use crate::chain::ChainClient;
use crate::error::ConfigError;
use crate::registry::{Asset, ChainConfig};
use crate::units::{format_units, to_f64};
use crate::{Error, Result};
use alloy::primitives::{Address, U256};
use serde::Serialize;
use std::collections::HashSet;
use tokio::sync::Mutex;

pub use usd::{CoinGeckoFeed, PriceSource, StaticPriceTable, UsdPriceFeed, UsdPricer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

/// What to quote, with assets already resolved on the chain
#[derive(Debug, Clone)]
pub struct QuoteRequest {
    pub side: TradeSide,
    pub chain: ChainConfig,
    /// The asset being bought or sold
    pub token: Asset,
    /// The asset paid with (Buy) or received (Sell)
    pub using: Asset,
    /// Base units of `token`, or of `using` when `amount_is_target` is set
    pub amount: U256,
    pub amount_is_target: bool,
}

impl QuoteRequest {
    /// Asset leaving the wallet
    pub fn input_asset(&self) -> &Asset {
        match self.side {
            TradeSide::Buy => &self.using,
            TradeSide::Sell => &self.token,
        }
    }

    /// Asset arriving in the wallet
    pub fn output_asset(&self) -> &Asset {
        match self.side {
            TradeSide::Buy => &self.token,
            TradeSide::Sell => &self.using,
        }
    }

    /// True when the fixed amount is the output (router `getAmountsIn`).
    pub fn is_exact_output(&self) -> bool {
        matches!(
            (self.side, self.amount_is_target),
            (TradeSide::Buy, false) | (TradeSide::Sell, true)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetAmount {
    pub symbol: String,
    /// `None` for the native coin
    pub address: Option<Address>,
    pub raw: U256,
    pub decimals: u8,
}

impl AssetAmount {
    fn of(asset: &Asset, raw: U256) -> Self {
        Self {
            symbol: asset.symbol().to_string(),
            address: asset.address(),
            raw,
            decimals: asset.decimals(),
        }
    }

    pub fn formatted(&self) -> String {
        format_units(self.raw, self.decimals)
    }

    pub fn as_f64(&self) -> f64 {
        to_f64(self.raw, self.decimals)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsdValues {
    pub input: f64,
    pub output: f64,
    pub source: PriceSource,
}

impl UsdValues {
    /// `(output - input) / input` in percent, when the input value is known.
    pub fn price_impact_percent(&self) -> Option<f64> {
        (self.input > 0.0).then(|| (self.output - self.input) / self.input * 100.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Route {
    pub router: Address,
    pub router_name: String,
    /// Hop addresses; the native coin appears as the wrapped-native token
    pub path: Vec<Address>,
}

/// One-shot quote; never reused across requests
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceQuote {
    pub side: TradeSide,
    pub chain: String,
    pub input: AssetAmount,
    pub output: AssetAmount,
    /// Units of the `using` asset per one unit of the traded token
    pub exchange_rate: f64,
    pub usd: UsdValues,
    pub route: Route,
}

impl PriceQuote {
    pub fn token_symbol(&self) -> &str {
        match self.side {
            TradeSide::Buy => &self.output.symbol,
            TradeSide::Sell => &self.input.symbol,
        }
    }

    pub fn using_symbol(&self) -> &str {
        match self.side {
            TradeSide::Buy => &self.input.symbol,
            TradeSide::Sell => &self.output.symbol,
        }
    }
}

pub struct PriceOracle {
    usd: UsdPricer,
    /// (chain, router) pairs whose factory already matched
    verified_routers: Mutex<HashSet<(String, Address)>>,
}

impl PriceOracle {
    pub fn new(usd: UsdPricer) -> Self {
        Self {
            usd,
            verified_routers: Mutex::new(HashSet::new()),
        }
    }

    /// Router and hop path for swapping `input` into `output` on `chain`.
    pub async fn route(
        &self,
        client: &dyn ChainClient,
        chain: &ChainConfig,
        input: &Asset,
        output: &Asset,
    ) -> Result<Route> {
        if input.is_native() && output.is_native() {
            return Err(Error::InvalidArgument(format!(
                "cannot swap {} for itself",
                chain.native_symbol
            )));
        }
        if input == output {
            return Err(Error::InvalidArgument(format!(
                "cannot swap {} for itself",
                input.symbol()
            )));
        }

        let dex = chain
            .dex
            .as_ref()
            .ok_or_else(|| ConfigError::NoRouter(chain.name.clone()))?;

        self.verify_router(client, chain).await?;

        let weth = match dex.weth {
            Some(weth) => weth,
            None if input.is_native() || output.is_native() => {
                client.router_weth(dex.router).await?
            }
            None => Address::ZERO,
        };
        let hop = |asset: &Asset| asset.address().unwrap_or(weth);

        Ok(Route {
            router: dex.router,
            router_name: dex.name.clone(),
            path: vec![hop(input), hop(output)],
        })
    }

    async fn verify_router(&self, client: &dyn ChainClient, chain: &ChainConfig) -> Result<()> {
        let Some(dex) = chain.dex.as_ref() else {
            return Err(ConfigError::NoRouter(chain.name.clone()).into());
        };
        let Some(expected) = dex.factory else {
            return Ok(());
        };

        let key = (chain.name.to_lowercase(), dex.router);
        if self.verified_routers.lock().await.contains(&key) {
            return Ok(());
        }

        let actual = client.router_factory(dex.router).await?;
        if actual != expected {
            return Err(ConfigError::RouterMismatch {
                chain: chain.name.clone(),
                expected: format!("{:?}", expected),
                actual: format!("{:?}", actual),
            }
            .into());
        }

        self.verified_routers.lock().await.insert(key);
        Ok(())
    }

    /// Quote a swap. USD estimation never fails the quote.
    pub async fn quote(&self, client: &dyn ChainClient, request: &QuoteRequest) -> Result<PriceQuote> {
        if request.amount.is_zero() {
            return Err(Error::InvalidArgument("amount must be greater than zero".to_string()));
        }

        let input_asset = request.input_asset();
        let output_asset = request.output_asset();
        let route = self
            .route(client, &request.chain, input_asset, output_asset)
            .await?;

        let (amount_in, amount_out) = if request.is_exact_output() {
            let amounts = client
                .amounts_in(route.router, request.amount, &route.path)
                .await?;
            let first = amounts.first().copied().ok_or_else(|| Error::Rpc {
                chain: request.chain.name.clone(),
                message: "getAmountsIn returned no amounts".to_string(),
            })?;
            (first, request.amount)
        } else {
            let amounts = client
                .amounts_out(route.router, request.amount, &route.path)
                .await?;
            let last = amounts.last().copied().ok_or_else(|| Error::Rpc {
                chain: request.chain.name.clone(),
                message: "getAmountsOut returned no amounts".to_string(),
            })?;
            (request.amount, last)
        };

        let input = AssetAmount::of(input_asset, amount_in);
        let output = AssetAmount::of(output_asset, amount_out);

        let (token_units, using_units) = match request.side {
            TradeSide::Buy => (output.as_f64(), input.as_f64()),
            TradeSide::Sell => (input.as_f64(), output.as_f64()),
        };
        let exchange_rate = if token_units > 0.0 {
            using_units / token_units
        } else {
            0.0
        };

        let usd = self.usd_values(&input, &output).await;

        tracing::info!(
            chain = %request.chain.name,
            side = ?request.side,
            amount_in = %input.formatted(),
            symbol_in = %input.symbol,
            amount_out = %output.formatted(),
            symbol_out = %output.symbol,
            router = %route.router_name,
            "Quote computed"
        );

        Ok(PriceQuote {
            side: request.side,
            chain: request.chain.name.clone(),
            input,
            output,
            exchange_rate,
            usd,
            route,
        })
    }

    async fn usd_values(&self, input: &AssetAmount, output: &AssetAmount) -> UsdValues {
        let ((in_price, in_source), (out_price, out_source)) = futures::join!(
            self.usd.price(&input.symbol),
            self.usd.price(&output.symbol)
        );

        let input_usd = in_price.map(|p| p * input.as_f64());
        let output_usd = out_price.map(|p| p * output.as_f64());

        // A side without a price mirrors the other side
        let (input_usd, output_usd) = match (input_usd, output_usd) {
            (Some(i), Some(o)) => (i, o),
            (Some(i), None) => (i, i),
            (None, Some(o)) => (o, o),
            (None, None) => (0.0, 0.0),
        };

        let source = match (in_source, out_source) {
            (PriceSource::Unavailable, PriceSource::Unavailable) => PriceSource::Unavailable,
            (PriceSource::Feed, PriceSource::Feed) => PriceSource::Feed,
            _ => PriceSource::Fallback,
        };

        UsdValues {
            input: input_usd,
            output: output_usd,
            source,
        }
    }
}
