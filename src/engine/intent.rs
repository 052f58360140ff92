//! Structured transaction requests

use crate::registry::{Asset, ChainConfig};
use crate::units::parse_units;
use crate::{Error, Result};
use alloy::primitives::{Address, U256};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Buy,
    Sell,
    Transfer,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Buy => "buy",
            Action::Sell => "sell",
            Action::Transfer => "transfer",
        })
    }
}

/// A decimal amount or a share of the wallet balance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AmountSpec {
    /// Human decimal, parsed at the asset's precision
    Exact(String),
    All,
    /// 1..=100 percent of the balance (`half` is 50)
    Percent(u8),
}

impl AmountSpec {
    /// Whether the amount depends on the wallet balance.
    pub fn is_relative(&self) -> bool {
        !matches!(self, AmountSpec::Exact(_))
    }

    /// Base units for an asset with `decimals`, given the spendable balance.
    pub fn resolve(&self, decimals: u8, balance: Option<U256>) -> Result<U256> {
        match self {
            AmountSpec::Exact(text) => parse_units(text, decimals),
            AmountSpec::All | AmountSpec::Percent(_) => {
                let balance = balance.ok_or_else(|| {
                    Error::InvalidArgument("balance required for relative amount".to_string())
                })?;
                let percent = match self {
                    AmountSpec::Percent(p) => *p,
                    _ => 100,
                };
                Ok(balance * U256::from(percent) / U256::from(100u8))
            }
        }
    }
}

impl FromStr for AmountSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match s.to_lowercase().as_str() {
            "all" | "max" => return Ok(AmountSpec::All),
            "half" => return Ok(AmountSpec::Percent(50)),
            _ => {}
        }

        if let Some(number) = s.strip_suffix('%') {
            let percent: u8 = number
                .trim()
                .parse()
                .map_err(|_| Error::InvalidArgument(format!("invalid percentage: {}", s)))?;
            if percent == 0 || percent > 100 {
                return Err(Error::InvalidArgument(format!(
                    "percentage must be between 1 and 100: {}",
                    s
                )));
            }
            return Ok(AmountSpec::Percent(percent));
        }

        // Validate the shape now; precision is applied once the asset is known
        parse_units(s, 0)?;
        Ok(AmountSpec::Exact(s.to_string()))
    }
}

impl fmt::Display for AmountSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmountSpec::Exact(text) => f.write_str(text),
            AmountSpec::All => f.write_str("all"),
            AmountSpec::Percent(p) => write!(f, "{}%", p),
        }
    }
}

/// A request as produced by the caller. Missing fields are filled during validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransactionIntent {
    pub action: Option<Action>,
    pub amount: Option<AmountSpec>,
    /// The amount refers to `using_token` (spend/receive exactly that much of it)
    pub amount_is_target: bool,
    pub token: Option<String>,
    pub using_token: Option<String>,
    pub recipient: Option<String>,
    pub chain: Option<String>,
}

impl TransactionIntent {
    pub fn buy(amount: AmountSpec, token: &str, using_token: &str, chain: &str) -> Self {
        Self {
            action: Some(Action::Buy),
            amount: Some(amount),
            token: Some(token.to_string()),
            using_token: Some(using_token.to_string()),
            chain: Some(chain.to_string()),
            ..Self::default()
        }
    }

    pub fn sell(amount: AmountSpec, token: &str, using_token: &str, chain: &str) -> Self {
        Self {
            action: Some(Action::Sell),
            amount: Some(amount),
            token: Some(token.to_string()),
            using_token: Some(using_token.to_string()),
            chain: Some(chain.to_string()),
            ..Self::default()
        }
    }

    pub fn transfer(chain: &str, token: &str, amount: AmountSpec, recipient: &str) -> Self {
        Self {
            action: Some(Action::Transfer),
            amount: Some(amount),
            token: Some(token.to_string()),
            recipient: Some(recipient.to_string()),
            chain: Some(chain.to_string()),
            ..Self::default()
        }
    }

    /// The amount is given in units of `using_token`.
    pub fn targeting(mut self) -> Self {
        self.amount_is_target = true;
        self
    }
}

/// Where the value goes in a validated intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Counterparty {
    /// Swap against this asset
    Using(Asset),
    /// Transfer to this address
    Recipient { name: String, address: Address },
}

/// Every field present and resolved against the registry
#[derive(Debug, Clone)]
pub struct ValidatedIntent {
    pub action: Action,
    pub chain: ChainConfig,
    pub token: Asset,
    pub counterparty: Counterparty,
    pub amount: AmountSpec,
    pub amount_is_target: bool,
}

impl ValidatedIntent {
    /// Asset whose balance funds the transaction
    pub fn spent_asset(&self) -> &Asset {
        match (&self.action, &self.counterparty) {
            (Action::Buy, Counterparty::Using(using)) => using,
            _ => &self.token,
        }
    }

    /// Asset the amount is denominated in
    pub fn amount_asset(&self) -> &Asset {
        match (&self.counterparty, self.amount_is_target) {
            (Counterparty::Using(using), true) => using,
            _ => &self.token,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_relative_amounts() {
        assert_eq!("all".parse::<AmountSpec>().unwrap(), AmountSpec::All);
        assert_eq!("HALF".parse::<AmountSpec>().unwrap(), AmountSpec::Percent(50));
        assert_eq!("25%".parse::<AmountSpec>().unwrap(), AmountSpec::Percent(25));
        assert!("0%".parse::<AmountSpec>().is_err());
        assert!("150%".parse::<AmountSpec>().is_err());
    }

    #[test]
    fn parses_exact_amounts() {
        assert_eq!(
            "0.05".parse::<AmountSpec>().unwrap(),
            AmountSpec::Exact("0.05".to_string())
        );
        assert!("ten".parse::<AmountSpec>().is_err());
        assert!("-3".parse::<AmountSpec>().is_err());
    }

    #[test]
    fn resolves_share_of_balance() {
        let balance = U256::from(1_001u64);
        assert_eq!(
            AmountSpec::Percent(50).resolve(6, Some(balance)).unwrap(),
            U256::from(500u64)
        );
        assert_eq!(AmountSpec::All.resolve(6, Some(balance)).unwrap(), balance);
        assert!(AmountSpec::All.resolve(6, None).is_err());
        assert_eq!(
            AmountSpec::Exact("1.5".to_string()).resolve(6, None).unwrap(),
            U256::from(1_500_000u64)
        );
    }
}
