//! Conversions between human decimal amounts and integer base units.
//!
//! All arithmetic on amounts happens on `U256` base units. Decimal strings are only
//! produced for display.

use crate::{Error, Result};
use alloy::primitives::U256;

/// Parse a decimal string into base units.
///
/// Digits beyond `decimals` fractional places are dropped (truncation toward zero).
pub fn parse_units(text: &str, decimals: u8) -> Result<U256> {
    let text = text.trim();
    if text.is_empty() {
        return Err(Error::InvalidArgument("empty amount".to_string()));
    }

    let (whole, fraction) = match text.split_once('.') {
        Some((w, f)) => (w, f),
        None => (text, ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        return Err(Error::InvalidArgument(format!("invalid amount: {}", text)));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return Err(Error::InvalidArgument(format!("invalid amount: {}", text)));
    }

    let kept: String = fraction.chars().take(decimals as usize).collect();
    let padded = format!("{:0<width$}", kept, width = decimals as usize);
    let digits = format!("{}{}", whole, padded);
    let digits = digits.trim_start_matches('0');

    if digits.is_empty() {
        return Ok(U256::ZERO);
    }

    U256::from_str_radix(digits, 10)
        .map_err(|e| Error::InvalidArgument(format!("amount {} out of range: {}", text, e)))
}

/// Format base units as a decimal string, trimming trailing zeros.
pub fn format_units(value: U256, decimals: u8) -> String {
    if value.is_zero() {
        return "0".to_string();
    }

    let divisor = U256::from(10).pow(U256::from(decimals));
    let whole = value / divisor;
    let remainder = value % divisor;

    if remainder.is_zero() {
        whole.to_string()
    } else {
        let remainder_str = format!("{:0>width$}", remainder, width = decimals as usize);
        let trimmed = remainder_str.trim_end_matches('0');
        if trimmed.is_empty() {
            whole.to_string()
        } else {
            format!("{}.{}", whole, trimmed)
        }
    }
}

/// Lossy conversion for display-only math (rates, USD estimates).
pub fn to_f64(value: U256, decimals: u8) -> f64 {
    format_units(value, decimals).parse().unwrap_or(0.0)
}

/// `value * bps / 10_000`, rounded down.
pub fn apply_bps(value: U256, bps: u64) -> U256 {
    value * U256::from(bps) / U256::from(10_000u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_whole_and_fractional_amounts() {
        assert_eq!(
            parse_units("0.05", 18).unwrap(),
            U256::from(50_000_000_000_000_000u64)
        );
        assert_eq!(parse_units("10", 6).unwrap(), U256::from(10_000_000u64));
        assert_eq!(parse_units(".5", 1).unwrap(), U256::from(5u64));
    }

    #[test]
    fn truncates_excess_precision() {
        // 6-decimal token: the seventh digit is dropped, never rounded up
        assert_eq!(parse_units("1.2345679", 6).unwrap(), U256::from(1_234_567u64));
        assert_eq!(parse_units("0.0000009", 6).unwrap(), U256::ZERO);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_units("", 18).is_err());
        assert!(parse_units("-1", 18).is_err());
        assert!(parse_units("1e18", 18).is_err());
        assert!(parse_units(".", 18).is_err());
    }

    #[test]
    fn formats_without_trailing_zeros() {
        assert_eq!(format_units(U256::from(1_500_000u64), 6), "1.5");
        assert_eq!(format_units(U256::from(10u64).pow(U256::from(18)), 18), "1");
        assert_eq!(format_units(U256::ZERO, 18), "0");
    }

    #[test]
    fn slippage_floor_rounds_down() {
        assert_eq!(apply_bps(U256::from(1_000u64), 9_950), U256::from(995u64));
        assert_eq!(apply_bps(U256::from(199u64), 9_950), U256::from(198u64));
    }
}
