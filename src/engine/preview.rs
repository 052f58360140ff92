//! Human-readable previews shown to the confirmation gate

use crate::pricing::{PriceQuote, PriceSource};
use crate::units::format_units;
use alloy::primitives::{Address, U256};

/// Swap breakdown: amounts, rate, USD estimate, route and the slippage floor.
pub fn swap_preview(quote: &PriceQuote, min_out: U256, slippage_bps: u64) -> String {
    let mut lines = vec![
        format!("Chain: {}", quote.chain),
        String::new(),
        "Price Quotes:".to_string(),
        "Best Price from DEX:".to_string(),
        format!("  You give: {} {}", quote.input.formatted(), quote.input.symbol),
        format!("  You get:  {} {}", quote.output.formatted(), quote.output.symbol),
        format!(
            "  Minimum received ({}% slippage): {} {}",
            slippage_bps as f64 / 100.0,
            format_units(min_out, quote.output.decimals),
            quote.output.symbol
        ),
        String::new(),
        "Exchange Rate:".to_string(),
        format!(
            "  1 {} = {:.6} {}",
            quote.token_symbol(),
            quote.exchange_rate,
            quote.using_symbol()
        ),
        String::new(),
    ];

    if quote.usd.source == PriceSource::Unavailable {
        lines.push("USD Values: unavailable".to_string());
    } else {
        lines.push("USD Values:".to_string());
        lines.push(format!("  Input:  ${:.2}", quote.usd.input));
        lines.push(format!("  Output: ${:.2}", quote.usd.output));
        if let Some(impact) = quote.usd.price_impact_percent() {
            lines.push(format!("  Price Impact: {:.2}%", impact));
        }
        if quote.usd.source == PriceSource::Fallback {
            lines.push("  (estimated from fallback prices)".to_string());
        }
    }

    lines.push(String::new());
    lines.push("Available Routes:".to_string());
    lines.push(format!(
        "  - {} via {:?}",
        quote.route.router_name, quote.route.router
    ));

    lines.join("\n")
}

/// Transfer breakdown.
pub fn transfer_preview(
    chain: &str,
    amount: &str,
    symbol: &str,
    recipient: &str,
    address: Address,
) -> String {
    [
        format!("Chain: {}", chain),
        String::new(),
        "Transfer Details:".to_string(),
        format!("  Send: {} {}", amount, symbol),
        format!("  To:   {} ({:?})", recipient, address),
    ]
    .join("\n")
}
