//! Universe filter and ticker list parsing.
//!
//! A ticker is eligible for a window when its price history there is not a
//! sliver: at least one observation, and at least [`MIN_OBSERVATIONS`] of
//! them. The threshold tolerates moderate missing data while keeping out
//! tickers that only existed for a fraction of the window.

use crate::domain::prices::{PriceTable, Window};
use std::collections::HashSet;

/// Minimum non-missing observations inside a window for a ticker to be
/// eligible.
pub const MIN_OBSERVATIONS: usize = 50;

/// Tickers with sufficient history inside `window`, in sorted order.
pub fn eligible_tickers(table: &PriceTable, window: &Window) -> Vec<String> {
    let sliced = table.slice(window);
    // BTreeMap iteration keeps the result sorted.
    sliced
        .columns
        .iter()
        .filter(|(_, col)| {
            let observed = col.iter().filter(|v| v.is_some()).count();
            observed >= MIN_OBSERVATIONS
        })
        .map(|(ticker, _)| ticker.clone())
        .collect()
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum TickerParseError {
    #[error("empty token in ticker list")]
    EmptyToken,

    #[error("duplicate ticker: {0}")]
    DuplicateTicker(String),
}

/// Parse a hyphen-separated ticker string ("AAPL-MSFT-V") into uppercase
/// symbols, preserving input order.
pub fn parse_tickers(input: &str) -> Result<Vec<String>, TickerParseError> {
    let mut tickers = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split('-') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(TickerParseError::EmptyToken);
        }
        let ticker = trimmed.to_uppercase();
        if seen.contains(&ticker) {
            return Err(TickerParseError::DuplicateTicker(ticker));
        }
        seen.insert(ticker.clone());
        tickers.push(ticker);
    }

    Ok(tickers)
}

/// Join symbols into the hyphen-separated wire form, sorted for
/// reproducibility.
pub fn join_tickers(tickers: &[String]) -> String {
    let mut sorted: Vec<&str> = tickers.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.join("-")
}
