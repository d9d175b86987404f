//! Momentum ranking.
//!
//! Scores every ticker by its return over a lookback window relative to
//! the benchmark (ALFA) and keeps the strongest outperformers. Only
//! strictly positive ALFA qualifies; tickers at or below the benchmark are
//! excluded even when fewer than `top_n` names remain, so callers must
//! handle a short list.

use crate::domain::error::RotorError;
use crate::domain::prices::{BUSINESS_DAYS_PER_YEAR, MarketData, PortfolioSlice, Window};
use crate::domain::returns::window_slice;
use crate::domain::universe::MIN_OBSERVATIONS;
use chrono::NaiveDate;
use std::cmp::Ordering;

/// Momentum score for one ticker over a lookback window.
#[derive(Debug, Clone, PartialEq)]
pub struct MomentumScore {
    pub ticker: String,
    /// Growth factor over the lookback window.
    pub roi: f64,
    /// Excess growth over the benchmark for the same window.
    pub alfa: f64,
}

/// Rank all tickers by ALFA over `lookback_years * 252` business days
/// ending at `as_of` (inclusive), returning at most `top_n` entries sorted
/// by ALFA descending.
///
/// ROI is measured between the first and last date of the realized window
/// slice; tickers missing a price at either endpoint, or with fewer than
/// [`MIN_OBSERVATIONS`] observations in the window, score as unusable and
/// are skipped. An empty result is valid.
pub fn rank_momentum(
    market: &MarketData,
    as_of: NaiveDate,
    lookback_years: u32,
    top_n: usize,
) -> Vec<MomentumScore> {
    let window = Window::lookback(as_of, lookback_years.saturating_mul(BUSINESS_DAYS_PER_YEAR));
    let sliced = market.prices.slice(&window);
    let rows = sliced.row_count();
    if rows < 2 {
        return Vec::new();
    }

    let first = sliced.dates[0];
    let last = sliced.dates[rows - 1];
    let Some(bench_roi) = market.benchmark.slice_range(first, last).roi() else {
        return Vec::new();
    };

    let mut scores: Vec<MomentumScore> = sliced
        .columns
        .iter()
        .filter_map(|(ticker, col)| {
            let observed = col.iter().filter(|v| v.is_some()).count();
            if observed < MIN_OBSERVATIONS {
                return None;
            }
            let start = col[0]?;
            let end = col[rows - 1]?;
            let roi = end / start;
            let alfa = roi - bench_roi;
            (alfa > 0.0).then(|| MomentumScore {
                ticker: ticker.clone(),
                roi,
                alfa,
            })
        })
        .collect();

    scores.sort_by(|a, b| {
        b.alfa
            .partial_cmp(&a.alfa)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.ticker.cmp(&b.ticker))
    });
    scores.truncate(top_n);
    scores
}

/// Evaluate an equal-weighted portfolio over `period_days` business days
/// starting at `start`: quarter growth factor, the cleaned slice, and the
/// benchmark growth factor over the same realized range.
///
/// The universe eligibility threshold does not apply here; a quarter
/// truncated by the end of the data is evaluated over the rows actually
/// present, as long as there are at least two.
pub fn evaluate_period(
    market: &MarketData,
    tickers: &[String],
    start: NaiveDate,
    period_days: u32,
) -> Result<(f64, PortfolioSlice, f64), RotorError> {
    let window = Window::forward(start, period_days);
    let slice = window_slice(market, tickers, &window)?;

    // window_slice guarantees at least two dates.
    let roi = slice.equal_weight_roi()[slice.len() - 1];

    let first = slice.dates[0];
    let last = slice.dates[slice.len() - 1];
    let bench_roi = market
        .benchmark
        .slice_range(first, last)
        .roi()
        .ok_or_else(|| RotorError::DataUnavailable {
            reason: format!(
                "benchmark {} has no data between {first} and {last}",
                market.benchmark.symbol
            ),
        })?;

    Ok((roi, slice, bench_roi))
}
