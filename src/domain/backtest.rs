//! Presentation-facing backtest operations.
//!
//! Thin orchestration over the return engine, universe filter, trial
//! aggregator and rotation simulator. Tickers cross this boundary as
//! hyphen-separated strings ("APD-CCI-CPRT"), sorted for reproducibility.

use crate::domain::error::RotorError;
use crate::domain::prices::{MarketData, PortfolioSlice, Window};
use crate::domain::returns::{BacktestFrame, compute_portfolio};
use crate::domain::rotation::{self, StrategyLedger};
use crate::domain::trials::{TrialResult, TrialSummary, simulate_trials};
use crate::domain::universe::{eligible_tickers, join_tickers, parse_tickers};
use chrono::NaiveDate;
use rand::Rng;
use rand::seq::SliceRandom;

/// Backtest a given portfolio over `[start_year, start_year + nb_years)`.
///
/// Returns the comparison frame (benchmark vs ROI vs rebalanced ROI), the
/// cleaned portfolio price slice and the per-ticker rebalanced components.
pub fn portfolio_backtest(
    market: &MarketData,
    ticker_spec: &str,
    start_year: i32,
    nb_years: i32,
    rebalance_period: usize,
) -> Result<(BacktestFrame, PortfolioSlice, PortfolioSlice), RotorError> {
    let tickers = parse_tickers(ticker_spec)?;
    let window = Window::from_years(start_year, nb_years);
    compute_portfolio(market, &tickers, &window, rebalance_period)
}

/// Draw `count` distinct random tickers from the eligible universe,
/// hyphen-joined and sorted.
pub fn random_ticker_string<R: Rng>(
    market: &MarketData,
    start_year: i32,
    nb_years: i32,
    count: usize,
    rng: &mut R,
) -> Result<String, RotorError> {
    let window = Window::from_years(start_year, nb_years);
    let universe = eligible_tickers(&market.prices, &window);
    if universe.len() < count {
        return Err(RotorError::InsufficientUniverse {
            requested: count,
            eligible: universe.len(),
        });
    }
    let drawn: Vec<String> = universe.choose_multiple(rng, count).cloned().collect();
    Ok(join_tickers(&drawn))
}

/// All eligible tickers for the window, hyphen-joined and sorted.
pub fn eligible_ticker_string(market: &MarketData, start_year: i32, nb_years: i32) -> String {
    let window = Window::from_years(start_year, nb_years);
    join_tickers(&eligible_tickers(&market.prices, &window))
}

/// Run random-portfolio trials and summarize the medians.
pub fn run_trials<R: Rng>(
    market: &MarketData,
    start_year: i32,
    nb_years: i32,
    portfolio_size: usize,
    trial_count: usize,
    rebalance_period: usize,
    rng: &mut R,
) -> Result<(Vec<TrialResult>, TrialSummary), RotorError> {
    simulate_trials(
        market,
        start_year,
        nb_years,
        portfolio_size,
        trial_count,
        rebalance_period,
        rng,
    )
}

/// Quarterly momentum rotation with turnover-scaled transaction costs.
pub fn quarterly_rotation(
    market: &MarketData,
    start: NaiveDate,
    n_quarters: u32,
    cost_rate: f64,
) -> Result<StrategyLedger, RotorError> {
    rotation::run_rotation(market, start, n_quarters, cost_rate)
}

/// Quarterly momentum rotation with the stop-loss/restart rule.
pub fn quarterly_rotation_with_stop(
    market: &MarketData,
    start: NaiveDate,
    n_quarters: u32,
    cost_rate: f64,
    loss_rate: f64,
    restart_quarters: u32,
) -> Result<StrategyLedger, RotorError> {
    rotation::run_rotation_with_stop(
        market,
        start,
        n_quarters,
        cost_rate,
        loss_rate,
        restart_quarters,
    )
}
