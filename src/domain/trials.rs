//! Monte Carlo trial aggregation over random portfolios.
//!
//! Each trial draws a distinct random portfolio from the eligible
//! universe, runs the return engine with rebalancing, and records the
//! final outcomes; the summary is the per-column median. The random
//! source is injected so tests can seed it; the CLI runs unseeded by
//! default.

use crate::domain::error::RotorError;
use crate::domain::prices::{MarketData, Window};
use crate::domain::returns::compute_portfolio;
use crate::domain::universe::eligible_tickers;
use rand::Rng;
use rand::seq::SliceRandom;

/// Outcome of a single random-portfolio trial.
#[derive(Debug, Clone)]
pub struct TrialResult {
    pub tickers: Vec<String>,
    pub final_roi: f64,
    pub final_rebalanced: f64,
    pub final_benchmark: f64,
}

/// Per-column medians across all trials.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialSummary {
    pub median_roi: f64,
    pub median_rebalanced: f64,
    pub median_benchmark: f64,
}

/// Median with midpoint interpolation for even counts; NaN for an empty
/// set (a zero-trial run).
fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}

/// Run `n_trials` random-portfolio backtests over the window
/// `[start_year, start_year + nb_years)`.
pub fn simulate_trials<R: Rng>(
    market: &MarketData,
    start_year: i32,
    nb_years: i32,
    portfolio_size: usize,
    n_trials: usize,
    rebalance_period: usize,
    rng: &mut R,
) -> Result<(Vec<TrialResult>, TrialSummary), RotorError> {
    let window = Window::from_years(start_year, nb_years);
    let universe = eligible_tickers(&market.prices, &window);
    if universe.len() < portfolio_size {
        return Err(RotorError::InsufficientUniverse {
            requested: portfolio_size,
            eligible: universe.len(),
        });
    }

    let mut results = Vec::with_capacity(n_trials);
    for _ in 0..n_trials {
        let mut tickers: Vec<String> = universe
            .choose_multiple(rng, portfolio_size)
            .cloned()
            .collect();
        tickers.sort_unstable();

        let (frame, _, _) = compute_portfolio(market, &tickers, &window, rebalance_period)?;
        let last = frame.last().ok_or(RotorError::InsufficientHistory {
            dates: 0,
            minimum: crate::domain::returns::MIN_RETURN_DATES,
        })?;

        results.push(TrialResult {
            tickers,
            final_roi: last.roi,
            final_rebalanced: last.rebalanced,
            final_benchmark: last.benchmark,
        });
    }

    let mut roi: Vec<f64> = results.iter().map(|r| r.final_roi).collect();
    let mut rebalanced: Vec<f64> = results.iter().map(|r| r.final_rebalanced).collect();
    let mut benchmark: Vec<f64> = results.iter().map(|r| r.final_benchmark).collect();
    let summary = TrialSummary {
        median_roi: median(&mut roi),
        median_rebalanced: median(&mut rebalanced),
        median_benchmark: median(&mut benchmark),
    };

    Ok((results, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::prices::{BenchmarkSeries, PriceTable, is_business_day};
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::BTreeMap;
    use std::collections::HashSet;

    fn trading_days(start: NaiveDate, count: usize) -> Vec<NaiveDate> {
        let mut dates = Vec::with_capacity(count);
        let mut d = start;
        while dates.len() < count {
            if is_business_day(d) {
                dates.push(d);
            }
            d += chrono::Duration::days(1);
        }
        dates
    }

    fn sample_market(n_tickers: usize) -> MarketData {
        let n = 120;
        let dates = trading_days(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(), n);
        let mut columns = BTreeMap::new();
        for k in 0..n_tickers {
            let drift = 1.0 + 0.001 * k as f64;
            let mut price = 50.0 + k as f64;
            let col = (0..n)
                .map(|_| {
                    price *= drift;
                    Some(price)
                })
                .collect();
            columns.insert(format!("T{k:02}"), col);
        }
        let benchmark = BenchmarkSeries::new(
            "SPY".into(),
            dates.clone(),
            (0..n).map(|i| 100.0 + i as f64 * 0.1).collect(),
        );
        MarketData {
            benchmark,
            prices: PriceTable::new(dates, columns),
        }
    }

    #[test]
    fn trials_draw_distinct_eligible_tickers() {
        let market = sample_market(12);
        let mut rng = StdRng::seed_from_u64(7);
        let (results, _) =
            simulate_trials(&market, 2020, 1, 5, 20, 252, &mut rng).unwrap();

        let window = Window::from_years(2020, 1);
        let universe: HashSet<String> =
            eligible_tickers(&market.prices, &window).into_iter().collect();
        for trial in &results {
            assert_eq!(trial.tickers.len(), 5);
            let unique: HashSet<&String> = trial.tickers.iter().collect();
            assert_eq!(unique.len(), 5);
            assert!(trial.tickers.iter().all(|t| universe.contains(t)));
        }
    }

    #[test]
    fn insufficient_universe_is_an_error() {
        let market = sample_market(3);
        let mut rng = StdRng::seed_from_u64(7);
        let result = simulate_trials(&market, 2020, 1, 5, 10, 252, &mut rng);
        assert!(matches!(
            result,
            Err(RotorError::InsufficientUniverse {
                requested: 5,
                eligible: 3,
            })
        ));
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let market = sample_market(10);
        let mut rng_a = StdRng::seed_from_u64(42);
        let mut rng_b = StdRng::seed_from_u64(42);
        let (results_a, summary_a) =
            simulate_trials(&market, 2020, 1, 4, 8, 252, &mut rng_a).unwrap();
        let (results_b, summary_b) =
            simulate_trials(&market, 2020, 1, 4, 8, 252, &mut rng_b).unwrap();

        assert_eq!(summary_a, summary_b);
        for (a, b) in results_a.iter().zip(&results_b) {
            assert_eq!(a.tickers, b.tickers);
            assert_eq!(a.final_roi, b.final_roi);
        }
    }

    #[test]
    fn summary_is_median_of_trials() {
        let market = sample_market(10);
        let mut rng = StdRng::seed_from_u64(3);
        let (results, summary) =
            simulate_trials(&market, 2020, 1, 4, 5, 252, &mut rng).unwrap();

        let mut rois: Vec<f64> = results.iter().map(|r| r.final_roi).collect();
        rois.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_relative_eq!(summary.median_roi, rois[2]);
    }

    #[test]
    fn median_interpolates_even_counts() {
        let mut values = vec![4.0, 1.0, 3.0, 2.0];
        assert_relative_eq!(median(&mut values), 2.5);
        let mut odd = vec![5.0, 1.0, 3.0];
        assert_relative_eq!(median(&mut odd), 3.0);
    }
}
