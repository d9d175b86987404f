//! Portfolio return engine.
//!
//! Slices the price table to a window, restricts to the requested holdings,
//! drops dates where any holding is missing, and computes the
//! equal-weighted cumulative-return series next to the benchmark and its
//! rebalanced counterpart. Returns are growth factors of 1 unit invested
//! at the first usable date, so every series starts at exactly 1.0.

use crate::domain::error::RotorError;
use crate::domain::prices::{MarketData, PortfolioSlice, Window};
use crate::domain::rebalance::rebalance;
use crate::domain::universe::eligible_tickers;
use chrono::NaiveDate;

/// Default rebalance cadence for buy-and-hold comparisons: one trading
/// year.
pub const DEFAULT_REBALANCE_PERIOD: usize = 252;

/// Minimum usable dates for a return series to be defined.
pub const MIN_RETURN_DATES: usize = 2;

/// One row of the side-by-side comparison ledger. All three values are
/// cumulative growth factors measured from the same first date.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestRow {
    pub date: NaiveDate,
    pub benchmark: f64,
    pub roi: f64,
    pub rebalanced: f64,
}

#[derive(Debug, Clone, Default)]
pub struct BacktestFrame {
    pub rows: Vec<BacktestRow>,
}

impl BacktestFrame {
    pub fn last(&self) -> Option<&BacktestRow> {
        self.rows.last()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Assemble the price matrix for `tickers` over `window` without the
/// universe eligibility gate: sorted tickers, only dates where every
/// holding has a price, and at least two of them. For deliberately short
/// windows, like a single rotation quarter truncated by the end of the
/// data, where the full-window observation threshold does not apply.
pub fn window_slice(
    market: &MarketData,
    tickers: &[String],
    window: &Window,
) -> Result<PortfolioSlice, RotorError> {
    if tickers.is_empty() {
        return Err(RotorError::EmptyPortfolio);
    }

    let mut selected: Vec<String> = tickers.to_vec();
    selected.sort_unstable();

    let sliced = market.prices.slice(window);
    let mut columns: Vec<&[Option<f64>]> = Vec::with_capacity(selected.len());
    for ticker in &selected {
        let col = sliced
            .column(ticker)
            .ok_or_else(|| RotorError::UnknownTicker {
                ticker: ticker.clone(),
                start: window.start,
                end: window.end,
            })?;
        columns.push(col);
    }

    let mut dates = Vec::new();
    let mut closes: Vec<Vec<f64>> = vec![Vec::new(); selected.len()];
    for (row, &date) in sliced.dates.iter().enumerate() {
        let values: Option<Vec<f64>> = columns.iter().map(|col| col[row]).collect();
        if let Some(values) = values {
            dates.push(date);
            for (i, value) in values.into_iter().enumerate() {
                closes[i].push(value);
            }
        }
    }

    if dates.len() < MIN_RETURN_DATES {
        return Err(RotorError::InsufficientHistory {
            dates: dates.len(),
            minimum: MIN_RETURN_DATES,
        });
    }

    Ok(PortfolioSlice {
        tickers: selected,
        dates,
        closes,
    })
}

/// Build the cleaned portfolio slice for `tickers` over `window`: only
/// eligible tickers are accepted, and only dates where every holding has a
/// price survive. The resulting date index is common to all holdings.
pub fn clean_slice(
    market: &MarketData,
    tickers: &[String],
    window: &Window,
) -> Result<PortfolioSlice, RotorError> {
    if tickers.is_empty() {
        return Err(RotorError::EmptyPortfolio);
    }

    let eligible = eligible_tickers(&market.prices, window);
    for ticker in tickers {
        if !eligible.contains(ticker) {
            return Err(RotorError::UnknownTicker {
                ticker: ticker.clone(),
                start: window.start,
                end: window.end,
            });
        }
    }

    window_slice(market, tickers, window)
}

/// Run the full return computation for a set of tickers.
///
/// Returns the comparison frame (benchmark, equal-weight ROI and
/// rebalanced ROI per date), the cleaned price slice, and the per-ticker
/// rebalanced cumulative components.
///
/// The benchmark is re-aligned to the first-to-last date of the cleaned
/// slice, not the requested window: return percentages are measured
/// against the window that was actually usable.
pub fn compute_portfolio(
    market: &MarketData,
    tickers: &[String],
    window: &Window,
    rebalance_period: usize,
) -> Result<(BacktestFrame, PortfolioSlice, PortfolioSlice), RotorError> {
    let slice = clean_slice(market, tickers, window)?;

    let first = slice.dates[0];
    let last = slice.dates[slice.len() - 1];
    let bench = market.benchmark.slice_range(first, last);

    let roi = slice.equal_weight_roi();
    let (rebalanced_roi, components) = rebalance(&slice, rebalance_period);

    // Walk benchmark and portfolio dates together; a row makes the frame
    // only when both sides have it.
    let mut rows = Vec::with_capacity(bench.len());
    let bench_first = bench.closes.first().copied();
    let mut p = 0usize;
    if let Some(bench_first) = bench_first {
        for (&date, &close) in bench.dates.iter().zip(&bench.closes) {
            while p < slice.len() && slice.dates[p] < date {
                p += 1;
            }
            if p < slice.len() && slice.dates[p] == date {
                rows.push(BacktestRow {
                    date,
                    benchmark: close / bench_first,
                    roi: roi[p],
                    rebalanced: rebalanced_roi[p],
                });
            }
        }
    }

    let rebalanced_slice = PortfolioSlice {
        tickers: slice.tickers.clone(),
        dates: slice.dates.clone(),
        closes: components,
    };

    Ok((BacktestFrame { rows }, slice, rebalanced_slice))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::prices::{BenchmarkSeries, PriceTable, is_business_day};
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

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

    /// 60 trading days; AAA rises linearly, BBB falls, GAP has a hole at
    /// row 30.
    fn sample_market() -> MarketData {
        let dates = trading_days(date(2020, 1, 1), 60);
        let mut columns = BTreeMap::new();
        columns.insert(
            "AAA".to_string(),
            (0..60).map(|i| Some(100.0 + i as f64)).collect(),
        );
        columns.insert(
            "BBB".to_string(),
            (0..60).map(|i| Some(200.0 - i as f64)).collect(),
        );
        columns.insert(
            "GAP".to_string(),
            (0..60)
                .map(|i| if i == 30 { None } else { Some(50.0 + i as f64) })
                .collect(),
        );
        let benchmark = BenchmarkSeries::new(
            "SPY".into(),
            dates.clone(),
            (0..60).map(|i| 300.0 + i as f64).collect(),
        );
        MarketData {
            benchmark,
            prices: PriceTable::new(dates, columns),
        }
    }

    fn tickers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn series_start_at_one() {
        let market = sample_market();
        let window = Window::from_years(2020, 1);
        let (frame, _, _) =
            compute_portfolio(&market, &tickers(&["AAA", "BBB"]), &window, 252).unwrap();

        let first = &frame.rows[0];
        assert_relative_eq!(first.benchmark, 1.0);
        assert_relative_eq!(first.roi, 1.0);
        assert_relative_eq!(first.rebalanced, 1.0);
    }

    #[test]
    fn equal_weight_is_mean_of_growth_factors() {
        let market = sample_market();
        let window = Window::from_years(2020, 1);
        let (frame, slice, _) =
            compute_portfolio(&market, &tickers(&["AAA", "BBB"]), &window, 252).unwrap();

        let last = frame.last().unwrap();
        let aaa = 159.0 / 100.0;
        let bbb = 141.0 / 200.0;
        assert_relative_eq!(last.roi, (aaa + bbb) / 2.0, max_relative = 1e-12);
        assert_eq!(slice.len(), 60);
    }

    #[test]
    fn tickers_are_sorted_in_slice() {
        let market = sample_market();
        let window = Window::from_years(2020, 1);
        let (_, slice, _) =
            compute_portfolio(&market, &tickers(&["BBB", "AAA"]), &window, 252).unwrap();
        assert_eq!(slice.tickers, vec!["AAA", "BBB"]);
    }

    #[test]
    fn rows_with_missing_values_are_dropped() {
        let market = sample_market();
        let window = Window::from_years(2020, 1);
        let (frame, slice, _) =
            compute_portfolio(&market, &tickers(&["AAA", "GAP"]), &window, 252).unwrap();

        // GAP's hole removes one common date for the whole portfolio.
        assert_eq!(slice.len(), 59);
        assert_eq!(frame.len(), 59);
    }

    #[test]
    fn empty_portfolio_is_an_error() {
        let market = sample_market();
        let window = Window::from_years(2020, 1);
        let result = compute_portfolio(&market, &[], &window, 252);
        assert!(matches!(result, Err(RotorError::EmptyPortfolio)));
    }

    #[test]
    fn unknown_ticker_is_an_error() {
        let market = sample_market();
        let window = Window::from_years(2020, 1);
        let result = compute_portfolio(&market, &tickers(&["AAA", "ZZZ"]), &window, 252);
        assert!(matches!(
            result,
            Err(RotorError::UnknownTicker { ticker, .. }) if ticker == "ZZZ"
        ));
    }

    #[test]
    fn window_past_data_rejects_tickers() {
        let market = sample_market();
        // Window past the data: no eligible tickers at all, reported as
        // unknown ticker for this window.
        let window = Window::from_years(2021, 1);
        let result = compute_portfolio(&market, &tickers(&["AAA"]), &window, 252);
        assert!(matches!(result, Err(RotorError::UnknownTicker { .. })));
    }

    #[test]
    fn window_slice_skips_the_eligibility_gate() {
        let market = sample_market();
        // Ten trading days: far below the universe threshold, but plenty
        // for a return series.
        let window = Window::new(date(2020, 1, 1), date(2020, 1, 15));

        let slice = window_slice(&market, &tickers(&["AAA", "BBB"]), &window).unwrap();
        assert_eq!(slice.len(), 10);

        // The gated path still rejects the same request.
        let gated = clean_slice(&market, &tickers(&["AAA", "BBB"]), &window);
        assert!(matches!(gated, Err(RotorError::UnknownTicker { .. })));
    }

    #[test]
    fn window_slice_still_rejects_absent_tickers() {
        let market = sample_market();
        let window = Window::from_years(2020, 1);
        let result = window_slice(&market, &tickers(&["AAA", "ZZZ"]), &window);
        assert!(matches!(
            result,
            Err(RotorError::UnknownTicker { ticker, .. }) if ticker == "ZZZ"
        ));
    }

    #[test]
    fn disjoint_histories_are_insufficient() {
        // Both tickers clear the 50-observation bar, but share only one
        // common date, so no return series can be built.
        let dates = trading_days(date(2020, 1, 1), 100);
        let mut columns = BTreeMap::new();
        columns.insert(
            "EARLY".to_string(),
            (0..100)
                .map(|i| (i <= 49 || i == 99).then_some(10.0 + i as f64))
                .collect(),
        );
        columns.insert(
            "LATE".to_string(),
            (0..100).map(|i| (i >= 50).then_some(20.0 + i as f64)).collect(),
        );
        let benchmark = BenchmarkSeries::new(
            "SPY".into(),
            dates.clone(),
            (0..100).map(|i| 300.0 + i as f64).collect(),
        );
        let market = MarketData {
            benchmark,
            prices: PriceTable::new(dates, columns),
        };

        let window = Window::from_years(2020, 1);
        let result = compute_portfolio(&market, &tickers(&["EARLY", "LATE"]), &window, 252);
        assert!(matches!(
            result,
            Err(RotorError::InsufficientHistory { dates: 1, minimum: 2 })
        ));
    }

    #[test]
    fn benchmark_realigned_to_cleaned_range() {
        let mut market = sample_market();
        // AAA missing for the first 5 rows: cleaned slice starts at row 5,
        // and so must the benchmark normalization.
        if let Some(col) = market.prices.columns.get_mut("AAA") {
            for v in col.iter_mut().take(5) {
                *v = None;
            }
        }
        let window = Window::from_years(2020, 1);
        let (frame, slice, _) =
            compute_portfolio(&market, &tickers(&["AAA"]), &window, 252).unwrap();

        assert_eq!(slice.dates[0], market.benchmark.dates[5]);
        assert_relative_eq!(frame.rows[0].benchmark, 1.0);
        let expected_last = (300.0 + 59.0) / (300.0 + 5.0);
        assert_relative_eq!(
            frame.last().unwrap().benchmark,
            expected_last,
            max_relative = 1e-12
        );
    }

    #[test]
    fn rebalanced_components_sum_to_rebalanced_column() {
        let market = sample_market();
        let window = Window::from_years(2020, 1);
        let (frame, _, rebalanced) =
            compute_portfolio(&market, &tickers(&["AAA", "BBB"]), &window, 30).unwrap();

        for (i, row) in frame.rows.iter().enumerate() {
            let sum: f64 = rebalanced.closes.iter().map(|col| col[i]).sum();
            assert_relative_eq!(row.rebalanced, sum, max_relative = 1e-9);
        }
    }
}
