#![allow(dead_code)]

use chrono::NaiveDate;
use rotor::domain::error::RotorError;
use rotor::domain::prices::{BenchmarkSeries, MarketData, PriceTable, is_business_day};
use rotor::ports::fetch_port::FetchPort;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// First `n` weekdays from `start` inclusive.
pub fn trading_days(start: NaiveDate, n: usize) -> Vec<NaiveDate> {
    let mut dates = Vec::with_capacity(n);
    let mut d = start;
    while dates.len() < n {
        if is_business_day(d) {
            dates.push(d);
        }
        d += chrono::Duration::days(1);
    }
    dates
}

/// Synthetic market: each ticker compounds at its own daily rate from 100,
/// the benchmark at `bench_rate`, over `n` weekdays from `start`.
pub fn growth_market(
    start: NaiveDate,
    n: usize,
    rates: &[(&str, f64)],
    bench_rate: f64,
) -> MarketData {
    let dates = trading_days(start, n);
    let mut columns = BTreeMap::new();
    for (ticker, rate) in rates {
        let col = (0..n).map(|i| Some(100.0 * rate.powi(i as i32))).collect();
        columns.insert(ticker.to_string(), col);
    }
    let bench_closes = (0..n).map(|i| 100.0 * bench_rate.powi(i as i32)).collect();
    MarketData {
        benchmark: BenchmarkSeries::new("SPY".to_string(), dates.clone(), bench_closes),
        prices: PriceTable::new(dates, columns),
    }
}

/// Twelve-ticker market with spread-out growth rates, wide enough for
/// multi-year backtests and two years of quarterly rotation.
pub fn wide_market() -> MarketData {
    let rates: Vec<(String, f64)> = (0..12)
        .map(|i| (format!("T{i:02}"), 1.0006 + i as f64 * 0.0001))
        .collect();
    let borrowed: Vec<(&str, f64)> = rates.iter().map(|(t, r)| (t.as_str(), *r)).collect();
    growth_market(date(2018, 1, 1), 1100, &borrowed, 1.0004)
}

/// Add a column that only has values for the first `observations` rows.
pub fn add_sparse_ticker(market: &mut MarketData, ticker: &str, observations: usize) {
    let n = market.prices.row_count();
    let col = (0..n)
        .map(|i| (i < observations).then(|| 50.0 + i as f64))
        .collect();
    market.prices.columns.insert(ticker.to_string(), col);
}

/// Render the market as the two cache CSV files the price store reads.
pub fn write_market_csv(dir: &Path, market: &MarketData) {
    let mut bench = String::from("Date,SPY\n");
    for (d, close) in market.benchmark.dates.iter().zip(&market.benchmark.closes) {
        writeln!(bench, "{d},{close}").unwrap();
    }
    std::fs::write(dir.join("spy.csv"), bench).unwrap();

    let tickers = market.prices.tickers();
    let mut prices = format!("Date,{}\n", tickers.join(","));
    for (i, d) in market.prices.dates.iter().enumerate() {
        write!(prices, "{d}").unwrap();
        for col in market.prices.columns.values() {
            match col[i] {
                Some(v) => write!(prices, ",{v}").unwrap(),
                None => prices.push(','),
            }
        }
        prices.push('\n');
    }
    std::fs::write(dir.join("prices.csv"), prices).unwrap();
}

/// Fetch port that always fails; cache-only tests must never hit it.
pub struct NoFetch;

impl FetchPort for NoFetch {
    fn fetch_closes(
        &self,
        symbol: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<(NaiveDate, f64)>, RotorError> {
        Err(RotorError::DataUnavailable {
            reason: format!("unexpected fetch for {symbol}"),
        })
    }
}
