//! Price table, benchmark series and date windows.
//!
//! `MarketData` is the owned, immutable handle returned by the price store.
//! It is loaded once at startup and passed explicitly into every engine
//! call; nothing in the domain mutates it.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use std::collections::BTreeMap;

/// Trading days per calendar year, used for lookback windows.
pub const BUSINESS_DAYS_PER_YEAR: u32 = 252;

/// Half-open date interval `[start, end)` used to slice price data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Window {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Calendar-year window: Jan 1 of `start_year` to Jan 1 of
    /// `start_year + nb_years`.
    pub fn from_years(start_year: i32, nb_years: i32) -> Self {
        // Jan 1 exists for every year.
        let start = NaiveDate::from_ymd_opt(start_year, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(start_year + nb_years, 1, 1).unwrap();
        Self { start, end }
    }

    /// Window covering `n` business days forward from `start`, inclusive of
    /// the landing date.
    pub fn forward(start: NaiveDate, n_business_days: u32) -> Self {
        let last = add_business_days(start, n_business_days);
        Self {
            start,
            end: last + Duration::days(1),
        }
    }

    /// Window covering `n` business days back from `as_of`, inclusive of
    /// `as_of` itself.
    pub fn lookback(as_of: NaiveDate, n_business_days: u32) -> Self {
        Self {
            start: sub_business_days(as_of, n_business_days),
            end: as_of + Duration::days(1),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }
}

pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Step `n` business days forward (weekends skipped, no holiday calendar).
pub fn add_business_days(date: NaiveDate, n: u32) -> NaiveDate {
    let mut current = date;
    let mut remaining = n;
    while remaining > 0 {
        current += Duration::days(1);
        if is_business_day(current) {
            remaining -= 1;
        }
    }
    current
}

/// Step `n` business days backward.
pub fn sub_business_days(date: NaiveDate, n: u32) -> NaiveDate {
    let mut current = date;
    let mut remaining = n;
    while remaining > 0 {
        current -= Duration::days(1);
        if is_business_day(current) {
            remaining -= 1;
        }
    }
    current
}

/// Wide table of daily close prices: one row per trading date, one column
/// per ticker, `None` for missing observations. All columns are aligned to
/// `dates`, which are strictly increasing.
#[derive(Debug, Clone, Default)]
pub struct PriceTable {
    pub dates: Vec<NaiveDate>,
    pub columns: BTreeMap<String, Vec<Option<f64>>>,
}

impl PriceTable {
    pub fn new(dates: Vec<NaiveDate>, columns: BTreeMap<String, Vec<Option<f64>>>) -> Self {
        debug_assert!(dates.windows(2).all(|w| w[0] < w[1]));
        debug_assert!(columns.values().all(|c| c.len() == dates.len()));
        Self { dates, columns }
    }

    pub fn row_count(&self) -> usize {
        self.dates.len()
    }

    pub fn tickers(&self) -> Vec<String> {
        self.columns.keys().cloned().collect()
    }

    pub fn column(&self, ticker: &str) -> Option<&[Option<f64>]> {
        self.columns.get(ticker).map(|c| c.as_slice())
    }

    /// Index range of rows falling inside `window`.
    fn row_range(&self, window: &Window) -> std::ops::Range<usize> {
        let lo = self.dates.partition_point(|&d| d < window.start);
        let hi = self.dates.partition_point(|&d| d < window.end);
        lo..hi
    }

    /// Restrict the table to the rows inside `window`. Columns are kept as
    /// is; missing-data filtering belongs to the universe and return
    /// engines.
    pub fn slice(&self, window: &Window) -> PriceTable {
        let range = self.row_range(window);
        let dates = self.dates[range.clone()].to_vec();
        let columns = self
            .columns
            .iter()
            .map(|(ticker, col)| (ticker.clone(), col[range.clone()].to_vec()))
            .collect();
        PriceTable { dates, columns }
    }

    /// Number of non-missing observations for `ticker` (whole table).
    pub fn observation_count(&self, ticker: &str) -> usize {
        self.columns
            .get(ticker)
            .map(|col| col.iter().filter(|v| v.is_some()).count())
            .unwrap_or(0)
    }
}

/// Cleaned per-holding price matrix: sorted tickers, a common trading-day
/// index, and no missing values. `closes[i]` is the series for
/// `tickers[i]`, aligned to `dates`.
#[derive(Debug, Clone)]
pub struct PortfolioSlice {
    pub tickers: Vec<String>,
    pub dates: Vec<NaiveDate>,
    pub closes: Vec<Vec<f64>>,
}

impl PortfolioSlice {
    pub fn holdings(&self) -> usize {
        self.tickers.len()
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Per-ticker cumulative growth factors: each series divided by its
    /// value at the first date.
    pub fn normalized(&self) -> Vec<Vec<f64>> {
        self.closes
            .iter()
            .map(|col| {
                let first = col[0];
                col.iter().map(|&p| p / first).collect()
            })
            .collect()
    }

    /// Equal-weighted cumulative ROI: mean of the per-ticker growth factors
    /// at each date. First value is 1.0 by construction.
    pub fn equal_weight_roi(&self) -> Vec<f64> {
        let normalized = self.normalized();
        let n = self.holdings() as f64;
        (0..self.len())
            .map(|t| normalized.iter().map(|col| col[t]).sum::<f64>() / n)
            .collect()
    }
}

/// Daily close series for the reference index.
#[derive(Debug, Clone)]
pub struct BenchmarkSeries {
    pub symbol: String,
    pub dates: Vec<NaiveDate>,
    pub closes: Vec<f64>,
}

impl BenchmarkSeries {
    pub fn new(symbol: String, dates: Vec<NaiveDate>, closes: Vec<f64>) -> Self {
        debug_assert!(dates.windows(2).all(|w| w[0] < w[1]));
        debug_assert_eq!(dates.len(), closes.len());
        Self {
            symbol,
            dates,
            closes,
        }
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Restrict to `[first, last]` (both inclusive); used to re-align the
    /// benchmark to the realized range of a cleaned portfolio slice.
    pub fn slice_range(&self, first: NaiveDate, last: NaiveDate) -> BenchmarkSeries {
        let lo = self.dates.partition_point(|&d| d < first);
        let hi = self.dates.partition_point(|&d| d <= last);
        BenchmarkSeries {
            symbol: self.symbol.clone(),
            dates: self.dates[lo..hi].to_vec(),
            closes: self.closes[lo..hi].to_vec(),
        }
    }

    /// Ending close over starting close; `None` when the series is empty or
    /// starts at zero.
    pub fn roi(&self) -> Option<f64> {
        let first = *self.closes.first()?;
        let last = *self.closes.last()?;
        if first == 0.0 { None } else { Some(last / first) }
    }
}

/// Immutable per-process price data: benchmark plus the full ticker table.
#[derive(Debug, Clone)]
pub struct MarketData {
    pub benchmark: BenchmarkSeries,
    pub prices: PriceTable,
}
