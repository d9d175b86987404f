//! CSV-backed price store.
//!
//! Two files: a wide close-price table (`Date` column plus one column per
//! ticker, empty cells for missing observations) and a two-column benchmark
//! series. `load` prefers the cached files; `refresh` re-fetches every
//! symbol through the fetch port and overwrites both.

use crate::domain::config_validation::DataConfig;
use crate::domain::error::RotorError;
use crate::domain::prices::{BenchmarkSeries, MarketData, PriceTable};
use crate::ports::fetch_port::FetchPort;
use crate::ports::price_port::PricePort;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Symbols dropped on refresh; the remote source serves these under the
/// dash spellings listed in `EXTRA_SYMBOLS`.
const EXCLUDED_SYMBOLS: &[&str] = &["BRK.B", "BF.B"];
const EXTRA_SYMBOLS: &[&str] = &["BRK-B", "BF-B"];

pub struct CsvPriceAdapter<F: FetchPort> {
    benchmark_csv: PathBuf,
    prices_csv: PathBuf,
    benchmark_symbol: String,
    history_start: NaiveDate,
    fetcher: F,
}

impl<F: FetchPort> CsvPriceAdapter<F> {
    pub fn new(config: &DataConfig, fetcher: F) -> Self {
        Self {
            benchmark_csv: PathBuf::from(&config.benchmark_csv),
            prices_csv: PathBuf::from(&config.prices_csv),
            benchmark_symbol: config.benchmark_symbol.clone(),
            history_start: config.history_start,
            fetcher,
        }
    }

    fn csv_error(path: &Path, err: impl std::fmt::Display) -> RotorError {
        RotorError::DataUnavailable {
            reason: format!("{}: {err}", path.display()),
        }
    }

    fn parse_date(path: &Path, raw: &str) -> Result<NaiveDate, RotorError> {
        NaiveDate::parse_from_str(raw, DATE_FORMAT)
            .map_err(|e| Self::csv_error(path, format!("bad date {raw:?}: {e}")))
    }

    fn read_benchmark(&self) -> Result<BenchmarkSeries, RotorError> {
        let path = &self.benchmark_csv;
        let mut reader =
            csv::Reader::from_path(path).map_err(|e| Self::csv_error(path, e))?;
        let mut rows = BTreeMap::new();
        for record in reader.records() {
            let record = record.map_err(|e| Self::csv_error(path, e))?;
            let date = Self::parse_date(path, record.get(0).unwrap_or(""))?;
            let raw = record.get(1).unwrap_or("");
            let close: f64 = raw
                .parse()
                .map_err(|e| Self::csv_error(path, format!("bad close {raw:?}: {e}")))?;
            rows.insert(date, close);
        }
        let (dates, closes) = rows.into_iter().unzip();
        Ok(BenchmarkSeries::new(
            self.benchmark_symbol.clone(),
            dates,
            closes,
        ))
    }

    fn read_prices(&self) -> Result<PriceTable, RotorError> {
        let path = &self.prices_csv;
        let mut reader =
            csv::Reader::from_path(path).map_err(|e| Self::csv_error(path, e))?;
        let tickers: Vec<String> = reader
            .headers()
            .map_err(|e| Self::csv_error(path, e))?
            .iter()
            .skip(1)
            .map(str::to_string)
            .collect();

        let mut rows: BTreeMap<NaiveDate, Vec<Option<f64>>> = BTreeMap::new();
        for record in reader.records() {
            let record = record.map_err(|e| Self::csv_error(path, e))?;
            let date = Self::parse_date(path, record.get(0).unwrap_or(""))?;
            let mut row = Vec::with_capacity(tickers.len());
            for i in 0..tickers.len() {
                let raw = record.get(i + 1).unwrap_or("");
                if raw.is_empty() {
                    row.push(None);
                } else {
                    let close: f64 = raw.parse().map_err(|e| {
                        Self::csv_error(path, format!("bad close {raw:?}: {e}"))
                    })?;
                    row.push(Some(close));
                }
            }
            rows.insert(date, row);
        }

        let dates: Vec<NaiveDate> = rows.keys().copied().collect();
        let columns = tickers
            .iter()
            .enumerate()
            .map(|(i, ticker)| {
                let col = rows.values().map(|row| row[i]).collect();
                (ticker.clone(), col)
            })
            .collect();
        Ok(PriceTable::new(dates, columns))
    }

    fn write_benchmark(&self, series: &BenchmarkSeries) -> Result<(), RotorError> {
        let path = &self.benchmark_csv;
        let mut writer =
            csv::Writer::from_path(path).map_err(|e| Self::csv_error(path, e))?;
        writer
            .write_record(["Date", &series.symbol])
            .map_err(|e| Self::csv_error(path, e))?;
        for (date, close) in series.dates.iter().zip(&series.closes) {
            writer
                .write_record([date.format(DATE_FORMAT).to_string(), close.to_string()])
                .map_err(|e| Self::csv_error(path, e))?;
        }
        writer.flush()?;
        Ok(())
    }

    fn write_prices(&self, table: &PriceTable) -> Result<(), RotorError> {
        let path = &self.prices_csv;
        let mut writer =
            csv::Writer::from_path(path).map_err(|e| Self::csv_error(path, e))?;
        let mut header = vec!["Date".to_string()];
        header.extend(table.tickers());
        writer
            .write_record(&header)
            .map_err(|e| Self::csv_error(path, e))?;
        for (i, date) in table.dates.iter().enumerate() {
            let mut row = vec![date.format(DATE_FORMAT).to_string()];
            for col in table.columns.values() {
                row.push(col[i].map(|v| v.to_string()).unwrap_or_default());
            }
            writer
                .write_record(&row)
                .map_err(|e| Self::csv_error(path, e))?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Ticker list for a refresh: the cached table's columns, minus the
    /// excluded spellings, plus their replacements.
    fn refresh_symbols(&self) -> Result<Vec<String>, RotorError> {
        if !self.prices_csv.exists() {
            return Err(RotorError::DataUnavailable {
                reason: format!(
                    "{}: no cached price table to take the ticker list from",
                    self.prices_csv.display()
                ),
            });
        }
        let mut symbols: BTreeSet<String> = self
            .read_prices()?
            .tickers()
            .into_iter()
            .filter(|t| !EXCLUDED_SYMBOLS.contains(&t.as_str()))
            .collect();
        symbols.extend(EXTRA_SYMBOLS.iter().map(|s| s.to_string()));
        Ok(symbols.into_iter().collect())
    }

    fn fetch_benchmark(&self, end: NaiveDate) -> Result<BenchmarkSeries, RotorError> {
        let rows = self
            .fetcher
            .fetch_closes(&self.benchmark_symbol, self.history_start, end)?;
        if rows.is_empty() {
            return Err(RotorError::DataUnavailable {
                reason: format!("no close prices returned for {}", self.benchmark_symbol),
            });
        }
        let (dates, closes) = rows.into_iter().collect::<BTreeMap<_, _>>().into_iter().unzip();
        Ok(BenchmarkSeries::new(
            self.benchmark_symbol.clone(),
            dates,
            closes,
        ))
    }

    /// Fetch every symbol and align the results on the union of their
    /// trading dates. Symbols that fail or come back empty are skipped
    /// with a warning rather than failing the whole refresh.
    fn fetch_table(&self, symbols: &[String], end: NaiveDate) -> Result<PriceTable, RotorError> {
        let mut series: BTreeMap<String, BTreeMap<NaiveDate, f64>> = BTreeMap::new();
        for symbol in symbols {
            match self.fetcher.fetch_closes(symbol, self.history_start, end) {
                Ok(rows) if !rows.is_empty() => {
                    series.insert(symbol.clone(), rows.into_iter().collect());
                }
                Ok(_) => eprintln!("warning: no close prices for {symbol}, skipping"),
                Err(e) => eprintln!("warning: fetch failed for {symbol}: {e}"),
            }
        }
        if series.is_empty() {
            return Err(RotorError::DataUnavailable {
                reason: "every symbol fetch failed or returned no data".to_string(),
            });
        }

        let dates: Vec<NaiveDate> = series
            .values()
            .flat_map(|rows| rows.keys().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let columns = series
            .into_iter()
            .map(|(symbol, rows)| {
                let col = dates.iter().map(|d| rows.get(d).copied()).collect();
                (symbol, col)
            })
            .collect();
        Ok(PriceTable::new(dates, columns))
    }

    fn fetch_all(&self) -> Result<MarketData, RotorError> {
        let symbols = self.refresh_symbols()?;
        let end = chrono::Local::now().date_naive();
        let benchmark = self.fetch_benchmark(end)?;
        let prices = self.fetch_table(&symbols, end)?;
        self.write_benchmark(&benchmark)?;
        self.write_prices(&prices)?;
        Ok(MarketData { benchmark, prices })
    }
}

impl<F: FetchPort> PricePort for CsvPriceAdapter<F> {
    fn load(&self) -> Result<MarketData, RotorError> {
        if self.benchmark_csv.exists() && self.prices_csv.exists() {
            let benchmark = self.read_benchmark()?;
            let prices = self.read_prices()?;
            return Ok(MarketData { benchmark, prices });
        }
        self.fetch_all()
    }

    fn refresh(&self) -> Result<MarketData, RotorError> {
        self.fetch_all()
    }
}
