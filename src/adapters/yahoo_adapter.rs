//! Yahoo Finance fetch adapter.
//!
//! Pulls daily closes from Yahoo's v8 chart API. Yahoo has no official
//! API and changes formats without notice; parse failures surface as
//! `DataUnavailable` and the CSV cache is the fallback.

use crate::domain::error::RotorError;
use crate::ports::fetch_port::FetchPort;
use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    close: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

pub struct YahooAdapter {
    client: reqwest::blocking::Client,
    max_retries: u32,
    base_delay: Duration,
}

impl YahooAdapter {
    pub fn new() -> Result<Self, RotorError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| RotorError::DataUnavailable {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        })
    }

    fn chart_url(symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        // Midnight to end of day keeps both endpoints inside the range.
        let start_ts = start.and_hms_opt(0, 0, 0).unwrap().and_utc().timestamp();
        let end_ts = end.and_hms_opt(23, 59, 59).unwrap().and_utc().timestamp();
        format!(
            "https://query2.finance.yahoo.com/v8/finance/chart/{symbol}\
             ?period1={start_ts}&period2={end_ts}&interval=1d\
             &includeAdjustedClose=true"
        )
    }

    fn format_error(symbol: &str, detail: impl std::fmt::Display) -> RotorError {
        RotorError::DataUnavailable {
            reason: format!("{symbol}: {detail}"),
        }
    }

    /// Extract (date, close) pairs, preferring the split/dividend adjusted
    /// close when Yahoo provides one. Non-trading days come back as null
    /// closes and are dropped.
    fn parse_response(
        symbol: &str,
        resp: ChartResponse,
    ) -> Result<Vec<(NaiveDate, f64)>, RotorError> {
        let result = resp.chart.result.ok_or_else(|| {
            if let Some(err) = resp.chart.error {
                Self::format_error(symbol, format!("{}: {}", err.code, err.description))
            } else {
                Self::format_error(symbol, "empty result with no error")
            }
        })?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| Self::format_error(symbol, "result array is empty"))?;

        let timestamps = data
            .timestamp
            .ok_or_else(|| Self::format_error(symbol, "no timestamps"))?;

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| Self::format_error(symbol, "no quote data"))?;

        let adj_closes = data
            .indicators
            .adjclose
            .and_then(|v| v.into_iter().next())
            .map(|a| a.adjclose);

        let mut closes = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            let date = chrono::DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.naive_utc().date())
                .ok_or_else(|| Self::format_error(symbol, format!("invalid timestamp: {ts}")))?;

            let close = adj_closes
                .as_ref()
                .and_then(|v| v.get(i).copied().flatten())
                .or_else(|| quote.close.get(i).copied().flatten());
            if let Some(close) = close {
                closes.push((date, close));
            }
        }

        Ok(closes)
    }
}

impl FetchPort for YahooAdapter {
    fn fetch_closes(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<(NaiveDate, f64)>, RotorError> {
        let url = Self::chart_url(symbol, start, end);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                std::thread::sleep(self.base_delay * 2u32.pow(attempt - 1));
            }

            match self.client.get(&url).send() {
                Ok(resp) => {
                    let status = resp.status();
                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS
                        || status.is_server_error()
                    {
                        last_error = Some(Self::format_error(symbol, format!("HTTP {status}")));
                        continue;
                    }
                    if !status.is_success() {
                        return Err(Self::format_error(symbol, format!("HTTP {status}")));
                    }

                    let chart: ChartResponse = resp.json().map_err(|e| {
                        Self::format_error(symbol, format!("failed to parse response: {e}"))
                    })?;
                    return Self::parse_response(symbol, chart);
                }
                Err(e) => {
                    if e.is_connect() || e.is_timeout() {
                        last_error = Some(Self::format_error(symbol, e));
                        continue;
                    }
                    return Err(Self::format_error(symbol, e));
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| Self::format_error(symbol, "max retries exceeded")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn response(timestamps: Vec<i64>, close: Vec<Option<f64>>, adj: Option<Vec<Option<f64>>>) -> ChartResponse {
        ChartResponse {
            chart: ChartResult {
                result: Some(vec![ChartData {
                    timestamp: Some(timestamps),
                    indicators: Indicators {
                        quote: vec![QuoteData { close }],
                        adjclose: adj.map(|a| vec![AdjCloseData { adjclose: a }]),
                    },
                }]),
                error: None,
            },
        }
    }

    #[test]
    fn chart_url_embeds_timestamps() {
        let url = YahooAdapter::chart_url("SPY", date(2020, 1, 2), date(2020, 1, 3));
        assert!(url.contains("/v8/finance/chart/SPY"));
        assert!(url.contains("period1=1577923200"));
        assert!(url.contains("interval=1d"));
    }

    #[test]
    fn parse_prefers_adjusted_close() {
        // 2020-01-02 00:00 UTC and the following day.
        let resp = response(
            vec![1577923200, 1578009600],
            vec![Some(100.0), Some(101.0)],
            Some(vec![Some(99.0), None]),
        );
        let closes = YahooAdapter::parse_response("SPY", resp).unwrap();
        assert_eq!(
            closes,
            vec![(date(2020, 1, 2), 99.0), (date(2020, 1, 3), 101.0)]
        );
    }

    #[test]
    fn parse_drops_null_closes() {
        let resp = response(vec![1577923200, 1578009600], vec![Some(100.0), None], None);
        let closes = YahooAdapter::parse_response("SPY", resp).unwrap();
        assert_eq!(closes, vec![(date(2020, 1, 2), 100.0)]);
    }

    #[test]
    fn parse_reports_api_error() {
        let resp = ChartResponse {
            chart: ChartResult {
                result: None,
                error: Some(ChartError {
                    code: "Not Found".to_string(),
                    description: "No data found".to_string(),
                }),
            },
        };
        let err = YahooAdapter::parse_response("NOPE", resp).unwrap_err();
        assert!(err.to_string().contains("Not Found"));
    }
}
