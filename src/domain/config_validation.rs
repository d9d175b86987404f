//! Typed validation of the INI configuration.
//!
//! The config port hands back loosely-typed values; this module checks
//! presence and ranges once, up front, and returns typed structs so the
//! rest of the program never touches raw config strings.

use crate::domain::error::RotorError;
use crate::domain::returns::DEFAULT_REBALANCE_PERIOD;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

/// Validated `[data]` section.
#[derive(Debug, Clone)]
pub struct DataConfig {
    pub benchmark_csv: String,
    pub prices_csv: String,
    pub benchmark_symbol: String,
    /// Earliest date fetched on refresh.
    pub history_start: NaiveDate,
}

/// Validated `[backtest]` section (all keys optional, defaults below).
#[derive(Debug, Clone)]
pub struct BacktestDefaults {
    pub rebalance_period: usize,
    pub cost_rate: f64,
    pub loss_rate: f64,
    pub restart_quarters: u32,
}

const DEFAULT_BENCHMARK_SYMBOL: &str = "SPY";
const DEFAULT_HISTORY_START: &str = "1999-01-01";
const DEFAULT_COST_RATE: f64 = 0.007;
const DEFAULT_LOSS_RATE: f64 = 0.1;
const DEFAULT_RESTART_QUARTERS: u32 = 2;

fn require_string(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<String, RotorError> {
    config
        .get_string(section, key)
        .ok_or_else(|| RotorError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        })
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<DataConfig, RotorError> {
    let benchmark_csv = require_string(config, "data", "benchmark_csv")?;
    let prices_csv = require_string(config, "data", "prices_csv")?;
    let benchmark_symbol = config
        .get_string("data", "benchmark_symbol")
        .unwrap_or_else(|| DEFAULT_BENCHMARK_SYMBOL.to_string());

    let history_start_raw = config
        .get_string("data", "history_start")
        .unwrap_or_else(|| DEFAULT_HISTORY_START.to_string());
    let history_start = NaiveDate::parse_from_str(&history_start_raw, "%Y-%m-%d").map_err(|e| {
        RotorError::ConfigInvalid {
            section: "data".to_string(),
            key: "history_start".to_string(),
            reason: format!("expected YYYY-MM-DD, got {history_start_raw:?}: {e}"),
        }
    })?;

    Ok(DataConfig {
        benchmark_csv,
        prices_csv,
        benchmark_symbol,
        history_start,
    })
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<BacktestDefaults, RotorError> {
    let rebalance_period = config.get_int(
        "backtest",
        "rebalance_period",
        DEFAULT_REBALANCE_PERIOD as i64,
    );
    if rebalance_period < 1 {
        return Err(RotorError::ConfigInvalid {
            section: "backtest".to_string(),
            key: "rebalance_period".to_string(),
            reason: format!("must be at least 1, got {rebalance_period}"),
        });
    }

    let cost_rate = config.get_double("backtest", "cost_rate", DEFAULT_COST_RATE);
    if !(0.0..1.0).contains(&cost_rate) {
        return Err(RotorError::ConfigInvalid {
            section: "backtest".to_string(),
            key: "cost_rate".to_string(),
            reason: format!("must be in [0, 1), got {cost_rate}"),
        });
    }

    let loss_rate = config.get_double("backtest", "loss_rate", DEFAULT_LOSS_RATE);
    if !(0.0..1.0).contains(&loss_rate) {
        return Err(RotorError::ConfigInvalid {
            section: "backtest".to_string(),
            key: "loss_rate".to_string(),
            reason: format!("must be in [0, 1), got {loss_rate}"),
        });
    }

    let restart_quarters = config.get_int(
        "backtest",
        "restart_quarters",
        DEFAULT_RESTART_QUARTERS as i64,
    );
    if restart_quarters < 0 {
        return Err(RotorError::ConfigInvalid {
            section: "backtest".to_string(),
            key: "restart_quarters".to_string(),
            reason: format!("must be non-negative, got {restart_quarters}"),
        });
    }

    Ok(BacktestDefaults {
        rebalance_period: rebalance_period as usize,
        cost_rate,
        loss_rate,
        restart_quarters: restart_quarters as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn adapter(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    #[test]
    fn data_config_requires_csv_paths() {
        let config = adapter("[data]\nprices_csv = ./prices.csv\n");
        let result = validate_data_config(&config);
        assert!(matches!(
            result,
            Err(RotorError::ConfigMissing { section, key })
                if section == "data" && key == "benchmark_csv"
        ));
    }

    #[test]
    fn data_config_applies_defaults() {
        let config = adapter(
            "[data]\nbenchmark_csv = ./spy.csv\nprices_csv = ./prices.csv\n",
        );
        let data = validate_data_config(&config).unwrap();
        assert_eq!(data.benchmark_symbol, "SPY");
        assert_eq!(
            data.history_start,
            NaiveDate::from_ymd_opt(1999, 1, 1).unwrap()
        );
    }

    #[test]
    fn data_config_rejects_bad_date() {
        let config = adapter(
            "[data]\nbenchmark_csv = a\nprices_csv = b\nhistory_start = 1999/01/01\n",
        );
        let result = validate_data_config(&config);
        assert!(matches!(
            result,
            Err(RotorError::ConfigInvalid { key, .. }) if key == "history_start"
        ));
    }

    #[test]
    fn backtest_defaults_when_section_absent() {
        let config = adapter("[data]\n");
        let defaults = validate_backtest_config(&config).unwrap();
        assert_eq!(defaults.rebalance_period, 252);
        assert_eq!(defaults.cost_rate, 0.007);
        assert_eq!(defaults.loss_rate, 0.1);
        assert_eq!(defaults.restart_quarters, 2);
    }

    #[test]
    fn backtest_rejects_out_of_range_rates() {
        let config = adapter("[backtest]\ncost_rate = 1.5\n");
        assert!(matches!(
            validate_backtest_config(&config),
            Err(RotorError::ConfigInvalid { key, .. }) if key == "cost_rate"
        ));

        let config = adapter("[backtest]\nloss_rate = -0.1\n");
        assert!(matches!(
            validate_backtest_config(&config),
            Err(RotorError::ConfigInvalid { key, .. }) if key == "loss_rate"
        ));
    }

    #[test]
    fn backtest_rejects_zero_rebalance_period() {
        let config = adapter("[backtest]\nrebalance_period = 0\n");
        assert!(matches!(
            validate_backtest_config(&config),
            Err(RotorError::ConfigInvalid { key, .. }) if key == "rebalance_period"
        ));
    }
}
