//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::csv_price_adapter::CsvPriceAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::yahoo_adapter::YahooAdapter;
use crate::domain::backtest;
use crate::domain::config_validation::{
    BacktestDefaults, validate_backtest_config, validate_data_config,
};
use crate::domain::error::RotorError;
use crate::domain::momentum::rank_momentum;
use crate::domain::prices::MarketData;
use crate::domain::rotation::{self, StrategyLedger};
use crate::ports::price_port::PricePort;
use rand::SeedableRng;
use rand::rngs::StdRng;

#[derive(Parser, Debug)]
#[command(name = "rotor", about = "Equity return and rotation-strategy backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Backtest a fixed portfolio against the benchmark
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Hyphen-separated tickers, e.g. APD-CCI-CPRT
        #[arg(long)]
        tickers: String,
        #[arg(long)]
        start_year: i32,
        #[arg(long, default_value_t = 1)]
        years: i32,
        /// Overrides [backtest] rebalance_period
        #[arg(long)]
        rebalance_period: Option<usize>,
    },
    /// List the eligible ticker universe for a window
    Tickers {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        start_year: i32,
        #[arg(long, default_value_t = 1)]
        years: i32,
    },
    /// Draw a random eligible portfolio
    Random {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        start_year: i32,
        #[arg(long, default_value_t = 1)]
        years: i32,
        #[arg(long, default_value_t = 10)]
        count: usize,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Run random-portfolio trials and report medians
    Trials {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        start_year: i32,
        #[arg(long, default_value_t = 1)]
        years: i32,
        #[arg(long, default_value_t = 10)]
        size: usize,
        #[arg(long, default_value_t = 100)]
        trials: usize,
        #[arg(long)]
        rebalance_period: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Rank the universe by momentum over a lookback window
    Rank {
        #[arg(short, long)]
        config: PathBuf,
        /// Ranking date, YYYY-MM-DD
        #[arg(long)]
        as_of: NaiveDate,
        #[arg(long, default_value_t = 1)]
        lookback_years: u32,
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Simulate the quarterly momentum rotation
    Rotate {
        #[arg(short, long)]
        config: PathBuf,
        /// First quarter start, YYYY-MM-DD
        #[arg(long)]
        start: NaiveDate,
        #[arg(long, default_value_t = 8)]
        quarters: u32,
        /// Overrides [backtest] cost_rate
        #[arg(long)]
        cost_rate: Option<f64>,
    },
    /// Simulate the rotation with the stop-loss/restart rule
    RotateStop {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long, default_value_t = 8)]
        quarters: u32,
        #[arg(long)]
        cost_rate: Option<f64>,
        #[arg(long)]
        loss_rate: Option<f64>,
        #[arg(long)]
        restart_quarters: Option<u32>,
    },
    /// Run the stop-loss rotation once per starting year
    Sweep {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        from_year: i32,
        #[arg(long)]
        to_year: i32,
        #[arg(long, default_value_t = 8)]
        quarters: u32,
        #[arg(long)]
        cost_rate: Option<f64>,
        #[arg(long)]
        loss_rate: Option<f64>,
        #[arg(long)]
        restart_quarters: Option<u32>,
    },
    /// Re-fetch the price cache from the remote source
    Refresh {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            tickers,
            start_year,
            years,
            rebalance_period,
        } => run_backtest(&config, &tickers, start_year, years, rebalance_period),
        Command::Tickers {
            config,
            start_year,
            years,
        } => run_tickers(&config, start_year, years),
        Command::Random {
            config,
            start_year,
            years,
            count,
            seed,
        } => run_random(&config, start_year, years, count, seed),
        Command::Trials {
            config,
            start_year,
            years,
            size,
            trials,
            rebalance_period,
            seed,
        } => run_trials(&config, start_year, years, size, trials, rebalance_period, seed),
        Command::Rank {
            config,
            as_of,
            lookback_years,
            top,
        } => run_rank(&config, as_of, lookback_years, top),
        Command::Rotate {
            config,
            start,
            quarters,
            cost_rate,
        } => run_rotate(&config, start, quarters, cost_rate),
        Command::RotateStop {
            config,
            start,
            quarters,
            cost_rate,
            loss_rate,
            restart_quarters,
        } => run_rotate_stop(&config, start, quarters, cost_rate, loss_rate, restart_quarters),
        Command::Sweep {
            config,
            from_year,
            to_year,
            quarters,
            cost_rate,
            loss_rate,
            restart_quarters,
        } => run_sweep(
            &config,
            from_year,
            to_year,
            quarters,
            cost_rate,
            loss_rate,
            restart_quarters,
        ),
        Command::Refresh { config } => run_refresh(&config),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = RotorError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

/// Load config, validate both sections and read the price cache.
fn load_market(config_path: &PathBuf) -> Result<(MarketData, BacktestDefaults), ExitCode> {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = load_config(config_path)?;

    let data_config = validate_data_config(&adapter).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })?;
    let defaults = validate_backtest_config(&adapter).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })?;

    eprintln!("Loading prices from {}", data_config.prices_csv);
    let fetcher = YahooAdapter::new().map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })?;
    let store = CsvPriceAdapter::new(&data_config, fetcher);
    let market = store.load().map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })?;

    eprintln!(
        "Loaded {} tickers over {} trading days, benchmark {}",
        market.prices.tickers().len(),
        market.prices.row_count(),
        market.benchmark.symbol,
    );
    Ok((market, defaults))
}

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

const MIN_YEAR: i32 = 1900;
const MAX_YEAR: i32 = 2200;

/// Reject year windows that calendar arithmetic cannot represent before
/// they reach date construction.
fn check_year_range(start_year: i32, years: i32) -> Result<(), ExitCode> {
    let end_year = start_year.saturating_add(years);
    if years < 1 || !(MIN_YEAR..=MAX_YEAR).contains(&start_year) || end_year > MAX_YEAR {
        eprintln!(
            "error: year window {start_year}+{years}y is outside {MIN_YEAR}..={MAX_YEAR}"
        );
        return Err(ExitCode::from(2));
    }
    Ok(())
}

fn run_backtest(
    config_path: &PathBuf,
    tickers: &str,
    start_year: i32,
    years: i32,
    rebalance_period: Option<usize>,
) -> ExitCode {
    if let Err(code) = check_year_range(start_year, years) {
        return code;
    }
    let (market, defaults) = match load_market(config_path) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };
    let period = rebalance_period.unwrap_or(defaults.rebalance_period);

    eprintln!("Backtesting {tickers} over {start_year}+{years}y, rebalance every {period} days");
    let (frame, slice, _) =
        match backtest::portfolio_backtest(&market, tickers, start_year, years, period) {
            Ok(result) => result,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };

    println!("date,{},roi,rebalanced", market.benchmark.symbol);
    for row in &frame.rows {
        println!(
            "{},{:.6},{:.6},{:.6}",
            row.date, row.benchmark, row.roi, row.rebalanced
        );
    }

    // The frame is non-empty whenever compute_portfolio succeeds.
    if let Some(last) = frame.last() {
        eprintln!("\n=== Final Values ===");
        eprintln!("Portfolio:  {} tickers over {} dates", slice.holdings(), slice.len());
        eprintln!("Benchmark:  {:.4}", last.benchmark);
        eprintln!("ROI:        {:.4}", last.roi);
        eprintln!("Rebalanced: {:.4}", last.rebalanced);
    }
    ExitCode::SUCCESS
}

fn run_tickers(config_path: &PathBuf, start_year: i32, years: i32) -> ExitCode {
    if let Err(code) = check_year_range(start_year, years) {
        return code;
    }
    let (market, _) = match load_market(config_path) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };

    let spec = backtest::eligible_ticker_string(&market, start_year, years);
    if spec.is_empty() {
        eprintln!("No eligible tickers for {start_year}+{years}y");
    } else {
        println!("{spec}");
        eprintln!("{} eligible tickers", spec.split('-').count());
    }
    ExitCode::SUCCESS
}

fn run_random(
    config_path: &PathBuf,
    start_year: i32,
    years: i32,
    count: usize,
    seed: Option<u64>,
) -> ExitCode {
    if let Err(code) = check_year_range(start_year, years) {
        return code;
    }
    let (market, _) = match load_market(config_path) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };

    let mut rng = make_rng(seed);
    match backtest::random_ticker_string(&market, start_year, years, count, &mut rng) {
        Ok(spec) => {
            println!("{spec}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn run_trials(
    config_path: &PathBuf,
    start_year: i32,
    years: i32,
    size: usize,
    trials: usize,
    rebalance_period: Option<usize>,
    seed: Option<u64>,
) -> ExitCode {
    if let Err(code) = check_year_range(start_year, years) {
        return code;
    }
    let (market, defaults) = match load_market(config_path) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };
    let period = rebalance_period.unwrap_or(defaults.rebalance_period);

    eprintln!("Running {trials} trials of {size} tickers over {start_year}+{years}y");
    let mut rng = make_rng(seed);
    let (results, summary) = match backtest::run_trials(
        &market, start_year, years, size, trials, period, &mut rng,
    ) {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    println!("tickers,roi,rebalanced,benchmark");
    for trial in &results {
        println!(
            "{},{:.6},{:.6},{:.6}",
            trial.tickers.join("-"),
            trial.final_roi,
            trial.final_rebalanced,
            trial.final_benchmark
        );
    }

    eprintln!("\n=== Medians over {} trials ===", results.len());
    eprintln!("ROI:        {:.4}", summary.median_roi);
    eprintln!("Rebalanced: {:.4}", summary.median_rebalanced);
    eprintln!("Benchmark:  {:.4}", summary.median_benchmark);
    ExitCode::SUCCESS
}

fn run_rank(
    config_path: &PathBuf,
    as_of: NaiveDate,
    lookback_years: u32,
    top: usize,
) -> ExitCode {
    if lookback_years == 0 || lookback_years > 100 {
        eprintln!("error: lookback of {lookback_years} years is outside 1..=100");
        return ExitCode::from(2);
    }
    let (market, _) = match load_market(config_path) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };

    eprintln!("Ranking momentum as of {as_of}, {lookback_years}y lookback");
    let scores = rank_momentum(&market, as_of, lookback_years, top);
    if scores.is_empty() {
        eprintln!("No ticker beat the benchmark over the lookback window");
        return ExitCode::SUCCESS;
    }

    println!("ticker,roi,alfa");
    for score in &scores {
        println!("{},{:.6},{:.6}", score.ticker, score.roi, score.alfa);
    }
    ExitCode::SUCCESS
}

fn print_ledger(ledger: &StrategyLedger, with_stop: bool) {
    if with_stop {
        println!("date,holdings,roi,benchmark_roi,cost,cumulative,benchmark,stopped");
    } else {
        println!("date,holdings,roi,benchmark_roi,cost,cumulative,benchmark");
    }
    for record in ledger {
        let holdings: Vec<&str> = record.holdings.iter().map(String::as_str).collect();
        let mut line = format!(
            "{},{},{:.6},{:.6},{:.6},{:.6},{:.6}",
            record.date,
            holdings.join("-"),
            record.roi,
            record.benchmark_roi,
            record.cost,
            record.cumulative_roi,
            record.cumulative_benchmark,
        );
        if with_stop {
            line.push(',');
            line.push_str(if record.stopped { "true" } else { "false" });
        }
        println!("{line}");
    }
}

fn summarize_ledger(ledger: &StrategyLedger) {
    // run_rotation always returns at least the opening record.
    if let Some(last) = ledger.last() {
        eprintln!("\n=== After {} quarters ===", ledger.len() - 1);
        eprintln!("Strategy:  {:.4}", last.cumulative_roi);
        eprintln!("Benchmark: {:.4}", last.cumulative_benchmark);
    }
}

fn run_rotate(
    config_path: &PathBuf,
    start: NaiveDate,
    quarters: u32,
    cost_rate: Option<f64>,
) -> ExitCode {
    let (market, defaults) = match load_market(config_path) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };
    let cost_rate = cost_rate.unwrap_or(defaults.cost_rate);

    eprintln!("Rotating quarterly from {start} for {quarters} quarters, cost {cost_rate}");
    match backtest::quarterly_rotation(&market, start, quarters, cost_rate) {
        Ok(ledger) => {
            print_ledger(&ledger, false);
            summarize_ledger(&ledger);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn run_rotate_stop(
    config_path: &PathBuf,
    start: NaiveDate,
    quarters: u32,
    cost_rate: Option<f64>,
    loss_rate: Option<f64>,
    restart_quarters: Option<u32>,
) -> ExitCode {
    let (market, defaults) = match load_market(config_path) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };
    let cost_rate = cost_rate.unwrap_or(defaults.cost_rate);
    let loss_rate = loss_rate.unwrap_or(defaults.loss_rate);
    let restart_quarters = restart_quarters.unwrap_or(defaults.restart_quarters);

    eprintln!(
        "Rotating from {start} for {quarters} quarters, cost {cost_rate}, \
         stop below {:.1}% drawdown, restart after {restart_quarters} positive quarters",
        loss_rate * 100.0
    );
    match backtest::quarterly_rotation_with_stop(
        &market,
        start,
        quarters,
        cost_rate,
        loss_rate,
        restart_quarters,
    ) {
        Ok(ledger) => {
            print_ledger(&ledger, true);
            summarize_ledger(&ledger);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn run_sweep(
    config_path: &PathBuf,
    from_year: i32,
    to_year: i32,
    quarters: u32,
    cost_rate: Option<f64>,
    loss_rate: Option<f64>,
    restart_quarters: Option<u32>,
) -> ExitCode {
    if from_year > to_year {
        eprintln!("error: from_year {from_year} is after to_year {to_year}");
        return ExitCode::from(2);
    }
    if let Err(code) = check_year_range(from_year, 1).and(check_year_range(to_year, 1)) {
        return code;
    }
    let (market, defaults) = match load_market(config_path) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };
    let cost_rate = cost_rate.unwrap_or(defaults.cost_rate);
    let loss_rate = loss_rate.unwrap_or(defaults.loss_rate);
    let restart_quarters = restart_quarters.unwrap_or(defaults.restart_quarters);

    eprintln!("Sweeping starting years {from_year}..={to_year}, {quarters} quarters each");
    match rotation::sweep_rotation(
        &market,
        from_year,
        to_year,
        quarters,
        cost_rate,
        loss_rate,
        restart_quarters,
    ) {
        Ok(rows) => {
            println!("start_year,strategy,benchmark");
            for row in &rows {
                println!(
                    "{},{:.6},{:.6}",
                    row.start_year, row.final_roi, row.final_benchmark
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn run_refresh(config_path: &PathBuf) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let data_config = match validate_data_config(&adapter) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let fetcher = match YahooAdapter::new() {
        Ok(f) => f,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let store = CsvPriceAdapter::new(&data_config, fetcher);

    eprintln!("Refreshing price cache from {}", data_config.history_start);
    match store.refresh() {
        Ok(market) => {
            eprintln!(
                "Fetched {} tickers over {} trading days, benchmark {} ({} days)",
                market.prices.tickers().len(),
                market.prices.row_count(),
                market.benchmark.symbol,
                market.benchmark.len(),
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}
