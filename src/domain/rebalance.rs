//! Periodic portfolio rebalancing.
//!
//! Transforms a buy-and-hold equal-weight trajectory into a
//! periodically-rebalanced one: at each checkpoint the portfolio's total
//! value is split evenly across all holdings and cumulation restarts from
//! that split. The reinvestment amount is rounded to six decimals,
//! modeling discrete position sizing; the resulting series is
//! path-dependent.

use crate::domain::prices::PortfolioSlice;

/// Round to 6 decimal digits. The rounding at each rebalance checkpoint is
/// part of the contract, not a display concern.
fn round6(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}

/// Rebalance `slice` every `period_days` trading days.
///
/// Returns the rebalanced portfolio ROI series (starts at 1.0) and the
/// per-ticker cumulative components (each starting at `1/holdings`, so the
/// components sum to the ROI series).
///
/// The checkpoint count is `round(len / period)`, with the first checkpoint
/// at index 0; a window shorter than half a period has no checkpoints and
/// returns the plain equal-weight series.
pub fn rebalance(slice: &PortfolioSlice, period_days: usize) -> (Vec<f64>, Vec<Vec<f64>>) {
    if slice.is_empty() || slice.holdings() == 0 {
        return (Vec::new(), Vec::new());
    }

    let holdings = slice.holdings() as f64;
    let len = slice.len();
    let checkpoints = (len as f64 / period_days as f64).round() as usize;

    // Equal split of 1 unit across holdings, per-ticker growth from day 1.
    let mut components: Vec<Vec<f64>> = slice
        .normalized()
        .into_iter()
        .map(|col| col.into_iter().map(|v| v / holdings).collect())
        .collect();
    let mut total: Vec<f64> = (0..len)
        .map(|t| components.iter().map(|col| col[t]).sum())
        .collect();

    for k in 0..checkpoints {
        let at = k * period_days;
        let reinvest = round6(total[at] / holdings);
        for (col, prices) in components.iter_mut().zip(&slice.closes) {
            let base = prices[at];
            for t in at..len {
                col[t] = reinvest * prices[t] / base;
            }
        }
        for t in at..len {
            total[t] = components.iter().map(|col| col[t]).sum();
        }
    }

    (total, components)
}
