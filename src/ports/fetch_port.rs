//! Remote market-data fetch port trait.

use crate::domain::error::RotorError;
use chrono::NaiveDate;

/// Fetches daily close prices for one symbol from a remote source.
pub trait FetchPort {
    fn fetch_closes(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<(NaiveDate, f64)>, RotorError>;
}
