//! Price store port trait.

use crate::domain::error::RotorError;
use crate::domain::prices::MarketData;

/// The price store: benchmark plus the full ticker close-price table.
///
/// `load` prefers the local cache and falls back to a remote fetch;
/// `refresh` always re-fetches and overwrites the cache.
pub trait PricePort {
    fn load(&self) -> Result<MarketData, RotorError>;
    fn refresh(&self) -> Result<MarketData, RotorError>;
}
