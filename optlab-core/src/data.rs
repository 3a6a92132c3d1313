//! Data source contract — the engine's only view of historical storage.
//!
//! Concrete loaders (CSV trees, synthetic generators) live outside the core.
//! A day that cannot be loaded is reported as `None` and skipped by the
//! engine; it is never fatal to a run.

use chrono::NaiveDate;

use crate::domain::TradingDayData;

pub trait DataSource: Send + Sync {
    /// Trading dates with data on disk for a symbol, sorted ascending.
    fn available_dates(&self, symbol: &str) -> Vec<NaiveDate>;

    /// Load one symbol-day. `None` when the day is missing or unreadable.
    fn load_trading_day(&self, symbol: &str, date: NaiveDate) -> Option<TradingDayData>;

    /// Load a batch of symbol-days with per-item semantics identical to
    /// [`DataSource::load_trading_day`], in request order.
    ///
    /// The default walks the requests sequentially; I/O-bound
    /// implementations may fan out over a bounded worker pool. Results are
    /// joined into a plain vector before any simulation state is touched.
    fn load_many(&self, requests: &[(String, NaiveDate)]) -> Vec<Option<TradingDayData>> {
        requests
            .iter()
            .map(|(symbol, date)| self.load_trading_day(symbol, *date))
            .collect()
    }
}
