//! Backtest engine — the top-level day-loop driver.
//!
//! Per trading day the driver runs LOAD -> RESET -> STEP* and ends the day
//! on a risk halt, the job-end index, or timestamp exhaustion, then
//! aggregates. Multi-symbol mode runs the same per-symbol state machine
//! with symbol-scoped managers and layers cross-symbol risk and velocity
//! correlation on top.

mod aggregate;
mod context;
mod correlation;

pub use aggregate::max_drawdown;
pub use correlation::CorrelationTracker;

use chrono::NaiveDate;
use thiserror::Error;

use crate::data::DataSource;
use crate::domain::{BacktestResults, DailyResults, ExitReason, Trade, TradingDayData};
use crate::dynamic::RegimeAdjustmentTable;
use crate::position_manager::ExitHeuristics;
use crate::strategy::StrategyFactory;

use context::SymbolContext;

/// Errors from the engine. Missing days and symbols are skipped with a
/// warning, not errors; only structural misuse surfaces here.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no symbols supplied to multi-symbol backtest")]
    NoSymbols,
    #[error("start date {start} is after end date {end}")]
    InvertedDateRange { start: NaiveDate, end: NaiveDate },
}

/// Engine configuration. Everything that used to be process-wide state is
/// injected here.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Daily loss ceiling per symbol, as a positive magnitude.
    pub daily_max_loss: f64,
    /// Combined open-P&L floor across symbols before a full unwind.
    pub cross_symbol_risk_limit: f64,
    /// Run the dynamic setup manager and apply regime adjustments.
    pub enable_dynamic_management: bool,
    /// Rolling window length for the regime detector.
    pub regime_lookback: usize,
    /// Rolling window length for cross-symbol velocity correlation.
    pub correlation_window: usize,
    pub exit_heuristics: ExitHeuristics,
    pub regime_adjustments: RegimeAdjustmentTable,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            daily_max_loss: 1000.0,
            cross_symbol_risk_limit: 2000.0,
            enable_dynamic_management: false,
            regime_lookback: crate::regime::MarketRegimeDetector::DEFAULT_LOOKBACK,
            correlation_window: CorrelationTracker::DEFAULT_WINDOW,
            exit_heuristics: ExitHeuristics::default(),
            regime_adjustments: RegimeAdjustmentTable::default(),
        }
    }
}

impl EngineConfig {
    pub fn new(daily_max_loss: f64) -> Self {
        Self {
            daily_max_loss,
            ..Self::default()
        }
    }

    pub fn with_dynamic_management(mut self, enabled: bool) -> Self {
        self.enable_dynamic_management = enabled;
        self
    }

    pub fn with_cross_symbol_risk_limit(mut self, limit: f64) -> Self {
        self.cross_symbol_risk_limit = limit;
        self
    }
}

pub struct BacktestEngine {
    loader: Box<dyn DataSource>,
    factory: Box<dyn StrategyFactory>,
    config: EngineConfig,
}

impl BacktestEngine {
    pub fn new(
        loader: Box<dyn DataSource>,
        factory: Box<dyn StrategyFactory>,
        config: EngineConfig,
    ) -> Self {
        Self {
            loader,
            factory,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run a single-symbol backtest over all available dates in the range.
    ///
    /// Days that fail to load are skipped. A symbol with no data at all
    /// yields structurally complete, empty results.
    pub fn run_backtest(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BacktestResults, EngineError> {
        if start > end {
            return Err(EngineError::InvertedDateRange { start, end });
        }

        let dates: Vec<NaiveDate> = self
            .loader
            .available_dates(symbol)
            .into_iter()
            .filter(|d| (start..=end).contains(d))
            .collect();
        tracing::info!(symbol, days = dates.len(), %start, %end, "starting backtest");

        let mut ctx = SymbolContext::new(symbol, self.factory.build(), &self.config);
        let mut all_trades: Vec<Trade> = Vec::new();
        let mut daily_results: Vec<DailyResults> = Vec::new();

        for date in dates {
            let Some(day) = self.loader.load_trading_day(symbol, date) else {
                tracing::warn!(symbol, %date, "no data for trading day, skipping");
                continue;
            };
            let day_trades = self.process_single_day(&mut ctx, &day, date);
            daily_results.push(aggregate::daily_results(date, &day_trades, &ctx));
            all_trades.extend(day_trades);
        }

        Ok(aggregate::build_results(
            all_trades,
            daily_results,
            ctx.dynamic.as_ref().map(|d| d.adjustment_stats()),
            None,
        ))
    }

    /// Run the per-symbol state machine for every symbol, step-synchronized
    /// per timestamp, with cross-symbol risk and correlation on top.
    pub fn run_multi_symbol_backtest(
        &self,
        symbols: &[&str],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BacktestResults, EngineError> {
        if symbols.is_empty() {
            return Err(EngineError::NoSymbols);
        }
        if start > end {
            return Err(EngineError::InvertedDateRange { start, end });
        }

        // Union of all symbols' dates in range; a symbol without data for a
        // date sits that day out.
        let mut dates: Vec<NaiveDate> = Vec::new();
        for &symbol in symbols {
            for date in self.loader.available_dates(symbol) {
                if (start..=end).contains(&date) && !dates.contains(&date) {
                    dates.push(date);
                }
            }
        }
        dates.sort();
        tracing::info!(symbols = symbols.len(), days = dates.len(), "starting multi-symbol backtest");

        let mut contexts: Vec<SymbolContext> = symbols
            .iter()
            .map(|&s| SymbolContext::new(s, self.factory.build(), &self.config))
            .collect();
        let mut tracker = CorrelationTracker::new(self.config.correlation_window);
        let mut all_trades: Vec<Trade> = Vec::new();
        let mut daily_results: Vec<DailyResults> = Vec::new();

        for date in dates {
            let requests: Vec<(String, NaiveDate)> = symbols
                .iter()
                .map(|s| (s.to_string(), date))
                .collect();
            let days: Vec<Option<TradingDayData>> = self.loader.load_many(&requests);

            let day_trades = self.process_multi_day(&mut contexts, &days, date, &mut tracker);
            daily_results.push(aggregate::daily_results_multi(date, &day_trades, &contexts));
            all_trades.extend(day_trades);
        }

        let per_symbol_stats: Vec<_> = contexts
            .iter()
            .filter_map(|c| c.dynamic.as_ref().map(|d| d.adjustment_stats()))
            .collect();
        Ok(aggregate::build_results(
            all_trades,
            daily_results,
            aggregate::merge_adjustment_stats(per_symbol_stats),
            Some(&tracker),
        ))
    }

    fn process_single_day(
        &self,
        ctx: &mut SymbolContext,
        day: &TradingDayData,
        date: NaiveDate,
    ) -> Vec<Trade> {
        ctx.reset_for_day();
        let mut day_trades = Vec::new();

        for ts in day.tradable_timestamps() {
            if ctx.halted {
                break;
            }
            day_trades.extend(ctx.step(day, ts, date));
        }

        tracing::info!(
            symbol = %ctx.symbol,
            %date,
            trades = day_trades.len(),
            pnl = day_trades.iter().map(|t| t.pnl).sum::<f64>(),
            "day complete"
        );
        day_trades
    }

    fn process_multi_day(
        &self,
        contexts: &mut [SymbolContext],
        days: &[Option<TradingDayData>],
        date: NaiveDate,
        tracker: &mut CorrelationTracker,
    ) -> Vec<Trade> {
        for (ctx, day) in contexts.iter_mut().zip(days) {
            ctx.reset_for_day();
            // Symbols without data for this date are halted immediately.
            ctx.halted = day.is_none();
            if day.is_none() {
                tracing::warn!(symbol = %ctx.symbol, %date, "no data for trading day, symbol sits out");
            }
        }

        // Step-synchronize over the union of every symbol's timestamps.
        let mut timestamps: Vec<i64> = Vec::new();
        for day in days.iter().flatten() {
            for ts in day.tradable_timestamps() {
                if !timestamps.contains(&ts) {
                    timestamps.push(ts);
                }
            }
        }
        timestamps.sort_unstable();

        let mut day_trades = Vec::new();
        for &ts in &timestamps {
            let mut any_active = false;

            // Per-symbol steps first; cross-symbol logic reads their state
            // afterwards, never concurrently.
            for (ctx, day) in contexts.iter_mut().zip(days) {
                let Some(day) = day else { continue };
                if ctx.halted || !day.spot.contains_key(&ts) || !day.options.contains_key(&ts) {
                    continue;
                }
                day_trades.extend(ctx.step(day, ts, date));
                tracker.push(&ctx.symbol, ctx.detector.price_velocity());
                any_active = true;
            }

            if !any_active {
                continue;
            }

            // Cross-symbol kill switch on combined open P&L.
            let combined: f64 = contexts.iter().map(|c| c.open_pnl()).sum();
            if combined <= -self.config.cross_symbol_risk_limit {
                tracing::warn!(
                    combined,
                    limit = self.config.cross_symbol_risk_limit,
                    ts,
                    "cross-symbol risk limit breached, unwinding all symbols"
                );
                for (ctx, day) in contexts.iter_mut().zip(days) {
                    day_trades.extend(ctx.unwind_all(
                        day.as_ref(),
                        ts,
                        ExitReason::CrossSymbolLimit,
                        date,
                    ));
                    ctx.halted = true;
                }
                break;
            }

            if contexts.iter().all(|c| c.halted) {
                break;
            }
        }

        day_trades
    }
}
