//! Per-symbol simulation context — one symbol's managers and strategy set.
//!
//! Each context exclusively owns its position manager, risk manager, regime
//! detector, and (when enabled) dynamic setup manager. Cross-symbol logic
//! only ever reads a context's state after its step completes.

use chrono::NaiveDate;

use crate::domain::{
    ExitReason, MarketSnapshot, OptionChain, Regime, Trade, TradingDayData,
};
use crate::dynamic::DynamicSetupManager;
use crate::position_manager::PositionManager;
use crate::regime::MarketRegimeDetector;
use crate::risk::RiskManager;
use crate::strategy::Strategy;

use super::EngineConfig;

pub(crate) struct SymbolContext {
    pub symbol: String,
    pub strategies: Vec<Box<dyn Strategy>>,
    pub pm: PositionManager,
    pub risk: RiskManager,
    pub detector: MarketRegimeDetector,
    pub dynamic: Option<DynamicSetupManager>,
    /// Day ended early (risk halt or job end) or symbol has no data today.
    pub halted: bool,
    pub forced_closed_at_job_end: usize,
}

impl SymbolContext {
    pub fn new(symbol: &str, strategies: Vec<Box<dyn Strategy>>, config: &EngineConfig) -> Self {
        let dynamic = config.enable_dynamic_management.then(|| {
            let base = strategies.iter().map(|s| s.params().clone()).collect();
            DynamicSetupManager::with_table(base, config.regime_adjustments.clone())
        });
        Self {
            symbol: symbol.to_string(),
            strategies,
            pm: PositionManager::with_heuristics(symbol, config.exit_heuristics),
            risk: RiskManager::new(config.daily_max_loss),
            detector: MarketRegimeDetector::new(config.regime_lookback),
            dynamic,
            halted: false,
            forced_closed_at_job_end: 0,
        }
    }

    /// RESET phase: clear all day-scoped state before the first step.
    pub fn reset_for_day(&mut self) {
        self.pm.reset_positions();
        self.risk.reset_daily_tracking();
        self.detector.reset_daily();
        if let Some(dynamic) = &mut self.dynamic {
            dynamic.reset_daily_adjustments();
        }
        for strategy in &mut self.strategies {
            strategy.reset_daily_state();
        }
        self.halted = false;
        self.forced_closed_at_job_end = 0;
    }

    /// Sum of open positions' current P&L.
    pub fn open_pnl(&self) -> f64 {
        self.pm.get_total_pnl()
    }

    /// STEP phase for one timestamp: regime update, entries, exits,
    /// rebalances, time closures, then the per-symbol risk and job-end
    /// checks. Entries run before exits, so a position opened this tick is
    /// first exit-evaluated on the next tick.
    pub fn step(&mut self, day: &TradingDayData, ts: i64, date: NaiveDate) -> Vec<Trade> {
        let chain = &day.options[&ts];
        let spot = day.spot[&ts];
        let mut snapshot = MarketSnapshot::new(ts, spot, chain);

        self.detector.update_market_data(&mut snapshot);

        if let Some(dynamic) = &mut self.dynamic {
            dynamic.update_market_regime(
                self.detector.current_regime(),
                self.detector.regime_confidence(),
                ts,
            );
            for strategy in &mut self.strategies {
                let setup_id = strategy.params().setup_id.clone();
                if let Some(params) = dynamic.adjusted_params(&setup_id) {
                    strategy.set_params(params.clone());
                }
            }
        }

        let entry_regime = self.detector.current_regime();
        let mut trades = Vec::new();

        // Entries.
        for strategy in &mut self.strategies {
            if self
                .dynamic
                .as_ref()
                .is_some_and(|d| d.is_paused(&strategy.params().setup_id))
            {
                continue;
            }
            if !strategy.check_entry_condition(ts) {
                continue;
            }
            for mut position in strategy.create_positions(&snapshot) {
                position.entry_regime =
                    (entry_regime != Regime::Unknown).then_some(entry_regime);
                let id = self.pm.add_position(position);
                tracing::debug!(symbol = %self.symbol, position = %id, ts, spot, "opened position");
            }
        }

        // Exits, rebalances, time closures, in that fixed order.
        trades.extend(self.pm.update_positions(&snapshot, date));
        trades.extend(
            self.pm
                .update_gamma_scalping_positions(&snapshot, &self.strategies, date),
        );
        trades.extend(
            self.pm
                .check_time_based_closures(ts, &self.strategies, date),
        );

        // Per-symbol kill switches.
        let total_pnl = self.pm.get_total_pnl();
        if self.risk.should_close_all_positions(total_pnl) {
            tracing::warn!(
                symbol = %self.symbol,
                total_pnl,
                ts,
                "daily risk limit breached, closing all positions"
            );
            trades.extend(
                self.pm
                    .close_all_positions(&snapshot, ExitReason::DailyLimit, date),
            );
            self.halted = true;
        } else if ts >= day.job_end_idx {
            let closed = self.pm.force_close_at_job_end(&snapshot, date);
            self.forced_closed_at_job_end = closed.len();
            trades.extend(closed);
            self.halted = true;
        }

        // Dynamic-vs-static attribution for everything closed this step.
        if let Some(dynamic) = &mut self.dynamic {
            for trade in &trades {
                let was_adjusted = dynamic.was_adjusted_today(&trade.setup_id);
                dynamic.track_adjustment_performance(trade, was_adjusted);
            }
        }

        trades
    }

    /// Unwind every open position, pricing against the symbol's chain at
    /// `ts` when data exists, or an empty chain otherwise.
    pub fn unwind_all(
        &mut self,
        day: Option<&TradingDayData>,
        ts: i64,
        reason: ExitReason,
        date: NaiveDate,
    ) -> Vec<Trade> {
        if self.pm.is_empty() {
            return Vec::new();
        }
        let empty = OptionChain::default();
        let (chain, spot) = match day {
            Some(day) => (
                day.options.get(&ts).unwrap_or(&empty),
                day.spot.get(&ts).copied().unwrap_or(0.0),
            ),
            None => (&empty, 0.0),
        };
        let snapshot = MarketSnapshot::new(ts, spot, chain);
        self.pm.close_all_positions(&snapshot, reason, date)
    }
}
