//! Aggregation records over the trade stream — derived, never mutated.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::trade::Trade;

/// One trading day's outcome across all setups (and symbols, in
/// multi-symbol mode).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyResults {
    pub date: NaiveDate,
    pub daily_pnl: f64,
    pub trades_count: usize,
    pub positions_forced_closed_at_job_end: usize,
    pub setup_pnls: BTreeMap<String, f64>,
    pub symbol_pnls: BTreeMap<String, f64>,
}

/// Per-setup performance over the whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupResults {
    pub setup_id: String,
    pub total_pnl: f64,
    pub total_trades: usize,
    pub win_rate: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    /// P&L contribution per symbol for this setup.
    pub symbol_pnls: BTreeMap<String, f64>,
}

/// Per-symbol performance over the whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolResults {
    pub symbol: String,
    pub total_pnl: f64,
    pub total_trades: usize,
    pub win_rate: f64,
    /// Rolling velocity correlation against each other symbol at run end.
    pub correlation_with_other_symbols: BTreeMap<String, f64>,
}

/// Per-regime performance, grouped on the regime active at trade entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeResults {
    pub regime: String,
    pub total_pnl: f64,
    pub total_trades: usize,
    pub win_rate: f64,
}

/// Dynamic-vs-static parameter adjustment attribution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdjustmentStats {
    pub total_adjustments: u32,
    pub static_avg_pnl: f64,
    pub dynamic_avg_pnl: f64,
    /// dynamic average minus static average.
    pub static_vs_dynamic_comparison: f64,
    pub regime_accuracy: f64,
    pub static_trade_count: usize,
    pub dynamic_trade_count: usize,
    /// Running average P&L impact per "(REGIME)_(setup_id)" pair.
    pub adjustment_performance: BTreeMap<String, f64>,
}

/// Complete results of a backtest run. Structurally complete: disabled
/// features produce empty maps, never missing fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResults {
    pub total_pnl: f64,
    pub total_trades: usize,
    pub win_rate: f64,
    /// Largest peak-to-trough drop of the trade-ordered cumulative P&L
    /// curve, as a non-negative magnitude.
    pub max_drawdown: f64,
    pub daily_results: Vec<DailyResults>,
    pub trade_log: Vec<Trade>,
    pub setup_performance: BTreeMap<String, SetupResults>,
    pub symbol_performance: BTreeMap<String, SymbolResults>,
    pub regime_performance: BTreeMap<String, RegimeResults>,
    pub dynamic_adjustments: Option<AdjustmentStats>,
}
