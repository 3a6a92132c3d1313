//! Trade — the immutable record of a closed position.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::snapshot::Regime;

/// Why a position left the open set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    Target,
    StopLoss,
    UnlimitedRiskProtection,
    EarlyProfitTarget,
    RatioSpreadProtection,
    TimeBased,
    JobEnd,
    DailyLimit,
    CrossSymbolLimit,
    Rebalance,
    PriorityClose,
    SetupClose,
    ForceClose,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExitReason::Target => "TARGET",
            ExitReason::StopLoss => "STOP_LOSS",
            ExitReason::UnlimitedRiskProtection => "UNLIMITED_RISK_PROTECTION",
            ExitReason::EarlyProfitTarget => "EARLY_PROFIT_TARGET",
            ExitReason::RatioSpreadProtection => "RATIO_SPREAD_PROTECTION",
            ExitReason::TimeBased => "TIME_BASED",
            ExitReason::JobEnd => "JOB_END",
            ExitReason::DailyLimit => "DAILY_LIMIT",
            ExitReason::CrossSymbolLimit => "CROSS_SYMBOL_LIMIT",
            ExitReason::Rebalance => "REBALANCE",
            ExitReason::PriorityClose => "PRIORITY_CLOSE",
            ExitReason::SetupClose => "SETUP_CLOSE",
            ExitReason::ForceClose => "FORCE_CLOSE",
        };
        f.write_str(s)
    }
}

/// Completed round trip: created exactly once per position closure and never
/// mutated afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub setup_id: String,
    pub symbol: String,
    pub date: NaiveDate,
    pub entry_timeindex: i64,
    pub exit_timeindex: i64,
    pub entry_prices: BTreeMap<String, f64>,
    pub exit_prices: BTreeMap<String, f64>,
    pub strikes: BTreeMap<String, f64>,
    pub quantity: i64,
    pub pnl: f64,
    pub exit_reason: ExitReason,
    /// Regime label active when the position was opened, if a detector ran.
    pub entry_regime: Option<Regime>,

    // Carried over from gamma-scalping positions; zero elsewhere.
    pub gamma_pnl: f64,
    pub theta_pnl: f64,
    pub final_delta: f64,
    pub rebalance_count: u32,
}

impl Trade {
    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }

    pub fn ticks_held(&self) -> i64 {
        self.exit_timeindex - self.entry_timeindex
    }
}
