//! The strategy contract — the engine's only window into trading rules.
//!
//! Concrete strategies (straddles, scalps, condors, ...) live outside the
//! core and are consumed exclusively through [`Strategy`]. Delta-neutral
//! strategies additionally expose the [`GammaScalper`] capability, probed
//! at runtime via [`Strategy::as_gamma_scalper`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::{MarketSnapshot, OptionChain, Position};

/// How a strategy picks strikes from the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrikeSelection {
    /// First strike, scanning OTM to ITM, whose premium clears the
    /// configured scalping price.
    Premium,
    /// Strike a fixed number of listed strikes away from spot.
    Distance,
}

/// The plain parameter block every strategy carries.
///
/// This is the unit the dynamic setup manager copies and adjusts; regime
/// multipliers apply to `target_pct`, `stop_loss_pct`, and `scalping_price`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyParams {
    pub setup_id: String,
    /// Profit target in P&L currency units.
    pub target_pct: f64,
    /// Stop-loss magnitude in P&L currency units (stored positive).
    pub stop_loss_pct: f64,
    pub entry_timeindex: i64,
    pub close_timeindex: i64,
    pub strike_selection: StrikeSelection,
    /// Minimum premium for premium-based strike selection.
    pub scalping_price: f64,
    /// Offset for distance-based strike selection.
    pub strikes_away: usize,
}

impl StrategyParams {
    pub const DEFAULT_CLOSE_TIMEINDEX: i64 = 4650;

    pub fn new(setup_id: impl Into<String>, target_pct: f64, stop_loss_pct: f64) -> Self {
        Self {
            setup_id: setup_id.into(),
            target_pct,
            stop_loss_pct,
            entry_timeindex: 0,
            close_timeindex: Self::DEFAULT_CLOSE_TIMEINDEX,
            strike_selection: StrikeSelection::Premium,
            scalping_price: 0.40,
            strikes_away: 2,
        }
    }

    pub fn with_entry(mut self, entry_timeindex: i64) -> Self {
        self.entry_timeindex = entry_timeindex;
        self
    }

    pub fn with_close(mut self, close_timeindex: i64) -> Self {
        self.close_timeindex = close_timeindex;
        self
    }

    pub fn with_selection(mut self, selection: StrikeSelection) -> Self {
        self.strike_selection = selection;
        self
    }

    pub fn with_scalping_price(mut self, scalping_price: f64) -> Self {
        self.scalping_price = scalping_price;
        self
    }

    pub fn with_strikes_away(mut self, strikes_away: usize) -> Self {
        self.strikes_away = strikes_away;
        self
    }
}

/// Accumulated gamma/theta decomposition for a delta-neutral position.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GammaThetaPnl {
    /// Movement-driven P&L, cumulative since entry.
    pub gamma_pnl: f64,
    /// Time-decay P&L, cumulative since entry (normally negative).
    pub theta_pnl: f64,
}

/// Capability of delta-neutral strategies that require periodic rebalancing.
///
/// All methods are pure with respect to the strategy: per-position state
/// (reference spot, accrual timestamps, rebalance count) lives on the
/// [`Position`] so the position manager can drive many positions through
/// one strategy instance.
pub trait GammaScalper {
    /// New cumulative gamma/theta totals for the position at this snapshot.
    fn gamma_theta_pnl(&self, snapshot: &MarketSnapshot<'_>, position: &Position)
        -> GammaThetaPnl;

    /// Simplified net-delta estimate for the position's strikes at spot.
    fn estimate_position_delta(
        &self,
        snapshot: &MarketSnapshot<'_>,
        strikes: &BTreeMap<String, f64>,
    ) -> f64;

    /// True when the position has drifted far enough from delta-neutral to
    /// warrant a close-and-reopen.
    fn should_rebalance(
        &self,
        timeindex: i64,
        snapshot: &MarketSnapshot<'_>,
        position: &Position,
    ) -> bool;

    /// Build the replacement position(s) after a rebalance fires. The
    /// position manager carries the rebalance counter forward.
    fn rebalance_position(
        &self,
        snapshot: &MarketSnapshot<'_>,
        position: &Position,
    ) -> Vec<Position>;

    /// True when closure should win over rebalancing (end of session).
    fn should_prioritize_closure(&self, timeindex: i64) -> bool;
}

/// A pluggable trading rule. The engine calls nothing beyond this contract
/// and tolerates empty strike/position sets from every method.
pub trait Strategy: Send {
    fn params(&self) -> &StrategyParams;

    /// Replace the parameter block (dynamic regime adjustment path).
    fn set_params(&mut self, params: StrategyParams);

    fn check_entry_condition(&self, timeindex: i64) -> bool;

    /// Map of leg role -> strike (e.g. "CE" -> 580.0, "PE_SELL" -> 575.0).
    fn select_strikes(&self, spot_price: f64, chain: &OptionChain) -> BTreeMap<String, f64>;

    /// Build the positions to open at this snapshot. May mutate internal
    /// entry-tracking state (re-entry counters and the like).
    fn create_positions(&mut self, snapshot: &MarketSnapshot<'_>) -> Vec<Position>;

    fn should_force_close(&self, timeindex: i64) -> bool {
        timeindex >= self.params().close_timeindex
    }

    /// Clear per-day state. Called once per trading day before stepping.
    fn reset_daily_state(&mut self) {}

    /// Narrower capability probe for delta-neutral rebalancing strategies.
    fn as_gamma_scalper(&self) -> Option<&dyn GammaScalper> {
        None
    }
}

/// Builds a fresh strategy set. Multi-symbol runs need one independent set
/// per symbol, since strategies carry per-day mutable state.
pub trait StrategyFactory: Send + Sync {
    fn build(&self) -> Vec<Box<dyn Strategy>>;
}

impl<F> StrategyFactory for F
where
    F: Fn() -> Vec<Box<dyn Strategy>> + Send + Sync,
{
    fn build(&self) -> Vec<Box<dyn Strategy>> {
        self()
    }
}
