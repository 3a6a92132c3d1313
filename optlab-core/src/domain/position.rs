//! Open positions — the mutable heart of the simulation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::leg::{parse_leg_key, LegAction, LegDescriptor};
use super::snapshot::Regime;

/// Position structure tag. Determines the leg-key encoding and which exit
/// heuristics apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionKind {
    Sell,
    Buy,
    Hedged,
    IronCondor,
    Butterfly,
    VerticalSpread,
    RatioSpread,
    VolatilitySkew,
    GammaScalp,
    GammaScalpRebalanced,
}

impl PositionKind {
    /// Action assumed for legs whose key carries none.
    ///
    /// Only plain short positions default to sell math; every other kind is
    /// expected to spell the action out in the key, and prices any bare leg
    /// with buy math.
    pub fn default_leg_action(&self) -> LegAction {
        match self {
            PositionKind::Sell => LegAction::Sell,
            _ => LegAction::Buy,
        }
    }

    pub fn is_gamma_scalp(&self) -> bool {
        matches!(
            self,
            PositionKind::GammaScalp | PositionKind::GammaScalpRebalanced
        )
    }
}

impl std::fmt::Display for PositionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PositionKind::Sell => "SELL",
            PositionKind::Buy => "BUY",
            PositionKind::Hedged => "HEDGED",
            PositionKind::IronCondor => "IRON_CONDOR",
            PositionKind::Butterfly => "BUTTERFLY",
            PositionKind::VerticalSpread => "VERTICAL_SPREAD",
            PositionKind::RatioSpread => "RATIO_SPREAD",
            PositionKind::VolatilitySkew => "VOLATILITY_SKEW",
            PositionKind::GammaScalp => "GAMMA_SCALP",
            PositionKind::GammaScalpRebalanced => "GAMMA_SCALP_REBALANCED",
        };
        f.write_str(s)
    }
}

/// One leg of a position: the original key, its parsed descriptor (if the
/// key was well-formed), and the entry price without slippage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Leg {
    pub key: String,
    pub descriptor: Option<LegDescriptor>,
    pub entry_price: f64,
}

/// An open multi-leg options position.
///
/// Created by a strategy at entry, mutated in place every timestamp by the
/// position manager, and removed from the open set exactly once when an exit
/// condition fires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub setup_id: String,
    pub entry_timeindex: i64,
    pub legs: Vec<Leg>,
    /// Strike per leg role (e.g. "CE" -> 580.0, or "CE_BUY_LOWER" -> 575.0).
    pub strikes: BTreeMap<String, f64>,
    pub quantity: i64,
    pub lot_size: i64,
    pub target_pnl: f64,
    /// Stop-loss threshold; negative by convention.
    pub stop_loss_pnl: f64,
    pub current_pnl: f64,
    pub kind: PositionKind,
    pub force_close_timeindex: i64,
    /// Per-leg slippage applied on both entry and exit.
    pub slippage: f64,
    pub unlimited_risk: bool,
    /// Theoretical maximum profit, when the structure bounds it (condor,
    /// butterfly). 0.0 when unknown/unbounded.
    pub max_profit: f64,
    /// Regime label at entry, when a detector was running.
    pub entry_regime: Option<Regime>,

    // Gamma-scalping running state.
    pub gamma_pnl: f64,
    pub theta_pnl: f64,
    pub current_delta: f64,
    pub rebalance_count: u32,
    /// Spot at the last gamma/theta accrual, for movement attribution.
    pub last_gamma_spot: Option<f64>,
    /// Timestamp of the last gamma/theta accrual, for decay attribution.
    pub last_gamma_timeindex: Option<i64>,
}

impl Position {
    /// Default force-close index: ten minutes before the standard 4660
    /// job end on the 5-second grid.
    pub const DEFAULT_FORCE_CLOSE: i64 = 4650;
    pub const DEFAULT_LOT_SIZE: i64 = 100;
    pub const DEFAULT_SLIPPAGE: f64 = 0.005;

    pub fn new(setup_id: impl Into<String>, entry_timeindex: i64, kind: PositionKind) -> Self {
        Self {
            setup_id: setup_id.into(),
            entry_timeindex,
            legs: Vec::new(),
            strikes: BTreeMap::new(),
            quantity: 1,
            lot_size: Self::DEFAULT_LOT_SIZE,
            target_pnl: 0.0,
            stop_loss_pnl: 0.0,
            current_pnl: 0.0,
            kind,
            force_close_timeindex: Self::DEFAULT_FORCE_CLOSE,
            slippage: Self::DEFAULT_SLIPPAGE,
            unlimited_risk: false,
            max_profit: 0.0,
            entry_regime: None,
            gamma_pnl: 0.0,
            theta_pnl: 0.0,
            current_delta: 0.0,
            rebalance_count: 0,
            last_gamma_spot: None,
            last_gamma_timeindex: None,
        }
    }

    /// Set the role->strike map. Must happen before butterfly legs are added,
    /// since their descriptors resolve strikes through this map.
    pub fn with_strikes(mut self, strikes: BTreeMap<String, f64>) -> Self {
        self.strikes = strikes;
        self
    }

    pub fn with_quantity(mut self, quantity: i64) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn with_lot_size(mut self, lot_size: i64) -> Self {
        self.lot_size = lot_size;
        self
    }

    /// Target is stored as given; stop-loss is normalized to a negative value.
    pub fn with_targets(mut self, target_pnl: f64, stop_loss_pnl: f64) -> Self {
        self.target_pnl = target_pnl;
        self.stop_loss_pnl = -stop_loss_pnl.abs();
        self
    }

    pub fn with_force_close(mut self, timeindex: i64) -> Self {
        self.force_close_timeindex = timeindex;
        self
    }

    pub fn with_slippage(mut self, slippage: f64) -> Self {
        self.slippage = slippage;
        self
    }

    pub fn with_unlimited_risk(mut self, unlimited_risk: bool) -> Self {
        self.unlimited_risk = unlimited_risk;
        self
    }

    pub fn with_max_profit(mut self, max_profit: f64) -> Self {
        self.max_profit = max_profit;
        self
    }

    /// Add a leg, parsing its key into a descriptor once, here. A key that
    /// fails to parse is kept (for the trade record) but never priced.
    pub fn add_leg(&mut self, key: &str, entry_price: f64) {
        let descriptor = parse_leg_key(key, self.kind, &self.strikes, self.quantity);
        self.legs.push(Leg {
            key: key.to_string(),
            descriptor,
            entry_price,
        });
    }

    pub fn leg_count(&self) -> usize {
        self.legs.len()
    }

    /// Entry prices keyed by leg key, for trade records.
    pub fn entry_prices(&self) -> BTreeMap<String, f64> {
        self.legs
            .iter()
            .map(|leg| (leg.key.clone(), leg.entry_price))
            .collect()
    }
}
