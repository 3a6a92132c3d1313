//! Dynamic setup management — regime-conditioned parameter adjustment.
//!
//! The manager holds a copy of every base strategy's parameter block and
//! maintains a parallel adjusted set. On each regime update with sufficient
//! confidence it applies regime-indexed multiplicative adjustments, decides
//! which strategies are paused for the regime, and logs one
//! [`ParameterAdjustment`] per materially changed field. It also attributes
//! realized trade P&L to dynamic-vs-static buckets so a run can report
//! whether adjustment helped.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::domain::{AdjustmentStats, Regime, Trade};
use crate::strategy::StrategyParams;

/// Change-log threshold: parameter deltas below this are noise, not
/// adjustments.
const ADJUSTMENT_EPSILON: f64 = 0.001;

/// Confidence gate: regime updates below this never touch parameters.
const MIN_ADJUST_CONFIDENCE: f64 = 0.6;

/// Immutable record of one parameter change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterAdjustment {
    pub timestamp: i64,
    pub setup_id: String,
    pub parameter_name: String,
    pub old_value: f64,
    pub new_value: f64,
    pub reason: String,
}

/// Multiplicative adjustments one regime applies to every strategy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeMultipliers {
    pub target_pct: f64,
    pub stop_loss_pct: f64,
    pub scalping_price: f64,
}

/// Regime -> multipliers table, constructor-injected so runs can override
/// the defaults without touching process-wide state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeAdjustmentTable {
    configs: BTreeMap<String, RegimeMultipliers>,
}

impl RegimeAdjustmentTable {
    pub fn get(&self, regime: Regime) -> Option<RegimeMultipliers> {
        self.configs.get(regime.as_str()).copied()
    }

    pub fn set(&mut self, regime: Regime, multipliers: RegimeMultipliers) {
        self.configs.insert(regime.as_str().to_string(), multipliers);
    }
}

impl Default for RegimeAdjustmentTable {
    fn default() -> Self {
        let mut configs = BTreeMap::new();
        // Trending markets: stretch targets, tighten stops, demand a little
        // more premium.
        for regime in [Regime::TrendingUp, Regime::TrendingDown] {
            configs.insert(
                regime.as_str().to_string(),
                RegimeMultipliers {
                    target_pct: 1.2,
                    stop_loss_pct: 0.8,
                    scalping_price: 1.1,
                },
            );
        }
        configs.insert(
            Regime::HighVol.as_str().to_string(),
            RegimeMultipliers {
                target_pct: 1.5,
                stop_loss_pct: 1.3,
                scalping_price: 1.3,
            },
        );
        configs.insert(
            Regime::LowVol.as_str().to_string(),
            RegimeMultipliers {
                target_pct: 0.8,
                stop_loss_pct: 0.9,
                scalping_price: 0.8,
            },
        );
        configs.insert(
            Regime::Ranging.as_str().to_string(),
            RegimeMultipliers {
                target_pct: 1.0,
                stop_loss_pct: 1.1,
                scalping_price: 0.9,
            },
        );
        Self { configs }
    }
}

/// Strategy-type keyword -> regimes the strategy stays active in.
///
/// Matched as a substring of the setup id; more specific keywords are probed
/// first. A setup id containing no recognized keyword is never paused.
const STRATEGY_REGIME_COMPATIBILITY: &[(&str, &[Regime])] = &[
    (
        "hedged_straddle",
        &[Regime::Ranging, Regime::LowVol, Regime::HighVol],
    ),
    ("straddle", &[Regime::Ranging, Regime::LowVol]),
    ("ce_scalping", &[Regime::TrendingUp, Regime::HighVol]),
    ("pe_scalping", &[Regime::TrendingDown, Regime::HighVol]),
    ("iron_condor", &[Regime::Ranging, Regime::LowVol]),
    ("butterfly", &[Regime::LowVol, Regime::Ranging]),
    (
        "vertical_spread",
        &[Regime::TrendingUp, Regime::TrendingDown],
    ),
    ("ratio_spread", &[Regime::Ranging, Regime::LowVol]),
];

pub struct DynamicSetupManager {
    base: Vec<StrategyParams>,
    adjusted: Vec<StrategyParams>,

    current_regime: Regime,
    regime_confidence: f64,
    last_regime_change_time: i64,

    /// Running average P&L per "(REGIME)_(setup_id)" key.
    adjustment_performance: BTreeMap<String, f64>,
    static_performance: BTreeMap<String, Vec<f64>>,
    dynamic_performance: BTreeMap<String, Vec<f64>>,

    adjustment_history: Vec<ParameterAdjustment>,
    paused: BTreeSet<String>,

    table: RegimeAdjustmentTable,
    total_adjustments: u32,
    regime_accuracy_history: Vec<bool>,
}

impl DynamicSetupManager {
    pub fn new(base: Vec<StrategyParams>) -> Self {
        Self::with_table(base, RegimeAdjustmentTable::default())
    }

    pub fn with_table(base: Vec<StrategyParams>, table: RegimeAdjustmentTable) -> Self {
        let adjusted = base.clone();
        Self {
            base,
            adjusted,
            current_regime: Regime::Unknown,
            regime_confidence: 0.0,
            last_regime_change_time: 0,
            adjustment_performance: BTreeMap::new(),
            static_performance: BTreeMap::new(),
            dynamic_performance: BTreeMap::new(),
            adjustment_history: Vec::new(),
            paused: BTreeSet::new(),
            table,
            total_adjustments: 0,
            regime_accuracy_history: Vec::new(),
        }
    }

    pub fn current_regime(&self) -> Regime {
        self.current_regime
    }

    /// Ingest a regime update. Parameters are only touched when confidence
    /// clears the gate.
    pub fn update_market_regime(&mut self, regime: Regime, confidence: f64, timestamp: i64) {
        let regime_changed =
            regime != self.current_regime && self.current_regime != Regime::Unknown;

        if regime_changed {
            tracing::info!(from = %self.current_regime, to = %regime, confidence, "regime change");
            self.last_regime_change_time = timestamp;
            // Crude accuracy proxy: a high-confidence regime that lasted
            // until a change is assumed to have been right.
            if self.regime_confidence > 0.7 {
                self.regime_accuracy_history.push(true);
            }
        }

        self.current_regime = regime;
        self.regime_confidence = confidence;

        if confidence >= MIN_ADJUST_CONFIDENCE {
            self.adjust_setups_for_regime(regime, timestamp);
        }
    }

    /// The adjusted parameter block for a setup, `None` while it is paused.
    pub fn adjusted_params(&self, setup_id: &str) -> Option<&StrategyParams> {
        if self.paused.contains(setup_id) {
            return None;
        }
        self.adjusted.iter().find(|p| p.setup_id == setup_id)
    }

    /// All adjusted setups excluding paused ones.
    pub fn active_setups(&self) -> Vec<&StrategyParams> {
        self.adjusted
            .iter()
            .filter(|p| !self.paused.contains(&p.setup_id))
            .collect()
    }

    pub fn is_paused(&self, setup_id: &str) -> bool {
        self.paused.contains(setup_id)
    }

    /// Apply one regime's multipliers to a parameter block.
    pub fn adjust_params_for_regime(
        &self,
        params: &StrategyParams,
        regime: Regime,
    ) -> StrategyParams {
        let mut adjusted = params.clone();
        if let Some(m) = self.table.get(regime) {
            adjusted.target_pct *= m.target_pct;
            adjusted.stop_loss_pct *= m.stop_loss_pct;
            adjusted.scalping_price *= m.scalping_price;
        }
        adjusted
    }

    /// True if any adjustment was logged for this setup today.
    pub fn was_adjusted_today(&self, setup_id: &str) -> bool {
        self.adjustment_history
            .iter()
            .any(|a| a.setup_id == setup_id)
    }

    /// Bucket a finished trade's P&L into the dynamic or static history and
    /// refresh the per-(regime, setup) running average.
    pub fn track_adjustment_performance(&mut self, trade: &Trade, was_adjusted: bool) {
        let bucket = if was_adjusted {
            &mut self.dynamic_performance
        } else {
            &mut self.static_performance
        };
        bucket
            .entry(trade.setup_id.clone())
            .or_default()
            .push(trade.pnl);

        let key = format!("{}_{}", self.current_regime, trade.setup_id);
        let count = self
            .dynamic_performance
            .get(&trade.setup_id)
            .map_or(0, Vec::len);
        if count > 0 {
            let current = self.adjustment_performance.get(&key).copied().unwrap_or(0.0);
            let updated = (current * (count - 1) as f64 + trade.pnl) / count as f64;
            self.adjustment_performance.insert(key, updated);
        }
    }

    /// Day boundary: clear the adjustment log and paused set, restore the
    /// adjusted blocks from base. Cumulative performance histories persist.
    pub fn reset_daily_adjustments(&mut self) {
        self.adjustment_history.clear();
        self.paused.clear();
        self.adjusted = self.base.clone();
    }

    pub fn adjustment_history(&self) -> &[ParameterAdjustment] {
        &self.adjustment_history
    }

    pub fn adjustment_stats(&self) -> AdjustmentStats {
        let all_static: Vec<f64> = self.static_performance.values().flatten().copied().collect();
        let all_dynamic: Vec<f64> =
            self.dynamic_performance.values().flatten().copied().collect();

        let static_avg = mean(&all_static);
        let dynamic_avg = mean(&all_dynamic);
        let regime_accuracy = if self.regime_accuracy_history.is_empty() {
            0.0
        } else {
            self.regime_accuracy_history.iter().filter(|&&b| b).count() as f64
                / self.regime_accuracy_history.len() as f64
        };

        AdjustmentStats {
            total_adjustments: self.total_adjustments,
            static_avg_pnl: static_avg,
            dynamic_avg_pnl: dynamic_avg,
            static_vs_dynamic_comparison: dynamic_avg - static_avg,
            regime_accuracy,
            static_trade_count: all_static.len(),
            dynamic_trade_count: all_dynamic.len(),
            adjustment_performance: self.adjustment_performance.clone(),
        }
    }

    fn adjust_setups_for_regime(&mut self, regime: Regime, timestamp: i64) {
        if self.table.get(regime).is_none() {
            return;
        }

        for i in 0..self.base.len() {
            let setup_id = self.base[i].setup_id.clone();

            if should_pause_for_regime(&setup_id, regime) {
                self.paused.insert(setup_id);
                continue;
            }
            self.paused.remove(&setup_id);

            let old = self.adjusted[i].clone();
            let new = self.adjust_params_for_regime(&self.base[i], regime);
            self.track_parameter_changes(&old, &new, regime, timestamp);
            self.adjusted[i] = new;
        }
    }

    fn track_parameter_changes(
        &mut self,
        old: &StrategyParams,
        new: &StrategyParams,
        regime: Regime,
        timestamp: i64,
    ) {
        let fields = [
            ("target_pct", old.target_pct, new.target_pct),
            ("stop_loss_pct", old.stop_loss_pct, new.stop_loss_pct),
            ("scalping_price", old.scalping_price, new.scalping_price),
        ];
        for (name, old_value, new_value) in fields {
            if (old_value - new_value).abs() > ADJUSTMENT_EPSILON {
                self.adjustment_history.push(ParameterAdjustment {
                    timestamp,
                    setup_id: new.setup_id.clone(),
                    parameter_name: name.to_string(),
                    old_value,
                    new_value,
                    reason: format!("regime_change_to_{regime}"),
                });
                self.total_adjustments += 1;
            }
        }
    }
}

fn should_pause_for_regime(setup_id: &str, regime: Regime) -> bool {
    let lower = setup_id.to_lowercase();
    for (keyword, compatible) in STRATEGY_REGIME_COMPATIBILITY {
        if lower.contains(keyword) {
            return !compatible.contains(&regime);
        }
    }
    false
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
