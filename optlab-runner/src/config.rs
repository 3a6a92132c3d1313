//! Serializable run configuration with a content-addressed run id.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use optlab_core::strategy::{
    Strategy, StrategyFactory, StrategyParams, StrikeSelection,
};

use crate::strategies::{
    CeScalpingSetup, GammaScalpingSetup, HedgedStraddleSetup, PeScalpingSetup, StraddleSetup,
};

/// Unique identifier for a run (content-addressable hash).
pub type RunId = String;

/// Everything needed to reproduce a backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Symbols to simulate. One entry runs single-symbol mode.
    pub symbols: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Root of the on-disk data tree.
    pub data_path: String,
    #[serde(default = "default_daily_max_loss")]
    pub daily_max_loss: f64,
    #[serde(default = "default_cross_symbol_risk_limit")]
    pub cross_symbol_risk_limit: f64,
    #[serde(default)]
    pub enable_dynamic_management: bool,
    #[serde(default = "default_load_workers")]
    pub load_workers: usize,
    pub strategies: Vec<StrategySpec>,
}

fn default_daily_max_loss() -> f64 {
    1000.0
}

fn default_cross_symbol_risk_limit() -> f64 {
    2000.0
}

fn default_load_workers() -> usize {
    4
}

impl RunConfig {
    /// Deterministic hash id: identical configs share cached artifacts.
    pub fn run_id(&self) -> RunId {
        let json = serde_json::to_string(self).expect("RunConfig serialization failed");
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_toml_path(path: &std::path::Path) -> anyhow::Result<Self> {
        use anyhow::Context;
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }
}

/// Shared parameter block every strategy spec carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecParams {
    pub setup_id: String,
    pub target_pct: f64,
    pub stop_loss_pct: f64,
    pub entry_timeindex: i64,
    #[serde(default = "default_close_timeindex")]
    pub close_timeindex: i64,
    #[serde(default = "default_strike_selection")]
    pub strike_selection: StrikeSelection,
    #[serde(default = "default_scalping_price")]
    pub scalping_price: f64,
    #[serde(default = "default_strikes_away")]
    pub strikes_away: usize,
}

fn default_close_timeindex() -> i64 {
    StrategyParams::DEFAULT_CLOSE_TIMEINDEX
}

fn default_strike_selection() -> StrikeSelection {
    StrikeSelection::Premium
}

fn default_scalping_price() -> f64 {
    0.40
}

fn default_strikes_away() -> usize {
    2
}

impl SpecParams {
    fn to_params(&self) -> StrategyParams {
        StrategyParams {
            setup_id: self.setup_id.clone(),
            target_pct: self.target_pct,
            stop_loss_pct: self.stop_loss_pct,
            entry_timeindex: self.entry_timeindex,
            close_timeindex: self.close_timeindex,
            strike_selection: self.strike_selection,
            scalping_price: self.scalping_price,
            strikes_away: self.strikes_away,
        }
    }
}

/// Serializable strategy selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategySpec {
    Straddle {
        #[serde(flatten)]
        params: SpecParams,
    },
    HedgedStraddle {
        #[serde(flatten)]
        params: SpecParams,
        #[serde(default = "default_hedge_strikes_away")]
        hedge_strikes_away: usize,
    },
    CeScalping {
        #[serde(flatten)]
        params: SpecParams,
        #[serde(default = "default_max_reentries")]
        max_reentries: u32,
        #[serde(default = "default_reentry_gap")]
        reentry_gap: i64,
    },
    PeScalping {
        #[serde(flatten)]
        params: SpecParams,
        #[serde(default = "default_max_reentries")]
        max_reentries: u32,
        #[serde(default = "default_reentry_gap")]
        reentry_gap: i64,
    },
    GammaScalping {
        #[serde(flatten)]
        params: SpecParams,
        #[serde(default = "default_delta_threshold")]
        delta_threshold: f64,
        #[serde(default = "default_rebalance_frequency")]
        rebalance_frequency: i64,
        #[serde(default = "default_max_rebalances")]
        max_rebalances: u32,
    },
}

fn default_hedge_strikes_away() -> usize {
    5
}

fn default_max_reentries() -> u32 {
    3
}

fn default_reentry_gap() -> i64 {
    300
}

fn default_delta_threshold() -> f64 {
    0.15
}

fn default_rebalance_frequency() -> i64 {
    60
}

fn default_max_rebalances() -> u32 {
    5
}

impl StrategySpec {
    pub fn setup_id(&self) -> &str {
        match self {
            StrategySpec::Straddle { params }
            | StrategySpec::HedgedStraddle { params, .. }
            | StrategySpec::CeScalping { params, .. }
            | StrategySpec::PeScalping { params, .. }
            | StrategySpec::GammaScalping { params, .. } => &params.setup_id,
        }
    }

    pub fn build(&self) -> Box<dyn Strategy> {
        match self {
            StrategySpec::Straddle { params } => {
                Box::new(StraddleSetup::new(params.to_params()))
            }
            StrategySpec::HedgedStraddle {
                params,
                hedge_strikes_away,
            } => Box::new(HedgedStraddleSetup::new(
                params.to_params(),
                *hedge_strikes_away,
            )),
            StrategySpec::CeScalping {
                params,
                max_reentries,
                reentry_gap,
            } => Box::new(CeScalpingSetup::new(
                params.to_params(),
                *max_reentries,
                *reentry_gap,
            )),
            StrategySpec::PeScalping {
                params,
                max_reentries,
                reentry_gap,
            } => Box::new(PeScalpingSetup::new(
                params.to_params(),
                *max_reentries,
                *reentry_gap,
            )),
            StrategySpec::GammaScalping {
                params,
                delta_threshold,
                rebalance_frequency,
                max_rebalances,
            } => Box::new(GammaScalpingSetup::new(
                params.to_params(),
                *delta_threshold,
                *rebalance_frequency,
                *max_rebalances,
            )),
        }
    }
}

/// Factory over a spec list: every symbol context gets an independent
/// strategy set.
pub struct SpecFactory {
    specs: Vec<StrategySpec>,
}

impl SpecFactory {
    pub fn new(specs: Vec<StrategySpec>) -> Self {
        Self { specs }
    }
}

impl StrategyFactory for SpecFactory {
    fn build(&self) -> Vec<Box<dyn Strategy>> {
        self.specs.iter().map(StrategySpec::build).collect()
    }
}
