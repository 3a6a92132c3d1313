//! Market snapshot — one symbol's view of the market at one timestamp.

use serde::{Deserialize, Serialize};

use super::chain::OptionChain;

/// Discrete market-regime label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Regime {
    TrendingUp,
    TrendingDown,
    Ranging,
    HighVol,
    LowVol,
    Unknown,
}

impl Regime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Regime::TrendingUp => "TRENDING_UP",
            Regime::TrendingDown => "TRENDING_DOWN",
            Regime::Ranging => "RANGING",
            Regime::HighVol => "HIGH_VOL",
            Regime::LowVol => "LOW_VOL",
            Regime::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for Regime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived indicators written back onto a snapshot by the regime detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeIndicators {
    pub velocity: f64,
    pub volatility: f64,
    pub trend_strength: f64,
    pub regime: Regime,
}

/// One symbol's market state at a single timestamp index.
///
/// Constructed once per (symbol, timestamp) during replay. The regime
/// detector writes `indicators` exactly once; after that pass the snapshot
/// is read-only for the rest of the step.
#[derive(Debug)]
pub struct MarketSnapshot<'a> {
    pub timestamp: i64,
    pub spot_price: f64,
    pub chain: &'a OptionChain,
    pub indicators: Option<RegimeIndicators>,
}

impl<'a> MarketSnapshot<'a> {
    pub fn new(timestamp: i64, spot_price: f64, chain: &'a OptionChain) -> Self {
        Self {
            timestamp,
            spot_price,
            chain,
            indicators: None,
        }
    }

    /// Union of strikes quoted at this timestamp, sorted.
    pub fn available_strikes(&self) -> Vec<f64> {
        self.chain.all_strikes()
    }

    /// Regime label from the detector pass, `Unknown` if none ran.
    pub fn regime(&self) -> Regime {
        self.indicators.map_or(Regime::Unknown, |i| i.regime)
    }
}
