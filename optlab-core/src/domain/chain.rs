//! Option chain storage — per-timestamp, strike-indexed price tables.
//!
//! The chain is stored as one strike-sorted parallel-array series per option
//! type. Lookups return `None` for any missing (type, strike) pair; callers
//! treat a missing price as "leg unpriced this tick", never as an error.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Option contract type. Serialized with the tape's "CE"/"PE" vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionType {
    #[serde(rename = "CE")]
    Call,
    #[serde(rename = "PE")]
    Put,
}

impl OptionType {
    /// Parse the tape vocabulary. Anything other than "CE"/"PE" is rejected.
    pub fn from_tape(s: &str) -> Option<Self> {
        match s {
            "CE" => Some(OptionType::Call),
            "PE" => Some(OptionType::Put),
            _ => None,
        }
    }

    pub fn as_tape(&self) -> &'static str {
        match self {
            OptionType::Call => "CE",
            OptionType::Put => "PE",
        }
    }
}

impl std::fmt::Display for OptionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_tape())
    }
}

/// Strike-sorted parallel arrays of (strike, price) for one option type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrikeSeries {
    strikes: Vec<f64>,
    prices: Vec<f64>,
}

impl StrikeSeries {
    /// Insert or overwrite the price at a strike, keeping strike order.
    pub fn insert(&mut self, strike: f64, price: f64) {
        let idx = self.strikes.partition_point(|&s| s < strike);
        if idx < self.strikes.len() && self.strikes[idx] == strike {
            self.prices[idx] = price;
        } else {
            self.strikes.insert(idx, strike);
            self.prices.insert(idx, price);
        }
    }

    pub fn price(&self, strike: f64) -> Option<f64> {
        let idx = self.strikes.partition_point(|&s| s < strike);
        (idx < self.strikes.len() && self.strikes[idx] == strike).then(|| self.prices[idx])
    }

    pub fn strikes(&self) -> &[f64] {
        &self.strikes
    }

    pub fn prices(&self) -> &[f64] {
        &self.prices
    }

    pub fn len(&self) -> usize {
        self.strikes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strikes.is_empty()
    }
}

/// Quotes for every listed strike of both option types at one timestamp.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptionChain {
    calls: StrikeSeries,
    puts: StrikeSeries,
}

impl OptionChain {
    pub fn insert(&mut self, option_type: OptionType, strike: f64, price: f64) {
        self.series_mut(option_type).insert(strike, price);
    }

    /// Price lookup. `None` on any missing key, matching the semantics of the
    /// nested-map storage this replaces.
    pub fn price(&self, option_type: OptionType, strike: f64) -> Option<f64> {
        self.series(option_type).price(strike)
    }

    pub fn series(&self, option_type: OptionType) -> &StrikeSeries {
        match option_type {
            OptionType::Call => &self.calls,
            OptionType::Put => &self.puts,
        }
    }

    fn series_mut(&mut self, option_type: OptionType) -> &mut StrikeSeries {
        match option_type {
            OptionType::Call => &mut self.calls,
            OptionType::Put => &mut self.puts,
        }
    }

    /// Union of all strikes across both option types, sorted ascending.
    pub fn all_strikes(&self) -> Vec<f64> {
        let mut strikes: Vec<f64> = self
            .calls
            .strikes()
            .iter()
            .chain(self.puts.strikes())
            .copied()
            .collect();
        strikes.sort_by(|a, b| a.partial_cmp(b).expect("strike is never NaN"));
        strikes.dedup();
        strikes
    }

    /// Mean of all positive quoted prices, both types. 0.0 on an empty chain.
    ///
    /// Used by the regime detector as a cheap implied-volatility proxy input.
    pub fn average_price(&self) -> f64 {
        let mut sum = 0.0;
        let mut count = 0usize;
        for &p in self.calls.prices().iter().chain(self.puts.prices()) {
            if p > 0.0 {
                sum += p;
                count += 1;
            }
        }
        if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty() && self.puts.is_empty()
    }
}

/// All market data for one symbol on one trading day.
///
/// Timestamps are the tape's integer time indices (5-second grid). The
/// job-end index marks the last valid index; everything open at or past it
/// is force-closed by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingDayData {
    pub date: NaiveDate,
    /// Spot price by timestamp index.
    pub spot: BTreeMap<i64, f64>,
    /// Option chain by timestamp index.
    pub options: BTreeMap<i64, OptionChain>,
    /// Last valid timestamp index for the day.
    pub job_end_idx: i64,
    /// Remaining key/value metadata from the day's property file.
    pub metadata: BTreeMap<String, String>,
}

impl TradingDayData {
    /// Timestamps where both a spot price and an option chain exist, sorted.
    ///
    /// The simulation only steps on these; one-sided timestamps are skipped.
    pub fn tradable_timestamps(&self) -> Vec<i64> {
        self.spot
            .keys()
            .filter(|ts| self.options.contains_key(ts))
            .copied()
            .collect()
    }
}
