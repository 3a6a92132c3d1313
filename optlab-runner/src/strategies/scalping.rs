//! One-sided premium scalps with re-entry.
//!
//! Sell a single call (CE) or put (PE) whose premium clears the scalping
//! price; after a position closes, re-enter up to `max_reentries` times
//! with a minimum gap between entries, but never within 100 ticks of the
//! configured close.

use std::collections::BTreeMap;

use optlab_core::domain::{MarketSnapshot, OptionChain, OptionType, Position, PositionKind};
use optlab_core::strategy::{Strategy, StrategyParams, StrikeSelection};

use super::{distance_based_strike, premium_based_strike};

/// Don't open scalps this close to the configured close time.
const ENTRY_CUTOFF_BEFORE_CLOSE: i64 = 100;

struct ScalpingState {
    params: StrategyParams,
    option_type: OptionType,
    max_reentries: u32,
    reentry_gap: i64,
    last_entry_time: i64,
    entry_count: u32,
}

impl ScalpingState {
    fn new(
        params: StrategyParams,
        option_type: OptionType,
        max_reentries: u32,
        reentry_gap: i64,
    ) -> Self {
        Self {
            params,
            option_type,
            max_reentries,
            reentry_gap,
            last_entry_time: 0,
            entry_count: 0,
        }
    }

    fn check_entry(&self, timeindex: i64) -> bool {
        if self.entry_count == 0 {
            return timeindex == self.params.entry_timeindex;
        }
        self.entry_count < self.max_reentries
            && timeindex >= self.last_entry_time + self.reentry_gap
            && timeindex <= self.params.close_timeindex - ENTRY_CUTOFF_BEFORE_CLOSE
    }

    fn select(&self, spot: f64, chain: &OptionChain) -> Option<f64> {
        match self.params.strike_selection {
            StrikeSelection::Premium => {
                premium_based_strike(chain, self.option_type, spot, self.params.scalping_price)
            }
            StrikeSelection::Distance => {
                distance_based_strike(chain, self.option_type, spot, self.params.strikes_away)
            }
        }
    }

    fn create(&mut self, snapshot: &MarketSnapshot<'_>) -> Vec<Position> {
        let Some(strike) = self.select(snapshot.spot_price, snapshot.chain) else {
            return Vec::new();
        };
        let Some(price) = snapshot.chain.price(self.option_type, strike) else {
            return Vec::new();
        };

        let tape = self.option_type.as_tape();
        let mut position = Position::new(
            &self.params.setup_id,
            snapshot.timestamp,
            PositionKind::Sell,
        )
        .with_targets(self.params.target_pct, self.params.stop_loss_pct)
        .with_force_close(self.params.close_timeindex)
        .with_strikes(BTreeMap::from([(tape.to_string(), strike)]));
        position.add_leg(&format!("{tape}_{strike}"), price);

        self.last_entry_time = snapshot.timestamp;
        self.entry_count += 1;
        vec![position]
    }

    fn reset(&mut self) {
        self.last_entry_time = 0;
        self.entry_count = 0;
    }
}

/// Call-side scalp.
pub struct CeScalpingSetup {
    state: ScalpingState,
}

impl CeScalpingSetup {
    pub fn new(params: StrategyParams, max_reentries: u32, reentry_gap: i64) -> Self {
        Self {
            state: ScalpingState::new(params, OptionType::Call, max_reentries, reentry_gap),
        }
    }
}

impl Strategy for CeScalpingSetup {
    fn params(&self) -> &StrategyParams {
        &self.state.params
    }

    fn set_params(&mut self, params: StrategyParams) {
        self.state.params = params;
    }

    fn check_entry_condition(&self, timeindex: i64) -> bool {
        self.state.check_entry(timeindex)
    }

    fn select_strikes(&self, spot_price: f64, chain: &OptionChain) -> BTreeMap<String, f64> {
        self.state
            .select(spot_price, chain)
            .map(|s| BTreeMap::from([("CE".to_string(), s)]))
            .unwrap_or_default()
    }

    fn create_positions(&mut self, snapshot: &MarketSnapshot<'_>) -> Vec<Position> {
        self.state.create(snapshot)
    }

    fn reset_daily_state(&mut self) {
        self.state.reset();
    }
}

/// Put-side scalp.
pub struct PeScalpingSetup {
    state: ScalpingState,
}

impl PeScalpingSetup {
    pub fn new(params: StrategyParams, max_reentries: u32, reentry_gap: i64) -> Self {
        Self {
            state: ScalpingState::new(params, OptionType::Put, max_reentries, reentry_gap),
        }
    }
}

impl Strategy for PeScalpingSetup {
    fn params(&self) -> &StrategyParams {
        &self.state.params
    }

    fn set_params(&mut self, params: StrategyParams) {
        self.state.params = params;
    }

    fn check_entry_condition(&self, timeindex: i64) -> bool {
        self.state.check_entry(timeindex)
    }

    fn select_strikes(&self, spot_price: f64, chain: &OptionChain) -> BTreeMap<String, f64> {
        self.state
            .select(spot_price, chain)
            .map(|s| BTreeMap::from([("PE".to_string(), s)]))
            .unwrap_or_default()
    }

    fn create_positions(&mut self, snapshot: &MarketSnapshot<'_>) -> Vec<Position> {
        self.state.create(snapshot)
    }

    fn reset_daily_state(&mut self) {
        self.state.reset();
    }
}
