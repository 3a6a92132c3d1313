//! Short straddle: sell one call and one put at selected strikes.

use std::collections::BTreeMap;

use optlab_core::domain::{MarketSnapshot, OptionChain, OptionType, Position, PositionKind};
use optlab_core::strategy::{Strategy, StrategyParams, StrikeSelection};

use super::{distance_based_strike, premium_based_strike};

pub struct StraddleSetup {
    params: StrategyParams,
}

impl StraddleSetup {
    pub fn new(params: StrategyParams) -> Self {
        Self { params }
    }
}

impl Strategy for StraddleSetup {
    fn params(&self) -> &StrategyParams {
        &self.params
    }

    fn set_params(&mut self, params: StrategyParams) {
        self.params = params;
    }

    fn check_entry_condition(&self, timeindex: i64) -> bool {
        timeindex == self.params.entry_timeindex
    }

    fn select_strikes(&self, spot_price: f64, chain: &OptionChain) -> BTreeMap<String, f64> {
        let mut selected = BTreeMap::new();
        for option_type in [OptionType::Call, OptionType::Put] {
            let strike = match self.params.strike_selection {
                StrikeSelection::Premium => premium_based_strike(
                    chain,
                    option_type,
                    spot_price,
                    self.params.scalping_price,
                ),
                StrikeSelection::Distance => distance_based_strike(
                    chain,
                    option_type,
                    spot_price,
                    self.params.strikes_away,
                ),
            };
            if let Some(strike) = strike {
                selected.insert(option_type.as_tape().to_string(), strike);
            }
        }
        selected
    }

    fn create_positions(&mut self, snapshot: &MarketSnapshot<'_>) -> Vec<Position> {
        let selected = self.select_strikes(snapshot.spot_price, snapshot.chain);
        if selected.is_empty() {
            return Vec::new();
        }

        let mut position = Position::new(
            &self.params.setup_id,
            snapshot.timestamp,
            PositionKind::Sell,
        )
        .with_targets(self.params.target_pct, self.params.stop_loss_pct)
        .with_force_close(self.params.close_timeindex)
        .with_strikes(selected.clone());

        for (role, &strike) in &selected {
            let Some(option_type) = OptionType::from_tape(role) else {
                continue;
            };
            if let Some(price) = snapshot.chain.price(option_type, strike) {
                position.add_leg(&format!("{role}_{strike}"), price);
            }
        }

        if position.leg_count() == 0 {
            return Vec::new();
        }
        vec![position]
    }
}
