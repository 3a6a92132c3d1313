//! Hedged straddle: sell a straddle, buy further-OTM wings against it.

use std::collections::BTreeMap;

use optlab_core::domain::{MarketSnapshot, OptionChain, OptionType, Position, PositionKind};
use optlab_core::strategy::{Strategy, StrategyParams, StrikeSelection};

use super::{distance_based_strike, premium_based_strike};

pub struct HedgedStraddleSetup {
    params: StrategyParams,
    /// How many listed strikes further OTM the hedge wings sit.
    hedge_strikes_away: usize,
}

impl HedgedStraddleSetup {
    pub fn new(params: StrategyParams, hedge_strikes_away: usize) -> Self {
        Self {
            params,
            hedge_strikes_away,
        }
    }

    fn main_strike(&self, chain: &OptionChain, option_type: OptionType, spot: f64) -> Option<f64> {
        match self.params.strike_selection {
            StrikeSelection::Premium => {
                premium_based_strike(chain, option_type, spot, self.params.scalping_price)
            }
            StrikeSelection::Distance => {
                distance_based_strike(chain, option_type, spot, self.params.strikes_away)
            }
        }
    }

    /// Hedge wing beyond the main strike: `hedge_strikes_away` strikes
    /// further OTM, or the furthest listed when the chain runs out.
    fn hedge_strike(
        &self,
        chain: &OptionChain,
        option_type: OptionType,
        main_strike: f64,
    ) -> Option<f64> {
        let strikes = chain.series(option_type).strikes();
        let beyond: Vec<f64> = match option_type {
            OptionType::Call => strikes.iter().filter(|&&s| s > main_strike).copied().collect(),
            OptionType::Put => strikes
                .iter()
                .rev()
                .filter(|&&s| s < main_strike)
                .copied()
                .collect(),
        };
        if beyond.len() >= self.hedge_strikes_away {
            Some(beyond[self.hedge_strikes_away - 1])
        } else {
            beyond.last().copied()
        }
    }
}

impl Strategy for HedgedStraddleSetup {
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
            let tape = option_type.as_tape();
            if let Some(main) = self.main_strike(chain, option_type, spot_price) {
                selected.insert(format!("{tape}_SELL"), main);
                if let Some(hedge) = self.hedge_strike(chain, option_type, main) {
                    selected.insert(format!("{tape}_BUY"), hedge);
                }
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
            PositionKind::Hedged,
        )
        .with_targets(self.params.target_pct, self.params.stop_loss_pct)
        .with_force_close(self.params.close_timeindex)
        .with_strikes(selected.clone());

        for (role, &strike) in &selected {
            let (tape, action) = role.split_once('_').unwrap_or((role.as_str(), "SELL"));
            let Some(option_type) = OptionType::from_tape(tape) else {
                continue;
            };
            if let Some(price) = snapshot.chain.price(option_type, strike) {
                position.add_leg(&format!("{tape}_{strike}_{action}"), price);
            }
        }

        if position.leg_count() == 0 {
            return Vec::new();
        }
        vec![position]
    }
}
