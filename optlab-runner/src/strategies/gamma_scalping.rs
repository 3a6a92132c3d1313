//! Gamma scalping: long ATM straddle, periodically rebalanced back to
//! delta-neutral as the underlying moves.
//!
//! Greeks are simplified proxies (no pricing model): delta comes from a
//! moneyness ramp, gamma P&L from squared spot moves, theta from elapsed
//! time. P&L attribution state (reference spot, accrual timestamp,
//! rebalance count) lives on the position so one strategy instance can
//! drive many positions.

use std::collections::BTreeMap;

use optlab_core::domain::{
    MarketSnapshot, OptionChain, OptionType, Position, PositionKind,
};
use optlab_core::strategy::{
    GammaScalper, GammaThetaPnl, Strategy, StrategyParams,
};

/// Moneyness-to-delta slope of the call-delta ramp proxy.
const DELTA_RAMP: f64 = 10.0;
/// Gamma proxy: P&L per unit spot-move squared, per contract unit.
const GAMMA_PROXY: f64 = 0.05;
/// Theta proxy: premium decay per tick, per contract unit.
const THETA_PER_TICK: f64 = 0.0004;
/// Prioritize closure this many ticks (30 minutes) before the close.
const CLOSURE_WINDOW: i64 = 360;

pub struct GammaScalpingSetup {
    params: StrategyParams,
    delta_threshold: f64,
    rebalance_frequency: i64,
    max_rebalances: u32,
}

impl GammaScalpingSetup {
    pub fn new(
        params: StrategyParams,
        delta_threshold: f64,
        rebalance_frequency: i64,
        max_rebalances: u32,
    ) -> Self {
        Self {
            params,
            delta_threshold,
            rebalance_frequency,
            max_rebalances,
        }
    }

    fn atm_strike(&self, chain: &OptionChain, option_type: OptionType, spot: f64) -> Option<f64> {
        chain
            .series(option_type)
            .strikes()
            .iter()
            .copied()
            .min_by(|a, b| {
                (a - spot)
                    .abs()
                    .partial_cmp(&(b - spot).abs())
                    .expect("strike is never NaN")
            })
    }

    fn build_straddle(&self, snapshot: &MarketSnapshot<'_>, kind: PositionKind) -> Vec<Position> {
        let strikes = self.select_strikes(snapshot.spot_price, snapshot.chain);
        if strikes.len() < 2 {
            return Vec::new();
        }

        let mut position = Position::new(&self.params.setup_id, snapshot.timestamp, kind)
            .with_targets(self.params.target_pct, self.params.stop_loss_pct)
            .with_force_close(self.params.close_timeindex)
            .with_strikes(strikes.clone());

        for (role, &strike) in &strikes {
            let Some(option_type) = OptionType::from_tape(role) else {
                continue;
            };
            if let Some(price) = snapshot.chain.price(option_type, strike) {
                position.add_leg(&format!("{role}_{strike}_BUY"), price);
            }
        }

        if position.leg_count() < 2 {
            return Vec::new();
        }
        position.last_gamma_spot = Some(snapshot.spot_price);
        position.last_gamma_timeindex = Some(snapshot.timestamp);
        vec![position]
    }

    /// Contracts held per leg role, for sizing the proxies.
    fn contract_units(position: &Position) -> f64 {
        (position.quantity * position.lot_size) as f64
    }
}

impl Strategy for GammaScalpingSetup {
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
            if let Some(strike) = self.atm_strike(chain, option_type, spot_price) {
                selected.insert(option_type.as_tape().to_string(), strike);
            }
        }
        selected
    }

    fn create_positions(&mut self, snapshot: &MarketSnapshot<'_>) -> Vec<Position> {
        self.build_straddle(snapshot, PositionKind::GammaScalp)
    }

    fn as_gamma_scalper(&self) -> Option<&dyn GammaScalper> {
        Some(self)
    }
}

impl GammaScalper for GammaScalpingSetup {
    fn gamma_theta_pnl(
        &self,
        snapshot: &MarketSnapshot<'_>,
        position: &Position,
    ) -> GammaThetaPnl {
        let units = Self::contract_units(position);

        let reference_spot = position.last_gamma_spot.unwrap_or(snapshot.spot_price);
        let spot_move = snapshot.spot_price - reference_spot;
        let gamma_increment = 0.5 * GAMMA_PROXY * spot_move * spot_move * units;

        let reference_ts = position
            .last_gamma_timeindex
            .unwrap_or(position.entry_timeindex);
        let elapsed = (snapshot.timestamp - reference_ts).max(0) as f64;
        let theta_increment = -THETA_PER_TICK * elapsed * units;

        GammaThetaPnl {
            gamma_pnl: position.gamma_pnl + gamma_increment,
            theta_pnl: position.theta_pnl + theta_increment,
        }
    }

    fn estimate_position_delta(
        &self,
        snapshot: &MarketSnapshot<'_>,
        strikes: &BTreeMap<String, f64>,
    ) -> f64 {
        let Some(&strike) = strikes.get("CE").or_else(|| strikes.get("PE")) else {
            return 0.0;
        };
        if strike <= 0.0 {
            return 0.0;
        }
        // Call-delta ramp around the money; the long put contributes
        // call_delta - 1, so the straddle nets 2*call_delta - 1.
        let moneyness = (snapshot.spot_price - strike) / strike;
        let call_delta = (0.5 + moneyness * DELTA_RAMP).clamp(0.0, 1.0);
        2.0 * call_delta - 1.0
    }

    fn should_rebalance(
        &self,
        timeindex: i64,
        _snapshot: &MarketSnapshot<'_>,
        position: &Position,
    ) -> bool {
        position.current_delta.abs() > self.delta_threshold
            && timeindex - position.entry_timeindex >= self.rebalance_frequency
            && position.rebalance_count < self.max_rebalances
            && !self.should_prioritize_closure(timeindex)
    }

    fn rebalance_position(
        &self,
        snapshot: &MarketSnapshot<'_>,
        _position: &Position,
    ) -> Vec<Position> {
        self.build_straddle(snapshot, PositionKind::GammaScalpRebalanced)
    }

    fn should_prioritize_closure(&self, timeindex: i64) -> bool {
        timeindex >= self.params.close_timeindex - CLOSURE_WINDOW
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> OptionChain {
        let mut chain = OptionChain::default();
        for (strike, ce, pe) in [
            (575.0, 8.5, 2.1),
            (580.0, 5.2, 4.8),
            (585.0, 2.8, 7.9),
        ] {
            chain.insert(OptionType::Call, strike, ce);
            chain.insert(OptionType::Put, strike, pe);
        }
        chain
    }

    fn setup() -> GammaScalpingSetup {
        GammaScalpingSetup::new(
            StrategyParams::new("gamma_scalp_1", 50.0, 100.0).with_entry(1000),
            0.10,
            60,
            5,
        )
    }

    #[test]
    fn entry_fires_exactly_at_entry_timeindex() {
        let s = setup();
        assert!(s.check_entry_condition(1000));
        assert!(!s.check_entry_condition(999));
    }

    #[test]
    fn selects_atm_strikes_both_sides() {
        let s = setup();
        let chain = chain();
        let strikes = s.select_strikes(580.0, &chain);
        assert_eq!(strikes["CE"], 580.0);
        assert_eq!(strikes["PE"], 580.0);
    }

    #[test]
    fn creates_long_straddle_with_buy_legs() {
        let mut s = setup();
        let chain = chain();
        let snap = MarketSnapshot::new(1000, 580.0, &chain);
        let positions = s.create_positions(&snap);

        assert_eq!(positions.len(), 1);
        let pos = &positions[0];
        assert_eq!(pos.kind, PositionKind::GammaScalp);
        assert_eq!(pos.leg_count(), 2);
        assert!(pos.legs.iter().all(|l| l.key.ends_with("_BUY")));
        assert_eq!(pos.last_gamma_spot, Some(580.0));
    }

    #[test]
    fn delta_is_zero_at_the_money_and_signed_off_it() {
        let s = setup();
        let chain = chain();
        let strikes = BTreeMap::from([("CE".to_string(), 580.0), ("PE".to_string(), 580.0)]);

        let snap = MarketSnapshot::new(1100, 580.0, &chain);
        assert!(s.estimate_position_delta(&snap, &strikes).abs() < 1e-12);

        let snap = MarketSnapshot::new(1100, 583.0, &chain);
        assert!(s.estimate_position_delta(&snap, &strikes) > 0.0);

        let snap = MarketSnapshot::new(1100, 577.0, &chain);
        assert!(s.estimate_position_delta(&snap, &strikes) < 0.0);
    }

    #[test]
    fn gamma_accrues_on_movement_theta_on_time() {
        let s = setup();
        let chain = chain();
        let mut pos = s
            .build_straddle(&MarketSnapshot::new(1000, 580.0, &chain), PositionKind::GammaScalp)
            .remove(0);

        // No movement, 10 ticks: pure theta.
        let snap = MarketSnapshot::new(1010, 580.0, &chain);
        let pnl = s.gamma_theta_pnl(&snap, &pos);
        assert_eq!(pnl.gamma_pnl, 0.0);
        assert!(pnl.theta_pnl < 0.0);

        // A 2-point move accrues gamma.
        pos.gamma_pnl = pnl.gamma_pnl;
        pos.theta_pnl = pnl.theta_pnl;
        pos.last_gamma_spot = Some(580.0);
        pos.last_gamma_timeindex = Some(1010);
        let snap = MarketSnapshot::new(1020, 582.0, &chain);
        let pnl = s.gamma_theta_pnl(&snap, &pos);
        assert!(pnl.gamma_pnl > 0.0);
        assert!(pnl.theta_pnl < pos.theta_pnl);
    }

    #[test]
    fn rebalance_requires_drift_elapsed_time_and_budget() {
        let s = setup();
        let chain = chain();
        let snap = MarketSnapshot::new(1100, 582.0, &chain);
        let mut pos = s
            .build_straddle(&MarketSnapshot::new(1000, 580.0, &chain), PositionKind::GammaScalp)
            .remove(0);

        pos.current_delta = 0.05;
        assert!(!s.should_rebalance(1100, &snap, &pos), "under threshold");

        pos.current_delta = 0.25;
        assert!(s.should_rebalance(1100, &snap, &pos));
        assert!(!s.should_rebalance(1030, &snap, &pos), "too soon");

        pos.rebalance_count = 5;
        assert!(!s.should_rebalance(1100, &snap, &pos), "budget exhausted");
    }

    #[test]
    fn closure_prioritized_in_final_window() {
        let s = setup(); // close_timeindex 4650 -> window opens at 4290
        assert!(!s.should_prioritize_closure(2000));
        assert!(!s.should_prioritize_closure(4289));
        assert!(s.should_prioritize_closure(4290));
        assert!(s.should_prioritize_closure(4400));
    }

    #[test]
    fn rebalanced_position_carries_the_rebalanced_kind() {
        let s = setup();
        let chain = chain();
        let snap = MarketSnapshot::new(1200, 582.0, &chain);
        let pos = s
            .build_straddle(&MarketSnapshot::new(1000, 580.0, &chain), PositionKind::GammaScalp)
            .remove(0);

        let replacements = s.rebalance_position(&snap, &pos);
        assert_eq!(replacements.len(), 1);
        assert_eq!(replacements[0].kind, PositionKind::GammaScalpRebalanced);
    }
}
