//! Position manager — open-position set, multi-leg P&L, exit evaluation.
//!
//! One manager per trading context (one symbol). Every timestamp it
//! recomputes each open position's P&L from its leg descriptors and the
//! current chain, evaluates exit conditions in priority order, and closes
//! matching positions into immutable [`Trade`] records.
//!
//! Legs whose strike/type is absent from the chain this tick are skipped,
//! modeling partial data availability. A position that can never price any
//! leg simply never meets a P&L-based exit and is eventually closed by time.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::domain::{
    ExitReason, LegAction, MarketSnapshot, OptionChain, Position, PositionKind, Trade,
};
use crate::strategy::Strategy;

/// Tunable early-exit heuristics, surfaced as configuration rather than
/// buried constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitHeuristics {
    /// Close an iron condor once this fraction of max profit is captured.
    pub iron_condor_profit_fraction: f64,
    /// Close a butterfly once this fraction of max profit is captured.
    pub butterfly_profit_fraction: f64,
    /// Ratio spreads stop out at this fraction of the configured stop.
    pub ratio_spread_stop_fraction: f64,
    /// Unlimited-risk positions stop out at this fraction of the stop.
    pub unlimited_risk_stop_fraction: f64,
}

impl Default for ExitHeuristics {
    fn default() -> Self {
        Self {
            iron_condor_profit_fraction: 0.5,
            butterfly_profit_fraction: 0.6,
            ratio_spread_stop_fraction: 0.75,
            unlimited_risk_stop_fraction: 0.5,
        }
    }
}

/// Aggregated gamma-scalping metrics across the open set.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GammaScalpingMetrics {
    pub total_gamma_pnl: f64,
    pub total_theta_pnl: f64,
    pub total_delta: f64,
    pub avg_delta: f64,
    pub total_rebalances: u32,
    pub gamma_positions: usize,
}

/// P&L for a single leg with slippage applied asymmetrically.
///
/// A sold leg receives less on entry and pays more on exit; a bought leg is
/// the mirror. Increasing slippage therefore strictly decreases realized
/// P&L for both actions.
pub fn leg_pnl(
    entry_price: f64,
    current_price: f64,
    action: LegAction,
    quantity: i64,
    lot_size: i64,
    slippage: f64,
) -> f64 {
    let size = (quantity * lot_size) as f64;
    match action {
        LegAction::Sell => {
            let effective_entry = entry_price - slippage;
            let effective_exit = current_price + slippage;
            (effective_entry - effective_exit) * size
        }
        LegAction::Buy => {
            let effective_entry = entry_price + slippage;
            let effective_exit = current_price - slippage;
            (effective_exit - effective_entry) * size
        }
    }
}

pub struct PositionManager {
    symbol: String,
    /// Open set keyed by the monotonically increasing position counter;
    /// iteration follows insertion order.
    positions: BTreeMap<u64, (String, Position)>,
    counter: u64,
    heuristics: ExitHeuristics,
}

impl PositionManager {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self::with_heuristics(symbol, ExitHeuristics::default())
    }

    pub fn with_heuristics(symbol: impl Into<String>, heuristics: ExitHeuristics) -> Self {
        Self {
            symbol: symbol.into(),
            positions: BTreeMap::new(),
            counter: 0,
            heuristics,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Add a position to the open set; returns its id
    /// (`"{setup_id}_{counter}"`).
    pub fn add_position(&mut self, position: Position) -> String {
        let id = format!("{}_{}", position.setup_id, self.counter);
        self.positions.insert(self.counter, (id.clone(), position));
        self.counter += 1;
        id
    }

    pub fn open_position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn open_positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values().map(|(_, p)| p)
    }

    /// Sum of `current_pnl` across the open set.
    pub fn get_total_pnl(&self) -> f64 {
        self.positions.values().map(|(_, p)| p.current_pnl).sum()
    }

    /// Sum of `current_pnl` across one setup's open positions.
    pub fn get_setup_pnl(&self, setup_id: &str) -> f64 {
        self.positions
            .values()
            .filter(|(_, p)| p.setup_id == setup_id)
            .map(|(_, p)| p.current_pnl)
            .sum()
    }

    /// Clear the open set and restart the id counter (new trading day).
    pub fn reset_positions(&mut self) {
        self.positions.clear();
        self.counter = 0;
    }

    /// Mark every open position to the snapshot, evaluate exits, and close
    /// whatever fires. Returns the trades closed this call, in open-set
    /// iteration order.
    pub fn update_positions(
        &mut self,
        snapshot: &MarketSnapshot<'_>,
        date: NaiveDate,
    ) -> Vec<Trade> {
        let mut closed = Vec::new();
        let mut to_remove = Vec::new();

        for (&seq, (_, position)) in self.positions.iter_mut() {
            position.current_pnl =
                compute_position_pnl_inner(position, snapshot.chain);

            if let Some(reason) =
                check_exit_conditions(position, snapshot.timestamp, &self.heuristics)
            {
                closed.push(close_position(
                    &self.symbol,
                    position,
                    snapshot,
                    reason,
                    date,
                ));
                to_remove.push(seq);
            }
        }

        for seq in to_remove {
            self.positions.remove(&seq);
        }
        closed
    }

    /// Recompute one position's P&L from its legs and the snapshot, without
    /// mutating anything. Exposed so the conservation property is testable.
    pub fn compute_position_pnl(
        &self,
        position: &Position,
        snapshot: &MarketSnapshot<'_>,
    ) -> f64 {
        compute_position_pnl_inner(position, snapshot.chain)
    }

    /// Evaluate the exit-condition ladder for a position at a timestamp.
    /// First match wins.
    pub fn check_exit_reason(&self, position: &Position, timeindex: i64) -> Option<ExitReason> {
        check_exit_conditions(position, timeindex, &self.heuristics)
    }

    /// Force-close positions whose owning strategy's close time has passed.
    ///
    /// Runs independently of `update_positions` so that a strategy's close
    /// time is honored even when its symbol has no fresh market data at this
    /// instant; legs close at 0.0 for lack of quotes.
    pub fn check_time_based_closures(
        &mut self,
        timeindex: i64,
        strategies: &[Box<dyn Strategy>],
        date: NaiveDate,
    ) -> Vec<Trade> {
        let close_times: BTreeMap<&str, i64> = strategies
            .iter()
            .map(|s| (s.params().setup_id.as_str(), s.params().close_timeindex))
            .collect();

        let empty_chain = OptionChain::default();
        let snapshot = MarketSnapshot::new(timeindex, 0.0, &empty_chain);

        let mut closed = Vec::new();
        let mut to_remove = Vec::new();

        for (&seq, (_, position)) in self.positions.iter_mut() {
            let close_time = close_times
                .get(position.setup_id.as_str())
                .copied()
                .unwrap_or(position.force_close_timeindex);

            if timeindex >= close_time {
                closed.push(close_position(
                    &self.symbol,
                    position,
                    &snapshot,
                    ExitReason::TimeBased,
                    date,
                ));
                to_remove.push(seq);
            }
        }

        for seq in to_remove {
            self.positions.remove(&seq);
        }
        closed
    }

    /// Unwind the entire open set. The set is guaranteed empty on return and
    /// the trade count equals the pre-call open-position count.
    pub fn close_all_positions(
        &mut self,
        snapshot: &MarketSnapshot<'_>,
        reason: ExitReason,
        date: NaiveDate,
    ) -> Vec<Trade> {
        let closed: Vec<Trade> = self
            .positions
            .values_mut()
            .map(|(_, position)| close_position(&self.symbol, position, snapshot, reason, date))
            .collect();
        self.positions.clear();
        closed
    }

    /// Unwind one setup's positions; the rest of the open set is untouched.
    pub fn close_setup_positions(
        &mut self,
        setup_id: &str,
        snapshot: &MarketSnapshot<'_>,
        reason: ExitReason,
        date: NaiveDate,
    ) -> Vec<Trade> {
        let mut closed = Vec::new();
        let mut to_remove = Vec::new();

        for (&seq, (_, position)) in self.positions.iter_mut() {
            if position.setup_id == setup_id {
                closed.push(close_position(&self.symbol, position, snapshot, reason, date));
                to_remove.push(seq);
            }
        }
        for seq in to_remove {
            self.positions.remove(&seq);
        }
        closed
    }

    /// Unwind everything at the day's job-end index.
    pub fn force_close_at_job_end(
        &mut self,
        snapshot: &MarketSnapshot<'_>,
        date: NaiveDate,
    ) -> Vec<Trade> {
        self.close_all_positions(snapshot, ExitReason::JobEnd, date)
    }

    /// Drive gamma-scalping positions through their owning strategy's
    /// rebalancing capability: accrue gamma/theta, re-estimate delta, and
    /// either close-and-reopen on a rebalance trigger or close outright when
    /// the strategy prioritizes closure.
    pub fn update_gamma_scalping_positions(
        &mut self,
        snapshot: &MarketSnapshot<'_>,
        strategies: &[Box<dyn Strategy>],
        date: NaiveDate,
    ) -> Vec<Trade> {
        let mut closed = Vec::new();
        let mut to_remove = Vec::new();
        let mut reopened = Vec::new();

        for (&seq, (id, position)) in self.positions.iter_mut() {
            if !position.kind.is_gamma_scalp() {
                continue;
            }
            let Some(scalper) = strategies
                .iter()
                .find(|s| s.params().setup_id == position.setup_id)
                .and_then(|s| s.as_gamma_scalper())
            else {
                continue;
            };

            let breakdown = scalper.gamma_theta_pnl(snapshot, position);
            position.gamma_pnl = breakdown.gamma_pnl;
            position.theta_pnl = breakdown.theta_pnl;
            position.current_delta =
                scalper.estimate_position_delta(snapshot, &position.strikes);
            position.last_gamma_spot = Some(snapshot.spot_price);
            position.last_gamma_timeindex = Some(snapshot.timestamp);

            if scalper.should_rebalance(snapshot.timestamp, snapshot, position) {
                let rebalance_count = position.rebalance_count;
                closed.push(close_position(
                    &self.symbol,
                    position,
                    snapshot,
                    ExitReason::Rebalance,
                    date,
                ));
                to_remove.push(seq);

                for mut replacement in scalper.rebalance_position(snapshot, position) {
                    replacement.rebalance_count = rebalance_count + 1;
                    reopened.push(replacement);
                }
            } else if scalper.should_prioritize_closure(snapshot.timestamp) {
                tracing::debug!(position = %id, "gamma scalp prioritizing closure");
                closed.push(close_position(
                    &self.symbol,
                    position,
                    snapshot,
                    ExitReason::PriorityClose,
                    date,
                ));
                to_remove.push(seq);
            }
        }

        for seq in to_remove {
            self.positions.remove(&seq);
        }
        for replacement in reopened {
            self.add_position(replacement);
        }
        closed
    }

    /// Aggregate gamma-scalping metrics across the open set.
    pub fn gamma_scalping_metrics(&self) -> GammaScalpingMetrics {
        let mut metrics = GammaScalpingMetrics::default();
        for (_, position) in self.positions.values() {
            if position.kind.is_gamma_scalp() {
                metrics.total_gamma_pnl += position.gamma_pnl;
                metrics.total_theta_pnl += position.theta_pnl;
                metrics.total_delta += position.current_delta;
                metrics.total_rebalances += position.rebalance_count;
                metrics.gamma_positions += 1;
            }
        }
        metrics.avg_delta = metrics.total_delta / metrics.gamma_positions.max(1) as f64;
        metrics
    }
}

fn compute_position_pnl_inner(position: &Position, chain: &OptionChain) -> f64 {
    let mut total = 0.0;
    for leg in &position.legs {
        let Some(descriptor) = leg.descriptor else {
            continue;
        };
        let Some(current_price) = chain.price(descriptor.option_type, descriptor.strike) else {
            // Leg unpriced this tick.
            continue;
        };
        total += leg_pnl(
            leg.entry_price,
            current_price,
            descriptor.action,
            descriptor.quantity,
            position.lot_size,
            position.slippage,
        );
    }
    total
}

fn check_exit_conditions(
    position: &Position,
    timeindex: i64,
    heuristics: &ExitHeuristics,
) -> Option<ExitReason> {
    if position.target_pnl > 0.0 && position.current_pnl >= position.target_pnl {
        return Some(ExitReason::Target);
    }

    if position.stop_loss_pnl < 0.0 && position.current_pnl <= position.stop_loss_pnl {
        return Some(ExitReason::StopLoss);
    }

    if position.unlimited_risk
        && position.current_pnl
            <= position.stop_loss_pnl * heuristics.unlimited_risk_stop_fraction
    {
        return Some(ExitReason::UnlimitedRiskProtection);
    }

    match position.kind {
        PositionKind::IronCondor => {
            if position.max_profit > 0.0
                && position.current_pnl
                    >= position.max_profit * heuristics.iron_condor_profit_fraction
            {
                return Some(ExitReason::EarlyProfitTarget);
            }
        }
        PositionKind::Butterfly => {
            if position.max_profit > 0.0
                && position.current_pnl
                    >= position.max_profit * heuristics.butterfly_profit_fraction
            {
                return Some(ExitReason::EarlyProfitTarget);
            }
        }
        PositionKind::RatioSpread => {
            if position.current_pnl
                <= position.stop_loss_pnl * heuristics.ratio_spread_stop_fraction
            {
                return Some(ExitReason::RatioSpreadProtection);
            }
        }
        _ => {}
    }

    if timeindex >= position.force_close_timeindex {
        return Some(ExitReason::TimeBased);
    }

    None
}

fn close_position(
    symbol: &str,
    position: &Position,
    snapshot: &MarketSnapshot<'_>,
    reason: ExitReason,
    date: NaiveDate,
) -> Trade {
    // Exit prices are recorded without slippage; the final P&L applies it.
    // Legs without a quote (or without a descriptor) record 0.0.
    let mut exit_prices = BTreeMap::new();
    let mut final_pnl = 0.0;

    for leg in &position.legs {
        let exit_price = leg
            .descriptor
            .and_then(|d| snapshot.chain.price(d.option_type, d.strike))
            .unwrap_or(0.0);
        exit_prices.insert(leg.key.clone(), exit_price);

        if let Some(descriptor) = leg.descriptor {
            final_pnl += leg_pnl(
                leg.entry_price,
                exit_price,
                descriptor.action,
                descriptor.quantity,
                position.lot_size,
                position.slippage,
            );
        }
    }

    Trade {
        setup_id: position.setup_id.clone(),
        symbol: symbol.to_string(),
        date,
        entry_timeindex: position.entry_timeindex,
        exit_timeindex: snapshot.timestamp,
        entry_prices: position.entry_prices(),
        exit_prices,
        strikes: position.strikes.clone(),
        quantity: position.quantity,
        pnl: final_pnl,
        exit_reason: reason,
        entry_regime: position.entry_regime,
        gamma_pnl: position.gamma_pnl,
        theta_pnl: position.theta_pnl,
        final_delta: position.current_delta,
        rebalance_count: position.rebalance_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OptionType;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, 13).unwrap()
    }

    fn straddle_chain(ce: f64, pe: f64) -> OptionChain {
        let mut chain = OptionChain::default();
        chain.insert(OptionType::Call, 580.0, ce);
        chain.insert(OptionType::Put, 575.0, pe);
        chain
    }

    fn short_straddle(target: f64, stop: f64) -> Position {
        let mut pos = Position::new("straddle_1", 1000, PositionKind::Sell)
            .with_targets(target, stop)
            .with_force_close(4650);
        pos.strikes.insert("CE".into(), 580.0);
        pos.strikes.insert("PE".into(), 575.0);
        pos.add_leg("CE_580", 5.2);
        pos.add_leg("PE_575", 4.8);
        pos
    }

    #[test]
    fn position_ids_are_monotonic_per_setup() {
        let mut pm = PositionManager::new("QQQ");
        let a = pm.add_position(short_straddle(50.0, 100.0));
        let b = pm.add_position(short_straddle(50.0, 100.0));
        assert_eq!(a, "straddle_1_0");
        assert_eq!(b, "straddle_1_1");
    }

    #[test]
    fn pnl_skips_unpriced_legs() {
        let pm = PositionManager::new("QQQ");
        let pos = short_straddle(50.0, 100.0);

        // Chain only quotes the call.
        let mut chain = OptionChain::default();
        chain.insert(OptionType::Call, 580.0, 4.7);
        let snap = MarketSnapshot::new(1100, 580.0, &chain);

        let pnl = pm.compute_position_pnl(&pos, &snap);
        let expected = leg_pnl(5.2, 4.7, LegAction::Sell, 1, 100, 0.005);
        assert!((pnl - expected).abs() < 1e-10);
    }

    #[test]
    fn update_closes_on_target_and_removes_position() {
        let mut pm = PositionManager::new("QQQ");
        pm.add_position(short_straddle(50.0, 100.0));

        let chain = straddle_chain(4.7, 4.3);
        let snap = MarketSnapshot::new(1100, 580.0, &chain);
        let trades = pm.update_positions(&snap, date());

        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].exit_reason, ExitReason::Target);
        assert!(pm.is_empty());
        // (5.195 - 4.705 + 4.795 - 4.305) * 100
        assert!((trades[0].pnl - 98.0).abs() < 1e-9);
    }

    #[test]
    fn stop_loss_fires_on_adverse_move() {
        let mut pm = PositionManager::new("QQQ");
        pm.add_position(short_straddle(500.0, 50.0));

        let chain = straddle_chain(6.2, 4.9);
        let snap = MarketSnapshot::new(1100, 582.0, &chain);
        let trades = pm.update_positions(&snap, date());

        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].exit_reason, ExitReason::StopLoss);
    }

    #[test]
    fn exit_ladder_checks_target_before_stop() {
        let pm = PositionManager::new("QQQ");
        let mut pos = short_straddle(50.0, 50.0);

        pos.current_pnl = 60.0;
        assert_eq!(pm.check_exit_reason(&pos, 1100), Some(ExitReason::Target));
        pos.current_pnl = -60.0;
        assert_eq!(pm.check_exit_reason(&pos, 1100), Some(ExitReason::StopLoss));
    }

    #[test]
    fn unlimited_risk_tightens_the_stop() {
        let pm = PositionManager::new("QQQ");
        let mut pos = short_straddle(500.0, 100.0).with_unlimited_risk(true);
        pos.strikes.clear();

        // Between half the stop and the stop: tightened protection fires.
        pos.current_pnl = -55.0;
        assert_eq!(
            pm.check_exit_reason(&pos, 1100),
            Some(ExitReason::UnlimitedRiskProtection)
        );
        // Past the full stop: the plain stop wins (checked earlier).
        pos.current_pnl = -120.0;
        assert_eq!(pm.check_exit_reason(&pos, 1100), Some(ExitReason::StopLoss));
    }

    #[test]
    fn iron_condor_early_profit_beats_time_exit() {
        let pm = PositionManager::new("QQQ");
        let mut pos = Position::new("ic_1", 1000, PositionKind::IronCondor)
            .with_targets(500.0, 100.0)
            .with_max_profit(120.0)
            .with_force_close(1100);
        pos.current_pnl = 61.0;
        assert_eq!(
            pm.check_exit_reason(&pos, 1100),
            Some(ExitReason::EarlyProfitTarget)
        );
    }

    #[test]
    fn ratio_spread_stops_earlier_than_configured() {
        let pm = PositionManager::new("QQQ");
        let mut pos = Position::new("ratio_1", 1000, PositionKind::RatioSpread)
            .with_targets(500.0, 100.0);
        pos.current_pnl = -80.0; // beyond 75% of the stop, short of the stop
        assert_eq!(
            pm.check_exit_reason(&pos, 1100),
            Some(ExitReason::RatioSpreadProtection)
        );
    }

    #[test]
    fn time_based_exit_is_last_resort() {
        let pm = PositionManager::new("QQQ");
        let mut pos = short_straddle(50.0, 100.0);
        pos.current_pnl = 10.0;
        assert_eq!(pm.check_exit_reason(&pos, 4649), None);
        assert_eq!(pm.check_exit_reason(&pos, 4650), Some(ExitReason::TimeBased));
    }

    #[test]
    fn close_all_empties_the_set_and_counts_match() {
        let mut pm = PositionManager::new("QQQ");
        for _ in 0..3 {
            pm.add_position(short_straddle(50.0, 100.0));
        }
        let chain = straddle_chain(5.0, 4.5);
        let snap = MarketSnapshot::new(2000, 580.0, &chain);

        let before = pm.open_position_count();
        let trades = pm.close_all_positions(&snap, ExitReason::DailyLimit, date());
        assert_eq!(trades.len(), before);
        assert!(pm.is_empty());
        assert!(trades.iter().all(|t| t.exit_reason == ExitReason::DailyLimit));
    }

    #[test]
    fn close_setup_positions_filters_by_setup() {
        let mut pm = PositionManager::new("QQQ");
        pm.add_position(short_straddle(50.0, 100.0));
        let mut other = short_straddle(50.0, 100.0);
        other.setup_id = "other".into();
        pm.add_position(other);

        let chain = straddle_chain(5.0, 4.5);
        let snap = MarketSnapshot::new(2000, 580.0, &chain);
        let trades = pm.close_setup_positions("straddle_1", &snap, ExitReason::SetupClose, date());

        assert_eq!(trades.len(), 1);
        assert_eq!(pm.open_position_count(), 1);
    }

    #[test]
    fn total_pnl_matches_independent_recomputation() {
        let mut pm = PositionManager::new("QQQ");
        pm.add_position(short_straddle(1000.0, 1000.0));
        pm.add_position(short_straddle(1000.0, 1000.0));

        let chain = straddle_chain(5.0, 4.6);
        let snap = MarketSnapshot::new(1100, 580.0, &chain);
        pm.update_positions(&snap, date());

        let recomputed: f64 = pm
            .open_positions()
            .map(|p| pm.compute_position_pnl(p, &snap))
            .sum();
        assert!((pm.get_total_pnl() - recomputed).abs() < 1e-10);
    }

    #[test]
    fn slippage_strictly_hurts_both_sides() {
        let base_sell = leg_pnl(5.2, 4.7, LegAction::Sell, 1, 100, 0.005);
        let worse_sell = leg_pnl(5.2, 4.7, LegAction::Sell, 1, 100, 0.01);
        assert!(worse_sell < base_sell);

        let base_buy = leg_pnl(4.7, 5.2, LegAction::Buy, 1, 100, 0.005);
        let worse_buy = leg_pnl(4.7, 5.2, LegAction::Buy, 1, 100, 0.01);
        assert!(worse_buy < base_buy);
    }

    #[test]
    fn time_based_closure_uses_strategy_close_time() {
        use crate::strategy::{StrategyParams, StrikeSelection};

        struct FixedStrategy(StrategyParams);
        impl Strategy for FixedStrategy {
            fn params(&self) -> &StrategyParams {
                &self.0
            }
            fn set_params(&mut self, params: StrategyParams) {
                self.0 = params;
            }
            fn check_entry_condition(&self, _t: i64) -> bool {
                false
            }
            fn select_strikes(
                &self,
                _spot: f64,
                _chain: &OptionChain,
            ) -> BTreeMap<String, f64> {
                BTreeMap::new()
            }
            fn create_positions(&mut self, _snapshot: &MarketSnapshot<'_>) -> Vec<Position> {
                Vec::new()
            }
        }

        let params = StrategyParams {
            setup_id: "straddle_1".into(),
            target_pct: 50.0,
            stop_loss_pct: 100.0,
            entry_timeindex: 1000,
            close_timeindex: 3000,
            strike_selection: StrikeSelection::Premium,
            scalping_price: 0.40,
            strikes_away: 2,
        };
        let strategies: Vec<Box<dyn Strategy>> = vec![Box::new(FixedStrategy(params))];

        let mut pm = PositionManager::new("QQQ");
        pm.add_position(short_straddle(50.0, 100.0)); // force_close 4650

        assert!(pm
            .check_time_based_closures(2999, &strategies, date())
            .is_empty());
        let trades = pm.check_time_based_closures(3000, &strategies, date());
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].exit_reason, ExitReason::TimeBased);
        assert!(pm.is_empty());
    }
}
