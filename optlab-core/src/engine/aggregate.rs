//! Results aggregation over the trade stream.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::domain::{
    AdjustmentStats, BacktestResults, DailyResults, Regime, RegimeResults, SetupResults,
    SymbolResults, Trade,
};

use super::context::SymbolContext;
use super::correlation::CorrelationTracker;

/// Maximum drawdown of the trade-ordered cumulative P&L curve, as a
/// non-negative magnitude.
///
/// Trade insertion order defines the curve, not time order across symbols.
pub fn max_drawdown(trades: &[Trade]) -> f64 {
    let mut cumulative = 0.0;
    let mut peak = 0.0;
    let mut max_dd = 0.0;
    for trade in trades {
        cumulative += trade.pnl;
        if cumulative > peak {
            peak = cumulative;
        }
        let drawdown = peak - cumulative;
        if drawdown > max_dd {
            max_dd = drawdown;
        }
    }
    max_dd
}

pub(crate) fn daily_results(
    date: NaiveDate,
    day_trades: &[Trade],
    ctx: &SymbolContext,
) -> DailyResults {
    let mut setup_pnls: BTreeMap<String, f64> = BTreeMap::new();
    let mut symbol_pnls: BTreeMap<String, f64> = BTreeMap::new();
    for trade in day_trades {
        *setup_pnls.entry(trade.setup_id.clone()).or_default() += trade.pnl;
        *symbol_pnls.entry(trade.symbol.clone()).or_default() += trade.pnl;
    }
    // Setups that traded nothing still appear, with zero.
    for strategy in &ctx.strategies {
        setup_pnls
            .entry(strategy.params().setup_id.clone())
            .or_default();
    }

    DailyResults {
        date,
        daily_pnl: day_trades.iter().map(|t| t.pnl).sum(),
        trades_count: day_trades.len(),
        positions_forced_closed_at_job_end: ctx.forced_closed_at_job_end,
        setup_pnls,
        symbol_pnls,
    }
}

pub(crate) fn daily_results_multi(
    date: NaiveDate,
    day_trades: &[Trade],
    contexts: &[SymbolContext],
) -> DailyResults {
    let mut setup_pnls: BTreeMap<String, f64> = BTreeMap::new();
    let mut symbol_pnls: BTreeMap<String, f64> = BTreeMap::new();
    for trade in day_trades {
        *setup_pnls.entry(trade.setup_id.clone()).or_default() += trade.pnl;
        *symbol_pnls.entry(trade.symbol.clone()).or_default() += trade.pnl;
    }
    for ctx in contexts {
        symbol_pnls.entry(ctx.symbol.clone()).or_default();
        for strategy in &ctx.strategies {
            setup_pnls
                .entry(strategy.params().setup_id.clone())
                .or_default();
        }
    }

    DailyResults {
        date,
        daily_pnl: day_trades.iter().map(|t| t.pnl).sum(),
        trades_count: day_trades.len(),
        positions_forced_closed_at_job_end: contexts
            .iter()
            .map(|c| c.forced_closed_at_job_end)
            .sum(),
        setup_pnls,
        symbol_pnls,
    }
}

/// Merge per-symbol adjustment stats into one run-level record. Averages
/// are weighted by trade counts; per-(regime, setup) entries are unioned.
pub(crate) fn merge_adjustment_stats(stats: Vec<AdjustmentStats>) -> Option<AdjustmentStats> {
    if stats.is_empty() {
        return None;
    }

    let mut merged = AdjustmentStats::default();
    let mut accuracy_sources = 0usize;
    for s in stats {
        merged.total_adjustments += s.total_adjustments;
        merged.static_avg_pnl += s.static_avg_pnl * s.static_trade_count as f64;
        merged.dynamic_avg_pnl += s.dynamic_avg_pnl * s.dynamic_trade_count as f64;
        merged.static_trade_count += s.static_trade_count;
        merged.dynamic_trade_count += s.dynamic_trade_count;
        if s.regime_accuracy > 0.0 {
            merged.regime_accuracy += s.regime_accuracy;
            accuracy_sources += 1;
        }
        merged.adjustment_performance.extend(s.adjustment_performance);
    }
    if merged.static_trade_count > 0 {
        merged.static_avg_pnl /= merged.static_trade_count as f64;
    }
    if merged.dynamic_trade_count > 0 {
        merged.dynamic_avg_pnl /= merged.dynamic_trade_count as f64;
    }
    if accuracy_sources > 0 {
        merged.regime_accuracy /= accuracy_sources as f64;
    }
    merged.static_vs_dynamic_comparison = merged.dynamic_avg_pnl - merged.static_avg_pnl;
    Some(merged)
}

pub(crate) fn build_results(
    trades: Vec<Trade>,
    daily_results: Vec<DailyResults>,
    dynamic_adjustments: Option<AdjustmentStats>,
    tracker: Option<&CorrelationTracker>,
) -> BacktestResults {
    let total_pnl: f64 = trades.iter().map(|t| t.pnl).sum();
    let total_trades = trades.len();
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    let win_rate = if total_trades > 0 {
        winners as f64 / total_trades as f64
    } else {
        0.0
    };

    BacktestResults {
        total_pnl,
        total_trades,
        win_rate,
        max_drawdown: max_drawdown(&trades),
        setup_performance: setup_performance(&trades),
        symbol_performance: symbol_performance(&trades, tracker),
        regime_performance: regime_performance(&trades),
        daily_results,
        trade_log: trades,
        dynamic_adjustments,
    }
}

fn setup_performance(trades: &[Trade]) -> BTreeMap<String, SetupResults> {
    let mut by_setup: BTreeMap<String, Vec<&Trade>> = BTreeMap::new();
    for trade in trades {
        by_setup.entry(trade.setup_id.clone()).or_default().push(trade);
    }

    by_setup
        .into_iter()
        .map(|(setup_id, setup_trades)| {
            let total_pnl: f64 = setup_trades.iter().map(|t| t.pnl).sum();
            let wins: Vec<&&Trade> = setup_trades.iter().filter(|t| t.pnl > 0.0).collect();
            let losses: Vec<&&Trade> = setup_trades.iter().filter(|t| t.pnl < 0.0).collect();

            let mut symbol_pnls: BTreeMap<String, f64> = BTreeMap::new();
            for trade in &setup_trades {
                *symbol_pnls.entry(trade.symbol.clone()).or_default() += trade.pnl;
            }

            let results = SetupResults {
                setup_id: setup_id.clone(),
                total_pnl,
                total_trades: setup_trades.len(),
                win_rate: wins.len() as f64 / setup_trades.len() as f64,
                avg_win: if wins.is_empty() {
                    0.0
                } else {
                    wins.iter().map(|t| t.pnl).sum::<f64>() / wins.len() as f64
                },
                avg_loss: if losses.is_empty() {
                    0.0
                } else {
                    losses.iter().map(|t| t.pnl).sum::<f64>() / losses.len() as f64
                },
                symbol_pnls,
            };
            (setup_id, results)
        })
        .collect()
}

fn symbol_performance(
    trades: &[Trade],
    tracker: Option<&CorrelationTracker>,
) -> BTreeMap<String, SymbolResults> {
    let mut by_symbol: BTreeMap<String, Vec<&Trade>> = BTreeMap::new();
    for trade in trades {
        by_symbol.entry(trade.symbol.clone()).or_default().push(trade);
    }

    by_symbol
        .into_iter()
        .map(|(symbol, symbol_trades)| {
            let wins = symbol_trades.iter().filter(|t| t.pnl > 0.0).count();
            let results = SymbolResults {
                symbol: symbol.clone(),
                total_pnl: symbol_trades.iter().map(|t| t.pnl).sum(),
                total_trades: symbol_trades.len(),
                win_rate: wins as f64 / symbol_trades.len() as f64,
                correlation_with_other_symbols: tracker
                    .map(|t| t.correlations_for(&symbol))
                    .unwrap_or_default(),
            };
            (symbol, results)
        })
        .collect()
}

fn regime_performance(trades: &[Trade]) -> BTreeMap<String, RegimeResults> {
    let mut by_regime: BTreeMap<String, Vec<&Trade>> = BTreeMap::new();
    for trade in trades {
        let regime = trade.entry_regime.unwrap_or(Regime::Unknown);
        by_regime
            .entry(regime.as_str().to_string())
            .or_default()
            .push(trade);
    }

    by_regime
        .into_iter()
        .map(|(regime, regime_trades)| {
            let wins = regime_trades.iter().filter(|t| t.pnl > 0.0).count();
            let results = RegimeResults {
                regime: regime.clone(),
                total_pnl: regime_trades.iter().map(|t| t.pnl).sum(),
                total_trades: regime_trades.len(),
                win_rate: wins as f64 / regime_trades.len() as f64,
            };
            (regime, results)
        })
        .collect()
}
