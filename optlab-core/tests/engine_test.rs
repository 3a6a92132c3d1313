//! Engine integration tests: day lifecycle, risk halts, job end, and
//! multi-symbol coordination, driven by a scripted in-memory data source.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use optlab_core::data::DataSource;
use optlab_core::domain::{
    ExitReason, MarketSnapshot, OptionChain, OptionType, Position, PositionKind, TradingDayData,
};
use optlab_core::engine::{BacktestEngine, EngineConfig};
use optlab_core::strategy::{Strategy, StrategyParams};

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 8, 13).unwrap()
}

/// Scripted source: one day per symbol, chain prices keyed per timestamp.
struct ScriptedSource {
    days: BTreeMap<String, TradingDayData>,
}

impl ScriptedSource {
    fn new() -> Self {
        Self {
            days: BTreeMap::new(),
        }
    }

    fn add_day(&mut self, symbol: &str, day: TradingDayData) {
        self.days.insert(symbol.to_string(), day);
    }
}

impl DataSource for ScriptedSource {
    fn available_dates(&self, symbol: &str) -> Vec<NaiveDate> {
        self.days.get(symbol).map(|d| vec![d.date]).unwrap_or_default()
    }

    fn load_trading_day(&self, symbol: &str, date: NaiveDate) -> Option<TradingDayData> {
        self.days.get(symbol).filter(|d| d.date == date).cloned()
    }
}

/// Builds a day where the CE 580 quote follows `ce_prices` across
/// timestamps 1000, 1001, ... and spot stays flat.
fn scripted_day(ce_prices: &[f64], job_end: i64) -> TradingDayData {
    let mut spot = BTreeMap::new();
    let mut options = BTreeMap::new();
    for (i, &price) in ce_prices.iter().enumerate() {
        let ts = 1000 + i as i64;
        let mut chain = OptionChain::default();
        chain.insert(OptionType::Call, 580.0, price);
        spot.insert(ts, 580.0);
        options.insert(ts, chain);
    }
    TradingDayData {
        date: date(),
        spot,
        options,
        job_end_idx: job_end,
        metadata: BTreeMap::new(),
    }
}

/// Opens one short CE position at a fixed timestamp with fixed targets.
struct SingleShotStrategy {
    params: StrategyParams,
    entered: bool,
    quantity: i64,
}

impl SingleShotStrategy {
    fn new(setup_id: &str, entry: i64, target: f64, stop: f64) -> Self {
        let mut params = StrategyParams::new(setup_id, target, stop).with_entry(entry);
        params.close_timeindex = 100_000; // never time out in these tests
        Self {
            params,
            entered: false,
            quantity: 1,
        }
    }

    fn with_quantity(mut self, quantity: i64) -> Self {
        self.quantity = quantity;
        self
    }
}

impl Strategy for SingleShotStrategy {
    fn params(&self) -> &StrategyParams {
        &self.params
    }

    fn set_params(&mut self, params: StrategyParams) {
        self.params = params;
    }

    fn check_entry_condition(&self, timeindex: i64) -> bool {
        !self.entered && timeindex == self.params.entry_timeindex
    }

    fn select_strikes(&self, _spot: f64, _chain: &OptionChain) -> BTreeMap<String, f64> {
        BTreeMap::from([("CE".to_string(), 580.0)])
    }

    fn create_positions(&mut self, snapshot: &MarketSnapshot<'_>) -> Vec<Position> {
        let Some(price) = snapshot.chain.price(OptionType::Call, 580.0) else {
            return Vec::new();
        };
        self.entered = true;
        let mut pos = Position::new(&self.params.setup_id, snapshot.timestamp, PositionKind::Sell)
            .with_targets(self.params.target_pct, self.params.stop_loss_pct)
            .with_quantity(self.quantity)
            .with_force_close(self.params.close_timeindex);
        pos.strikes.insert("CE".into(), 580.0);
        pos.add_leg("CE_580.0", price);
        vec![pos]
    }

    fn reset_daily_state(&mut self) {
        self.entered = false;
    }
}

// ── Daily limit halts the day ────────────────────────────────────────

#[test]
fn daily_limit_closes_every_open_position_with_daily_limit_reason() {
    // Two positions, no target/stop of their own (0 disables both), with a
    // rising quote that drives combined P&L past -1000.
    let mut source = ScriptedSource::new();
    // Entry at 5.0; by ts 1003 the quote is 10.1:
    // each position P&L = (4.995 - 10.105) * 100 = -511, combined -1022.
    source.add_day("QQQ", scripted_day(&[5.0, 6.0, 8.0, 10.1, 10.1, 10.1], 2_000));

    let factory = || -> Vec<Box<dyn Strategy>> {
        vec![
            Box::new(SingleShotStrategy::new("a", 1000, 0.0, 0.0)),
            Box::new(SingleShotStrategy::new("b", 1000, 0.0, 0.0)),
        ]
    };
    let engine = BacktestEngine::new(
        Box::new(source),
        Box::new(factory),
        EngineConfig::new(1000.0),
    );

    let results = engine.run_backtest("QQQ", date(), date()).unwrap();

    assert_eq!(results.total_trades, 2);
    assert!(results
        .trade_log
        .iter()
        .all(|t| t.exit_reason == ExitReason::DailyLimit));
    // The day halts at the breaching tick: both trades exit at ts 1003.
    assert!(results.trade_log.iter().all(|t| t.exit_timeindex == 1003));
    assert!(results.total_pnl <= -1000.0);
}

#[test]
fn under_the_limit_the_day_runs_to_exhaustion() {
    let mut source = ScriptedSource::new();
    source.add_day("QQQ", scripted_day(&[5.0, 5.5, 6.0, 6.0], 2_000));

    let factory =
        || -> Vec<Box<dyn Strategy>> { vec![Box::new(SingleShotStrategy::new("a", 1000, 0.0, 0.0))] };
    let engine = BacktestEngine::new(
        Box::new(source),
        Box::new(factory),
        EngineConfig::new(1000.0),
    );
    let results = engine.run_backtest("QQQ", date(), date()).unwrap();

    // Loss of ~(4.995-6.005)*100 = -101 never breaches 1000; the position
    // stays open through the day and is never closed (no job end reached).
    assert_eq!(results.total_trades, 0);
    assert_eq!(results.daily_results.len(), 1);
}

// ── Job end ──────────────────────────────────────────────────────────

#[test]
fn job_end_force_closes_open_positions() {
    let mut source = ScriptedSource::new();
    source.add_day("QQQ", scripted_day(&[5.0, 5.0, 5.0, 5.0, 5.0], 1003));

    let factory =
        || -> Vec<Box<dyn Strategy>> { vec![Box::new(SingleShotStrategy::new("a", 1000, 0.0, 0.0))] };
    let engine = BacktestEngine::new(
        Box::new(source),
        Box::new(factory),
        EngineConfig::new(1_000_000.0),
    );
    let results = engine.run_backtest("QQQ", date(), date()).unwrap();

    assert_eq!(results.total_trades, 1);
    assert_eq!(results.trade_log[0].exit_reason, ExitReason::JobEnd);
    assert_eq!(results.trade_log[0].exit_timeindex, 1003);
    assert_eq!(
        results.daily_results[0].positions_forced_closed_at_job_end,
        1
    );
}

// ── Missing data ─────────────────────────────────────────────────────

#[test]
fn symbol_without_data_yields_empty_results() {
    let source = ScriptedSource::new();
    let factory = || -> Vec<Box<dyn Strategy>> { Vec::new() };
    let engine = BacktestEngine::new(
        Box::new(source),
        Box::new(factory),
        EngineConfig::default(),
    );
    let results = engine.run_backtest("MISSING", date(), date()).unwrap();

    assert_eq!(results.total_trades, 0);
    assert!(results.daily_results.is_empty());
    assert!(results.setup_performance.is_empty());
    assert_eq!(results.max_drawdown, 0.0);
}

// ── Target exit through the full engine loop ─────────────────────────

#[test]
fn engine_closes_position_on_target_next_tick() {
    let mut source = ScriptedSource::new();
    // Entry at 5.0 on ts 1000; quote collapses to 4.0 on ts 1001:
    // P&L = (4.995 - 4.005) * 100 = 99 >= target 50.
    source.add_day("QQQ", scripted_day(&[5.0, 4.0, 4.0], 2_000));

    let factory =
        || -> Vec<Box<dyn Strategy>> { vec![Box::new(SingleShotStrategy::new("a", 1000, 50.0, 500.0))] };
    let engine = BacktestEngine::new(
        Box::new(source),
        Box::new(factory),
        EngineConfig::default(),
    );
    let results = engine.run_backtest("QQQ", date(), date()).unwrap();

    assert_eq!(results.total_trades, 1);
    let trade = &results.trade_log[0];
    assert_eq!(trade.exit_reason, ExitReason::Target);
    // Opened at 1000, first exit evaluation with fresh data at 1001.
    assert_eq!(trade.entry_timeindex, 1000);
    assert_eq!(trade.exit_timeindex, 1001);
    assert!((trade.pnl - 99.0).abs() < 1e-9);
    assert_eq!(results.win_rate, 1.0);
}

// ── Drawdown over the aggregated run ─────────────────────────────────

#[test]
fn max_drawdown_nonnegative_and_zero_for_all_winners() {
    let mut source = ScriptedSource::new();
    source.add_day("QQQ", scripted_day(&[5.0, 4.0, 4.0], 2_000));

    let factory =
        || -> Vec<Box<dyn Strategy>> { vec![Box::new(SingleShotStrategy::new("a", 1000, 50.0, 500.0))] };
    let engine = BacktestEngine::new(
        Box::new(source),
        Box::new(factory),
        EngineConfig::default(),
    );
    let results = engine.run_backtest("QQQ", date(), date()).unwrap();

    assert!(results.max_drawdown >= 0.0);
    assert_eq!(results.max_drawdown, 0.0);
}

// ── Multi-symbol mode ────────────────────────────────────────────────

#[test]
fn cross_symbol_limit_unwinds_every_symbol() {
    let mut source = ScriptedSource::new();
    // Each symbol loses ~511 at ts 1003; combined ~-1022 crosses the 1000
    // cross-symbol limit while each stays inside its 2000 daily limit.
    source.add_day("QQQ", scripted_day(&[5.0, 6.0, 8.0, 10.1, 10.1], 5_000));
    source.add_day("SPY", scripted_day(&[5.0, 6.0, 8.0, 10.1, 10.1], 5_000));

    let factory =
        || -> Vec<Box<dyn Strategy>> { vec![Box::new(SingleShotStrategy::new("a", 1000, 0.0, 0.0))] };
    let config = EngineConfig::new(2000.0).with_cross_symbol_risk_limit(1000.0);
    let engine = BacktestEngine::new(Box::new(source), Box::new(factory), config);

    let results = engine
        .run_multi_symbol_backtest(&["QQQ", "SPY"], date(), date())
        .unwrap();

    assert_eq!(results.total_trades, 2);
    assert!(results
        .trade_log
        .iter()
        .all(|t| t.exit_reason == ExitReason::CrossSymbolLimit));
    let symbols: Vec<&str> = results
        .trade_log
        .iter()
        .map(|t| t.symbol.as_str())
        .collect();
    assert!(symbols.contains(&"QQQ"));
    assert!(symbols.contains(&"SPY"));
}

#[test]
fn multi_symbol_results_carry_per_symbol_buckets() {
    let mut source = ScriptedSource::new();
    source.add_day("QQQ", scripted_day(&[5.0, 4.0, 4.0], 2_000));
    source.add_day("SPY", scripted_day(&[5.0, 4.0, 4.0], 2_000));

    let factory =
        || -> Vec<Box<dyn Strategy>> { vec![Box::new(SingleShotStrategy::new("a", 1000, 50.0, 500.0))] };
    let engine = BacktestEngine::new(
        Box::new(source),
        Box::new(factory),
        EngineConfig::default(),
    );
    let results = engine
        .run_multi_symbol_backtest(&["QQQ", "SPY"], date(), date())
        .unwrap();

    assert_eq!(results.total_trades, 2);
    assert_eq!(results.symbol_performance.len(), 2);
    assert!(results.symbol_performance["QQQ"].total_pnl > 0.0);
    assert!(results.symbol_performance["SPY"].total_pnl > 0.0);
    // Correlation map exists (possibly zero) and excludes the symbol itself.
    assert!(!results.symbol_performance["QQQ"]
        .correlation_with_other_symbols
        .contains_key("QQQ"));

    // Setup results span both symbols.
    let setup = &results.setup_performance["a"];
    assert_eq!(setup.symbol_pnls.len(), 2);
}

#[test]
fn empty_symbol_list_is_an_error() {
    let source = ScriptedSource::new();
    let factory = || -> Vec<Box<dyn Strategy>> { Vec::new() };
    let engine = BacktestEngine::new(
        Box::new(source),
        Box::new(factory),
        EngineConfig::default(),
    );
    assert!(engine.run_multi_symbol_backtest(&[], date(), date()).is_err());
}

// ── Larger quantity drives the scenario from the daily-limit spec ────

#[test]
fn two_positions_at_minus_1001_trigger_the_limit() {
    // Direct construction of the boundary case: combined open P&L of
    // -1010 against a 1000 ceiling.
    let mut source = ScriptedSource::new();
    // Entry 5.0 -> 10.04: each position (4.995 - 10.045) * 100 = -505.
    source.add_day("QQQ", scripted_day(&[5.0, 10.04, 10.04], 5_000));

    let factory = || -> Vec<Box<dyn Strategy>> {
        vec![
            Box::new(SingleShotStrategy::new("a", 1000, 0.0, 0.0).with_quantity(1)),
            Box::new(SingleShotStrategy::new("b", 1000, 0.0, 0.0).with_quantity(1)),
        ]
    };
    let engine = BacktestEngine::new(
        Box::new(source),
        Box::new(factory),
        EngineConfig::new(1000.0),
    );
    let results = engine.run_backtest("QQQ", date(), date()).unwrap();

    assert_eq!(results.total_trades, 2);
    assert!(results
        .trade_log
        .iter()
        .all(|t| t.exit_reason == ExitReason::DailyLimit));
}
