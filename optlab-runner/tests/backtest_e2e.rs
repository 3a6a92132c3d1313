//! End-to-end runs: CSV fixtures on disk, through the loader, engine,
//! concrete strategies, and reporting.

use chrono::NaiveDate;
use std::io::Write;
use std::path::Path;

use optlab_core::domain::{ExitReason, Regime};
use optlab_core::engine::{BacktestEngine, EngineConfig};
use optlab_runner::config::{RunConfig, SpecFactory, StrategySpec};
use optlab_runner::data_loader::CsvDataLoader;
use optlab_runner::report;

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 8, 13).unwrap()
}

/// Quote for one (timestamp, type, strike, price) row.
type Row = (i64, &'static str, f64, f64);

fn write_symbol_day(
    root: &Path,
    symbol: &str,
    option_rows: &[Row],
    spot_rows: &[(i64, f64)],
    job_end: i64,
) {
    let symbol_dir = root.join(symbol);
    std::fs::create_dir_all(symbol_dir.join("Spot")).unwrap();

    let mut tape =
        std::fs::File::create(symbol_dir.join(format!("{}_BK.csv", date()))).unwrap();
    for (ts, ty, strike, price) in option_rows {
        writeln!(tape, "{ts},{ty},{strike},{price}").unwrap();
    }

    let mut spot = std::fs::File::create(
        symbol_dir.join("Spot").join(format!("{}.csv", symbol.to_lowercase())),
    )
    .unwrap();
    for (ts, price) in spot_rows {
        writeln!(spot, "{},{ts},{price},{price},{price},{price}", date()).unwrap();
    }

    let mut prop = std::fs::File::create(symbol_dir.join(format!("{}.prop", date()))).unwrap();
    writeln!(prop, "jobEndIdx={job_end}").unwrap();
}

/// Flat-spot day where straddle premiums collapse at `decay_ts`.
fn straddle_day(root: &Path, symbol: &str) {
    let mut option_rows: Vec<Row> = Vec::new();
    let mut spot_rows = Vec::new();
    for i in 0..41 {
        let ts = 1000 + i;
        let (ce, pe) = if ts < 1020 { (5.2, 4.8) } else { (4.0, 4.3) };
        option_rows.push((ts, "CE", 580.0, ce));
        option_rows.push((ts, "PE", 575.0, pe));
        spot_rows.push((ts, 580.0));
    }
    write_symbol_day(root, symbol, &option_rows, &spot_rows, 5000);
}

fn straddle_spec(setup_id: &str) -> StrategySpec {
    let toml = format!(
        r#"
type = "STRADDLE"
setup_id = "{setup_id}"
target_pct = 50.0
stop_loss_pct = 500.0
entry_timeindex = 1010
scalping_price = 0.40
"#
    );
    toml::from_str(&toml).unwrap()
}

#[test]
fn straddle_hits_target_through_the_full_stack() {
    let dir = tempfile::tempdir().unwrap();
    straddle_day(dir.path(), "QQQ");

    let loader = CsvDataLoader::new(dir.path());
    let factory = SpecFactory::new(vec![straddle_spec("straddle_e2e")]);
    let engine = BacktestEngine::new(
        Box::new(loader),
        Box::new(factory),
        EngineConfig::default(),
    );

    let results = engine.run_backtest("QQQ", date(), date()).unwrap();

    assert_eq!(results.total_trades, 1);
    let trade = &results.trade_log[0];
    assert_eq!(trade.exit_reason, ExitReason::Target);
    assert_eq!(trade.entry_timeindex, 1010);
    assert_eq!(trade.exit_timeindex, 1020);
    // (5.195-4.005 + 4.795-4.305) * 100
    assert!((trade.pnl - 168.0).abs() < 1e-9);
    // Flat tape at entry: detector classifies LOW_VOL once warm.
    assert_eq!(trade.entry_regime, Some(Regime::LowVol));
    assert_eq!(results.win_rate, 1.0);
}

#[test]
fn dynamic_management_adjusts_parameters_during_the_run() {
    let dir = tempfile::tempdir().unwrap();
    straddle_day(dir.path(), "QQQ");

    let loader = CsvDataLoader::new(dir.path());
    let factory = SpecFactory::new(vec![straddle_spec("straddle_dyn")]);
    let engine = BacktestEngine::new(
        Box::new(loader),
        Box::new(factory),
        EngineConfig::default().with_dynamic_management(true),
    );

    let results = engine.run_backtest("QQQ", date(), date()).unwrap();

    // The LOW_VOL regime fires with confidence >= 0.6 and rescales all
    // three tracked parameters of the one strategy.
    let stats = results.dynamic_adjustments.expect("dynamic stats present");
    assert!(stats.total_adjustments >= 3);
    assert_eq!(results.total_trades, 1);
    // The trade closed after adjustments, so it lands in the dynamic bucket.
    assert_eq!(stats.dynamic_trade_count, 1);
}

#[test]
fn multi_symbol_run_produces_correlations_and_per_symbol_results() {
    let dir = tempfile::tempdir().unwrap();
    straddle_day(dir.path(), "QQQ");
    straddle_day(dir.path(), "SPY");

    let loader = CsvDataLoader::new(dir.path()).with_workers(2);
    let factory = SpecFactory::new(vec![straddle_spec("straddle_multi")]);
    let engine = BacktestEngine::new(
        Box::new(loader),
        Box::new(factory),
        EngineConfig::default(),
    );

    let results = engine
        .run_multi_symbol_backtest(&["QQQ", "SPY"], date(), date())
        .unwrap();

    assert_eq!(results.total_trades, 2);
    assert_eq!(results.symbol_performance.len(), 2);
    assert!(results.symbol_performance["QQQ"]
        .correlation_with_other_symbols
        .contains_key("SPY"));
    assert_eq!(results.daily_results.len(), 1);
    assert_eq!(results.daily_results[0].trades_count, 2);
}

#[test]
fn gamma_scalping_rebalances_and_closes_at_job_end() {
    let dir = tempfile::tempdir().unwrap();

    // Spot ramps 580 -> 590 over 11 ticks; chain quotes strikes 570..590
    // with an intrinsic-plus-2 proxy.
    let mut option_rows: Vec<Row> = Vec::new();
    let mut spot_rows = Vec::new();
    let strikes = [570.0, 575.0, 580.0, 585.0, 590.0];
    for i in 0..11 {
        let ts = 1000 + i * 10;
        let spot = 580.0 + i as f64;
        for &strike in &strikes {
            option_rows.push((ts, "CE", strike, (spot - strike).max(0.0) + 2.0));
            option_rows.push((ts, "PE", strike, (strike - spot).max(0.0) + 2.0));
        }
        spot_rows.push((ts, spot));
    }
    write_symbol_day(dir.path(), "QQQ", &option_rows, &spot_rows, 1100);

    let spec: StrategySpec = toml::from_str(
        r#"
type = "GAMMA_SCALPING"
setup_id = "gamma_e2e"
target_pct = 100000.0
stop_loss_pct = 100000.0
entry_timeindex = 1000
delta_threshold = 0.15
rebalance_frequency = 60
max_rebalances = 5
"#,
    )
    .unwrap();

    let loader = CsvDataLoader::new(dir.path());
    let engine = BacktestEngine::new(
        Box::new(loader),
        Box::new(SpecFactory::new(vec![spec])),
        EngineConfig::new(1_000_000.0),
    );

    let results = engine.run_backtest("QQQ", date(), date()).unwrap();

    let rebalances: Vec<_> = results
        .trade_log
        .iter()
        .filter(|t| t.exit_reason == ExitReason::Rebalance)
        .collect();
    assert!(!rebalances.is_empty(), "expected at least one rebalance");
    // Movement every tick accrued gamma; time decay accrued negative theta.
    assert!(rebalances[0].gamma_pnl > 0.0);
    assert!(rebalances[0].theta_pnl < 0.0);

    // The replacement position carries an incremented counter and is
    // force-closed at the job end.
    let job_end: Vec<_> = results
        .trade_log
        .iter()
        .filter(|t| t.exit_reason == ExitReason::JobEnd)
        .collect();
    assert_eq!(job_end.len(), 1);
    assert!(job_end[0].rebalance_count >= 1);
}

#[test]
fn runner_glue_executes_a_config_and_reports() {
    let dir = tempfile::tempdir().unwrap();
    straddle_day(dir.path(), "QQQ");

    let config = RunConfig {
        symbols: vec!["QQQ".to_string()],
        start_date: date(),
        end_date: date(),
        data_path: dir.path().to_string_lossy().into_owned(),
        daily_max_loss: 1000.0,
        cross_symbol_risk_limit: 2000.0,
        enable_dynamic_management: false,
        load_workers: 2,
        strategies: vec![straddle_spec("straddle_glue")],
    };

    let results = optlab_runner::run(&config).unwrap();
    assert_eq!(results.total_trades, 1);

    let trades_path = dir.path().join("trades.csv");
    report::write_trades_csv(&trades_path, &results.trade_log).unwrap();
    let summary = report::render_summary(&results);
    assert!(summary.contains("Total trades:   1"));
    assert!(std::fs::read_to_string(&trades_path)
        .unwrap()
        .contains("straddle_glue"));
}
