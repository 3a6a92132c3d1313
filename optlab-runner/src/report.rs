//! Reporting exports — trade tape CSV/JSON and a text summary.
//!
//! Consumes a finished [`BacktestResults`] only; nothing here feeds back
//! into the simulation.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

use optlab_core::domain::{BacktestResults, Trade};

pub fn write_trades_csv(path: &Path, trades: &[Trade]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create trades CSV {}", path.display()))?;

    writer.write_record([
        "date",
        "symbol",
        "setup_id",
        "entry_timeindex",
        "exit_timeindex",
        "quantity",
        "pnl",
        "exit_reason",
        "entry_regime",
        "rebalance_count",
    ])?;

    for trade in trades {
        writer.write_record([
            trade.date.to_string(),
            trade.symbol.clone(),
            trade.setup_id.clone(),
            trade.entry_timeindex.to_string(),
            trade.exit_timeindex.to_string(),
            trade.quantity.to_string(),
            format!("{:.4}", trade.pnl),
            trade.exit_reason.to_string(),
            trade
                .entry_regime
                .map(|r| r.to_string())
                .unwrap_or_default(),
            trade.rebalance_count.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_results_json(path: &Path, results: &BacktestResults) -> Result<()> {
    let json =
        serde_json::to_string_pretty(results).context("failed to serialize results")?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write results JSON {}", path.display()))?;
    Ok(())
}

/// Human-readable run summary.
pub fn render_summary(results: &BacktestResults) -> String {
    let mut out = String::new();
    use std::fmt::Write as _;

    let _ = writeln!(out, "Backtest Summary");
    let _ = writeln!(out, "================");
    let _ = writeln!(out, "Total P&L:      {:.2}", results.total_pnl);
    let _ = writeln!(out, "Total trades:   {}", results.total_trades);
    let _ = writeln!(out, "Win rate:       {:.1}%", results.win_rate * 100.0);
    let _ = writeln!(out, "Max drawdown:   {:.2}", results.max_drawdown);

    if !results.daily_results.is_empty() {
        let _ = writeln!(out, "\nDaily results");
        let _ = writeln!(out, "-------------");
        for day in &results.daily_results {
            let _ = writeln!(
                out,
                "{}  pnl {:>10.2}  trades {:>3}  forced-closed {}",
                day.date, day.daily_pnl, day.trades_count,
                day.positions_forced_closed_at_job_end
            );
        }
    }

    if !results.setup_performance.is_empty() {
        let _ = writeln!(out, "\nPer-setup performance");
        let _ = writeln!(out, "---------------------");
        for (setup_id, perf) in &results.setup_performance {
            let _ = writeln!(
                out,
                "{setup_id:<28} pnl {:>10.2}  trades {:>3}  win rate {:>5.1}%",
                perf.total_pnl,
                perf.total_trades,
                perf.win_rate * 100.0
            );
        }
    }

    if !results.symbol_performance.is_empty() {
        let _ = writeln!(out, "\nPer-symbol performance");
        let _ = writeln!(out, "----------------------");
        for (symbol, perf) in &results.symbol_performance {
            let _ = writeln!(
                out,
                "{symbol:<12} pnl {:>10.2}  trades {:>3}  win rate {:>5.1}%",
                perf.total_pnl,
                perf.total_trades,
                perf.win_rate * 100.0
            );
            for (other, corr) in &perf.correlation_with_other_symbols {
                let _ = writeln!(out, "    corr vs {other}: {corr:.2}");
            }
        }
    }

    if let Some(stats) = &results.dynamic_adjustments {
        let _ = writeln!(out, "\nDynamic adjustment performance");
        let _ = writeln!(out, "------------------------------");
        let _ = writeln!(out, "Total adjustments:  {}", stats.total_adjustments);
        let _ = writeln!(
            out,
            "Dynamic vs static:  {:.2} ({} vs {} trades)",
            stats.static_vs_dynamic_comparison,
            stats.dynamic_trade_count,
            stats.static_trade_count
        );
        let _ = writeln!(out, "Regime accuracy:    {:.1}%", stats.regime_accuracy * 100.0);
    }

    out
}

pub fn write_summary(path: &Path, results: &BacktestResults) -> Result<()> {
    let mut file = std::fs::File::create(path)
        .with_context(|| format!("failed to create summary {}", path.display()))?;
    file.write_all(render_summary(results).as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use optlab_core::domain::{DailyResults, ExitReason, Regime};
    use std::collections::BTreeMap;

    fn sample_results() -> BacktestResults {
        let trade = Trade {
            setup_id: "straddle_1".into(),
            symbol: "QQQ".into(),
            date: NaiveDate::from_ymd_opt(2025, 8, 13).unwrap(),
            entry_timeindex: 1000,
            exit_timeindex: 2400,
            entry_prices: BTreeMap::new(),
            exit_prices: BTreeMap::new(),
            strikes: BTreeMap::new(),
            quantity: 1,
            pnl: 98.0,
            exit_reason: ExitReason::Target,
            entry_regime: Some(Regime::Ranging),
            gamma_pnl: 0.0,
            theta_pnl: 0.0,
            final_delta: 0.0,
            rebalance_count: 0,
        };
        BacktestResults {
            total_pnl: 98.0,
            total_trades: 1,
            win_rate: 1.0,
            max_drawdown: 0.0,
            daily_results: vec![DailyResults {
                date: trade.date,
                daily_pnl: 98.0,
                trades_count: 1,
                positions_forced_closed_at_job_end: 0,
                setup_pnls: BTreeMap::new(),
                symbol_pnls: BTreeMap::new(),
            }],
            trade_log: vec![trade],
            setup_performance: BTreeMap::new(),
            symbol_performance: BTreeMap::new(),
            regime_performance: BTreeMap::new(),
            dynamic_adjustments: None,
        }
    }

    #[test]
    fn csv_export_round_trips_row_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trades.csv");
        let results = sample_results();

        write_trades_csv(&path, &results.trade_log).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2); // header + one trade
        assert!(lines[1].contains("TARGET"));
        assert!(lines[1].contains("RANGING"));
    }

    #[test]
    fn json_export_parses_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        let results = sample_results();

        write_results_json(&path, &results).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let back: BacktestResults = serde_json::from_str(&content).unwrap();
        assert_eq!(back.total_trades, 1);
    }

    #[test]
    fn summary_mentions_headline_numbers() {
        let summary = render_summary(&sample_results());
        assert!(summary.contains("Total P&L:      98.00"));
        assert!(summary.contains("Win rate:       100.0%"));
        assert!(summary.contains("2025-08-13"));
    }
}
