//! Run glue — wires the loader, strategy factory, and engine together.

use thiserror::Error;

use optlab_core::domain::BacktestResults;
use optlab_core::engine::{BacktestEngine, EngineConfig, EngineError};

use crate::config::{RunConfig, SpecFactory};
use crate::data_loader::CsvDataLoader;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("config has no symbols")]
    NoSymbols,
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Execute a configured run: single-symbol mode for one symbol, multi-symbol
/// mode otherwise.
pub fn run(config: &RunConfig) -> Result<BacktestResults, RunnerError> {
    if config.symbols.is_empty() {
        return Err(RunnerError::NoSymbols);
    }

    let loader = CsvDataLoader::new(config.data_path.as_str()).with_workers(config.load_workers);
    let factory = SpecFactory::new(config.strategies.clone());
    let engine_config = EngineConfig::new(config.daily_max_loss)
        .with_cross_symbol_risk_limit(config.cross_symbol_risk_limit)
        .with_dynamic_management(config.enable_dynamic_management);
    let engine = BacktestEngine::new(Box::new(loader), Box::new(factory), engine_config);

    tracing::info!(run_id = %config.run_id(), symbols = config.symbols.len(), "starting run");

    let results = if config.symbols.len() == 1 {
        engine.run_backtest(&config.symbols[0], config.start_date, config.end_date)?
    } else {
        let symbols: Vec<&str> = config.symbols.iter().map(String::as_str).collect();
        engine.run_multi_symbol_backtest(&symbols, config.start_date, config.end_date)?
    };

    Ok(results)
}
