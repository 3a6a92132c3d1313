//! OptLab Runner — orchestration around the core engine.
//!
//! - CSV data loading over the `5SecData` layout, with a bounded parallel
//!   batch variant and a deterministic synthetic generator
//! - Concrete strategies (straddles, scalps, gamma scalping)
//! - Serializable run configuration with content-addressed run ids
//! - Trade-tape and summary exports

pub mod config;
pub mod data_loader;
pub mod report;
pub mod runner;
pub mod strategies;

pub use config::{RunConfig, SpecFactory, StrategySpec};
pub use data_loader::{synthetic_trading_day, CsvDataLoader, LoadError};
pub use runner::{run, RunnerError};
