//! Domain types: chains, snapshots, legs, positions, trades, results.

pub mod chain;
pub mod leg;
pub mod position;
pub mod results;
pub mod snapshot;
pub mod trade;

pub use chain::{OptionChain, OptionType, StrikeSeries, TradingDayData};
pub use leg::{parse_leg_key, LegAction, LegDescriptor, LegRole};
pub use position::{Leg, Position, PositionKind};
pub use results::{
    AdjustmentStats, BacktestResults, DailyResults, RegimeResults, SetupResults, SymbolResults,
};
pub use snapshot::{MarketSnapshot, Regime, RegimeIndicators};
pub use trade::{ExitReason, Trade};
