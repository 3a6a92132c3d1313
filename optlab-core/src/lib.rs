//! OptLab Core — intraday options backtesting engine.
//!
//! This crate contains the heart of the simulator:
//! - Domain types (chains, snapshots, legs, positions, trades, results)
//! - Position lifecycle with multi-leg P&L and prioritized exit conditions
//! - Daily risk-limit enforcement
//! - Market-regime detection over rolling windows
//! - Dynamic regime-conditioned parameter adjustment
//! - The day-loop driver, single- and multi-symbol

pub mod data;
pub mod domain;
pub mod dynamic;
pub mod engine;
pub mod position_manager;
pub mod regime;
pub mod risk;
pub mod strategy;
