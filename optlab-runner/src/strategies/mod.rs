//! Concrete strategy implementations consumed through the core contract.
//!
//! - [`StraddleSetup`] — short straddle, premium- or distance-based strikes
//! - [`HedgedStraddleSetup`] — short straddle plus OTM hedge buys
//! - [`CeScalpingSetup`] / [`PeScalpingSetup`] — one-sided premium scalps
//!   with re-entry
//! - [`GammaScalpingSetup`] — long ATM straddle with delta-threshold
//!   rebalancing

pub mod gamma_scalping;
pub mod hedged_straddle;
pub mod scalping;
pub mod straddle;

pub use gamma_scalping::GammaScalpingSetup;
pub use hedged_straddle::HedgedStraddleSetup;
pub use scalping::{CeScalpingSetup, PeScalpingSetup};
pub use straddle::StraddleSetup;

use optlab_core::domain::{OptionChain, OptionType};

/// Premium-based selection: scan OTM strikes first (nearest the money
/// last), then ITM, and take the first whose premium clears `min_premium`.
///
/// For calls OTM means strikes at or above spot, scanned downward; for puts
/// OTM means strikes at or below spot, scanned upward.
pub(crate) fn premium_based_strike(
    chain: &OptionChain,
    option_type: OptionType,
    spot: f64,
    min_premium: f64,
) -> Option<f64> {
    let series = chain.series(option_type);
    let strikes = series.strikes();
    if strikes.is_empty() {
        return None;
    }

    let scan: Vec<f64> = match option_type {
        OptionType::Call => {
            let otm = strikes.iter().rev().filter(|&&s| s >= spot);
            let itm = strikes.iter().rev().filter(|&&s| s < spot);
            otm.chain(itm).copied().collect()
        }
        OptionType::Put => {
            let otm = strikes.iter().filter(|&&s| s <= spot);
            let itm = strikes.iter().filter(|&&s| s > spot);
            otm.chain(itm).copied().collect()
        }
    };

    scan.into_iter()
        .find(|&strike| chain.price(option_type, strike).is_some_and(|p| p >= min_premium))
}

/// Distance-based selection: from the strike closest to spot, step
/// `strikes_away` listed strikes OTM (up for calls, down for puts), clamped
/// to the listed range.
pub(crate) fn distance_based_strike(
    chain: &OptionChain,
    option_type: OptionType,
    spot: f64,
    strikes_away: usize,
) -> Option<f64> {
    let strikes = chain.series(option_type).strikes();
    if strikes.is_empty() {
        return None;
    }

    let spot_idx = strikes
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            (*a - spot)
                .abs()
                .partial_cmp(&(*b - spot).abs())
                .expect("strike is never NaN")
        })
        .map(|(i, _)| i)?;

    let target_idx = match option_type {
        OptionType::Call => (spot_idx + strikes_away).min(strikes.len() - 1),
        OptionType::Put => spot_idx.saturating_sub(strikes_away),
    };
    Some(strikes[target_idx])
}
