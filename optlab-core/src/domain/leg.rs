//! Leg descriptors — the tagged form of the four leg-key encodings.
//!
//! Historical position records encode legs as underscore-joined strings in
//! four shapes, depending on the position kind:
//!
//! - `"CE_580.0"`                 — simple single-leg positions
//! - `"CE_580.0_SELL"`            — hedged / condor / spread legs
//! - `"CE_BUY_LOWER"`             — butterfly legs, strike held in the
//!   position's role map under the same key
//! - `"CE_580.0_SELL_2"`          — ratio-spread legs with explicit quantity
//!
//! A key is parsed ONCE, when the position is built, into a [`LegDescriptor`]
//! stored next to the entry price. A key that fails to parse yields `None`
//! and that leg is excluded from pricing for the life of the position —
//! a parse failure is never fatal.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::chain::OptionType;
use super::position::PositionKind;

/// Whether a leg was sold or bought at entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegAction {
    Sell,
    Buy,
}

impl LegAction {
    /// Tape vocabulary is loose: "SELL"/"SHORT" mean sold, anything else
    /// (including unrecognized tokens) falls through to bought.
    fn from_tape(s: &str) -> Self {
        match s {
            "SELL" | "SHORT" => LegAction::Sell,
            _ => LegAction::Buy,
        }
    }
}

/// Butterfly leg role: which wing (or the body) this leg occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegRole {
    Lower,
    Body,
    Upper,
}

/// Fully resolved leg: everything needed to price it against a chain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LegDescriptor {
    pub option_type: OptionType,
    pub strike: f64,
    pub action: LegAction,
    pub quantity: i64,
    pub role: Option<LegRole>,
}

/// Parse a leg key under a position kind's encoding rules.
///
/// `strikes` is the position's role map (needed for butterfly keys, whose
/// strike lives there rather than in the key). `default_quantity` is the
/// position's net quantity, used when the key carries none.
pub fn parse_leg_key(
    key: &str,
    kind: PositionKind,
    strikes: &BTreeMap<String, f64>,
    default_quantity: i64,
) -> Option<LegDescriptor> {
    let parts: Vec<&str> = key.split('_').collect();
    let option_type = OptionType::from_tape(parts.first().copied()?)?;
    let default_action = kind.default_leg_action();

    let descriptor = match kind {
        PositionKind::IronCondor | PositionKind::VerticalSpread | PositionKind::VolatilitySkew => {
            if parts.len() >= 3 {
                LegDescriptor {
                    option_type,
                    strike: parts[1].parse().ok()?,
                    action: LegAction::from_tape(parts[2]),
                    quantity: default_quantity,
                    role: None,
                }
            } else {
                // Underspecified key: strike 0.0 is never quoted, so the leg
                // prices as missing every tick.
                LegDescriptor {
                    option_type,
                    strike: 0.0,
                    action: default_action,
                    quantity: default_quantity,
                    role: None,
                }
            }
        }

        PositionKind::Butterfly => {
            let (role, action, quantity) = if key.contains("LOWER") {
                (Some(LegRole::Lower), LegAction::Buy, 1)
            } else if key.contains("BODY") {
                // The body is sold twice against one of each wing.
                (Some(LegRole::Body), LegAction::Sell, 2)
            } else if key.contains("UPPER") {
                (Some(LegRole::Upper), LegAction::Buy, 1)
            } else {
                (None, default_action, default_quantity)
            };
            let strike = role
                .map(|r| {
                    let role_key = match r {
                        LegRole::Lower => format!("{option_type}_BUY_LOWER"),
                        LegRole::Body => format!("{option_type}_SELL_BODY"),
                        LegRole::Upper => format!("{option_type}_BUY_UPPER"),
                    };
                    strikes.get(&role_key).copied().unwrap_or(0.0)
                })
                .unwrap_or(0.0);
            LegDescriptor {
                option_type,
                strike,
                action,
                quantity,
                role,
            }
        }

        PositionKind::RatioSpread => {
            if parts.len() >= 3 {
                let quantity = if parts.len() > 3 {
                    parts[3].parse().ok()?
                } else {
                    default_quantity
                };
                LegDescriptor {
                    option_type,
                    strike: parts[1].parse().ok()?,
                    action: LegAction::from_tape(parts[2]),
                    quantity,
                    role: None,
                }
            } else {
                LegDescriptor {
                    option_type,
                    strike: 0.0,
                    action: default_action,
                    quantity: default_quantity,
                    role: None,
                }
            }
        }

        PositionKind::Hedged | PositionKind::GammaScalp | PositionKind::GammaScalpRebalanced => {
            if parts.len() >= 3 {
                LegDescriptor {
                    option_type,
                    strike: parts[1].parse().ok()?,
                    action: LegAction::from_tape(parts[2]),
                    quantity: default_quantity,
                    role: None,
                }
            } else {
                LegDescriptor {
                    option_type,
                    strike: parts.get(1)?.parse().ok()?,
                    action: default_action,
                    quantity: default_quantity,
                    role: None,
                }
            }
        }

        PositionKind::Sell | PositionKind::Buy => {
            let strike = match parts.get(1) {
                Some(raw) => raw.parse().ok()?,
                None => 0.0,
            };
            LegDescriptor {
                option_type,
                strike,
                action: default_action,
                quantity: default_quantity,
                role: None,
            }
        }
    };

    Some(descriptor)
}
