//! Block metric reducer.
//!
//! Turns a raw block record from the TzKT `blocks` channel into a
//! [`BlockSnapshot`]: the liquidity-baking toggle EMA expressed as a share
//! of its maximum and as progress towards the deactivation threshold, plus
//! the baker's tri-state vote.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper bound of the toggle EMA (twice the deactivation threshold).
pub const MAX_EMA: u64 = 2_000_000_000;
/// EMA at or above which the subsidy is deactivated.
pub const THRESHOLD: u64 = 1_000_000_000;

/// Tri-state liquidity-baking toggle vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Vote {
    On,
    Off,
    Pass,
}

impl Vote {
    /// Map a producer-supplied vote string. Anything that is not `on` or
    /// `off` counts as a pass.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_uppercase().as_str() {
            "ON" => Vote::On,
            "OFF" => Vote::Off,
            _ => Vote::Pass,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Vote::On => "ON",
            Vote::Off => "OFF",
            Vote::Pass => "PASS",
        }
    }
}

impl fmt::Display for Vote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Proposer {
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub address: String,
}

/// A block as delivered in the `data` array of a `blocks` update.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBlock {
    pub level: i64,
    #[serde(default)]
    pub lb_toggle_ema: Option<u64>,
    #[serde(default)]
    pub lb_toggle_vote: Option<String>,
    #[serde(default)]
    pub lb_toggle: Option<bool>,
    #[serde(default)]
    pub proposer: Option<Proposer>,
}

/// Derived per-block view. Never mutated after [`reduce`] builds it.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockSnapshot {
    pub level: i64,
    pub ema: u64,
    pub pct_of_max: f64,
    pub deactivation_progress: f64,
    pub vote: Vote,
    pub baker: String,
}

impl BlockSnapshot {
    pub fn is_deactivated(&self) -> bool {
        self.deactivation_progress >= 100.0
    }
}

// Scale before dividing: both ratios then share one rounding step, which
// keeps `deactivation_progress == 2 * pct_of_max` exact.
pub fn pct_of_max(ema: u64) -> f64 {
    ema as f64 * 100.0 / MAX_EMA as f64
}

pub fn deactivation_progress(ema: u64) -> f64 {
    ema as f64 * 100.0 / THRESHOLD as f64
}

/// Vote precedence: explicit vote string, then the boolean toggle, then pass.
pub fn derive_vote(lb_toggle_vote: Option<&str>, lb_toggle: Option<bool>) -> Vote {
    match (lb_toggle_vote.filter(|v| !v.is_empty()), lb_toggle) {
        (Some(label), _) => Vote::from_label(label),
        (None, Some(true)) => Vote::On,
        (None, Some(false)) => Vote::Off,
        (None, None) => Vote::Pass,
    }
}

pub fn baker_name(proposer: Option<&Proposer>) -> String {
    match proposer {
        Some(p) => match p.alias.as_deref() {
            Some(alias) if !alias.is_empty() => alias.to_string(),
            _ => p.address.clone(),
        },
        None => "unknown".to_string(),
    }
}

/// Reduce a raw block. Returns `None` when the block carries no toggle EMA.
pub fn reduce(raw: &RawBlock) -> Option<BlockSnapshot> {
    let ema = raw.lb_toggle_ema?;
    Some(BlockSnapshot {
        level: raw.level,
        ema,
        pct_of_max: pct_of_max(ema),
        deactivation_progress: deactivation_progress(ema),
        vote: derive_vote(raw.lb_toggle_vote.as_deref(), raw.lb_toggle),
        baker: baker_name(raw.proposer.as_ref()),
    })
}
