//! Display filter and bounded block history.

use crate::block::{BlockSnapshot, Vote};
use serde::{Deserialize, Deserializer};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

/// Default number of snapshots kept in the rolling history.
pub const DEFAULT_CAPACITY: usize = 10;

/// Which votes are kept in the history panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayMode {
    #[default]
    All,
    OnOff,
    OffOnly,
}

impl DisplayMode {
    pub fn as_str(self) -> &'static str {
        match self {
            DisplayMode::All => "ALL",
            DisplayMode::OnOff => "ON_OFF",
            DisplayMode::OffOnly => "OFF_ONLY",
        }
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DisplayMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "ALL" => Ok(DisplayMode::All),
            "ON_OFF" => Ok(DisplayMode::OnOff),
            "OFF_ONLY" => Ok(DisplayMode::OffOnly),
            other => Err(format!(
                "unknown display mode {other:?} (expected ALL, ON_OFF or OFF_ONLY)"
            )),
        }
    }
}

impl<'de> Deserialize<'de> for DisplayMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

pub fn should_track(vote: Vote, mode: DisplayMode) -> bool {
    match mode {
        DisplayMode::All => true,
        DisplayMode::OnOff => matches!(vote, Vote::On | Vote::Off),
        DisplayMode::OffOnly => vote == Vote::Off,
    }
}

/// Oldest-first ring of recent snapshots.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    entries: VecDeque<BlockSnapshot>,
    capacity: usize,
}

impl HistoryBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn push(&mut self, snapshot: BlockSnapshot) {
        self.entries.push_back(snapshot);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Arrival order, oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &BlockSnapshot> {
        self.entries.iter()
    }

    pub fn newest_first(&self) -> impl Iterator<Item = &BlockSnapshot> {
        self.entries.iter().rev()
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
