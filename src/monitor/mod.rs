//! Per-process monitoring state.
//!
//! `Monitor` is the only mutable state of the client: the current snapshot,
//! the filtered history and the OFF-vote log. The event loop owns it and
//! hands it each block in arrival order.

use crate::block::{reduce, BlockSnapshot, RawBlock};
use crate::history::{should_track, DisplayMode, HistoryBuffer};
use crate::store::VoteLog;
use tracing::{debug, info};

pub struct Monitor {
    mode: DisplayMode,
    current: Option<BlockSnapshot>,
    history: HistoryBuffer,
    vote_log: Option<VoteLog>,
    blocks_seen: u64,
}

/// What a single block did to the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockOutcome {
    pub reduced: bool,
    pub tracked: bool,
    pub logged: bool,
}

impl Monitor {
    pub fn new(mode: DisplayMode, history_capacity: usize, vote_log: Option<VoteLog>) -> Self {
        Self {
            mode,
            current: None,
            history: HistoryBuffer::new(history_capacity),
            vote_log,
            blocks_seen: 0,
        }
    }

    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    pub fn current(&self) -> Option<&BlockSnapshot> {
        self.current.as_ref()
    }

    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    pub fn vote_log(&self) -> Option<&VoteLog> {
        self.vote_log.as_ref()
    }

    pub fn blocks_seen(&self) -> u64 {
        self.blocks_seen
    }

    /// Reduce `raw` and fold it into the state. A block without a toggle EMA
    /// changes nothing.
    pub fn handle_block(&mut self, raw: &RawBlock) -> BlockOutcome {
        let Some(snapshot) = reduce(raw) else {
            debug!(level = raw.level, "block carries no toggle EMA, skipping");
            return BlockOutcome::default();
        };
        self.blocks_seen += 1;

        let tracked = should_track(snapshot.vote, self.mode);
        let logged = match self.vote_log.as_mut() {
            Some(log) => log.record(&snapshot),
            None => false,
        };

        info!(
            level = snapshot.level,
            ema = snapshot.ema,
            progress = snapshot.deactivation_progress,
            vote = %snapshot.vote,
            baker = %snapshot.baker,
            tracked,
            logged,
            "block"
        );

        if tracked {
            self.history.push(snapshot.clone());
        }
        self.current = Some(snapshot);

        BlockOutcome {
            reduced: true,
            tracked,
            logged,
        }
    }
}
