//! Terminal dashboard.
//!
//! `render` is a pure function of the monitor state; `draw` clears the
//! screen and writes one full frame. Layout:
//!   header      → title + connection status
//!   current     → level, EMA, % of max, deactivation progress, banner
//!   history     → recent tracked blocks, newest first
//!   footer      → run counters

use crate::block::{BlockSnapshot, Vote};
use crate::history::{DisplayMode, HistoryBuffer};
use crate::monitor::Monitor;
use crossterm::cursor::MoveTo;
use crossterm::style::{Print, StyledContent, Stylize};
use crossterm::terminal::{Clear, ClearType};
use crossterm::queue;
use std::fmt::Write as _;
use std::io::{self, Write};

const RULE_WIDTH: usize = 64;
const BAR_WIDTH: usize = 30;
/// Progress above which the banner turns to warning.
const WARNING_PCT: f64 = 80.0;

/// Three-tier status derived from deactivation progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Banner {
    Nominal,
    Warning,
    Critical,
}

impl Banner {
    pub fn for_progress(progress: f64) -> Self {
        if progress >= 100.0 {
            Banner::Critical
        } else if progress > WARNING_PCT {
            Banner::Warning
        } else {
            Banner::Nominal
        }
    }

    fn styled(self) -> StyledContent<&'static str> {
        match self {
            Banner::Critical => "CRITICAL: deactivation threshold reached, subsidy off".red().bold(),
            Banner::Warning => "WARNING: approaching deactivation threshold".yellow().bold(),
            Banner::Nominal => "NOMINAL: subsidy active".green(),
        }
    }
}

/// Read-only view handed to the renderer.
#[derive(Debug, Clone, Copy)]
pub struct DashboardView<'a> {
    pub connected: bool,
    pub current: Option<&'a BlockSnapshot>,
    pub history: &'a HistoryBuffer,
    pub mode: DisplayMode,
    pub blocks_seen: u64,
    /// OFF votes written this run; `None` when the vote log is disabled.
    pub votes_logged: Option<u64>,
}

impl<'a> DashboardView<'a> {
    pub fn from_monitor(connected: bool, monitor: &'a Monitor) -> Self {
        Self {
            connected,
            current: monitor.current(),
            history: monitor.history(),
            mode: monitor.mode(),
            blocks_seen: monitor.blocks_seen(),
            votes_logged: monitor.vote_log().map(|log| log.appended()),
        }
    }
}

fn styled_vote(vote: Vote) -> StyledContent<&'static str> {
    match vote {
        Vote::On => "ON  ".green(),
        Vote::Off => "OFF ".red(),
        Vote::Pass => "PASS".dark_grey(),
    }
}

fn group_digits(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn progress_bar(progress: f64) -> String {
    let filled = ((progress.clamp(0.0, 100.0) / 100.0) * BAR_WIDTH as f64).round() as usize;
    format!("[{}{}]", "#".repeat(filled), ".".repeat(BAR_WIDTH - filled))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
        out.push('~');
        out
    }
}

/// Render one frame as text (ANSI colors included, no cursor control).
pub fn render(view: &DashboardView<'_>) -> String {
    let mut out = String::new();
    let rule = "-".repeat(RULE_WIDTH);

    // Header
    let status = if view.connected {
        "CONNECTED".green().bold()
    } else {
        "DISCONNECTED".red().bold()
    };
    let _ = writeln!(out, "{}   {}", "Liquidity Baking Toggle Monitor".cyan().bold(), status);
    let _ = writeln!(out, "{rule}");

    // Current block
    match view.current {
        None => {
            let _ = writeln!(out, "{}", "Waiting for block data...".dark_grey());
        }
        Some(snap) => {
            let _ = writeln!(out, "Level:                  {}", snap.level);
            let _ = writeln!(out, "Toggle EMA:             {}", group_digits(snap.ema));
            let _ = writeln!(out, "% of max EMA:           {:.2}%", snap.pct_of_max);
            let _ = writeln!(
                out,
                "Deactivation progress:  {:.2}%  {}",
                snap.deactivation_progress,
                progress_bar(snap.deactivation_progress)
            );
            let _ = writeln!(
                out,
                "Status:                 {}",
                Banner::for_progress(snap.deactivation_progress).styled()
            );
            let _ = writeln!(
                out,
                "Latest vote:            {} by {}",
                styled_vote(snap.vote),
                snap.baker
            );
        }
    }
    let _ = writeln!(out);

    // History
    let title = match view.mode {
        DisplayMode::All => "Recent blocks (newest first)".to_string(),
        mode => format!("Recent blocks (newest first) [filter: {mode}]"),
    };
    let _ = writeln!(out, "{}", title.bold());
    let _ = writeln!(out, "{rule}");
    if view.history.is_empty() {
        let _ = writeln!(out, "{}", "No matching blocks yet".dark_grey());
    } else {
        let _ = writeln!(out, "{:<10} {:<4} {:>9}  {}", "LEVEL", "VOTE", "PROGRESS", "BAKER");
        for snap in view.history.newest_first() {
            let _ = writeln!(
                out,
                "{:<10} {} {:>8.2}%  {}",
                snap.level,
                styled_vote(snap.vote),
                snap.deactivation_progress,
                truncate(&snap.baker, 36)
            );
        }
    }
    let _ = writeln!(out, "{rule}");

    // Footer
    let logged = match view.votes_logged {
        Some(n) => n.to_string(),
        None => "disabled".to_string(),
    };
    let _ = writeln!(
        out,
        "{}",
        format!("blocks seen: {} | OFF votes logged: {}", view.blocks_seen, logged).dark_grey()
    );

    out
}

/// Clear the screen, home the cursor and write one frame.
pub fn draw<W: Write>(out: &mut W, view: &DashboardView<'_>) -> io::Result<()> {
    queue!(out, Clear(ClearType::All), MoveTo(0, 0), Print(render(view)))?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(level: i64, ema: u64, vote: Vote) -> BlockSnapshot {
        BlockSnapshot {
            level,
            ema,
            pct_of_max: crate::block::pct_of_max(ema),
            deactivation_progress: crate::block::deactivation_progress(ema),
            vote,
            baker: format!("baker-{level}"),
        }
    }

    #[test]
    fn test_banner_tiers() {
        assert_eq!(Banner::for_progress(110.0), Banner::Critical);
        assert_eq!(Banner::for_progress(100.0), Banner::Critical);
        assert_eq!(Banner::for_progress(80.5), Banner::Warning);
        assert_eq!(Banner::for_progress(80.0), Banner::Nominal);
        assert_eq!(Banner::for_progress(0.0), Banner::Nominal);
    }

    #[test]
    fn test_group_digits() {
        assert_eq!(group_digits(0), "0");
        assert_eq!(group_digits(999), "999");
        assert_eq!(group_digits(1_100_000_000), "1,100,000,000");
    }

    #[test]
    fn test_render_waiting() {
        let history = HistoryBuffer::default();
        let view = DashboardView {
            connected: false,
            current: None,
            history: &history,
            mode: DisplayMode::All,
            blocks_seen: 0,
            votes_logged: None,
        };
        let out = render(&view);
        assert!(out.contains("DISCONNECTED"));
        assert!(out.contains("Waiting for block data"));
        assert!(!out.contains("[filter:"));
        assert!(out.contains("disabled"));
    }

    #[test]
    fn test_render_current_and_history() {
        let mut history = HistoryBuffer::default();
        history.push(snap(900000, 1_000_000_000, Vote::Off));
        history.push(snap(900001, 1_100_000_000, Vote::Off));
        let current = snap(900002, 1_100_000_000, Vote::Pass);
        let view = DashboardView {
            connected: true,
            current: Some(&current),
            history: &history,
            mode: DisplayMode::OffOnly,
            blocks_seen: 3,
            votes_logged: Some(2),
        };
        let out = render(&view);

        assert!(out.contains("CONNECTED"));
        assert!(out.contains("900002"));
        assert!(out.contains("1,100,000,000"));
        assert!(out.contains("55.00%"));
        assert!(out.contains("110.00%"));
        assert!(out.contains("CRITICAL"));
        assert!(out.contains("[filter: OFF_ONLY]"));

        let newer = out.find("baker-900001").unwrap();
        let older = out.find("baker-900000").unwrap();
        assert!(newer < older);
    }

    #[test]
    fn test_draw_clears_screen() {
        let history = HistoryBuffer::default();
        let view = DashboardView {
            connected: true,
            current: None,
            history: &history,
            mode: DisplayMode::All,
            blocks_seen: 0,
            votes_logged: Some(0),
        };
        let mut buf = Vec::new();
        draw(&mut buf, &view).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("\u{1b}[2J"));
        assert!(text.contains("Liquidity Baking Toggle Monitor"));
    }
}
