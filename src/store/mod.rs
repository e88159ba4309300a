//! Append-only JSONL log of OFF votes.
//!
//! File layout:
//!   off_votes.jsonl  → one `LogEntry` per line, ascending level
//!   off_votes.json   → legacy whole-file JSON array, migration source only
//!
//! The highest logged level (the watermark) is recovered from the last line
//! on startup, so restarts never write the same level twice. A line left
//! without its newline by an interrupted append is cut off before the
//! watermark is read.

use crate::block::{BlockSnapshot, Vote};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("vote log io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("vote log json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One persisted OFF vote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: i64,
    pub vote: Vote,
    pub baker: String,
    pub ema: u64,
    /// Wall-clock time the block was processed (RFC 3339, UTC).
    pub timestamp: String,
}

impl LogEntry {
    pub fn from_snapshot(snapshot: &BlockSnapshot) -> Self {
        Self {
            level: snapshot.level,
            vote: snapshot.vote,
            baker: snapshot.baker.clone(),
            ema: snapshot.ema,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// File-backed OFF-vote log.
pub struct VoteLog {
    path: PathBuf,
    last_logged_level: Option<i64>,
    appended: u64,
}

impl VoteLog {
    /// Open the log, migrating the legacy array file first if needed.
    ///
    /// Never fails: migration or tail-read problems are logged and the
    /// watermark stays unset.
    pub fn open(path: impl Into<PathBuf>, legacy_path: Option<&Path>) -> Self {
        let path = path.into();

        if let Some(legacy) = legacy_path {
            match migrate_legacy(legacy, &path) {
                Ok(Some(count)) => {
                    info!(legacy = %legacy.display(), path = %path.display(), entries = count, "migrated legacy vote log")
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, legacy = %legacy.display(), "legacy vote log migration failed"),
            }
        }

        match repair_torn_tail(&path) {
            Ok(0) => {}
            Ok(removed) => warn!(path = %path.display(), bytes = removed, "dropped unterminated vote log line"),
            Err(e) => warn!(error = %e, path = %path.display(), "could not check vote log tail"),
        }

        let last_logged_level = match read_last_entry(&path) {
            Ok(Some(entry)) => Some(entry.level),
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, path = %path.display(), "could not recover vote log watermark");
                None
            }
        };

        info!(
            path = %path.display(),
            watermark = ?last_logged_level,
            "vote log ready"
        );

        Self {
            path,
            last_logged_level,
            appended: 0,
        }
    }

    pub fn last_logged_level(&self) -> Option<i64> {
        self.last_logged_level
    }

    /// Entries appended by this process.
    pub fn appended(&self) -> u64 {
        self.appended
    }

    /// Whether `snapshot` would be written by [`VoteLog::record`].
    pub fn accepts(&self, snapshot: &BlockSnapshot) -> bool {
        snapshot.vote == Vote::Off
            && self
                .last_logged_level
                .map_or(true, |last| snapshot.level > last)
    }

    /// Append `snapshot` if it is a new OFF vote. Returns true when a line
    /// was written. I/O failures are logged, never returned.
    pub fn record(&mut self, snapshot: &BlockSnapshot) -> bool {
        if !self.accepts(snapshot) {
            return false;
        }

        let entry = LogEntry::from_snapshot(snapshot);
        match self.append(&entry) {
            Ok(()) => {
                self.last_logged_level = Some(entry.level);
                self.appended += 1;
                debug!(level = entry.level, baker = %entry.baker, "OFF vote logged");
                true
            }
            Err(e) => {
                warn!(error = %e, level = entry.level, "failed to append OFF vote");
                false
            }
        }
    }

    fn append(&self, entry: &LogEntry) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.sync_data()?;
        Ok(())
    }
}

/// Truncate the log back to its last newline. Returns the number of bytes
/// removed; a missing or newline-terminated file is left alone.
pub fn repair_torn_tail(path: &Path) -> Result<u64, StoreError> {
    let mut file = match OpenOptions::new().read(true).write(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    if bytes.last().map_or(true, |b| *b == b'\n') {
        return Ok(0);
    }

    let keep = bytes
        .iter()
        .rposition(|b| *b == b'\n')
        .map_or(0, |i| i + 1);
    file.set_len(keep as u64)?;
    file.sync_all()?;
    Ok((bytes.len() - keep) as u64)
}

/// Convert a legacy JSON-array log into JSONL. Returns the number of
/// migrated entries, or `None` when there was nothing to do.
pub fn migrate_legacy(legacy: &Path, path: &Path) -> Result<Option<usize>, StoreError> {
    if path.exists() || !legacy.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(legacy)?;
    let entries: Vec<LogEntry> = serde_json::from_str(&contents)?;

    let mut out = String::new();
    for entry in &entries {
        out.push_str(&serde_json::to_string(entry)?);
        out.push('\n');
    }
    write_atomic(path, out.as_bytes())?;

    Ok(Some(entries.len()))
}

/// Write `bytes` to `<path>.tmp`, fsync, then rename over `path`. After a
/// crash `path` is either absent or complete.
fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;

    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    fsync_parent(path)
}

#[cfg(unix)]
fn fsync_parent(path: &Path) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    File::open(parent)?.sync_all()
}

#[cfg(not(unix))]
fn fsync_parent(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// Parse the last non-empty line of the log. A missing file is `Ok(None)`.
pub fn read_last_entry(path: &Path) -> Result<Option<LogEntry>, StoreError> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut last = None;
    for line in BufReader::new(file).lines() {
        let line = line?;
        if !line.trim().is_empty() {
            last = Some(line);
        }
    }

    match last {
        Some(line) => Ok(Some(serde_json::from_str(line.trim())?)),
        None => Ok(None),
    }
}
