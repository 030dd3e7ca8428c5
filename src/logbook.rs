// SPDX-License-Identifier: PMPL-1.0-or-later

//! Shared structured log sink.
//!
//! All three actors and the orchestrator append to one JSON-array file.
//! The file is bounded to the most recent 1000 entries and unparsable
//! content is treated as empty and overwritten, so a corrupt or truncated
//! file never takes the exercise down. Writes serialize through a
//! process-wide lock.

use chrono::Local;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

const MAX_ENTRIES: usize = 1000;

static LOGBOOK_LOCK: Mutex<()> = Mutex::new(());
static LOGBOOK_PATH: OnceLock<PathBuf> = OnceLock::new();

/// One entry in the shared logbook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub actor: String,
    pub icon: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub is_vulnerability: bool,
}

/// Set the logbook location for this process. First call wins; later
/// calls against a different path are ignored.
pub fn init(path: PathBuf) {
    let _ = LOGBOOK_PATH.set(path);
}

fn path() -> PathBuf {
    if let Some(path) = LOGBOOK_PATH.get() {
        return path.clone();
    }
    #[cfg(test)]
    {
        std::env::temp_dir().join("gauntlet-test-logs.json")
    }
    #[cfg(not(test))]
    {
        PathBuf::from("logs.json")
    }
}

pub fn record(actor: &str, icon: &str, message: &str, kind: &str) {
    append_at(&path(), actor, icon, message, kind, false);
}

pub fn vulnerability(actor: &str, icon: &str, message: &str) {
    append_at(&path(), actor, icon, message, "vulnerability", true);
}

/// The most recent `limit` entries, oldest first. Missing or corrupt
/// files read as empty.
pub fn recent(limit: usize) -> Vec<LogEntry> {
    recent_at(&path(), limit)
}

pub fn clear() {
    let _guard = LOGBOOK_LOCK.lock();
    let _ = fs::write(path(), "[]");
}

pub(crate) fn append_at(
    path: &Path,
    actor: &str,
    icon: &str,
    message: &str,
    kind: &str,
    is_vulnerability: bool,
) {
    let entry = LogEntry {
        timestamp: Local::now().format("%H:%M:%S").to_string(),
        actor: actor.to_string(),
        icon: icon.to_string(),
        message: message.to_string(),
        kind: kind.to_string(),
        is_vulnerability,
    };

    let _guard = LOGBOOK_LOCK.lock();
    let mut entries = read_entries(path);
    entries.push(entry);
    if entries.len() > MAX_ENTRIES {
        entries.drain(..entries.len() - MAX_ENTRIES);
    }
    match serde_json::to_string_pretty(&entries) {
        Ok(json) => {
            if let Err(err) = fs::write(path, json) {
                tracing::warn!(path = %path.display(), %err, "logbook write failed");
            }
        }
        Err(err) => tracing::warn!(%err, "logbook serialize failed"),
    }
}

pub(crate) fn recent_at(path: &Path, limit: usize) -> Vec<LogEntry> {
    let _guard = LOGBOOK_LOCK.lock();
    let mut entries = read_entries(path);
    if entries.len() > limit {
        entries.drain(..entries.len() - limit);
    }
    entries
}

fn read_entries(path: &Path) -> Vec<LogEntry> {
    match fs::read_to_string(path) {
        Ok(content) if !content.trim().is_empty() => {
            serde_json::from_str(&content).unwrap_or_default()
        }
        _ => Vec::new(),
    }
}
