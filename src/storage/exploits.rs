// SPDX-License-Identifier: PMPL-1.0-or-later

//! Durable deduplicated memory of previously discovered attack payloads.
//!
//! The attacker loads this at startup and appends to it on a confirmed
//! hit. Membership is informational: callers may still act on a payload
//! that is already present, the store just skips the duplicate write.

use crate::logbook;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

static EXPLOITS_LOCK: Mutex<()> = Mutex::new(());

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ExploitFile {
    #[serde(default)]
    exploits: Vec<String>,
}

/// Handle on the exploit store file.
#[derive(Debug, Clone)]
pub struct ExploitMemory {
    path: PathBuf,
}

impl ExploitMemory {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Load the known set. Absent or corrupt storage reads as empty;
    /// corruption is swallowed, not raised.
    pub fn load(&self) -> HashSet<String> {
        let _guard = EXPLOITS_LOCK.lock();
        let file: ExploitFile = super::read_json_or_default(&self.path);
        file.exploits.into_iter().collect()
    }

    /// Add `payload` to the set and persist the whole set. Returns false
    /// only on an unrecoverable write error. Saving an already-known
    /// payload is a no-op on disk content (set semantics).
    pub fn save(&self, payload: &str, known: &mut HashSet<String>) -> bool {
        known.insert(payload.to_string());

        let _guard = EXPLOITS_LOCK.lock();
        let mut exploits: Vec<String> = known.iter().cloned().collect();
        exploits.sort();
        match super::write_json(&self.path, &ExploitFile { exploits }) {
            Ok(()) => {
                logbook::record(
                    "Memory",
                    "\u{1f4be}",
                    &format!("Exploit persisted: '{payload}'"),
                    "info",
                );
                true
            }
            Err(err) => {
                tracing::warn!(%err, "exploit store write failed");
                logbook::record(
                    "Memory",
                    "\u{1f4be}",
                    &format!("Error saving exploit: {err}"),
                    "info",
                );
                false
            }
        }
    }

    pub fn try_load_logged(&self) -> HashSet<String> {
        logbook::record(
            "Memory",
            "\u{1f4be}",
            "Querying memory for known exploits...",
            "info",
        );
        let known = self.load();
        if known.is_empty() {
            logbook::record("Memory", "\u{1f4be}", "No known exploits found", "info");
        } else {
            logbook::record(
                "Memory",
                "\u{1f4be}",
                &format!("Loaded {} known exploits from storage", known.len()),
                "info",
            );
        }
        known
    }
}
