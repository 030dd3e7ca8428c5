// SPDX-License-Identifier: PMPL-1.0-or-later

//! Actor address discovery.
//!
//! Three rungs, best first: the actor's own stdout announcement, the most
//! recent matching startup entry in the shared logbook, and finally a
//! sentinel placeholder. Discovery failure is non-fatal by design; the
//! exercise runs degraded rather than not at all.

use crate::bus::{ADDRESS_PATTERN, PLACEHOLDER_ADDRESS};
use crate::logbook;
use crate::types::Role;
use anyhow::{Context, Result};
use regex::Regex;
use std::path::Path;
use std::time::{Duration, Instant};

const LOGBOOK_SCAN_DEPTH: usize = 100;
const ANNOUNCE_POLL: Duration = Duration::from_millis(100);

pub(crate) fn address_regex() -> Result<Regex> {
    Regex::new(ADDRESS_PATTERN).context("compiling address pattern")
}

/// Wait up to `settle` for the stdout announcement, then fall back to the
/// logbook, then to the placeholder.
pub(crate) fn discover_address(
    announced: &dyn Fn() -> Option<String>,
    role: Role,
    settle: Duration,
    logbook_path: &Path,
) -> String {
    let deadline = Instant::now() + settle;
    loop {
        if let Some(address) = announced() {
            return address;
        }
        if Instant::now() >= deadline {
            break;
        }
        std::thread::sleep(ANNOUNCE_POLL);
    }

    if let Some(address) = from_logbook(logbook_path, role) {
        tracing::debug!(role = role.label(), %address, "address recovered from logbook");
        return address;
    }

    tracing::warn!(role = role.label(), "address discovery failed, using placeholder");
    PLACEHOLDER_ADDRESS.to_string()
}

/// Scan the most recent logbook entries for this actor's startup line.
pub(crate) fn from_logbook(path: &Path, role: Role) -> Option<String> {
    let regex = address_regex().ok()?;
    let entries = logbook::recent_at(path, LOGBOOK_SCAN_DEPTH);
    for entry in entries.iter().rev() {
        if !entry.actor.eq_ignore_ascii_case(role.label()) {
            continue;
        }
        if !entry.message.to_lowercase().contains("started") {
            continue;
        }
        if let Some(found) = regex.find(&entry.message) {
            return Some(found.as_str().to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::derive_address;
    use tempfile::TempDir;

    #[test]
    fn test_announcement_wins_over_logbook() {
        let dir = TempDir::new().unwrap();
        let expected = derive_address("announced");
        let announced = {
            let expected = expected.clone();
            move || Some(expected.clone())
        };
        let found = discover_address(
            &announced,
            Role::Auditor,
            Duration::from_secs(1),
            &dir.path().join("logs.json"),
        );
        assert_eq!(found, expected);
    }

    #[test]
    fn test_logbook_fallback() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs.json");
        let address = derive_address("auditor-seed-phrase");
        logbook::append_at(
            &path,
            "Auditor",
            "a",
            &format!("Auditor actor started: {address}"),
            "info",
            false,
        );

        let found = discover_address(&|| None, Role::Auditor, Duration::from_millis(10), &path);
        assert_eq!(found, address);
    }

    #[test]
    fn test_logbook_fallback_matches_actor_name() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs.json");
        let address = derive_address("target-seed-phrase");
        logbook::append_at(
            &path,
            "Target",
            "t",
            &format!("Target actor started: {address}"),
            "info",
            false,
        );

        // Asking for the auditor must not pick up the target's line.
        assert_eq!(from_logbook(&path, Role::Auditor), None);
        assert_eq!(from_logbook(&path, Role::Target), Some(address));
    }

    #[test]
    fn test_placeholder_when_nothing_is_discoverable() {
        let dir = TempDir::new().unwrap();
        let found = discover_address(
            &|| None,
            Role::Attacker,
            Duration::from_millis(10),
            &dir.path().join("logs.json"),
        );
        assert_eq!(found, PLACEHOLDER_ADDRESS);
    }

    #[test]
    fn test_most_recent_startup_entry_wins() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs.json");
        let old = derive_address("old-run");
        let new = derive_address("new-run");
        for address in [&old, &new] {
            logbook::append_at(
                &path,
                "Attacker",
                "r",
                &format!("Attacker actor started: {address}"),
                "info",
                false,
            );
        }

        assert_eq!(from_logbook(&path, Role::Attacker), Some(new));
    }
}
