// SPDX-License-Identifier: PMPL-1.0-or-later

//! Append-only bounty ledger file.

use crate::types::BountyRecord;
use anyhow::Result;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

static BOUNTIES_LOCK: Mutex<()> = Mutex::new(());

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct BountyFile {
    #[serde(default)]
    bounties: Vec<BountyRecord>,
}

#[derive(Debug, Clone)]
pub struct BountyStore {
    path: PathBuf,
}

impl BountyStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Append one record (read-modify-write under the store lock).
    pub fn append(&self, record: &BountyRecord) -> Result<()> {
        let _guard = BOUNTIES_LOCK.lock();
        let mut file: BountyFile = super::read_json_or_default(&self.path);
        file.bounties.push(record.clone());
        super::write_json(&self.path, &file)
    }

    pub fn load(&self) -> Vec<BountyRecord> {
        let _guard = BOUNTIES_LOCK.lock();
        let file: BountyFile = super::read_json_or_default(&self.path);
        file.bounties
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(tx: &str) -> BountyRecord {
        BountyRecord {
            recipient: "audit1deadbeef".to_string(),
            exploit: "gauntlet_2024".to_string(),
            amount: 1,
            timestamp: "2024-01-01T00:00:00+00:00".to_string(),
            tx_hash: tx.to_string(),
        }
    }

    #[test]
    fn test_append_accumulates() {
        let dir = TempDir::new().unwrap();
        let store = BountyStore::new(dir.path().join("bounty_tokens.json"));

        store.append(&record("0xaaaa")).unwrap();
        store.append(&record("0xbbbb")).unwrap();

        let all = store.load();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].tx_hash, "0xaaaa");
        assert_eq!(all[1].tx_hash, "0xbbbb");
    }

    #[test]
    fn test_corrupt_ledger_restarts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bounty_tokens.json");
        std::fs::write(&path, "not a ledger").unwrap();

        let store = BountyStore::new(path);
        assert!(store.load().is_empty());
        store.append(&record("0xcccc")).unwrap();
        assert_eq!(store.load().len(), 1);
    }
}
