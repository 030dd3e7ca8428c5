// SPDX-License-Identifier: PMPL-1.0-or-later

//! File-backed shared state: exploit memory and the bounty ledger.
//!
//! Both stores are whole-file JSON documents rewritten under a
//! per-resource process-wide lock (read-modify-write). Unparsable content
//! is treated as empty and overwritten on the next save; there is no
//! cross-file transactionality.

pub mod bounties;
pub mod exploits;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Read a JSON document, falling back to `T::default()` when the file is
/// absent or corrupt.
pub(crate) fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    match fs::read_to_string(path) {
        Ok(content) if !content.trim().is_empty() => {
            serde_json::from_str(&content).unwrap_or_default()
        }
        _ => T::default(),
    }
}

/// Overwrite a JSON document in place.
pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating store directory {}", parent.display()))?;
        }
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("writing store {}", path.display()))?;
    Ok(())
}
