// SPDX-License-Identifier: PMPL-1.0-or-later

//! The three exercise actors.
//!
//! Each actor runs as its own process with a single-threaded event loop
//! over one mailbox: inbound envelopes and (for the attacker) timer ticks
//! are handled strictly one at a time. Handlers absorb their own
//! failures; nothing in here is allowed to crash the loop.

pub mod attacker;
pub mod auditor;
pub mod target;

use crate::logbook;
use crate::types::Role;
use std::io::Write;

/// Print the startup announcement line the orchestrator's discovery
/// reads, and mirror it into the logbook (the discovery fallback).
pub(crate) fn announce(role: Role, address: &str) {
    println!("{} actor started: {address}", role.label());
    let _ = std::io::stdout().flush();
    logbook::record(
        role.label(),
        role.icon(),
        &format!("{} actor started: {address}", role.label()),
        "info",
    );
}
