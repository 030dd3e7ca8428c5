// SPDX-License-Identifier: PMPL-1.0-or-later

//! Gauntlet — Automated Adversarial Audit Exercise.
//!
//! This crate runs a self-contained security exercise between three
//! independently scheduled actor processes: an attacker probing for a
//! protected secret, a target defending it, and an auditor correlating
//! the traffic between them into audit proofs and bounty awards.
//!
//! ENGINE PILLARS:
//! 1. **Actors**: single-loop attacker/target/auditor processes wired
//!    together over a fire-and-forget message bus.
//! 2. **Orchestrator**: control-plane process supervision with address
//!    discovery and rollback.
//! 3. **Effects**: proof and ledger clients with deterministic local
//!    simulation fallbacks, recorded to durable stores.

pub mod actors;
pub mod bus;
pub mod config;
pub mod control;
pub mod effects;
pub mod logbook;
pub mod orchestrator;
pub mod payloads;
pub mod storage;
pub mod types;
