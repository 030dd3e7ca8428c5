// SPDX-License-Identifier: PMPL-1.0-or-later

//! Attacker actor: periodic payload generation against the target.
//!
//! One mailbox, two producers: the bus listener and the cycle timer.
//! Each tick generates (or falls back to) a payload and fires it at the
//! target with an observability copy to the auditor; responses flip the
//! actor into `completed` on the first confirmed hit.

use crate::bus::{self, Event};
use crate::logbook;
use crate::payloads::PayloadGenerator;
use crate::storage::exploits::ExploitMemory;
use crate::types::{
    AttackMessage, Envelope, Peer, ResponseMessage, Role, Verdict, WireMessage,
};
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::sync::mpsc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AttackerConfig {
    pub seed: String,
    pub port: u16,
    pub target: Peer,
    pub auditor: Option<Peer>,
    pub period: Duration,
    pub max_attempts: u32,
    pub registry_url: Option<String>,
    pub registry_key: Option<String>,
}

struct Attacker {
    config: AttackerConfig,
    address: String,
    endpoint: String,
    generator: PayloadGenerator,
    memory: ExploitMemory,
    known_exploits: HashSet<String>,
    attempt_count: u32,
    completed: bool,
    last_sent_payload: Option<String>,
}

pub fn run(
    config: AttackerConfig,
    generator: PayloadGenerator,
    memory: ExploitMemory,
) -> Result<()> {
    let address = bus::derive_address(&config.seed);
    let (tx, rx) = mpsc::channel();
    let timer_tx = tx.clone();
    let bound = bus::listen(config.port, tx)?;

    super::announce(Role::Attacker, &address);
    logbook::record(
        Role::Attacker.label(),
        Role::Attacker.icon(),
        &format!("Target: {}", config.target.address),
        "info",
    );
    tracing::info!(%address, target = %config.target.address, "attacker actor running");

    // Both startup steps are best-effort: an empty memory or a missed
    // registration never stops the attack loop.
    let known_exploits = memory.try_load_logged();
    register(&config, &address, &bound.to_string());

    bus::spawn_timer(config.period, timer_tx);

    let mut attacker = Attacker {
        endpoint: bound.to_string(),
        address,
        config,
        generator,
        memory,
        known_exploits,
        attempt_count: 0,
        completed: false,
        last_sent_payload: None,
    };

    for event in rx {
        match event {
            Event::Tick => attacker.on_tick(),
            Event::Message(envelope) => match envelope.body {
                WireMessage::Response(response) => attacker.on_response(&response),
                WireMessage::Attack(_) => {
                    tracing::debug!(sender = %envelope.sender, "attacker ignoring attack traffic");
                }
            },
        }
    }
    Ok(())
}

/// Best-effort registration with an external directory, skipped without a
/// credential.
fn register(config: &AttackerConfig, address: &str, endpoint: &str) {
    let (Some(url), Some(key)) = (&config.registry_url, &config.registry_key) else {
        tracing::debug!("no registry credential configured, skipping registration");
        return;
    };

    let result = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .context("building registry http client")
        .and_then(|client| {
            client
                .post(url)
                .bearer_auth(key)
                .json(&serde_json::json!({
                    "name": "attacker",
                    "address": address,
                    "endpoint": endpoint,
                }))
                .send()
                .context("registry request failed")
        });

    match result {
        Ok(response) if response.status().is_success() => {
            logbook::record(
                Role::Attacker.label(),
                Role::Attacker.icon(),
                &format!("Registered with directory: {endpoint}"),
                "info",
            );
        }
        Ok(response) => {
            tracing::warn!(status = %response.status(), "registry rejected registration");
        }
        Err(err) => {
            tracing::warn!(%err, "registration failed");
            logbook::record(
                Role::Attacker.label(),
                Role::Attacker.icon(),
                &format!("Registration error: {err}"),
                "info",
            );
        }
    }
}

impl Attacker {
    fn on_tick(&mut self) {
        if self.completed || self.attempt_count >= self.config.max_attempts {
            return;
        }

        let payload = self.generator.next_payload();
        self.last_sent_payload = Some(payload.clone());
        self.attempt_count += 1;

        tracing::info!(attempt = self.attempt_count, %payload, "sending attack");
        logbook::record(
            Role::Attacker.label(),
            Role::Attacker.icon(),
            &format!("Executing vector: '{payload}'"),
            "attack",
        );

        let envelope = Envelope {
            sender: self.address.clone(),
            reply_to: self.endpoint.clone(),
            body: WireMessage::Attack(AttackMessage { payload }),
        };

        if let Err(err) = bus::send(&self.config.target.endpoint, &envelope) {
            tracing::warn!(%err, "attack delivery to target failed");
        }
        if let Some(auditor) = &self.config.auditor {
            bus::send_best_effort(&auditor.endpoint, &envelope, "auditor copy");
        }
    }

    fn on_response(&mut self, response: &ResponseMessage) {
        logbook::record(
            Role::Attacker.label(),
            Role::Attacker.icon(),
            &format!("Response received: {} - {}", response.status, response.message),
            "info",
        );

        match response.status {
            Verdict::Success => {
                logbook::vulnerability(
                    Role::Attacker.label(),
                    Role::Attacker.icon(),
                    "SUCCESS! Protected secret recovered! Vulnerability exploited!",
                );
                self.record_success();
                self.completed = true;
            }
            Verdict::Denied => {
                logbook::record(
                    Role::Attacker.label(),
                    Role::Attacker.icon(),
                    &format!(
                        "Attack denied: {}. Continuing attack sequence...",
                        response.message
                    ),
                    "info",
                );
            }
            Verdict::Unknown => {
                tracing::warn!(status = %response.status, "unrecognized response status");
                logbook::record(
                    Role::Attacker.label(),
                    Role::Attacker.icon(),
                    &format!(
                        "Unknown response status: {} - {}",
                        response.status, response.message
                    ),
                    "info",
                );
            }
        }
    }

    fn record_success(&mut self) {
        let Some(payload) = self.last_sent_payload.clone() else {
            return;
        };
        if self.known_exploits.contains(&payload) {
            logbook::record(
                "Memory",
                "\u{1f4be}",
                &format!("Exploit already known, skipping save: {payload}"),
                "info",
            );
            return;
        }
        self.memory.save(&payload, &mut self.known_exploits);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_attacker(dir: &TempDir, max_attempts: u32) -> Attacker {
        let config = AttackerConfig {
            seed: "attacker-seed-phrase".to_string(),
            port: 0,
            target: Peer {
                address: "audit1aaaa".to_string(),
                // Dead endpoint: delivery fails, which a cycle must survive.
                endpoint: "127.0.0.1:1".to_string(),
            },
            auditor: None,
            period: Duration::from_secs(3),
            max_attempts,
            registry_url: None,
            registry_key: None,
        };
        Attacker {
            address: bus::derive_address(&config.seed),
            endpoint: "127.0.0.1:0".to_string(),
            config,
            generator: PayloadGenerator::new(None, None, &[]).unwrap(),
            memory: ExploitMemory::new(dir.path().join("known_exploits.json")),
            known_exploits: HashSet::new(),
            attempt_count: 0,
            completed: false,
            last_sent_payload: None,
        }
    }

    #[test]
    fn test_tick_records_payload_before_counting() {
        let dir = TempDir::new().unwrap();
        let mut attacker = test_attacker(&dir, 50);

        attacker.on_tick();
        assert_eq!(attacker.attempt_count, 1);
        assert!(attacker.last_sent_payload.is_some());
    }

    #[test]
    fn test_attempt_cap_stops_the_loop() {
        let dir = TempDir::new().unwrap();
        let mut attacker = test_attacker(&dir, 2);

        for _ in 0..5 {
            attacker.on_tick();
        }
        assert_eq!(attacker.attempt_count, 2);
    }

    #[test]
    fn test_success_completes_and_persists_exploit() {
        let dir = TempDir::new().unwrap();
        let mut attacker = test_attacker(&dir, 50);
        attacker.last_sent_payload = Some("gauntlet_2024".to_string());

        attacker.on_response(&ResponseMessage {
            status: Verdict::Success,
            message: "Access Granted! Flag: gauntlet_2024".to_string(),
        });

        assert!(attacker.completed);
        assert!(attacker.known_exploits.contains("gauntlet_2024"));
        let reloaded = ExploitMemory::new(dir.path().join("known_exploits.json")).load();
        assert!(reloaded.contains("gauntlet_2024"));
    }

    #[test]
    fn test_success_with_known_exploit_skips_the_write() {
        let dir = TempDir::new().unwrap();
        let mut attacker = test_attacker(&dir, 50);
        attacker.known_exploits.insert("gauntlet_2024".to_string());
        attacker.last_sent_payload = Some("gauntlet_2024".to_string());

        attacker.on_response(&ResponseMessage {
            status: Verdict::Success,
            message: "Access Granted! Flag: gauntlet_2024".to_string(),
        });

        assert!(attacker.completed);
        // Nothing was persisted; the store file was never created.
        assert!(!dir.path().join("known_exploits.json").exists());
    }

    #[test]
    fn test_denied_keeps_attacking() {
        let dir = TempDir::new().unwrap();
        let mut attacker = test_attacker(&dir, 50);
        attacker.on_tick();

        attacker.on_response(&ResponseMessage {
            status: Verdict::Denied,
            message: "Access Denied".to_string(),
        });

        assert!(!attacker.completed);
        attacker.on_tick();
        assert_eq!(attacker.attempt_count, 2);
    }

    #[test]
    fn test_unknown_status_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let mut attacker = test_attacker(&dir, 50);
        attacker.on_tick();
        let before = attacker.attempt_count;

        attacker.on_response(&ResponseMessage {
            status: Verdict::Unknown,
            message: "partial".to_string(),
        });

        assert!(!attacker.completed);
        assert_eq!(attacker.attempt_count, before);
        assert!(!dir.path().join("known_exploits.json").exists());
    }

    #[test]
    fn test_completed_attacker_ignores_ticks() {
        let dir = TempDir::new().unwrap();
        let mut attacker = test_attacker(&dir, 50);
        attacker.completed = true;

        attacker.on_tick();
        assert_eq!(attacker.attempt_count, 0);
    }
}
