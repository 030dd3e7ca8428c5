// SPDX-License-Identifier: PMPL-1.0-or-later

//! Auditor actor: passive observer of attack and response traffic.
//!
//! The auditor sees two unordered streams with no correlation id linking
//! a response to the attack that caused it. Attribution is therefore a
//! recency heuristic over a bounded history: correct with a single
//! attacker and in-order arrival, ambiguous under concurrent attackers.
//! That ambiguity is inherited behavior and deliberately left intact.
//!
//! Steady state is `observing`; a qualifying response runs the
//! synchronous confirmation chain (proof, then bounty, failures isolated
//! from each other) and drops straight back to observing.

use crate::bus::{self, Event};
use crate::effects::{derive_audit_id, ProofRequest, ProofService};
use crate::effects::ledger::LedgerService;
use crate::logbook;
use crate::types::{
    AttackFlowEntry, AuditProofRecord, ResponseMessage, Role, Verdict, WireMessage,
};
use anyhow::Result;
use std::collections::{HashMap, VecDeque};
use std::sync::mpsc;

const ATTACK_FLOW_LIMIT: usize = 10;
const RISK_SCORE: u8 = 98;
const RISK_THRESHOLD: u8 = 90;
const PLACEHOLDER_SENDER_SEED: &str = "unattributed-attacker";

#[derive(Debug, Clone)]
pub struct AuditorConfig {
    pub seed: String,
    pub port: u16,
    pub secret: String,
}

/// Most recent payload per sender, preserving first-seen order the way
/// the correlation fallback expects: overwriting a sender's payload does
/// not move it to the back.
#[derive(Debug, Default)]
pub struct MonitoredAttacks {
    entries: Vec<(String, String)>,
}

impl MonitoredAttacks {
    pub fn record(&mut self, sender: &str, payload: &str) {
        if let Some(entry) = self.entries.iter_mut().find(|(s, _)| s == sender) {
            entry.1 = payload.to_string();
        } else {
            self.entries.push((sender.to_string(), payload.to_string()));
        }
    }

    pub fn last(&self) -> Option<(&str, &str)> {
        self.entries
            .last()
            .map(|(s, p)| (s.as_str(), p.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct Auditor {
    address: String,
    secret: String,
    attack_flow: VecDeque<AttackFlowEntry>,
    monitored: MonitoredAttacks,
    bounties_awarded: u32,
    proof_records: HashMap<String, AuditProofRecord>,
    proof: ProofService,
    ledger: LedgerService,
}

pub fn run(config: AuditorConfig, proof: ProofService, ledger: LedgerService) -> Result<()> {
    let mut auditor = Auditor::new(&config, proof, ledger);
    let (tx, rx) = mpsc::channel();
    let bound = bus::listen(config.port, tx)?;

    super::announce(Role::Auditor, &auditor.address);
    logbook::record(
        Role::Auditor.label(),
        Role::Auditor.icon(),
        "Monitoring attacker and target communications...",
        "info",
    );
    tracing::info!(address = %auditor.address, endpoint = %bound, "auditor actor running");

    for event in rx {
        match event {
            Event::Message(envelope) => match envelope.body {
                WireMessage::Attack(attack) => {
                    auditor.on_attack(&envelope.sender, &attack.payload)
                }
                WireMessage::Response(response) => {
                    auditor.on_response(&envelope.sender, &response)
                }
            },
            Event::Tick => {}
        }
    }
    Ok(())
}

impl Auditor {
    pub fn new(config: &AuditorConfig, proof: ProofService, ledger: LedgerService) -> Self {
        Self {
            address: bus::derive_address(&config.seed),
            secret: config.secret.clone(),
            attack_flow: VecDeque::new(),
            monitored: MonitoredAttacks::default(),
            bounties_awarded: 0,
            proof_records: HashMap::new(),
            proof,
            ledger,
        }
    }

    pub fn on_attack(&mut self, sender: &str, payload: &str) {
        tracing::info!(%sender, %payload, "intercepted attack");
        logbook::record(
            Role::Auditor.label(),
            Role::Auditor.icon(),
            &format!("Monitoring attack: {sender} -> target (payload: '{payload}')"),
            "info",
        );

        self.attack_flow.push_back(AttackFlowEntry {
            sender: sender.to_string(),
            payload: payload.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        });
        while self.attack_flow.len() > ATTACK_FLOW_LIMIT {
            self.attack_flow.pop_front();
        }
        self.monitored.record(sender, payload);
    }

    pub fn on_response(&mut self, sender: &str, response: &ResponseMessage) {
        tracing::info!(%sender, status = %response.status, "intercepted response");
        logbook::record(
            Role::Auditor.label(),
            Role::Auditor.icon(),
            "Interception. Analyzing target response against risk matrix.",
            "info",
        );

        if response.status != Verdict::Success || !response.message.contains(&self.secret) {
            logbook::record(
                Role::Auditor.label(),
                Role::Auditor.icon(),
                &format!(
                    "Response analyzed: {} - No vulnerability detected.",
                    response.status
                ),
                "info",
            );
            return;
        }

        self.confirm();
    }

    /// The confirmation chain: attribute, prove, reward. Proof failure is
    /// isolated from bounty issuance; bounty issuance cannot fail.
    fn confirm(&mut self) {
        let (attributed_sender, attributed_payload) = self.attribute();

        tracing::info!(
            sender = %attributed_sender,
            payload = %attributed_payload,
            "critical vulnerability confirmed"
        );
        logbook::vulnerability(
            Role::Auditor.label(),
            Role::Auditor.icon(),
            &format!("CRITICAL VULNERABILITY CONFIRMED. Risk Score: {RISK_SCORE}/100."),
        );

        let timestamp = chrono::Utc::now().to_rfc3339();
        let audit_id = derive_audit_id(&attributed_payload, &timestamp);

        let request = ProofRequest {
            audit_id: audit_id.clone(),
            exploit: attributed_payload.clone(),
            risk_score: RISK_SCORE,
            auditor_id: self.address.clone(),
            threshold: RISK_THRESHOLD,
        };
        match self.proof.submit(&request) {
            Ok(proof_hash) => {
                self.proof_records.insert(
                    audit_id.clone(),
                    AuditProofRecord {
                        audit_id,
                        proof_hash,
                        risk_score: RISK_SCORE,
                        auditor_id: self.address.clone(),
                        threshold: RISK_THRESHOLD,
                    },
                );
            }
            Err(err) => {
                tracing::warn!(%err, "proof submission failed");
                logbook::record(
                    Role::Auditor.label(),
                    Role::Auditor.icon(),
                    &format!("Proof submission failed: {err}"),
                    "info",
                );
            }
        }

        let record = self
            .ledger
            .issue_bounty(&attributed_sender, &attributed_payload);
        self.bounties_awarded += 1;

        let short: String = attributed_sender.chars().take(20).collect();
        logbook::record(
            Role::Auditor.label(),
            Role::Auditor.icon(),
            &format!("Bounty token awarded to {short}..."),
            "info",
        );
        logbook::record(
            Role::Auditor.label(),
            Role::Auditor.icon(),
            &format!("Transaction: {}", record.tx_hash),
            "info",
        );
    }

    pub fn bounties_awarded(&self) -> u32 {
        self.bounties_awarded
    }

    pub fn proof_records(&self) -> impl Iterator<Item = &AuditProofRecord> {
        self.proof_records.values()
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Attribution precedence: newest flow entry, then newest monitored
    /// sender, then the fixed placeholder pair.
    fn attribute(&self) -> (String, String) {
        if let Some(entry) = self.attack_flow.back() {
            return (entry.sender.clone(), entry.payload.clone());
        }
        if let Some((sender, payload)) = self.monitored.last() {
            return (sender.to_string(), payload.to_string());
        }
        (
            bus::derive_address(PLACEHOLDER_SENDER_SEED),
            self.secret.clone(),
        )
    }
}
