// SPDX-License-Identifier: PMPL-1.0-or-later

//! Core type definitions for gauntlet
//!
//! Wire messages exchanged between the three actors, the auditor's
//! correlation records, and the bookkeeping types shared between the
//! orchestrator and the control plane.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Verdict attached to a target response. Anything a peer sends that is
/// not a known status string reads as `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    Success,
    Denied,
    Unknown,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Success => "SUCCESS",
            Verdict::Denied => "DENIED",
            Verdict::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Verdict {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Verdict {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "SUCCESS" => Verdict::Success,
            "DENIED" => Verdict::Denied,
            _ => Verdict::Unknown,
        })
    }
}

/// One attack attempt, immutable once sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackMessage {
    pub payload: String,
}

/// Target's evaluation of one attack attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMessage {
    pub status: Verdict,
    pub message: String,
}

/// Message body carried by a bus envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum WireMessage {
    Attack(AttackMessage),
    Response(ResponseMessage),
}

/// Bus-level envelope. `sender` is the originating actor's identity
/// address; `reply_to` is the socket endpoint a response should go to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub sender: String,
    pub reply_to: String,
    pub body: WireMessage,
}

/// Entry in the auditor's bounded recent-attack history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackFlowEntry {
    pub sender: String,
    pub payload: String,
    pub timestamp: String,
}

/// Recorded outcome of one proof submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditProofRecord {
    pub audit_id: String,
    pub proof_hash: String,
    pub risk_score: u8,
    pub auditor_id: String,
    pub threshold: u8,
}

/// Recorded reward issuance for a confirmed finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BountyRecord {
    pub recipient: String,
    pub exploit: String,
    pub amount: u32,
    pub timestamp: String,
    pub tx_hash: String,
}

/// The three actors the orchestrator manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Auditor,
    Target,
    Attacker,
}

impl Role {
    pub fn all() -> [Role; 3] {
        [Role::Auditor, Role::Target, Role::Attacker]
    }

    /// Display label used in logbook entries and announcements.
    pub fn label(&self) -> &'static str {
        match self {
            Role::Auditor => "Auditor",
            Role::Target => "Target",
            Role::Attacker => "Attacker",
        }
    }

    /// Key used on the control-plane JSON surface.
    pub fn wire_key(&self) -> &'static str {
        match self {
            Role::Auditor => "judge",
            Role::Target => "target",
            Role::Attacker => "redTeam",
        }
    }

    /// Binary subcommand that runs this actor.
    pub fn subcommand(&self) -> &'static str {
        match self {
            Role::Auditor => "auditor",
            Role::Target => "target",
            Role::Attacker => "attacker",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Role::Auditor => "\u{2696}\u{fe0f}",
            Role::Target => "\u{1f3af}",
            Role::Attacker => "\u{1f534}",
        }
    }

    /// Fixed port assignment per actor.
    pub fn port(&self) -> u16 {
        match self {
            Role::Target => 8000,
            Role::Attacker => 8001,
            Role::Auditor => 8002,
        }
    }
}

/// Liveness of a supervised actor process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Down,
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthState::Healthy => write!(f, "healthy"),
            HealthState::Down => write!(f, "down"),
        }
    }
}

/// Requested depth of an exercise run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditIntensity {
    Quick,
    Deep,
}

impl AuditIntensity {
    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "deep" => AuditIntensity::Deep,
            _ => AuditIntensity::Quick,
        }
    }

    /// Attack cadence implied by the intensity.
    pub fn attack_period_secs(&self) -> f64 {
        match self {
            AuditIntensity::Quick => 3.0,
            AuditIntensity::Deep => 1.0,
        }
    }
}

/// Reference to a peer actor: identity address plus delivery endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    pub address: String,
    pub endpoint: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_wire_names() {
        let json = serde_json::to_string(&Verdict::Success).unwrap();
        assert_eq!(json, "\"SUCCESS\"");
        let back: Verdict = serde_json::from_str("\"DENIED\"").unwrap();
        assert_eq!(back, Verdict::Denied);
    }

    #[test]
    fn test_unrecognized_status_maps_to_unknown() {
        let verdict: Verdict = serde_json::from_str("\"PARTIAL\"").unwrap();
        assert_eq!(verdict, Verdict::Unknown);
    }

    #[test]
    fn test_envelope_round_trip() {
        let env = Envelope {
            sender: "audit1abc".to_string(),
            reply_to: "127.0.0.1:8001".to_string(),
            body: WireMessage::Attack(AttackMessage {
                payload: "' OR '1'='1".to_string(),
            }),
        };
        let line = serde_json::to_string(&env).unwrap();
        let back: Envelope = serde_json::from_str(&line).unwrap();
        assert_eq!(back, env);
    }

    #[test]
    fn test_intensity_parse_defaults_to_quick() {
        assert_eq!(AuditIntensity::parse("deep"), AuditIntensity::Deep);
        assert_eq!(AuditIntensity::parse("QUICK"), AuditIntensity::Quick);
        assert_eq!(AuditIntensity::parse("frenzied"), AuditIntensity::Quick);
    }
}
