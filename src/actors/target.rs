// SPDX-License-Identifier: PMPL-1.0-or-later

//! Target actor: stateless responder protecting a secret.

use crate::bus::{self, Event};
use crate::logbook;
use crate::types::{Envelope, Peer, ResponseMessage, Role, Verdict, WireMessage};
use anyhow::Result;
use std::sync::mpsc;

const DENIAL_MESSAGE: &str = "Access Denied";

#[derive(Debug, Clone)]
pub struct TargetConfig {
    pub secret: String,
    pub seed: String,
    pub port: u16,
    pub auditor: Option<Peer>,
}

/// Deterministic evaluation of one payload against the protected secret.
pub fn evaluate(secret: &str, payload: &str) -> ResponseMessage {
    if payload == secret {
        ResponseMessage {
            status: Verdict::Success,
            message: format!("Access Granted! Flag: {secret}"),
        }
    } else {
        ResponseMessage {
            status: Verdict::Denied,
            message: DENIAL_MESSAGE.to_string(),
        }
    }
}

pub fn run(config: TargetConfig) -> Result<()> {
    let (bound, address, rx) = bind(&config)?;
    event_loop(config, address, bound.to_string(), rx);
    Ok(())
}

/// Bind and run the event loop on a background thread, returning the
/// bound endpoint. Used when the target shares a process with its peers.
pub fn spawn(config: TargetConfig) -> Result<std::net::SocketAddr> {
    let (bound, address, rx) = bind(&config)?;
    let endpoint = bound.to_string();
    std::thread::spawn(move || event_loop(config, address, endpoint, rx));
    Ok(bound)
}

fn bind(
    config: &TargetConfig,
) -> Result<(std::net::SocketAddr, String, mpsc::Receiver<Event>)> {
    let address = bus::derive_address(&config.seed);
    let (tx, rx) = mpsc::channel();
    let bound = bus::listen(config.port, tx)?;

    super::announce(Role::Target, &address);
    logbook::record(
        Role::Target.label(),
        Role::Target.icon(),
        &format!("Listening on port {}", bound.port()),
        "info",
    );
    tracing::info!(%address, endpoint = %bound, "target actor running");
    Ok((bound, address, rx))
}

fn event_loop(config: TargetConfig, address: String, endpoint: String, rx: mpsc::Receiver<Event>) {
    for event in rx {
        match event {
            Event::Message(envelope) => handle(&config, &address, &endpoint, envelope),
            Event::Tick => {}
        }
    }
}

fn handle(config: &TargetConfig, address: &str, endpoint: &str, envelope: Envelope) {
    let attack = match envelope.body {
        WireMessage::Attack(attack) => attack,
        WireMessage::Response(_) => {
            tracing::debug!(sender = %envelope.sender, "target ignoring response traffic");
            return;
        }
    };

    logbook::record(
        Role::Target.label(),
        Role::Target.icon(),
        &format!("Processing input: '{}'...", attack.payload),
        "info",
    );

    let response = evaluate(&config.secret, &attack.payload);
    if response.status == Verdict::Success {
        tracing::info!("protected secret compromised");
        logbook::vulnerability(
            Role::Target.label(),
            Role::Target.icon(),
            "Processing input... Vulnerability triggered! Leaking protected secret.",
        );
    } else {
        logbook::record(
            Role::Target.label(),
            Role::Target.icon(),
            &format!("Attack blocked: '{}'", attack.payload),
            "info",
        );
    }

    let reply = Envelope {
        sender: address.to_string(),
        reply_to: endpoint.to_string(),
        body: WireMessage::Response(response),
    };

    // Reply to the original sender; delivery failure is logged, never
    // raised into the loop.
    bus::send_best_effort(&envelope.reply_to, &reply, "attacker reply");

    // Observability copy for the auditor.
    if let Some(auditor) = &config.auditor {
        bus::send_best_effort(&auditor.endpoint, &reply, "auditor mirror");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrong_payload_is_denied() {
        let response = evaluate("gauntlet_2024", "admin");
        assert_eq!(response.status, Verdict::Denied);
        assert_eq!(response.message, "Access Denied");
    }

    #[test]
    fn test_secret_payload_succeeds_and_leaks_secret() {
        let response = evaluate("gauntlet_2024", "gauntlet_2024");
        assert_eq!(response.status, Verdict::Success);
        assert!(response.message.contains("gauntlet_2024"));
    }

    #[test]
    fn test_near_miss_is_still_denied() {
        for payload in ["gauntlet_2024 ", "GAUNTLET_2024", "", "gauntlet_202"] {
            assert_eq!(
                evaluate("gauntlet_2024", payload).status,
                Verdict::Denied,
                "payload {payload:?} must not match"
            );
        }
    }
}
