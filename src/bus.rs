// SPDX-License-Identifier: PMPL-1.0-or-later

//! Fire-and-forget actor messaging.
//!
//! Each actor owns a TCP listener that feeds parsed envelopes into an
//! mpsc mailbox; its event loop is the single consumer, so handlers never
//! overlap within one actor. Delivery is at-most-once with no
//! acknowledgement and no ordering guarantee across sender/receiver
//! pairs: `send` writes one JSON line and hangs up, and a failed delivery
//! is the sender's problem to log (or ignore).

use crate::types::Envelope;
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const IO_TIMEOUT: Duration = Duration::from_secs(5);

/// Regex source for identity addresses, shared with orchestrator
/// discovery.
pub const ADDRESS_PATTERN: &str = "audit1[0-9a-f]{38}";

/// Placeholder used when an address cannot be discovered.
pub const PLACEHOLDER_ADDRESS: &str = "audit1...";

/// Everything an actor's event loop can wake up on.
#[derive(Debug)]
pub enum Event {
    Message(Envelope),
    Tick,
}

/// Deterministic identity address derived from a seed phrase.
pub fn derive_address(seed: &str) -> String {
    let digest = hex::encode(Sha256::digest(seed.as_bytes()));
    format!("audit1{}", &digest[..38])
}

/// Bind the actor's inbound endpoint and start the accept loop. Returns
/// the bound address (useful when `port` is 0).
pub fn listen(port: u16, tx: Sender<Event>) -> Result<SocketAddr> {
    let listener = TcpListener::bind(("127.0.0.1", port))
        .with_context(|| format!("binding actor endpoint on port {port}"))?;
    let addr = listener.local_addr()?;

    thread::spawn(move || {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let tx = tx.clone();
                    thread::spawn(move || drain_connection(stream, tx));
                }
                Err(err) => {
                    tracing::debug!(%err, "accept failed");
                }
            }
        }
    });

    Ok(addr)
}

fn drain_connection(stream: TcpStream, tx: Sender<Event>) {
    let _ = stream.set_read_timeout(Some(IO_TIMEOUT));
    let reader = BufReader::new(stream);
    for line in reader.lines() {
        let Ok(line) = line else { return };
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Envelope>(&line) {
            Ok(envelope) => {
                if tx.send(Event::Message(envelope)).is_err() {
                    return;
                }
            }
            Err(err) => {
                // Malformed traffic is dropped, not fatal.
                tracing::debug!(%err, "discarding unparsable envelope");
            }
        }
    }
}

/// Deliver one envelope to a peer endpoint (`host:port`).
pub fn send(endpoint: &str, envelope: &Envelope) -> Result<()> {
    let addr: SocketAddr = endpoint
        .parse()
        .with_context(|| format!("bad endpoint '{endpoint}'"))?;
    let mut stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)
        .with_context(|| format!("connecting to {endpoint}"))?;
    stream.set_write_timeout(Some(IO_TIMEOUT))?;

    let mut line = serde_json::to_string(envelope)?;
    line.push('\n');
    stream
        .write_all(line.as_bytes())
        .with_context(|| format!("sending to {endpoint}"))?;
    Ok(())
}

/// Deliver and swallow failure; `what` labels the attempt in the trace.
pub fn send_best_effort(endpoint: &str, envelope: &Envelope, what: &str) {
    if let Err(err) = send(endpoint, envelope) {
        tracing::debug!(%err, endpoint, "{what} delivery failed");
    }
}

/// Periodic tick feeding the same mailbox as inbound messages. The
/// thread exits once the mailbox is gone.
pub fn spawn_timer(period: Duration, tx: Sender<Event>) {
    thread::spawn(move || loop {
        thread::sleep(period);
        if tx.send(Event::Tick).is_err() {
            break;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AttackMessage, WireMessage};
    use std::sync::mpsc;

    fn attack_envelope(payload: &str) -> Envelope {
        Envelope {
            sender: derive_address("test-sender"),
            reply_to: "127.0.0.1:1".to_string(),
            body: WireMessage::Attack(AttackMessage {
                payload: payload.to_string(),
            }),
        }
    }

    #[test]
    fn test_derive_address_matches_pattern() {
        let address = derive_address("auditor-seed-phrase");
        let pattern = regex::Regex::new(&format!("^{ADDRESS_PATTERN}$")).unwrap();
        assert!(pattern.is_match(&address), "bad address: {address}");
        assert_eq!(address, derive_address("auditor-seed-phrase"));
        assert_ne!(address, derive_address("target-seed-phrase"));
    }

    #[test]
    fn test_send_and_receive_round_trip() {
        let (tx, rx) = mpsc::channel();
        let addr = listen(0, tx).unwrap();
        let endpoint = addr.to_string();

        send(&endpoint, &attack_envelope("admin")).unwrap();

        match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
            Event::Message(envelope) => {
                assert_eq!(
                    envelope.body,
                    WireMessage::Attack(AttackMessage {
                        payload: "admin".to_string()
                    })
                );
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_garbage_traffic_does_not_kill_the_listener() {
        let (tx, rx) = mpsc::channel();
        let addr = listen(0, tx).unwrap();
        let endpoint = addr.to_string();

        {
            let mut stream =
                TcpStream::connect_timeout(&addr, Duration::from_secs(2)).unwrap();
            stream.write_all(b"this is not an envelope\n").unwrap();
        }

        send(&endpoint, &attack_envelope("root")).unwrap();
        match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
            Event::Message(envelope) => match envelope.body {
                WireMessage::Attack(msg) => assert_eq!(msg.payload, "root"),
                other => panic!("unexpected body: {other:?}"),
            },
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_send_to_dead_endpoint_errors() {
        assert!(send("127.0.0.1:1", &attack_envelope("x")).is_err());
    }

    #[test]
    fn test_timer_ticks() {
        let (tx, rx) = mpsc::channel();
        spawn_timer(Duration::from_millis(10), tx);
        for _ in 0..2 {
            match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
                Event::Tick => {}
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }
}
