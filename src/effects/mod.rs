// SPDX-License-Identifier: PMPL-1.0-or-later

//! External-effect clients: proof submission and bounty issuance.
//!
//! Each client is an ordered chain of backends tried first-to-last; the
//! last backend is a local deterministic simulation, so a chain that ends
//! in one cannot fail. Remote backends fail on transport errors, timeouts,
//! non-success status codes, and application-level error fields alike.

pub mod ledger;
pub mod proof;

pub use ledger::{BountyRequest, LedgerService};
pub use proof::{ProofRequest, ProofService};

use anyhow::{anyhow, Result};
use sha2::{Digest, Sha256};

/// One backend in a fallback chain.
pub trait EffectStrategy<I> {
    fn label(&self) -> &'static str;
    fn attempt(&self, input: &I) -> Result<String>;
}

/// Try each strategy in order, stopping at the first success.
pub(crate) fn run_chain<I>(input: &I, strategies: &[&dyn EffectStrategy<I>]) -> Result<String> {
    let mut last_err = anyhow!("no backends configured");
    for strategy in strategies {
        match strategy.attempt(input) {
            Ok(value) => return Ok(value),
            Err(err) => {
                tracing::debug!(backend = strategy.label(), %err, "backend failed, trying next");
                last_err = err;
            }
        }
    }
    Err(last_err)
}

pub fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// 64-hex-character audit identifier derived from the attributed payload
/// and the confirmation timestamp.
pub fn derive_audit_id(exploit: &str, timestamp_iso: &str) -> String {
    sha256_hex(&format!("{exploit}{timestamp_iso}"))
}

/// Deterministic stand-in for a generated proof.
pub fn simulated_proof_hash(audit_id: &str, exploit: &str, risk_score: u8) -> String {
    let digest = sha256_hex(&format!("{audit_id}{exploit}{risk_score}"));
    format!("zk_{}", &digest[..16])
}

/// Deterministic stand-in for a ledger transaction hash.
pub fn simulated_tx_hash(recipient: &str, exploit: &str, timestamp: &str) -> String {
    let digest = sha256_hex(&format!("{recipient}{exploit}{timestamp}"));
    format!("0x{}", &digest[..16])
}

/// Exploit payload packed into the fixed-width witness field:
/// zero-padded, truncated at 64 bytes.
pub fn witness_bytes(exploit: &str) -> [u8; 64] {
    let mut bytes = [0u8; 64];
    let raw = exploit.as_bytes();
    let len = raw.len().min(64);
    bytes[..len].copy_from_slice(&raw[..len]);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_id_is_64_hex_chars() {
        let id = derive_audit_id("' OR '1'='1", "2024-01-01T00:00:00+00:00");
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_simulated_hashes_are_deterministic() {
        let a = simulated_proof_hash("abc123", "payload", 98);
        let b = simulated_proof_hash("abc123", "payload", 98);
        assert_eq!(a, b);

        let tx1 = simulated_tx_hash("audit1xyz", "payload", "2024-01-01T00:00:00+00:00");
        let tx2 = simulated_tx_hash("audit1xyz", "payload", "2024-01-01T00:00:00+00:00");
        assert_eq!(tx1, tx2);
    }

    #[test]
    fn test_risk_score_changes_proof_hash() {
        let a = simulated_proof_hash("abc123", "payload", 98);
        let b = simulated_proof_hash("abc123", "payload", 97);
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_prefixes() {
        assert!(simulated_proof_hash("a", "b", 1).starts_with("zk_"));
        assert!(simulated_tx_hash("a", "b", "c").starts_with("0x"));
    }

    #[test]
    fn test_witness_bytes_pads_and_truncates() {
        let short = witness_bytes("abc");
        assert_eq!(&short[..3], b"abc");
        assert!(short[3..].iter().all(|&b| b == 0));

        let long_input = "x".repeat(100);
        let long = witness_bytes(&long_input);
        assert_eq!(long.len(), 64);
        assert!(long.iter().all(|&b| b == b'x'));
    }

    struct Failing;
    struct Constant(&'static str);

    impl EffectStrategy<()> for Failing {
        fn label(&self) -> &'static str {
            "failing"
        }
        fn attempt(&self, _input: &()) -> Result<String> {
            Err(anyhow!("unreachable backend"))
        }
    }

    impl EffectStrategy<()> for Constant {
        fn label(&self) -> &'static str {
            "constant"
        }
        fn attempt(&self, _input: &()) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn test_chain_stops_at_first_success() {
        let result = run_chain(
            &(),
            &[
                &Failing as &dyn EffectStrategy<()>,
                &Constant("fallback"),
                &Constant("never"),
            ],
        );
        assert_eq!(result.unwrap(), "fallback");
    }

    #[test]
    fn test_chain_reports_last_error_when_all_fail() {
        let result = run_chain(&(), &[&Failing as &dyn EffectStrategy<()>]);
        assert!(result.is_err());
    }
}
