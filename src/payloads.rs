// SPDX-License-Identifier: PMPL-1.0-or-later

//! Attack payload generation.
//!
//! The attacker asks an external completion service for a fresh injection
//! string each cycle. Any failure mode on that path (transport error,
//! timeout, non-success status, empty or malformed content) degrades to a
//! uniform random pick from a fixed fallback pool, so a cycle always has
//! a payload to send.

use crate::logbook;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::time::Duration;

const GENERATION_TIMEOUT: Duration = Duration::from_secs(10);
const GENERATION_PROMPT: &str =
    "Generate a single novel SQL injection probe string. Reply with the string only.";

/// Pool used whenever the generation service is unavailable.
pub const FALLBACK_PAYLOADS: [&str; 4] = [
    "' OR '1'='1",
    "admin' --",
    "' UNION SELECT NULL--",
    "1' OR '1'='1",
];

const GENERATOR_ACTOR: &str = "PayloadGen";
const GENERATOR_ICON: &str = "\u{1f9e0}";

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: String,
}

pub struct PayloadGenerator {
    api_url: Option<String>,
    api_key: Option<String>,
    pool: Vec<String>,
    client: reqwest::blocking::Client,
}

impl PayloadGenerator {
    /// `extra_payloads` extends the built-in fallback pool (a demo config
    /// typically adds the protected secret here so an offline run can
    /// eventually land a hit).
    pub fn new(
        api_url: Option<String>,
        api_key: Option<String>,
        extra_payloads: &[String],
    ) -> Result<Self> {
        let mut pool: Vec<String> = FALLBACK_PAYLOADS.iter().map(|p| p.to_string()).collect();
        pool.extend(extra_payloads.iter().cloned());
        Ok(Self {
            api_url,
            api_key,
            pool,
            client: reqwest::blocking::Client::builder()
                .timeout(GENERATION_TIMEOUT)
                .build()
                .context("building generation http client")?,
        })
    }

    /// Produce the next payload, remote first, pool on any failure.
    pub fn next_payload(&self) -> String {
        if let Some(url) = &self.api_url {
            logbook::record(
                GENERATOR_ACTOR,
                GENERATOR_ICON,
                "Generating injection variant based on previous failure...",
                "info",
            );
            match self.generate_remote(url) {
                Ok(payload) => {
                    logbook::record(
                        GENERATOR_ACTOR,
                        GENERATOR_ICON,
                        &format!("Generated attack vector: {payload}"),
                        "info",
                    );
                    return payload;
                }
                Err(err) => {
                    tracing::debug!(%err, "payload generation failed");
                    logbook::record(
                        GENERATOR_ACTOR,
                        GENERATOR_ICON,
                        &format!("Generation failed ({err}), using fallback"),
                        "info",
                    );
                }
            }
        }
        self.fallback()
    }

    fn generate_remote(&self, url: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": "gpt-4",
            "messages": [{"role": "user", "content": GENERATION_PROMPT}],
            "max_tokens": 100,
            "temperature": 0.7,
        });

        let mut request = self.client.post(url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().context("generation request failed")?;
        if !response.status().is_success() {
            bail!("generation service returned status {}", response.status());
        }

        let body = response.text().context("reading generation response")?;
        parse_completion(&body)
    }

    pub fn fallback(&self) -> String {
        let payload = pick(&self.pool);
        logbook::record(
            GENERATOR_ACTOR,
            GENERATOR_ICON,
            &format!("Using fallback payload: {payload}"),
            "info",
        );
        payload
    }
}

/// Extract the generated string from a completion-style response body.
/// Empty and malformed content are both failures; the caller falls back.
fn parse_completion(body: &str) -> Result<String> {
    let parsed: CompletionResponse =
        serde_json::from_str(body).context("malformed generation response")?;
    let content = parsed
        .choices
        .first()
        .map(|choice| choice.message.content.trim().to_string())
        .unwrap_or_default();
    if content.is_empty() {
        bail!("generation service returned empty content");
    }
    Ok(content)
}

fn pick(pool: &[String]) -> String {
    debug_assert!(!pool.is_empty());
    let mut buf = [0u8; 8];
    let index = match getrandom::getrandom(&mut buf) {
        Ok(()) => (u64::from_le_bytes(buf) as usize) % pool.len(),
        // Entropy failure degrades to the first entry rather than a panic.
        Err(_) => 0,
    };
    pool[index].clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_comes_from_pool() {
        let generator = PayloadGenerator::new(None, None, &[]).unwrap();
        for _ in 0..20 {
            let payload = generator.fallback();
            assert!(FALLBACK_PAYLOADS.contains(&payload.as_str()));
        }
    }

    #[test]
    fn test_extra_payloads_join_the_pool() {
        let extras = vec!["gauntlet_2024".to_string()];
        let generator = PayloadGenerator::new(None, None, &extras).unwrap();
        let mut seen_extra = false;
        for _ in 0..200 {
            if generator.fallback() == "gauntlet_2024" {
                seen_extra = true;
                break;
            }
        }
        assert!(seen_extra, "extra payload should be reachable from the pool");
    }

    #[test]
    fn test_no_remote_configured_uses_pool() {
        let generator = PayloadGenerator::new(None, None, &[]).unwrap();
        let payload = generator.next_payload();
        assert!(FALLBACK_PAYLOADS.contains(&payload.as_str()));
    }

    #[test]
    fn test_parse_completion_extracts_trimmed_content() {
        let body = r#"{"choices":[{"message":{"content":"  ' OR 1=1 --  "}}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "' OR 1=1 --");
    }

    #[test]
    fn test_parse_completion_rejects_empty_content() {
        let body = r#"{"choices":[{"message":{"content":"   "}}]}"#;
        assert!(parse_completion(body).is_err());
    }

    #[test]
    fn test_parse_completion_rejects_missing_choices() {
        assert!(parse_completion(r#"{"choices":[]}"#).is_err());
        assert!(parse_completion("{}").is_err());
    }

    #[test]
    fn test_parse_completion_rejects_malformed_body() {
        assert!(parse_completion("<html>busy</html>").is_err());
    }

    #[test]
    fn test_unreachable_remote_uses_pool() {
        let generator = PayloadGenerator::new(
            Some("http://127.0.0.1:9/v1/chat/completions".to_string()),
            Some("key".to_string()),
            &[],
        )
        .unwrap();
        let payload = generator.next_payload();
        assert!(FALLBACK_PAYLOADS.contains(&payload.as_str()));
    }
}
