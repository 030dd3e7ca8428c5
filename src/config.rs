// SPDX-License-Identifier: PMPL-1.0-or-later

//! Exercise configuration: YAML file, environment overrides, defaults.
//!
//! The orchestrator reads a full `ExerciseConfig`; each actor subcommand
//! reads the same config plus the peer addresses the orchestrator injected
//! into its environment at spawn time.

use crate::types::{Peer, Role};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_SECRET: &str = "gauntlet_2024";
pub const DEFAULT_CONTROL_PORT: u16 = 8003;

/// Runtime configuration for one exercise.
#[derive(Debug, Clone)]
pub struct ExerciseConfig {
    /// The token the target protects and the auditor scans responses for.
    pub secret: String,
    /// Directory holding the logbook, exploit store, and bounty store.
    pub data_dir: PathBuf,
    pub attack_period_secs: f64,
    pub max_attempts: u32,
    /// Wait after spawning an actor before reading its announcement.
    pub settle_secs: u64,
    /// Wait for a killed actor to exit before giving up on it.
    pub stop_timeout_secs: u64,
    pub control_port: u16,
    pub generator_url: Option<String>,
    pub generator_key: Option<String>,
    pub proof_url: Option<String>,
    pub ledger_url: Option<String>,
    pub registry_url: Option<String>,
    pub registry_key: Option<String>,
    /// Extra payloads appended to the generator's built-in fallback pool.
    pub extra_payloads: Vec<String>,
}

impl Default for ExerciseConfig {
    fn default() -> Self {
        Self {
            secret: DEFAULT_SECRET.to_string(),
            data_dir: PathBuf::from("."),
            attack_period_secs: 3.0,
            max_attempts: 50,
            settle_secs: 3,
            stop_timeout_secs: 5,
            control_port: DEFAULT_CONTROL_PORT,
            generator_url: None,
            generator_key: None,
            proof_url: None,
            ledger_url: None,
            registry_url: None,
            registry_key: None,
            extra_payloads: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ExerciseSpec {
    secret: Option<String>,
    data_dir: Option<PathBuf>,
    attack_period_secs: Option<f64>,
    max_attempts: Option<u32>,
    settle_secs: Option<u64>,
    stop_timeout_secs: Option<u64>,
    control_port: Option<u16>,
    generator_url: Option<String>,
    generator_key: Option<String>,
    proof_url: Option<String>,
    ledger_url: Option<String>,
    registry_url: Option<String>,
    registry_key: Option<String>,
    #[serde(default)]
    extra_payloads: Vec<String>,
}

impl ExerciseConfig {
    /// Load configuration: defaults, then the optional YAML file, then
    /// environment overrides (strongest).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading exercise config {}", path.display()))?;
            let spec: ExerciseSpec = serde_yaml::from_str(&content)
                .with_context(|| format!("parsing yaml config {}", path.display()))?;
            config.apply_spec(spec);
        }
        config.apply_env();
        Ok(config)
    }

    fn apply_spec(&mut self, spec: ExerciseSpec) {
        if let Some(secret) = spec.secret {
            self.secret = secret;
        }
        if let Some(dir) = spec.data_dir {
            self.data_dir = dir;
        }
        if let Some(period) = spec.attack_period_secs {
            self.attack_period_secs = period;
        }
        if let Some(max) = spec.max_attempts {
            self.max_attempts = max;
        }
        if let Some(settle) = spec.settle_secs {
            self.settle_secs = settle;
        }
        if let Some(timeout) = spec.stop_timeout_secs {
            self.stop_timeout_secs = timeout;
        }
        if let Some(port) = spec.control_port {
            self.control_port = port;
        }
        self.generator_url = spec.generator_url.or(self.generator_url.take());
        self.generator_key = spec.generator_key.or(self.generator_key.take());
        self.proof_url = spec.proof_url.or(self.proof_url.take());
        self.ledger_url = spec.ledger_url.or(self.ledger_url.take());
        self.registry_url = spec.registry_url.or(self.registry_url.take());
        self.registry_key = spec.registry_key.or(self.registry_key.take());
        if !spec.extra_payloads.is_empty() {
            self.extra_payloads = spec.extra_payloads;
        }
    }

    fn apply_env(&mut self) {
        if let Some(secret) = env_string("EXERCISE_SECRET") {
            self.secret = secret;
        }
        if let Some(dir) = env_string("EXERCISE_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(period) = env_parse::<f64>("ATTACK_PERIOD_SECS") {
            self.attack_period_secs = period;
        }
        if let Some(max) = env_parse::<u32>("MAX_ATTEMPTS") {
            self.max_attempts = max;
        }
        if let Some(port) = env_parse::<u16>("CONTROL_PORT") {
            self.control_port = port;
        }
        self.generator_url = env_string("GENERATOR_URL").or(self.generator_url.take());
        self.generator_key = env_string("GENERATOR_KEY").or(self.generator_key.take());
        self.proof_url = env_string("PROOF_URL").or(self.proof_url.take());
        self.ledger_url = env_string("LEDGER_URL").or(self.ledger_url.take());
        self.registry_url = env_string("REGISTRY_URL").or(self.registry_url.take());
        self.registry_key = env_string("REGISTRY_KEY").or(self.registry_key.take());
    }

    pub fn attack_period(&self) -> Duration {
        Duration::from_secs_f64(self.attack_period_secs.max(0.1))
    }

    pub fn logbook_path(&self) -> PathBuf {
        self.data_dir.join("logs.json")
    }

    pub fn exploits_path(&self) -> PathBuf {
        self.data_dir.join("known_exploits.json")
    }

    pub fn bounties_path(&self) -> PathBuf {
        self.data_dir.join("bounty_tokens.json")
    }

    /// Seed phrase an actor derives its identity address from.
    pub fn seed_for(&self, role: Role) -> String {
        let var = match role {
            Role::Auditor => "AUDITOR_SEED",
            Role::Target => "TARGET_SEED",
            Role::Attacker => "ATTACKER_SEED",
        };
        env_string(var).unwrap_or_else(|| format!("{}-seed-phrase", role.subcommand()))
    }
}

/// Peer injected by the orchestrator, if present in the environment.
pub fn peer_from_env(role: Role) -> Option<Peer> {
    let (addr_var, endpoint_var) = match role {
        Role::Auditor => ("AUDITOR_ADDRESS", "AUDITOR_ENDPOINT"),
        Role::Target => ("TARGET_ADDRESS", "TARGET_ENDPOINT"),
        Role::Attacker => ("ATTACKER_ADDRESS", "ATTACKER_ENDPOINT"),
    };
    let address = env_string(addr_var)?;
    let endpoint =
        env_string(endpoint_var).unwrap_or_else(|| format!("127.0.0.1:{}", role.port()));
    Some(Peer { address, endpoint })
}

fn env_string(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env_string(name).and_then(|v| v.parse().ok())
}
