// SPDX-License-Identifier: PMPL-1.0-or-later

//! Process lifecycle for the three actors.
//!
//! The orchestrator is an explicit context object owned by the control
//! plane; it spawns the actors as subcommands of this binary in
//! dependency order (auditor, target, attacker), injects each discovered
//! address into the next spawn's environment, polls liveness, and tears
//! everything down on stop or drop.
//!
//! Discovery failures degrade to a placeholder address and the sequence
//! continues; a spawn failure rolls back every process already spawned
//! and fails the whole start.

mod discovery;

use crate::config::ExerciseConfig;
use crate::types::{AuditIntensity, HealthState, Role};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::BufRead;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How actor processes are spawned. The default launches the current
/// executable with the actor's subcommand; tests substitute a stub.
#[derive(Debug, Clone)]
pub struct ActorLauncher {
    pub program: PathBuf,
    pub leading_args: Vec<String>,
}

impl ActorLauncher {
    pub fn current_exe() -> Result<Self> {
        Ok(Self {
            program: std::env::current_exe().context("resolving current executable")?,
            leading_args: Vec::new(),
        })
    }

    fn command(&self, role: Role) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.leading_args);
        command.arg(role.subcommand());
        command
    }
}

/// One supervised actor process.
pub struct ActorHandle {
    role: Role,
    child: Child,
    port: u16,
    address: Option<String>,
    started_at: DateTime<Utc>,
    announced: Arc<Mutex<Option<String>>>,
}

impl ActorHandle {
    fn announced(&self) -> Option<String> {
        self.announced.lock().clone()
    }

    /// A process with no exit code yet is healthy.
    fn health(&mut self) -> HealthState {
        match self.child.try_wait() {
            Ok(None) => HealthState::Healthy,
            _ => HealthState::Down,
        }
    }
}

#[derive(Default)]
struct Tracked {
    handles: HashMap<Role, ActorHandle>,
    started_at: Option<DateTime<Utc>>,
    target_hint: Option<String>,
    intensity: Option<AuditIntensity>,
}

impl Tracked {
    fn any_alive(&mut self) -> bool {
        self.handles
            .values_mut()
            .any(|handle| handle.health() == HealthState::Healthy)
    }

    fn kill_all(&mut self, wait: Duration) -> Vec<Role> {
        let mut stopped = Vec::new();
        for role in Role::all() {
            if let Some(handle) = self.handles.get_mut(&role) {
                if handle.health() == HealthState::Healthy {
                    tracing::debug!(role = handle.role.label(), "terminating actor");
                    let _ = handle.child.kill();
                    wait_for_exit(&mut handle.child, wait);
                    stopped.push(role);
                }
            }
        }
        self.handles.clear();
        self.started_at = None;
        self.target_hint = None;
        self.intensity = None;
        stopped
    }
}

/// Per-actor view returned by `status`.
#[derive(Debug, Clone)]
pub struct ActorStatus {
    pub role: Role,
    pub is_running: bool,
    pub port: u16,
    pub address: Option<String>,
    pub last_seen: Option<String>,
    pub health: HealthState,
}

#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub actors: Vec<ActorStatus>,
    pub started_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StartedActor {
    pub role: Role,
    pub address: String,
    pub port: u16,
}

pub struct Orchestrator {
    config: ExerciseConfig,
    launcher: ActorLauncher,
    state: Mutex<Tracked>,
}

impl Orchestrator {
    pub fn new(config: ExerciseConfig, launcher: ActorLauncher) -> Self {
        Self {
            config,
            launcher,
            state: Mutex::new(Tracked::default()),
        }
    }

    /// Start all three actors. Fails without touching anything when a
    /// tracked process is still alive; rolls back on mid-sequence spawn
    /// failure.
    pub fn start(&self, target_hint: &str, intensity: AuditIntensity) -> Result<Vec<StartedActor>> {
        let mut state = self.state.lock();
        if state.any_alive() {
            bail!("actors are already running; stop them before starting new ones");
        }
        state.kill_all(Duration::from_secs(0));
        state.started_at = Some(Utc::now());
        state.target_hint = Some(target_hint.to_string());
        state.intensity = Some(intensity);

        match self.start_sequence(&mut state, intensity) {
            Ok(started) => Ok(started),
            Err(err) => {
                tracing::error!(%err, "start sequence failed, terminating spawned actors");
                state.kill_all(Duration::from_secs(self.config.stop_timeout_secs));
                Err(err)
            }
        }
    }

    fn start_sequence(
        &self,
        state: &mut Tracked,
        intensity: AuditIntensity,
    ) -> Result<Vec<StartedActor>> {
        let mut env = self.common_env(intensity);

        let auditor_address = self.spawn_and_discover(state, Role::Auditor, &env)?;
        env.push(("AUDITOR_ADDRESS".to_string(), auditor_address.clone()));
        env.push(("AUDITOR_ENDPOINT".to_string(), endpoint(Role::Auditor)));

        let target_address = self.spawn_and_discover(state, Role::Target, &env)?;
        env.push(("TARGET_ADDRESS".to_string(), target_address.clone()));
        env.push(("TARGET_ENDPOINT".to_string(), endpoint(Role::Target)));

        let attacker_address = self.spawn_and_discover(state, Role::Attacker, &env)?;

        Ok(vec![
            StartedActor {
                role: Role::Auditor,
                address: auditor_address,
                port: Role::Auditor.port(),
            },
            StartedActor {
                role: Role::Target,
                address: target_address,
                port: Role::Target.port(),
            },
            StartedActor {
                role: Role::Attacker,
                address: attacker_address,
                port: Role::Attacker.port(),
            },
        ])
    }

    fn spawn_and_discover(
        &self,
        state: &mut Tracked,
        role: Role,
        env: &[(String, String)],
    ) -> Result<String> {
        tracing::info!(role = role.label(), "starting actor");
        let handle = self.launch(role, env)?;
        state.handles.insert(role, handle);

        // The handle is tracked before discovery so rollback can reach it.
        let handle = state
            .handles
            .get_mut(&role)
            .context("freshly inserted handle missing")?;
        let announced = handle.announced.clone();
        let address = discovery::discover_address(
            &move || announced.lock().clone(),
            role,
            Duration::from_secs(self.config.settle_secs),
            &self.config.logbook_path(),
        );
        handle.address = Some(address.clone());
        tracing::info!(role = role.label(), %address, "actor started");
        Ok(address)
    }

    fn launch(&self, role: Role, env: &[(String, String)]) -> Result<ActorHandle> {
        let regex = discovery::address_regex()?;
        let mut command = self.launcher.command(role);
        command
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());

        let mut child = command
            .spawn()
            .with_context(|| format!("spawning {} actor", role.label()))?;

        let announced = Arc::new(Mutex::new(None));
        if let Some(stdout) = child.stdout.take() {
            let slot = announced.clone();
            std::thread::spawn(move || {
                let reader = std::io::BufReader::new(stdout);
                // Keep draining after the announcement so the pipe never
                // fills up.
                for line in reader.lines() {
                    let Ok(line) = line else { break };
                    let mut slot = slot.lock();
                    if slot.is_none() {
                        if let Some(found) = regex.find(&line) {
                            *slot = Some(found.as_str().to_string());
                        }
                    }
                }
            });
        }

        Ok(ActorHandle {
            role,
            child,
            port: role.port(),
            address: None,
            started_at: Utc::now(),
            announced,
        })
    }

    fn common_env(&self, intensity: AuditIntensity) -> Vec<(String, String)> {
        let config = &self.config;
        let mut env = vec![
            ("EXERCISE_SECRET".to_string(), config.secret.clone()),
            (
                "EXERCISE_DATA_DIR".to_string(),
                config.data_dir.display().to_string(),
            ),
            (
                "ATTACK_PERIOD_SECS".to_string(),
                intensity.attack_period_secs().to_string(),
            ),
            ("MAX_ATTEMPTS".to_string(), config.max_attempts.to_string()),
        ];
        for (name, value) in [
            ("GENERATOR_URL", &config.generator_url),
            ("GENERATOR_KEY", &config.generator_key),
            ("PROOF_URL", &config.proof_url),
            ("LEDGER_URL", &config.ledger_url),
            ("REGISTRY_URL", &config.registry_url),
            ("REGISTRY_KEY", &config.registry_key),
        ] {
            if let Some(value) = value {
                env.push((name.to_string(), value.clone()));
            }
        }
        env
    }

    /// Poll liveness, re-attempt discovery for still-missing addresses.
    pub fn status(&self) -> StatusSnapshot {
        let mut state = self.state.lock();
        let started_at = state.started_at.map(|t| t.to_rfc3339());
        let logbook_path = self.config.logbook_path();

        let mut actors = Vec::new();
        for role in Role::all() {
            match state.handles.get_mut(&role) {
                Some(handle) => {
                    let health = handle.health();
                    if handle
                        .address
                        .as_deref()
                        .map(|a| a == crate::bus::PLACEHOLDER_ADDRESS)
                        .unwrap_or(true)
                    {
                        if let Some(address) =
                            handle.announced().or_else(|| {
                                discovery::from_logbook(&logbook_path, role)
                            })
                        {
                            handle.address = Some(address);
                        }
                    }
                    actors.push(ActorStatus {
                        role,
                        is_running: health == HealthState::Healthy,
                        port: handle.port,
                        address: handle.address.clone(),
                        last_seen: Some(handle.started_at.to_rfc3339()),
                        health,
                    });
                }
                None => actors.push(ActorStatus {
                    role,
                    is_running: false,
                    port: role.port(),
                    address: None,
                    last_seen: None,
                    health: HealthState::Down,
                }),
            }
        }

        StatusSnapshot { actors, started_at }
    }

    /// Terminate every live actor and reset tracking. Idempotent: with
    /// nothing running this returns an empty list.
    pub fn stop(&self) -> Vec<Role> {
        let mut state = self.state.lock();
        let stopped = state.kill_all(Duration::from_secs(self.config.stop_timeout_secs));
        if stopped.is_empty() {
            tracing::info!("stop requested with no live actors");
        } else {
            tracing::info!(?stopped, "actors stopped");
        }
        stopped
    }

}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.state.lock().kill_all(Duration::from_millis(500));
    }
}

fn endpoint(role: Role) -> String {
    format!("127.0.0.1:{}", role.port())
}

fn wait_for_exit(child: &mut Child, wait: Duration) {
    let deadline = Instant::now() + wait;
    loop {
        match child.try_wait() {
            Ok(Some(_)) | Err(_) => return,
            Ok(None) => {}
        }
        if Instant::now() >= deadline {
            // Timed out: the actor stays requested-to-stop; the kill has
            // already been delivered.
            tracing::warn!("actor did not exit within the stop timeout");
            return;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Launcher that runs a long-sleeping shell instead of real actors.
    /// The appended subcommand lands in `$0` of `sh -c`, where it is
    /// harmless.
    fn sleeper_launcher() -> ActorLauncher {
        ActorLauncher {
            program: PathBuf::from("sh"),
            leading_args: vec!["-c".to_string(), "sleep 30".to_string()],
        }
    }

    fn fast_config(dir: &TempDir) -> ExerciseConfig {
        let mut config = ExerciseConfig::default();
        config.data_dir = dir.path().to_path_buf();
        config.settle_secs = 0;
        config.stop_timeout_secs = 2;
        config
    }

    #[test]
    fn test_start_twice_fails_and_keeps_first_run() {
        let dir = TempDir::new().unwrap();
        let orchestrator = Orchestrator::new(fast_config(&dir), sleeper_launcher());

        let started = orchestrator.start("0xdeadbeef", AuditIntensity::Quick).unwrap();
        assert_eq!(started.len(), 3);

        let second = orchestrator.start("0xdeadbeef", AuditIntensity::Quick);
        assert!(second.is_err(), "second start must be rejected");

        // First processes untouched.
        let snapshot = orchestrator.status();
        assert!(snapshot.actors.iter().all(|a| a.is_running));

        orchestrator.stop();
    }

    #[test]
    fn test_stop_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let orchestrator = Orchestrator::new(fast_config(&dir), sleeper_launcher());

        assert!(orchestrator.stop().is_empty());

        orchestrator.start("0xdeadbeef", AuditIntensity::Quick).unwrap();
        let stopped = orchestrator.stop();
        assert_eq!(stopped.len(), 3);

        assert!(orchestrator.stop().is_empty());
    }

    #[test]
    fn test_spawn_failure_fails_the_start_and_allows_retry() {
        let dir = TempDir::new().unwrap();
        let launcher = ActorLauncher {
            program: PathBuf::from("/nonexistent/actor-binary"),
            leading_args: Vec::new(),
        };
        let orchestrator = Orchestrator::new(fast_config(&dir), launcher);

        assert!(orchestrator.start("0xdeadbeef", AuditIntensity::Quick).is_err());

        // Rollback cleared tracking; a healthy launcher could start now.
        let snapshot = orchestrator.status();
        assert!(snapshot.actors.iter().all(|a| !a.is_running));
        assert!(snapshot.started_at.is_none());
    }

    #[test]
    fn test_discovery_degrades_to_placeholder_for_silent_actors() {
        let dir = TempDir::new().unwrap();
        let orchestrator = Orchestrator::new(fast_config(&dir), sleeper_launcher());

        let started = orchestrator.start("0xdeadbeef", AuditIntensity::Quick).unwrap();
        for actor in &started {
            assert_eq!(actor.address, crate::bus::PLACEHOLDER_ADDRESS);
        }
        orchestrator.stop();
    }

    #[test]
    fn test_status_reports_fixed_ports_when_down() {
        let dir = TempDir::new().unwrap();
        let orchestrator = Orchestrator::new(fast_config(&dir), sleeper_launcher());

        let snapshot = orchestrator.status();
        assert_eq!(snapshot.actors.len(), 3);
        for actor in &snapshot.actors {
            assert_eq!(actor.health, HealthState::Down);
            assert_eq!(actor.port, actor.role.port());
        }
    }
}
