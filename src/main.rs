// SPDX-License-Identifier: PMPL-1.0-or-later

//! gauntlet: automated adversarial audit exercise
//!
//! One binary, five entry points: the control-plane server (which spawns
//! the other three as child processes), the three actor subcommands, and
//! a logbook viewer.

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use gauntlet::actors::attacker::{self, AttackerConfig};
use gauntlet::actors::auditor::{self, AuditorConfig};
use gauntlet::actors::target::{self, TargetConfig};
use gauntlet::bus::PLACEHOLDER_ADDRESS;
use gauntlet::config::{peer_from_env, ExerciseConfig};
use gauntlet::control;
use gauntlet::effects::ledger::LedgerService;
use gauntlet::effects::ProofService;
use gauntlet::logbook;
use gauntlet::orchestrator::{ActorLauncher, Orchestrator};
use gauntlet::payloads::PayloadGenerator;
use gauntlet::storage::bounties::BountyStore;
use gauntlet::storage::exploits::ExploitMemory;
use gauntlet::types::{Peer, Role};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gauntlet")]
#[command(version = "0.3.0")]
#[command(about = "Automated adversarial audit exercise")]
#[command(long_about = None)]
struct Cli {
    /// Optional exercise config file (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the control-plane server that supervises the three actors
    Serve {
        /// Listen port (default: from config, 8003)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run the auditor actor
    Auditor,

    /// Run the target actor
    Target,

    /// Run the attacker actor
    Attacker,

    /// Print recent logbook entries
    Logs {
        /// Number of entries to show
        #[arg(short, long, default_value = "50")]
        limit: usize,

        /// Only show vulnerability entries
        #[arg(long)]
        vulnerabilities_only: bool,

        /// Clear the logbook instead of printing it
        #[arg(long)]
        clear: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ExerciseConfig::load(cli.config.as_deref())?;
    logbook::init(config.logbook_path());

    match cli.command {
        Commands::Serve { port } => {
            let port = port.unwrap_or(config.control_port);
            let orchestrator = Arc::new(Orchestrator::new(
                config,
                ActorLauncher::current_exe()?,
            ));
            tokio::runtime::Runtime::new()?.block_on(control::serve(orchestrator, port))
        }

        Commands::Auditor => {
            let proof = ProofService::new(config.proof_url.clone())?;
            let ledger = LedgerService::new(
                config.ledger_url.clone(),
                BountyStore::new(config.bounties_path()),
            )?;
            auditor::run(
                AuditorConfig {
                    seed: config.seed_for(Role::Auditor),
                    port: Role::Auditor.port(),
                    secret: config.secret.clone(),
                },
                proof,
                ledger,
            )
        }

        Commands::Target => target::run(TargetConfig {
            secret: config.secret.clone(),
            seed: config.seed_for(Role::Target),
            port: Role::Target.port(),
            auditor: peer_from_env(Role::Auditor),
        }),

        Commands::Attacker => {
            let target_peer = peer_from_env(Role::Target).unwrap_or_else(|| Peer {
                address: PLACEHOLDER_ADDRESS.to_string(),
                endpoint: format!("127.0.0.1:{}", Role::Target.port()),
            });
            let generator = PayloadGenerator::new(
                config.generator_url.clone(),
                config.generator_key.clone(),
                &config.extra_payloads,
            )?;
            let memory = ExploitMemory::new(config.exploits_path());
            attacker::run(
                AttackerConfig {
                    seed: config.seed_for(Role::Attacker),
                    port: Role::Attacker.port(),
                    target: target_peer,
                    auditor: peer_from_env(Role::Auditor),
                    period: config.attack_period(),
                    max_attempts: config.max_attempts,
                    registry_url: config.registry_url.clone(),
                    registry_key: config.registry_key.clone(),
                },
                generator,
                memory,
            )
        }

        Commands::Logs {
            limit,
            vulnerabilities_only,
            clear,
        } => {
            if clear {
                logbook::clear();
                println!("Logbook cleared.");
            } else {
                print_logs(limit, vulnerabilities_only);
            }
            Ok(())
        }
    }
}

fn print_logs(limit: usize, vulnerabilities_only: bool) {
    let entries = logbook::recent(limit);
    if entries.is_empty() {
        println!("No logbook entries.");
        return;
    }

    for entry in entries {
        if vulnerabilities_only && !entry.is_vulnerability {
            continue;
        }
        let prefix = format!("{} {} [{}]", entry.timestamp, entry.icon, entry.actor);
        let line = if entry.is_vulnerability {
            format!("{} {}", prefix.dimmed(), entry.message.red().bold())
        } else {
            match entry.kind.as_str() {
                "attack" => format!("{} {}", prefix.dimmed(), entry.message.yellow()),
                "proof" => format!("{} {}", prefix.dimmed(), entry.message.cyan()),
                _ => format!("{} {}", prefix.dimmed(), entry.message),
            }
        };
        println!("{line}");
    }
}
