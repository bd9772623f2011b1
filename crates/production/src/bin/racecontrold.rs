//! RaceControl Stewarding Daemon
//!
//! Production binary for running the stewarding node.
//!
//! # Usage
//!
//! ```bash
//! # Start with a rulebook directory and the default RPC port
//! racecontrold --rulebook-dir /etc/racecontrol/rulebooks
//!
//! # Custom listen address and verbose logging
//! racecontrold --rulebook-dir ./rulebooks --listen 0.0.0.0:9090 --log debug
//! ```
//!
//! The rulebook directory must contain an `active.json` document; it is
//! fetched at startup and installed into the engine before the first
//! incident can match. Telemetry ingest and channel consumers attach over
//! the runner handle; this binary only wires the pieces together.

use anyhow::{Context, Result};
use clap::Parser;
use racecontrol_production::rpc::{RpcServer, RpcServerConfig};
use racecontrol_production::{
    init_telemetry, FileRulebookStore, InMemoryPenaltyStore, ProductionRunner, TelemetryConfig,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::info;

/// RaceControl Stewarding Daemon
///
/// Runs the incident classification and broadcast distribution node.
#[derive(Parser, Debug)]
#[command(name = "racecontrold")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Directory holding rulebook JSON documents (active.json is loaded)
    #[arg(long)]
    rulebook_dir: PathBuf,

    /// RPC listen address
    #[arg(long, default_value = "0.0.0.0:8080")]
    listen: SocketAddr,

    /// Event and fan-out channel capacity
    #[arg(long, default_value_t = 1024)]
    channel_capacity: usize,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, default_value = "info,racecontrol_node=debug")]
    log: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_telemetry(&TelemetryConfig {
        default_filter: cli.log.clone(),
        compact: false,
    })
    .context("failed to initialize telemetry")?;

    anyhow::ensure!(
        cli.rulebook_dir.is_dir(),
        "rulebook directory {} does not exist",
        cli.rulebook_dir.display()
    );

    let rulebook_store = Arc::new(FileRulebookStore::new(&cli.rulebook_dir));
    let penalty_store = Arc::new(InMemoryPenaltyStore::new());

    let mut runner = ProductionRunner::builder()
        .rulebook_store(rulebook_store)
        .penalty_store(penalty_store)
        .channel_capacity(cli.channel_capacity)
        .build()
        .context("failed to build runner")?;

    let handle = runner.handle();
    let shutdown = runner
        .shutdown_handle()
        .context("shutdown handle already taken")?;

    let rpc = RpcServer::new(
        RpcServerConfig {
            listen_addr: cli.listen,
        },
        handle.event_sender(),
        handle.delay_states(),
        handle.node_status(),
    );
    let rpc_handle = rpc.start().await.context("failed to start RPC server")?;

    let runner_task = tokio::spawn(runner.run());

    info!(listen = %cli.listen, rulebooks = %cli.rulebook_dir.display(), "racecontrold started");

    signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
    info!("Interrupt received, shutting down");

    shutdown.shutdown();
    runner_task.await??;
    rpc_handle.abort();

    Ok(())
}
