//! Ship Sync demo - loopback server with scripted clients
//!
//! Runs an authoritative server session and a number of client sessions in
//! one process, connected by in-memory transports:
//! - the server spawns a ship per client and broadcasts snapshots
//! - each client flies a scripted ship and mirrors the others

use std::time::Duration;

use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ship_sync::config::Config;
use ship_sync::game::{FixedTimestep, ScriptedIntents};
use ship_sync::net::{loopback_pair, LossyTransport, Transport};
use ship_sync::session::{run_loop, ClientSession, ServerSession};
use ship_sync::state::AttachmentTracker;
use ship_sync::util::time::{init_process_time, uptime_secs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    init_process_time();

    info!("Starting Ship Sync loopback demo");
    info!(
        clients = config.demo_clients,
        fps = config.fps,
        packet_period_frames = config.packet_period_frames,
        packet_loss = config.demo_packet_loss,
        "Demo configuration"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let timestep = || FixedTimestep::new(config.fps, config.max_catch_up_steps);

    let mut server = ServerSession::new(&config, AttachmentTracker::new());
    let mut clients = Vec::with_capacity(config.demo_clients);
    for index in 0..config.demo_clients {
        let (server_end, client_end) = loopback_pair();
        server.add_peer(server_end);

        let transport: Box<dyn Transport> = if config.demo_packet_loss > 0.0 {
            Box::new(LossyTransport::new(
                client_end,
                config.demo_packet_loss,
                config.spawn_seed.wrapping_add(index as u64),
            ))
        } else {
            Box::new(client_end)
        };
        let intents = ScriptedIntents {
            sweep_period: 180 + 60 * index as u64,
            fire_every: 15,
        };
        let session = ClientSession::new(&config, transport, AttachmentTracker::new(), Box::new(intents));
        clients.push(tokio::spawn(run_loop(session, timestep(), shutdown_rx.clone())));
    }
    let server = tokio::spawn(run_loop(server, timestep(), shutdown_rx));

    tokio::select! {
        _ = shutdown_signal() => {}
        _ = tokio::time::sleep(Duration::from_secs(config.demo_duration_secs)) => {
            info!(duration_secs = config.demo_duration_secs, "Demo duration elapsed");
        }
    }
    // Receivers may already be gone if every session finished
    let _ = shutdown_tx.send(true);

    let server = server.await?;
    let stats = server.snapshot_stats();
    info!(
        tick = server.authority().tick(),
        objects = server.authority().objects().len(),
        snapshots = stats.total_snapshots,
        snapshot_bytes = stats.total_bytes,
        avg_objects = stats.avg_objects_per_snapshot,
        hits = server.hits(),
        kills = server.kills(),
        "Server summary"
    );

    for (index, client) in clients.into_iter().enumerate() {
        let client = client.await?;
        let stats = client.stats();
        info!(
            client = index,
            player = ?client.player(),
            replicas = client.replica().objects().len(),
            snapshots = stats.snapshots_applied,
            stale = stats.stale_snapshots,
            inputs_sent = stats.inputs_sent,
            local_hits = stats.local_hits,
            rtt_ms = ?stats.last_rtt_ms,
            "Client summary"
        );
    }

    info!(uptime_secs = uptime_secs(), "Demo shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Ctrl+C / terminate signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        }
    }
}
