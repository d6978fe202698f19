//! irisd — chat over a swarm of directly connected peers.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::BufReader;

use iris_core::config::IrisConfig;
use iris_core::PeerIdentity;
use iris_services::{
    BroadcastDispatcher, ChannelSink, ConnectionHandler, KeepAlivePolicy, OutputSink, PeerRegistry,
    SwarmEventLoop,
};

mod input;
mod printer;
mod swarm;

use swarm::Swarm;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // Load config
    if let Err(e) = IrisConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = IrisConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        let mut config = IrisConfig::default();
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    });

    // Identity
    let identity = PeerIdentity::generate();
    println!("ID: {}", identity.to_hex());
    tracing::info!(peer = identity.short(), "irisd starting");

    // Swarm
    let (swarm, events) = Swarm::configure(identity);
    let swarm = swarm.with_redial_interval(config.network.redial_interval());
    let port = swarm
        .listen(config.network.port)
        .await
        .context("failed to start swarm")?;
    println!("INFO: Peer listening on port: {port}");

    swarm.join(&config.network.channel);
    for addr in &config.network.bootstrap {
        tracing::info!(addr, "dialling bootstrap peer");
        swarm.dial(addr.clone());
    }

    // Shared state
    let registry = PeerRegistry::new();
    let (sink, lines) = ChannelSink::new();
    let sink: Arc<dyn OutputSink> = Arc::new(sink);
    let handler = ConnectionHandler::new(
        registry.clone(),
        sink,
        KeepAlivePolicy::new(config.peers.keepalive_interval()),
    );

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    // ── Spawn tasks ──────────────────────────────────────────────────────────

    let event_loop_task =
        tokio::spawn(SwarmEventLoop::new(handler, events, shutdown_tx.subscribe()).run());

    let prompt = config.ui.interactive.then(|| config.ui.prompt.clone());
    let printer_task = tokio::spawn(printer::print_loop(lines, tokio::io::stdout(), prompt));

    if config.ui.interactive {
        tokio::spawn(input::input_loop(
            BroadcastDispatcher::new(registry.clone()),
            BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
            config.ui.prompt.clone(),
        ));
    } else {
        tracing::info!("interactive input disabled");
    }

    let peer_printer = {
        let registry = registry.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(30));
            loop {
                interval.tick().await;
                tracing::debug!(count = registry.snapshot_size(), "peer registry snapshot");
                for peer in registry.peers() {
                    tracing::debug!(
                        peer = peer.short(),
                        sequence = ?registry.sequence_of(&peer),
                        "  peer"
                    );
                }
            }
        })
    };

    // ── Wait for exit ────────────────────────────────────────────────────────

    let mut shutdown_rx = shutdown_tx.subscribe();

    tokio::select! {
        _ = shutdown_rx.recv()  => tracing::info!("shutting down"),
        r = event_loop_task     => tracing::error!("event loop exited: {:?}", r),
        r = printer_task        => tracing::error!("printer exited: {:?}", r),
        r = peer_printer        => tracing::error!("peer printer exited: {:?}", r),
    }

    Ok(())
}
