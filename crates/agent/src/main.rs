//! RiftSync agent - background match tracker
//!
//! Watches the local game client, reconstructs finished matches, and
//! relays them to the tracker backend.

use anyhow::Result;
use riftsync_lib::auth::{CredentialManager, CredentialStore};
use riftsync_lib::backend::BackendClient;
use riftsync_lib::client::{
    ClientDiscovery, ClientRest, DiscoveryConfig, DiscoveryEvent, EventStream, StreamConfig,
};
use riftsync_lib::pipeline::SyncPipeline;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Request timeout toward the local client control plane.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!(version = AGENT_VERSION, "Starting riftsync-agent");

    let config = config::AgentConfig::load()?;
    info!(server_url = %config.server_url, "Agent configured");

    let backend = Arc::new(BackendClient::new(&config.server_url)?);
    let store = CredentialStore::default_location()?;
    let credentials = Arc::new(CredentialManager::new(Arc::clone(&backend), store));

    if !credentials.is_logged_in().await {
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            if let Err(err) = credentials.login(username, password).await {
                warn!(error = %err, "startup login failed; will sync once logged in");
            }
        }
    }

    let (pipeline, status_rx) = SyncPipeline::new(Arc::clone(&backend), Arc::clone(&credentials));

    // Status endpoint
    let app_state = Arc::new(api::AppState::new(status_rx));
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    // Shutdown fan-out to the polling loop and the event stream
    let (shutdown_tx, _) = broadcast::channel(1);

    let agent_handle = tokio::spawn(run_agent(
        config.clone(),
        Arc::clone(&pipeline),
        shutdown_tx.subscribe(),
        shutdown_tx.clone(),
    ));

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    let _ = shutdown_tx.send(());

    let _ = agent_handle.await;
    api_handle.abort();

    Ok(())
}

/// Tasks owned per client connection.
struct ClientSession {
    rest: Arc<ClientRest>,
    stream_handle: JoinHandle<()>,
    consumer_handle: JoinHandle<()>,
}

impl ClientSession {
    fn close(self) {
        // The stream exits via the shutdown channel; on client loss it is
        // aborted instead so the backoff loop stops hammering a dead port.
        self.stream_handle.abort();
        self.consumer_handle.abort();
    }
}

/// The single long-lived background loop: connection polling plus periodic
/// rank and identity refresh. All failures are logged and retried; nothing
/// escapes to crash the loop.
async fn run_agent(
    config: config::AgentConfig,
    pipeline: Arc<SyncPipeline>,
    mut shutdown: broadcast::Receiver<()>,
    shutdown_tx: broadcast::Sender<()>,
) {
    let mut discovery = ClientDiscovery::new(DiscoveryConfig::default());
    let mut ticker = tokio::time::interval(Duration::from_secs(config.poll_interval_secs.max(1)));
    let refresh_every = (config.refresh_interval_secs / config.poll_interval_secs.max(1)).max(1);

    let mut session: Option<ClientSession> = None;
    let mut ticks = 0u64;

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                info!("Stopping polling loop");
                if let Some(session) = session.take() {
                    session.close();
                }
                return;
            }
            _ = ticker.tick() => {}
        }
        ticks += 1;

        match discovery.poll().await {
            DiscoveryEvent::Connected(info) => {
                if let Some(old) = session.take() {
                    old.close();
                }
                match open_session(&info, &pipeline, &shutdown_tx).await {
                    Ok(new_session) => session = Some(new_session),
                    Err(err) => warn!(error = %err, "failed to open client session"),
                }
            }
            DiscoveryEvent::Disconnected => {
                if let Some(old) = session.take() {
                    old.close();
                }
            }
            DiscoveryEvent::Unchanged => {}
        }

        // Periodic rank-info refresh and identity watch on the same loop.
        if ticks % refresh_every == 0 {
            if let Some(session) = &session {
                refresh_context(&session.rest, &pipeline).await;
            }
        }
    }
}

async fn open_session(
    info: &riftsync_lib::models::ConnectionInfo,
    pipeline: &Arc<SyncPipeline>,
    shutdown_tx: &broadcast::Sender<()>,
) -> Result<ClientSession> {
    let rest = Arc::new(ClientRest::new(info, CLIENT_TIMEOUT)?);
    refresh_context(&rest, pipeline).await;

    // Polling fallback for a game that ended while no stream was attached.
    // When the stream delivers the same payload the seen-set absorbs it.
    match rest.eog_stats_block().await {
        Ok(payload) => {
            pipeline.on_game_ended(payload, Some(&rest)).await;
        }
        Err(err) => debug!(error = %err, "no end-of-game block pending"),
    }

    let (stream, mut events_rx) = EventStream::new(info.clone(), StreamConfig::default());
    let stream_handle = tokio::spawn(stream.run(shutdown_tx.subscribe()));

    let consumer_rest = Arc::clone(&rest);
    let consumer_pipeline = Arc::clone(pipeline);
    let consumer_handle = tokio::spawn(async move {
        while let Some(payload) = events_rx.recv().await {
            consumer_pipeline
                .on_game_ended(payload, Some(&consumer_rest))
                .await;
        }
    });

    Ok(ClientSession {
        rest,
        stream_handle,
        consumer_handle,
    })
}

/// Fetches the signed-in identity and current rank; failures are logged
/// and retried on the next refresh tick.
async fn refresh_context(rest: &Arc<ClientRest>, pipeline: &Arc<SyncPipeline>) {
    match rest.current_summoner().await {
        Ok(summoner) => pipeline.update_identity(summoner).await,
        Err(err) => warn!(error = %err, "could not fetch current summoner"),
    }
    match rest.current_rank().await {
        Ok(rank) => pipeline.set_rank(rank).await,
        Err(err) => warn!(error = %err, "could not fetch ranked stats"),
    }
}
