//! # FieldSync Agent
//!
//! Composition root for a field device. Opens the local store, restores the
//! sync queue and the inspection archive, and keeps delivering queued work
//! whenever the API is reachable.
//!
//! ## Startup Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. tracing subscriber (RUST_LOG, default "info")                      │
//! │  2. FieldSyncConfig::load  (TOML + FIELDSYNC_* env, validated)         │
//! │  3. SQLite store (WAL)     ──► KvStore                                 │
//! │  4. SyncQueue::restore     ──► Synchronizer::restore                   │
//! │  5. InspectionArchive + CachedLocationProvider ──► DraftEngine         │
//! │  6. spawn: connectivity probe, synchronizer run loop,                  │
//! │            MediaConfirmed follower, event logger                       │
//! │  7. wait for Ctrl-C / SIGTERM ──► save current draft, close store      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod http;
mod probe;

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use fieldsync_db::{Database, DbConfig, KvStore};
use fieldsync_drafts::{CachedLocationProvider, DraftEngine, InspectionArchive, NoLocation};
use fieldsync_sync::{
    BlobUploader, FieldSyncConfig, SyncEvent, SyncQueue, Synchronizer, UnconfiguredUploader,
};

use crate::http::{build_client, HttpBlobUploader, HttpSubmissionApi};
use crate::probe::ConnectivityProbe;

/// Buffered device events between the probe and the synchronizer.
const DEVICE_EVENT_BUFFER: usize = 16;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("Starting FieldSync agent...");

    // Load configuration
    let config = FieldSyncConfig::load(None)?;
    let db_path = config.database_path();
    info!(
        device_id = %config.device_id(),
        api = %config.sync.api_base_url,
        upload_configured = config.sync.upload_url.is_some(),
        db = %db_path.display(),
        "Configuration loaded"
    );

    // Open the local store
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let db = Database::new(DbConfig::new(&db_path)).await?;
    if !db.health_check().await {
        warn!("Local store failed its health check, continuing");
    }
    let store: Arc<dyn KvStore> = Arc::new(db.kv());

    // HTTP collaborators
    let client = build_client(config.request_timeout())?;
    let api = Arc::new(HttpSubmissionApi::new(
        client.clone(),
        config.sync.api_base_url.clone(),
    ));
    let uploader: Arc<dyn BlobUploader> = match &config.sync.upload_url {
        Some(url) => Arc::new(HttpBlobUploader::new(client.clone(), url.clone())),
        None => {
            warn!("No upload URL configured, media will stay queued");
            Arc::new(UnconfiguredUploader)
        }
    };

    // Restore state
    let queue = SyncQueue::restore(
        store.clone(),
        config.sync.max_attempts,
        config.sync.tombstone_limit,
    )
    .await;
    let sync = Synchronizer::restore(queue, api, uploader).await;
    let location = CachedLocationProvider::restore(
        Arc::new(NoLocation),
        store.clone(),
        config.location.clone(),
    )
    .await;
    let archive = InspectionArchive::restore(store).await;
    let engine = DraftEngine::new(archive, sync.clone(), location, config.autosave.clone());

    let status = sync.status().await;
    info!(
        pending = status.pending_items,
        drafts = engine.list_drafts().await.len(),
        last_sync = ?status.last_sync_time,
        "State restored"
    );

    // Background tasks
    let follower = engine.follow_sync_events();
    let logger = tokio::spawn(log_sync_events(sync.subscribe()));

    let (device_tx, device_rx) = mpsc::channel(DEVICE_EVENT_BUFFER);
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

    let probe = ConnectivityProbe::new(client, &config.sync.api_base_url, config.probe_interval());
    let probe_task = tokio::spawn(probe.run(device_tx));
    let sync_task = tokio::spawn(sync.clone().run(device_rx, shutdown_rx));

    shutdown_signal().await;
    info!("Shutdown requested");

    // Stop producing events, then let the run loop exit on its own.
    probe_task.abort();
    let _ = shutdown_tx.send(()).await;
    if let Err(e) = sync_task.await {
        error!(error = %e, "Synchronizer task failed");
    }
    follower.abort();
    logger.abort();

    // Persist whatever was being authored.
    engine.disable_auto_save();
    if engine.current_draft().await.is_some() {
        match engine.save_draft().await {
            Ok(draft) => info!(draft_id = %draft.id, "Current draft saved"),
            Err(e) => error!(error = %e, "Failed to save current draft"),
        }
    }

    db.close().await;
    info!("Agent shutdown complete");
    Ok(())
}

/// Logs every synchronizer event until the channel closes.
async fn log_sync_events(mut events: broadcast::Receiver<SyncEvent>) {
    loop {
        match events.recv().await {
            Ok(SyncEvent::Status(status)) => info!(
                online = status.is_online,
                pending = status.pending_items,
                syncing = status.sync_in_progress,
                last_error = ?status.last_error,
                "Sync status"
            ),
            Ok(SyncEvent::ItemSynced {
                item_id,
                kind,
                subject_id,
            }) => info!(%item_id, %kind, %subject_id, "Item synced"),
            Ok(SyncEvent::PermanentFailure(tombstone)) => error!(
                item_id = %tombstone.item.id,
                kind = %tombstone.item.kind(),
                attempts = tombstone.item.attempts,
                last_error = %tombstone.last_error,
                "Item failed permanently"
            ),
            Ok(SyncEvent::MediaConfirmed { media_id, blob }) => {
                info!(%media_id, url = %blob.url, "Media confirmed")
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Event logger lagged")
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix. A handler that cannot be
/// installed is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
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
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
