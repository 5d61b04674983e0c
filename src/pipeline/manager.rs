//! Active pipeline set and lifecycle
//!
//! The manager owns the map of active sessions behind its own lock, separate
//! from the hub's shared-state lock: binary ingress only touches this lock
//! for the handle lookup, and the actual sink writes happen outside it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{mpsc, Mutex};

use crate::protocol::{epoch_ms, StreamInfo};
use crate::registry::SlotId;

use super::error::PipelineError;
use super::session::PipelineSession;
use super::transcoder;
use super::upload::{ArchiveMeta, ArchiveStore};

/// How often the per-session supervisor checks the transcoder child
const SUPERVISOR_POLL: Duration = Duration::from_secs(1);

/// Pipeline configuration, derived from the hub configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root directory for per-slot live playlists and segments
    pub live_root: PathBuf,
    /// Root directory for local archives awaiting upload
    pub recording_root: PathBuf,
    /// Path of the external transcoder binary
    pub transcoder_path: PathBuf,
    /// Base URL of the external archive store (upload skipped when absent)
    pub site_url: Option<String>,
    /// Bearer token for the archive store (upload skipped when absent)
    pub api_token: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            live_root: PathBuf::from("./live"),
            recording_root: PathBuf::from("./recordings"),
            transcoder_path: PathBuf::from("ffmpeg"),
            site_url: None,
            api_token: None,
        }
    }
}

/// Notification emitted by the manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineEvent {
    /// A session finished its stop procedure (sinks closed, disk reclaimed)
    Stopped { slot: SlotId },
}

/// Owner of every active pipeline session
pub struct PipelineManager {
    config: PipelineConfig,
    store: ArchiveStore,
    active: Mutex<HashMap<SlotId, Arc<PipelineSession>>>,
    events: mpsc::UnboundedSender<PipelineEvent>,
}

impl PipelineManager {
    /// Create a manager and the receiving end of its event stream
    pub fn new(config: PipelineConfig) -> (Arc<Self>, mpsc::UnboundedReceiver<PipelineEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let store = ArchiveStore::new(config.site_url.clone(), config.api_token.clone());

        (
            Arc::new(Self {
                config,
                store,
                active: Mutex::new(HashMap::new()),
                events,
            }),
            events_rx,
        )
    }

    /// Start a pipeline session for a slot
    ///
    /// Wipes the slot's live directory, spawns the transcoder and opens the
    /// archive sink. Fails with `AlreadyStreaming` if the slot has an active
    /// session. Start is only ever invoked from the slot's own dispatch
    /// loop, so the check-then-insert here cannot race against itself.
    pub async fn start(
        self: &Arc<Self>,
        slot: SlotId,
        display_name: &str,
    ) -> Result<(), PipelineError> {
        if self.active.lock().await.contains_key(&slot) {
            return Err(PipelineError::AlreadyStreaming);
        }

        let live_dir = self.config.live_root.join(slot.to_string());
        prepare_live_dir(&live_dir).await?;
        tokio::fs::create_dir_all(&self.config.recording_root).await?;

        let started_at_ms = epoch_ms();
        let archive_path = self
            .config
            .recording_root
            .join(transcoder::archive_file_name(display_name, slot, started_at_ms));

        let mut child = transcoder::spawn(&self.config.transcoder_path, &live_dir, started_at_ms)?;
        let stdin = child.stdin.take();

        let archive = tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&archive_path)
            .await?;

        let session = Arc::new(PipelineSession::new(
            slot,
            display_name.to_string(),
            started_at_ms,
            live_dir,
            archive_path,
            stdin,
            Some(archive),
            Some(child),
        ));

        self.active.lock().await.insert(slot, session);
        self.spawn_supervisor(slot);

        tracing::info!(slot, name = display_name, "stream pipeline started");
        Ok(())
    }

    /// Route one binary chunk to the slot's session
    ///
    /// Chunks for slots without an active session are dropped silently.
    pub async fn feed(&self, slot: SlotId, chunk: Bytes) {
        let session = { self.active.lock().await.get(&slot).cloned() };
        if let Some(session) = session {
            session.ingest(&chunk).await;
        }
    }

    /// Stop a slot's session and reclaim its resources
    ///
    /// The session is removed from the active set first, so repeat calls and
    /// a concurrent disconnect are no-ops. Returns whether a session was
    /// actually stopped.
    pub async fn stop(&self, slot: SlotId) -> bool {
        let session = { self.active.lock().await.remove(&slot) };
        let Some(session) = session else {
            return false;
        };

        tracing::info!(
            slot,
            bytes = session.bytes_ingested(),
            "stopping stream pipeline"
        );

        session.finish().await;

        let meta = ArchiveMeta {
            agent_id: session.slot,
            agent_name: session.display_name.clone(),
            duration_secs: session.duration_secs(),
            recorded_at_ms: session.started_at_ms,
        };
        if let Err(e) = self.store.upload(session.archive_path(), &meta).await {
            tracing::warn!(slot, error = %e, "archive upload failed");
        }

        remove_quiet(session.live_dir(), true).await;
        remove_quiet(session.archive_path(), false).await;

        let _ = self.events.send(PipelineEvent::Stopped { slot });
        true
    }

    /// Stop every active session (graceful shutdown path)
    pub async fn stop_all(&self) {
        let slots: Vec<SlotId> = { self.active.lock().await.keys().copied().collect() };
        for slot in slots {
            self.stop(slot).await;
        }
    }

    /// Session handle for a slot, if active
    pub async fn get(&self, slot: SlotId) -> Option<Arc<PipelineSession>> {
        self.active.lock().await.get(&slot).cloned()
    }

    /// Number of active sessions
    pub async fn active_count(&self) -> usize {
        self.active.lock().await.len()
    }

    /// Handles of every active session, ascending by slot
    pub async fn sessions(&self) -> Vec<Arc<PipelineSession>> {
        let mut sessions: Vec<Arc<PipelineSession>> =
            self.active.lock().await.values().cloned().collect();
        sessions.sort_by_key(|session| session.slot);
        sessions
    }

    /// Descriptions of every active stream, ascending by slot
    pub async fn streams(&self) -> Vec<StreamInfo> {
        let mut streams: Vec<StreamInfo> = self
            .active
            .lock()
            .await
            .values()
            .map(|session| session.info())
            .collect();
        streams.sort_by_key(|info| info.agent_id);
        streams
    }

    /// Watch the transcoder child; its own exit triggers the standard stop
    /// path for the session.
    fn spawn_supervisor(self: &Arc<Self>, slot: SlotId) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SUPERVISOR_POLL);
            loop {
                ticker.tick().await;
                let Some(session) = manager.get(slot).await else {
                    break; // stopped elsewhere
                };
                if session.transcoder_exited().await {
                    tracing::warn!(slot, "transcoder exited on its own, stopping pipeline");
                    manager.stop(slot).await;
                    break;
                }
            }
        });
    }
}

/// Wipe and recreate a session's live directory
///
/// Stale segments from a prior session are discarded here.
pub(super) async fn prepare_live_dir(dir: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    tokio::fs::create_dir_all(dir).await
}

/// Best-effort removal of a session resource; absence is not an error
async fn remove_quiet(path: &Path, dir: bool) {
    let result = if dir {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    };
    match result {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove"),
    }
}
