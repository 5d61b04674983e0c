//! One active pipeline session
//!
//! Holds the transcoder stdin and archive sink for a streaming slot. Both
//! sinks fail independently: a broken sink is dropped and subsequent chunks
//! skip it, while the session itself stays active until stopped.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin};
use tokio::sync::Mutex;

use crate::protocol::StreamInfo;
use crate::registry::SlotId;

use super::transcoder;

/// Per-slot pipeline state between `stream_start` and stop completion
pub struct PipelineSession {
    /// Owning slot
    pub slot: SlotId,
    /// Display name captured at stream start
    pub display_name: String,
    /// Epoch milliseconds when the pipeline started
    pub started_at_ms: u64,

    started: Instant,
    live_dir: PathBuf,
    archive_path: PathBuf,
    stdin: Mutex<Option<ChildStdin>>,
    archive: Mutex<Option<File>>,
    child: Mutex<Option<Child>>,
    bytes_ingested: AtomicU64,
}

impl PipelineSession {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn new(
        slot: SlotId,
        display_name: String,
        started_at_ms: u64,
        live_dir: PathBuf,
        archive_path: PathBuf,
        stdin: Option<ChildStdin>,
        archive: Option<File>,
        child: Option<Child>,
    ) -> Self {
        Self {
            slot,
            display_name,
            started_at_ms,
            started: Instant::now(),
            live_dir,
            archive_path,
            stdin: Mutex::new(stdin),
            archive: Mutex::new(archive),
            child: Mutex::new(child),
            bytes_ingested: AtomicU64::new(0),
        }
    }

    /// Live directory for this session's playlist and segments
    pub fn live_dir(&self) -> &Path {
        &self.live_dir
    }

    /// Local archive file awaiting upload
    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    /// Total bytes accepted so far
    pub fn bytes_ingested(&self) -> u64 {
        self.bytes_ingested.load(Ordering::Relaxed)
    }

    /// Whole seconds of wall-clock time since the pipeline started
    pub fn duration_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    /// Wire-level description of this stream
    pub fn info(&self) -> StreamInfo {
        StreamInfo {
            agent_id: self.slot,
            name: self.display_name.clone(),
            hls_url: format!("/live/{}/{}", self.slot, transcoder::PLAYLIST_NAME),
            started_at: self.started_at_ms,
        }
    }

    /// Append one binary chunk to both sinks
    ///
    /// A failed sink is dropped so later chunks skip it; the write error is
    /// logged once. Neither failure affects the other sink or the session.
    pub async fn ingest(&self, chunk: &[u8]) {
        {
            let mut stdin = self.stdin.lock().await;
            if let Some(sink) = stdin.as_mut() {
                if let Err(e) = sink.write_all(chunk).await {
                    tracing::warn!(
                        slot = self.slot,
                        error = %e,
                        "transcoder stdin write failed, dropping sink"
                    );
                    *stdin = None;
                }
            }
        }

        {
            let mut archive = self.archive.lock().await;
            if let Some(sink) = archive.as_mut() {
                if let Err(e) = sink.write_all(chunk).await {
                    tracing::warn!(
                        slot = self.slot,
                        error = %e,
                        "archive write failed, dropping sink"
                    );
                    *archive = None;
                }
            }
        }

        self.bytes_ingested
            .fetch_add(chunk.len() as u64, Ordering::Relaxed);
    }

    /// Whether the transcoder child has exited (or was never running)
    pub async fn transcoder_exited(&self) -> bool {
        let mut child = self.child.lock().await;
        match child.as_mut() {
            Some(ch) => matches!(ch.try_wait(), Ok(Some(_))),
            None => true,
        }
    }

    /// Close both sinks and reap the transcoder
    ///
    /// Safe to call once per session; the manager guarantees that by
    /// removing the session from the active set before finishing it.
    pub(super) async fn finish(&self) {
        {
            let mut archive = self.archive.lock().await;
            if let Some(mut sink) = archive.take() {
                if let Err(e) = sink.flush().await {
                    tracing::warn!(slot = self.slot, error = %e, "archive flush failed");
                }
            }
        }

        // Dropping stdin signals end-of-input to the transcoder.
        self.stdin.lock().await.take();

        let mut child = self.child.lock().await;
        if let Some(mut ch) = child.take() {
            transcoder::wait_or_kill(&mut ch).await;
        }
    }
}
