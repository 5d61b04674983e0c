//! External transcoder process control
//!
//! The transcoder (ffmpeg) reads raw container bytes on stdin and remuxes
//! the video track into a rolling segmented playlist. No re-encoding: the
//! video track is copied, audio is discarded.

use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};

use crate::registry::SlotId;

/// Target duration of one live segment, in seconds
pub const SEGMENT_SECONDS: u32 = 1;

/// Number of segments kept in the rolling playlist
pub const PLAYLIST_SIZE: u32 = 4;

/// Playlist filename inside each slot's live directory
pub const PLAYLIST_NAME: &str = "stream.m3u8";

/// Extension of the live segment files
pub const SEGMENT_EXT: &str = "ts";

/// Extension of the local archive container
pub const ARCHIVE_EXT: &str = "webm";

/// MIME type of the archive container
pub const ARCHIVE_MIME: &str = "video/webm";

/// How long stop waits for the transcoder to exit before killing it
pub const STOP_KILL_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the transcoder argument list for one session
///
/// stdin is the source container; output is a low-latency rolling HLS
/// playlist in `live_dir` with segment filenames `s<epoch>_NNN.ts`.
pub fn hls_args(live_dir: &Path, epoch_ms: u64) -> Vec<OsString> {
    let segment_template = live_dir.join(format!("s{}_%03d.{}", epoch_ms, SEGMENT_EXT));
    let playlist = live_dir.join(PLAYLIST_NAME);

    let mut args: Vec<OsString> = [
        "-hide_banner",
        "-loglevel",
        "error",
        "-fflags",
        "nobuffer",
        "-i",
        "pipe:0",
        "-c:v",
        "copy",
        "-an",
        "-f",
        "hls",
    ]
    .iter()
    .map(OsString::from)
    .collect();

    args.push("-hls_time".into());
    args.push(SEGMENT_SECONDS.to_string().into());
    args.push("-hls_list_size".into());
    args.push(PLAYLIST_SIZE.to_string().into());
    args.push("-hls_flags".into());
    args.push("delete_segments+independent_segments".into());
    args.push("-hls_segment_filename".into());
    args.push(segment_template.into_os_string());
    args.push(playlist.into_os_string());

    args
}

/// Spawn the transcoder child for one session, with stdin piped
///
/// stdout/stderr are discarded; the transcoder's own diagnostics are not
/// part of the hub's surface.
pub fn spawn(transcoder_path: &Path, live_dir: &Path, epoch_ms: u64) -> std::io::Result<Child> {
    Command::new(transcoder_path)
        .args(hls_args(live_dir, epoch_ms))
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
}

/// Wait for the transcoder to exit, force-terminating after
/// [`STOP_KILL_TIMEOUT`]
pub async fn wait_or_kill(child: &mut Child) {
    match tokio::time::timeout(STOP_KILL_TIMEOUT, child.wait()).await {
        Ok(Ok(status)) => {
            tracing::debug!(status = %status, "transcoder exited");
        }
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "failed to reap transcoder");
        }
        Err(_) => {
            tracing::warn!(
                timeout_secs = STOP_KILL_TIMEOUT.as_secs(),
                "transcoder did not exit in time, killing"
            );
            if let Err(e) = child.kill().await {
                tracing::warn!(error = %e, "failed to kill transcoder");
            }
        }
    }
}

/// Derive the archive filename for a session
///
/// Keeps only `[A-Za-z0-9_-]` from the display name, falling back to
/// `agent_<slot>` when nothing survives, and appends the start timestamp
/// plus the container extension.
pub fn archive_file_name(display_name: &str, slot: SlotId, epoch_ms: u64) -> String {
    let safe: String = display_name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();

    let base = if safe.is_empty() {
        format!("agent_{}", slot)
    } else {
        safe
    };

    format!("{}_{}.{}", base, epoch_ms, ARCHIVE_EXT)
}
