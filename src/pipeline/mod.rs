//! Per-agent stream pipeline
//!
//! Each agent that starts streaming gets one pipeline: binary WebSocket
//! frames are appended to the stdin of an external transcoder child process
//! (which writes a rolling segmented playlist into the agent's live
//! directory) and, in parallel, to an archive file awaiting upload.
//!
//! # Architecture
//!
//! ```text
//!                       Arc<PipelineManager>
//!                  ┌──────────────────────────────┐
//!                  │ active: HashMap<SlotId,      │
//!                  │   Arc<PipelineSession> {     │
//!                  │     transcoder stdin,        │
//!                  │     archive sink,            │
//!                  │   }                          │
//!                  │ >                            │
//!                  └──────────────┬───────────────┘
//!                                 │
//!               binary frame ─► feed(slot, chunk)
//!                                 │
//!                   ┌─────────────┴─────────────┐
//!                   ▼                           ▼
//!          transcoder stdin              archive file
//!                   │                           │
//!                   ▼                           ▼
//!     <live>/<slot>/stream.m3u8        <recordings>/<name>_<ts>.webm
//!     <live>/<slot>/s<ts>_NNN.ts          (uploaded on stop)
//! ```
//!
//! Input-side faults (broken stdin, closed archive sink) are logged and
//! absorbed; the session stays active until an explicit stop or disconnect.
//! Stop closes both sinks, waits for the transcoder with a bounded kill
//! timeout, uploads the archive and reclaims every on-disk resource.

pub mod error;
pub mod manager;
pub mod session;
pub mod transcoder;
pub mod upload;

pub use error::PipelineError;
pub use manager::{PipelineConfig, PipelineEvent, PipelineManager};
pub use session::PipelineSession;
pub use upload::{ArchiveMeta, ArchiveStore, UploadError};
