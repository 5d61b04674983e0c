//! Coordination hub server
//!
//! One WebSocket endpoint carries all control and video traffic; a small
//! HTTP surface exposes health, stream listings and the live playlists.
//!
//! # Architecture
//!
//! ```text
//!        WebSocket /ws                       Arc<Hub>
//!   ┌────────────────────┐        ┌──────────────────────────┐
//!   │ per-peer reader ───┼──────► │ Mutex<HubState> {        │
//!   │ per-peer writer ◄──┼─────── │   SlotRegistry,          │
//!   └────────────────────┘  text  │   SessionState,          │
//!             │                   │   peers: slot → sink,    │
//!      binary frames              │ }                        │
//!             │                   └──────────────────────────┘
//!             ▼                                │ stream_start/stop
//!   ┌────────────────────┐                     ▼
//!   │  PipelineManager   │◄────────────────────┘
//!   │  (own lock)        │──► ffmpeg ──► /live/<slot>/stream.m3u8
//!   └────────────────────┘──► archive ─► upload on stop
//! ```
//!
//! State mutation and the broadcast fan-out share one lock, giving every
//! peer the same total order of frames; peer sinks are bounded queues so a
//! slow peer can fall behind (and eventually be dropped) without stalling
//! anyone else.

pub mod config;
pub mod connection;
pub mod handler;
pub mod http;
pub mod hub;
pub mod listener;

pub use config::HubConfig;
pub use handler::{ALREADY_STREAMING_MSG, NOT_IN_TRAVEL_MSG, READY_GATE_MSG};
pub use hub::{Hub, HubFull, PeerSink, SERVER_FULL_MSG};
pub use listener::HubServer;
