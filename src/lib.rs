//! # raidhub
//!
//! Coordination hub for small fireteams (up to 8 agents) of speedrunners.
//! Agents attach over a single WebSocket endpoint, synchronize ready state
//! and countdowns, and optionally push live video up through the hub for
//! HLS re-distribution and archival upload.
//!
//! ## What the hub does
//!
//! - Assigns each connection the lowest free identity slot (1..=8) and
//!   reclaims it on disconnect.
//! - Maintains shared ready/name/travel state and broadcasts a canonical
//!   snapshot after every mutation.
//! - Gates the start protocol on unanimous readiness and emits a shared
//!   countdown anchored to the initiator's clock.
//! - Remuxes each agent's binary video chunks into a rolling live playlist
//!   on disk and archives the raw stream for upload when the session ends.
//!
//! ## Example
//!
//! ```no_run
//! use raidhub::{HubConfig, HubServer};
//!
//! #[tokio::main]
//! async fn main() -> raidhub::Result<()> {
//!     let config = HubConfig::default().live_root("/srv/live");
//!     HubServer::new(config).run().await
//! }
//! ```

pub mod error;
pub mod pipeline;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;

pub use error::{Error, Result};
pub use server::{HubConfig, HubServer};

/// Crate version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
