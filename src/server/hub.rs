//! Shared hub state and broadcast bus
//!
//! One mutex guards the combined shared-mutable state (slot registry,
//! session state, peer set). Every broadcast is issued while the state
//! update that caused it is already committed, so a peer receiving
//! `ready_state` sees a snapshot consistent with a moment at-or-after the
//! event. Peer sinks are bounded queues written with `try_send`, so no
//! await point is ever held under the lock.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::Utf8Bytes;
use tokio::sync::{mpsc, Mutex, Notify};

use crate::pipeline::PipelineManager;
use crate::protocol::ServerMessage;
use crate::registry::{SlotId, SlotRegistry, MAX_SLOTS};
use crate::session::{SessionState, StateSnapshot};

use super::config::HubConfig;

/// Error frame text for pre-admission refusal
pub const SERVER_FULL_MSG: &str = "Server full (max 8 agents)";

/// Outbound side of one attached peer
///
/// `tx` feeds the peer's writer task; `kill` tells that task to close the
/// connection when the queue overflows or the hub shuts down.
pub struct PeerSink {
    pub tx: mpsc::Sender<Utf8Bytes>,
    pub kill: Arc<Notify>,
}

/// Returned when admission fails: all slots occupied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubFull;

impl std::fmt::Display for HubFull {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", SERVER_FULL_MSG)
    }
}

impl std::error::Error for HubFull {}

/// Everything guarded by the hub lock
pub(crate) struct HubState {
    pub slots: SlotRegistry,
    pub session: SessionState,
    pub peers: HashMap<SlotId, PeerSink>,
}

/// The coordination hub: shared state, broadcast bus and pipeline access
pub struct Hub {
    pub(crate) state: Mutex<HubState>,
    pipelines: Arc<PipelineManager>,
    config: HubConfig,
}

impl Hub {
    /// Create a hub around an existing pipeline manager
    pub fn new(config: HubConfig, pipelines: Arc<PipelineManager>) -> Self {
        Self {
            state: Mutex::new(HubState {
                slots: SlotRegistry::new(),
                session: SessionState::new(),
                peers: HashMap::new(),
            }),
            pipelines,
            config,
        }
    }

    /// Hub configuration
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Pipeline manager handle
    pub fn pipelines(&self) -> &Arc<PipelineManager> {
        &self.pipelines
    }

    /// Number of attached peers
    pub async fn client_count(&self) -> usize {
        self.state.lock().await.peers.len()
    }

    /// Admit a peer: acquire the lowest free slot, initialise its state,
    /// send `agent_assigned` to it and broadcast the new `ready_state`.
    pub async fn attach(&self, sink: PeerSink) -> Result<SlotId, HubFull> {
        let mut state = self.state.lock().await;

        if state.peers.len() >= MAX_SLOTS as usize {
            return Err(HubFull);
        }
        let slot = state.slots.acquire().map_err(|_| HubFull)?;

        state.session.attach(slot);
        state.peers.insert(slot, sink);

        let snapshot = state.session.snapshot();
        Self::send_to_locked(
            &mut state,
            slot,
            &ServerMessage::AgentAssigned {
                agent_id: slot,
                agents: snapshot.agents.clone(),
                names: snapshot.names.clone(),
            },
        );
        Self::broadcast_locked(&mut state, &ready_state_frame(snapshot));

        tracing::info!(slot, "agent attached");
        Ok(slot)
    }

    /// Detach a peer: clear its state, release the slot and broadcast the
    /// new `ready_state`. Idempotent.
    pub async fn detach(&self, slot: SlotId) {
        let mut state = self.state.lock().await;

        if state.peers.remove(&slot).is_none() {
            return;
        }
        state.session.detach(slot);
        state.slots.release(slot);

        let snapshot = state.session.snapshot();
        Self::broadcast_locked(&mut state, &ready_state_frame(snapshot));

        tracing::info!(slot, "agent detached");
    }

    /// Deliver a frame to every attached peer
    pub async fn broadcast(&self, msg: &ServerMessage) {
        let mut state = self.state.lock().await;
        Self::broadcast_locked(&mut state, msg);
    }

    /// Deliver a frame to a single peer
    pub async fn send_to(&self, slot: SlotId, msg: &ServerMessage) {
        let mut state = self.state.lock().await;
        Self::send_to_locked(&mut state, slot, msg);
    }

    /// Broadcast the current set of active streams
    pub async fn broadcast_stream_status(&self) {
        let streams = self.pipelines.streams().await;
        self.broadcast(&ServerMessage::StreamStatus { streams }).await;
    }

    /// Tell every peer's writer task to close (shutdown path)
    pub async fn close_all_peers(&self) {
        let state = self.state.lock().await;
        for peer in state.peers.values() {
            peer.kill.notify_waiters();
        }
    }

    /// Serialise once, write to every peer's sink
    ///
    /// A full queue marks the peer dead and triggers its close; a closed
    /// sink is skipped — the peer's own read loop drives its teardown.
    pub(crate) fn broadcast_locked(state: &mut HubState, msg: &ServerMessage) {
        let Ok(text) = serde_json::to_string(msg) else {
            tracing::error!("failed to serialize broadcast frame");
            return;
        };
        let frame = Utf8Bytes::from(text);

        for (slot, peer) in &state.peers {
            match peer.tx.try_send(frame.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(slot = *slot, "outbound queue full, closing peer");
                    peer.kill.notify_waiters();
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::debug!(slot = *slot, "peer sink closed, skipping");
                }
            }
        }
    }

    /// Serialise and write to one peer's sink
    pub(crate) fn send_to_locked(state: &mut HubState, slot: SlotId, msg: &ServerMessage) {
        let Some(peer) = state.peers.get(&slot) else {
            return;
        };
        let Ok(text) = serde_json::to_string(msg) else {
            tracing::error!(slot, "failed to serialize frame");
            return;
        };

        match peer.tx.try_send(Utf8Bytes::from(text)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(slot, "outbound queue full, closing peer");
                peer.kill.notify_waiters();
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(slot, "peer sink closed, skipping");
            }
        }
    }
}

/// Build the `ready_state` frame from a snapshot
pub(crate) fn ready_state_frame(snapshot: StateSnapshot) -> ServerMessage {
    ServerMessage::ReadyState {
        agents: snapshot.agents,
        names: snapshot.names,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::pipeline::PipelineConfig;

    pub(crate) fn test_hub() -> Arc<Hub> {
        let (pipelines, _events) = PipelineManager::new(PipelineConfig::default());
        Arc::new(Hub::new(HubConfig::default(), pipelines))
    }

    pub(crate) fn peer() -> (PeerSink, mpsc::Receiver<Utf8Bytes>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_TEST_CAP);
        (
            PeerSink {
                tx,
                kill: Arc::new(Notify::new()),
            },
            rx,
        )
    }

    pub(crate) fn next_frame(rx: &mut mpsc::Receiver<Utf8Bytes>) -> serde_json::Value {
        let frame = rx.try_recv().expect("expected a queued frame");
        serde_json::from_str(frame.as_str()).expect("frame is valid JSON")
    }

    const OUTBOUND_TEST_CAP: usize = 64;

    #[tokio::test]
    async fn test_attach_sends_assignment_then_snapshot() {
        let hub = test_hub();
        let (sink, mut rx) = peer();

        let slot = hub.attach(sink).await.unwrap();
        assert_eq!(slot, 1);

        let assigned = next_frame(&mut rx);
        assert_eq!(assigned["type"], "agent_assigned");
        assert_eq!(assigned["agentId"], 1);
        assert_eq!(assigned["agents"]["1"], false);
        assert_eq!(assigned["names"]["8"], "");

        let ready = next_frame(&mut rx);
        assert_eq!(ready["type"], "ready_state");
        assert_eq!(ready["agents"], assigned["agents"]);
    }

    #[tokio::test]
    async fn test_ninth_attach_is_refused() {
        let hub = test_hub();
        let mut receivers = Vec::new();

        for expected in 1..=8u8 {
            let (sink, rx) = peer();
            assert_eq!(hub.attach(sink).await.unwrap(), expected);
            receivers.push(rx);
        }

        let (sink, _rx) = peer();
        assert_eq!(hub.attach(sink).await, Err(HubFull));
        assert_eq!(hub.client_count().await, 8);
    }

    #[tokio::test]
    async fn test_detach_frees_lowest_slot() {
        let hub = test_hub();
        let (a, _ra) = peer();
        let (b, _rb) = peer();
        let (c, _rc) = peer();

        hub.attach(a).await.unwrap(); // 1
        hub.attach(b).await.unwrap(); // 2
        let third = hub.attach(c).await.unwrap();
        assert_eq!(third, 3);

        hub.detach(3).await;
        hub.detach(3).await; // idempotent

        let (d, _rd) = peer();
        assert_eq!(hub.attach(d).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all_peers() {
        let hub = test_hub();
        let (a, mut ra) = peer();
        let (b, mut rb) = peer();
        hub.attach(a).await.unwrap();
        hub.attach(b).await.unwrap();

        // Drain attach-time frames.
        while ra.try_recv().is_ok() {}
        while rb.try_recv().is_ok() {}

        hub.broadcast(&ServerMessage::Reset).await;

        assert_eq!(next_frame(&mut ra)["type"], "reset");
        assert_eq!(next_frame(&mut rb)["type"], "reset");
    }

    #[tokio::test]
    async fn test_overflowed_peer_is_killed() {
        let hub = test_hub();
        let (tx, _rx) = mpsc::channel(1);
        let kill = Arc::new(Notify::new());
        let sink = PeerSink {
            tx,
            kill: kill.clone(),
        };

        // Register interest before the overflow so the notification is not lost.
        let notified = kill.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        // attach queues two frames into a capacity-1 channel; the second
        // try_send overflows and must fire the kill switch.
        hub.attach(sink).await.unwrap();
        notified.await;
    }
}
