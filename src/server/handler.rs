//! Inbound frame dispatch
//!
//! Interprets every decoded [`ClientMessage`] for one peer, mutating shared
//! state and driving broadcasts. Frame sequences that must appear adjacent
//! to every peer (countdown then start, travel transitions) are emitted in
//! one hub-lock critical section.

use std::sync::Arc;

use crate::pipeline::PipelineError;
use crate::protocol::{epoch_ms, ClientMessage, ServerMessage, COUNTDOWN_DURATION_MS};
use crate::registry::SlotId;

use super::hub::{ready_state_frame, Hub};

/// Error sent when the ready gate refuses a start request
pub const READY_GATE_MSG: &str = "All connected users must be Ready to start";

/// Error sent when `execute_travel` arrives outside travel mode
pub const NOT_IN_TRAVEL_MSG: &str = "Not in travel mode";

/// Error sent when a slot starts a second stream
pub const ALREADY_STREAMING_MSG: &str = "Already streaming";

impl Hub {
    /// Dispatch one control frame from an attached peer
    pub async fn handle_message(self: &Arc<Self>, slot: SlotId, msg: ClientMessage) {
        match msg {
            ClientMessage::Ready { value } => {
                let mut state = self.state.lock().await;
                if !state.session.contains(slot) {
                    tracing::warn!(slot, "frame from unassigned slot, dropping");
                    return;
                }
                state.session.set_ready(slot, value);
                let snapshot = state.session.snapshot();
                Self::broadcast_locked(&mut state, &ready_state_frame(snapshot));
            }

            ClientMessage::SetName { name } => {
                let mut state = self.state.lock().await;
                if !state.session.contains(slot) {
                    tracing::warn!(slot, "frame from unassigned slot, dropping");
                    return;
                }
                state.session.set_name(slot, &name);
                let snapshot = state.session.snapshot();
                Self::broadcast_locked(&mut state, &ready_state_frame(snapshot));
            }

            ClientMessage::StartRequest { timestamp } => {
                let mut state = self.state.lock().await;
                if !state.session.contains(slot) {
                    tracing::warn!(slot, "frame from unassigned slot, dropping");
                    return;
                }
                if !state.session.all_ready() {
                    Self::send_to_locked(
                        &mut state,
                        slot,
                        &ServerMessage::Error {
                            message: READY_GATE_MSG.into(),
                        },
                    );
                    return;
                }

                // The sender's clock is the canonical anchor; echo it
                // unchanged, adjacent to the start frame.
                Self::broadcast_locked(
                    &mut state,
                    &ServerMessage::Countdown {
                        timestamp,
                        duration: COUNTDOWN_DURATION_MS,
                    },
                );
                Self::broadcast_locked(
                    &mut state,
                    &ServerMessage::Start {
                        timestamp,
                        starter_agent_id: slot,
                    },
                );
                tracing::info!(slot, timestamp, "countdown started");
            }

            ClientMessage::TravelRequest => {
                let mut state = self.state.lock().await;
                if !state.session.contains(slot) {
                    tracing::warn!(slot, "frame from unassigned slot, dropping");
                    return;
                }
                state.session.reset_all_ready();
                state.session.set_travel_mode(true);
                Self::broadcast_locked(&mut state, &ServerMessage::TravelMode { active: true });
                let snapshot = state.session.snapshot();
                Self::broadcast_locked(&mut state, &ready_state_frame(snapshot));
                tracing::info!(slot, "travel mode requested");
            }

            ClientMessage::ExecuteTravel => {
                let mut state = self.state.lock().await;
                if !state.session.contains(slot) {
                    tracing::warn!(slot, "frame from unassigned slot, dropping");
                    return;
                }
                if !state.session.travel_mode() {
                    Self::send_to_locked(
                        &mut state,
                        slot,
                        &ServerMessage::Error {
                            message: NOT_IN_TRAVEL_MSG.into(),
                        },
                    );
                    return;
                }
                Self::broadcast_locked(&mut state, &ServerMessage::ExecuteTravel);
                state.session.set_travel_mode(false);
                state.session.reset_all_ready();
                Self::broadcast_locked(&mut state, &ServerMessage::TravelMode { active: false });
                let snapshot = state.session.snapshot();
                Self::broadcast_locked(&mut state, &ready_state_frame(snapshot));
                tracing::info!(slot, "travel executed");
            }

            ClientMessage::ResetRaid => {
                let mut state = self.state.lock().await;
                if !state.session.contains(slot) {
                    tracing::warn!(slot, "frame from unassigned slot, dropping");
                    return;
                }
                state.session.set_travel_mode(false);
                state.session.reset_all_ready();
                Self::broadcast_locked(&mut state, &ServerMessage::TravelMode { active: false });
                Self::broadcast_locked(&mut state, &ServerMessage::Reset);
                let snapshot = state.session.snapshot();
                Self::broadcast_locked(&mut state, &ready_state_frame(snapshot));
                tracing::info!(slot, "raid reset");
            }

            ClientMessage::StreamStart => {
                let display_name = {
                    let state = self.state.lock().await;
                    if !state.session.contains(slot) {
                        tracing::warn!(slot, "frame from unassigned slot, dropping");
                        return;
                    }
                    state.session.name(slot).to_string()
                };

                match self.pipelines().start(slot, &display_name).await {
                    Ok(()) => self.broadcast_stream_status().await,
                    Err(PipelineError::AlreadyStreaming) => {
                        self.send_to(
                            slot,
                            &ServerMessage::Error {
                                message: ALREADY_STREAMING_MSG.into(),
                            },
                        )
                        .await;
                    }
                    Err(e) => {
                        tracing::error!(slot, error = %e, "failed to start stream pipeline");
                    }
                }
            }

            ClientMessage::StreamStop => {
                // Stop runs in the background; the completion event drives
                // the stream_status broadcast.
                let pipelines = Arc::clone(self.pipelines());
                tokio::spawn(async move {
                    pipelines.stop(slot).await;
                });
            }

            ClientMessage::Ping => {
                self.send_to(
                    slot,
                    &ServerMessage::Pong {
                        timestamp: epoch_ms(),
                    },
                )
                .await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::hub::tests::{next_frame, peer, test_hub};

    #[tokio::test]
    async fn test_lone_client_ready_gate() {
        let hub = test_hub();
        let (sink, mut rx) = peer();
        let slot = hub.attach(sink).await.unwrap();
        while rx.try_recv().is_ok() {}

        hub.handle_message(slot, ClientMessage::SetName { name: "  Foo  ".into() })
            .await;
        let ready = next_frame(&mut rx);
        assert_eq!(ready["type"], "ready_state");
        assert_eq!(ready["names"]["1"], "Foo");

        hub.handle_message(slot, ClientMessage::StartRequest { timestamp: 1000 })
            .await;
        let error = next_frame(&mut rx);
        assert_eq!(error["type"], "error");
        assert_eq!(error["message"], READY_GATE_MSG);
        // No countdown or start was broadcast.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_two_client_countdown() {
        let hub = test_hub();
        let (a, mut ra) = peer();
        let (b, mut rb) = peer();
        let slot_a = hub.attach(a).await.unwrap();
        let slot_b = hub.attach(b).await.unwrap();

        hub.handle_message(slot_a, ClientMessage::Ready { value: true })
            .await;
        hub.handle_message(slot_b, ClientMessage::Ready { value: true })
            .await;
        while ra.try_recv().is_ok() {}
        while rb.try_recv().is_ok() {}

        hub.handle_message(slot_b, ClientMessage::StartRequest { timestamp: 5000 })
            .await;

        for rx in [&mut ra, &mut rb] {
            let countdown = next_frame(rx);
            assert_eq!(countdown["type"], "countdown");
            assert_eq!(countdown["timestamp"], 5000);
            assert_eq!(countdown["duration"], 3000);

            let start = next_frame(rx);
            assert_eq!(start["type"], "start");
            assert_eq!(start["timestamp"], 5000);
            assert_eq!(start["starterAgentId"], 2);
        }
    }

    #[tokio::test]
    async fn test_travel_cycle() {
        let hub = test_hub();
        let (a, mut ra) = peer();
        let (b, mut rb) = peer();
        let slot_a = hub.attach(a).await.unwrap();
        let slot_b = hub.attach(b).await.unwrap();

        hub.handle_message(slot_a, ClientMessage::Ready { value: true })
            .await;
        hub.handle_message(slot_b, ClientMessage::Ready { value: true })
            .await;
        while ra.try_recv().is_ok() {}
        while rb.try_recv().is_ok() {}

        hub.handle_message(slot_a, ClientMessage::TravelRequest).await;

        let travel = next_frame(&mut ra);
        assert_eq!(travel["type"], "travel_mode");
        assert_eq!(travel["active"], true);
        let ready = next_frame(&mut ra);
        assert_eq!(ready["type"], "ready_state");
        assert!(ready["agents"]
            .as_object()
            .unwrap()
            .values()
            .all(|v| v == false));

        hub.handle_message(slot_b, ClientMessage::Ready { value: true })
            .await;
        while ra.try_recv().is_ok() {}
        while rb.try_recv().is_ok() {}

        hub.handle_message(slot_b, ClientMessage::ExecuteTravel).await;

        assert_eq!(next_frame(&mut rb)["type"], "execute_travel");
        let travel_off = next_frame(&mut rb);
        assert_eq!(travel_off["type"], "travel_mode");
        assert_eq!(travel_off["active"], false);
        let ready = next_frame(&mut rb);
        assert_eq!(ready["type"], "ready_state");
        assert!(ready["agents"]
            .as_object()
            .unwrap()
            .values()
            .all(|v| v == false));
    }

    #[tokio::test]
    async fn test_execute_travel_outside_travel_mode() {
        let hub = test_hub();
        let (a, mut ra) = peer();
        let (b, mut rb) = peer();
        hub.attach(a).await.unwrap();
        let slot_b = hub.attach(b).await.unwrap();
        while ra.try_recv().is_ok() {}
        while rb.try_recv().is_ok() {}

        hub.handle_message(slot_b, ClientMessage::ExecuteTravel).await;

        let error = next_frame(&mut rb);
        assert_eq!(error["type"], "error");
        assert_eq!(error["message"], NOT_IN_TRAVEL_MSG);
        // Only the offending peer heard anything.
        assert!(ra.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_reset_raid_is_idempotent() {
        let hub = test_hub();
        let (a, mut ra) = peer();
        let slot = hub.attach(a).await.unwrap();
        hub.handle_message(slot, ClientMessage::Ready { value: true })
            .await;
        hub.handle_message(slot, ClientMessage::TravelRequest).await;
        while ra.try_recv().is_ok() {}

        hub.handle_message(slot, ClientMessage::ResetRaid).await;
        let first: Vec<serde_json::Value> =
            (0..3).map(|_| next_frame(&mut ra)).collect();

        hub.handle_message(slot, ClientMessage::ResetRaid).await;
        let second: Vec<serde_json::Value> =
            (0..3).map(|_| next_frame(&mut ra)).collect();

        assert_eq!(first, second);
        assert_eq!(first[0]["type"], "travel_mode");
        assert_eq!(first[0]["active"], false);
        assert_eq!(first[1]["type"], "reset");
        assert_eq!(first[2]["type"], "ready_state");
    }

    #[tokio::test]
    async fn test_ping_answers_sender_only() {
        let hub = test_hub();
        let (a, mut ra) = peer();
        let (b, mut rb) = peer();
        let slot_a = hub.attach(a).await.unwrap();
        hub.attach(b).await.unwrap();
        while ra.try_recv().is_ok() {}
        while rb.try_recv().is_ok() {}

        hub.handle_message(slot_a, ClientMessage::Ping).await;

        let pong = next_frame(&mut ra);
        assert_eq!(pong["type"], "pong");
        assert!(pong["timestamp"].as_u64().unwrap() > 0);
        assert!(rb.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_frames_from_detached_slot_are_dropped() {
        let hub = test_hub();
        let (a, mut ra) = peer();
        let (b, mut rb) = peer();
        hub.attach(a).await.unwrap();
        let slot_b = hub.attach(b).await.unwrap();
        hub.detach(slot_b).await;
        while ra.try_recv().is_ok() {}
        while rb.try_recv().is_ok() {}

        hub.handle_message(slot_b, ClientMessage::Ready { value: true })
            .await;

        assert!(ra.try_recv().is_err());
    }
}
