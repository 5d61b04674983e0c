//! Message taxonomy for the WebSocket control channel
//!
//! Client frames are decoded into [`ClientMessage`]; everything the hub emits
//! is a [`ServerMessage`]. Field names follow the wire convention of the
//! clients (camelCase), variant tags are snake_case.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Ready-flag snapshot keyed by slot id, always covering 1..=8.
///
/// `BTreeMap` keeps the keys in ascending order so snapshots serialize
/// deterministically.
pub type ReadyMap = BTreeMap<u8, bool>;

/// Display-name snapshot keyed by slot id, always covering 1..=8.
pub type NameMap = BTreeMap<u8, String>;

/// Inbound control frame from a client
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Set the sender's ready flag
    Ready { value: bool },
    /// Set the sender's display name
    SetName { name: String },
    /// Request a synchronized start; the timestamp is the sender's local
    /// clock and becomes the countdown anchor for everyone
    StartRequest { timestamp: u64 },
    /// Enter travel mode, clearing all ready flags
    TravelRequest,
    /// Execute the pending travel (only honoured while in travel mode)
    ExecuteTravel,
    /// Clear travel mode and all ready flags
    ResetRaid,
    /// Begin ingesting this agent's video stream
    StreamStart,
    /// Stop ingesting this agent's video stream
    StreamStop,
    /// Application-level liveness probe
    Ping,
}

/// Outbound control frame to one or all clients
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent to a newly attached peer only, naming its slot
    #[serde(rename_all = "camelCase")]
    AgentAssigned {
        agent_id: u8,
        agents: ReadyMap,
        names: NameMap,
    },
    /// Full ready/name snapshot, broadcast after every state mutation
    ReadyState { agents: ReadyMap, names: NameMap },
    /// Shared countdown anchor; always immediately followed by `start`
    Countdown { timestamp: u64, duration: u64 },
    /// Start frame naming the slot that initiated the countdown
    #[serde(rename_all = "camelCase")]
    Start { timestamp: u64, starter_agent_id: u8 },
    /// Process-wide travel mode toggled
    TravelMode { active: bool },
    /// Travel execution signal
    ExecuteTravel,
    /// Raid state was reset
    Reset,
    /// Currently active live streams
    StreamStatus { streams: Vec<StreamInfo> },
    /// Reply to `ping`, carrying the server clock
    Pong { timestamp: u64 },
    /// Human-readable error, sent only to the offending peer
    Error { message: String },
}

/// One active live stream, as seen in `stream_status` broadcasts and the
/// `/streams` HTTP endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamInfo {
    /// Slot of the streaming agent
    pub agent_id: u8,
    /// Display name captured at stream start
    pub name: String,
    /// Playlist path relative to the HTTP root
    pub hls_url: String,
    /// Epoch milliseconds when the pipeline started
    pub started_at: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_maps() -> (ReadyMap, NameMap) {
        let mut agents = ReadyMap::new();
        let mut names = NameMap::new();
        for slot in 1..=8u8 {
            agents.insert(slot, false);
            names.insert(slot, String::new());
        }
        (agents, names)
    }

    #[test]
    fn test_decode_ready() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"ready","value":true}"#).unwrap();
        assert_eq!(msg, ClientMessage::Ready { value: true });
    }

    #[test]
    fn test_decode_set_name() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"set_name","name":"Foo"}"#).unwrap();
        assert_eq!(msg, ClientMessage::SetName { name: "Foo".into() });
    }

    #[test]
    fn test_decode_start_request() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"start_request","timestamp":5000}"#).unwrap();
        assert_eq!(msg, ClientMessage::StartRequest { timestamp: 5000 });
    }

    #[test]
    fn test_decode_unit_variants() {
        for (raw, expected) in [
            (r#"{"type":"travel_request"}"#, ClientMessage::TravelRequest),
            (r#"{"type":"execute_travel"}"#, ClientMessage::ExecuteTravel),
            (r#"{"type":"reset_raid"}"#, ClientMessage::ResetRaid),
            (r#"{"type":"stream_start"}"#, ClientMessage::StreamStart),
            (r#"{"type":"stream_stop"}"#, ClientMessage::StreamStop),
            (r#"{"type":"ping"}"#, ClientMessage::Ping),
        ] {
            let msg: ClientMessage = serde_json::from_str(raw).unwrap();
            assert_eq!(msg, expected);
        }
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let result = serde_json::from_str::<ClientMessage>(r#"{"type":"self_destruct"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_agent_assigned_wire_shape() {
        let (agents, names) = full_maps();
        let frame = ServerMessage::AgentAssigned {
            agent_id: 1,
            agents,
            names,
        };
        let value: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&frame).unwrap()).unwrap();

        assert_eq!(value["type"], "agent_assigned");
        assert_eq!(value["agentId"], 1);
        assert_eq!(value["agents"]["1"], false);
        assert_eq!(value["agents"]["8"], false);
        assert_eq!(value["names"]["1"], "");
    }

    #[test]
    fn test_countdown_and_start_wire_shape() {
        let countdown = ServerMessage::Countdown {
            timestamp: 5000,
            duration: 3000,
        };
        assert_eq!(
            serde_json::to_string(&countdown).unwrap(),
            r#"{"type":"countdown","timestamp":5000,"duration":3000}"#
        );

        let start = ServerMessage::Start {
            timestamp: 5000,
            starter_agent_id: 2,
        };
        assert_eq!(
            serde_json::to_string(&start).unwrap(),
            r#"{"type":"start","timestamp":5000,"starterAgentId":2}"#
        );
    }

    #[test]
    fn test_stream_status_wire_shape() {
        let frame = ServerMessage::StreamStatus {
            streams: vec![StreamInfo {
                agent_id: 3,
                name: "Foo".into(),
                hls_url: "/live/3/stream.m3u8".into(),
                started_at: 1234,
            }],
        };
        let value: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&frame).unwrap()).unwrap();

        assert_eq!(value["type"], "stream_status");
        assert_eq!(value["streams"][0]["agentId"], 3);
        assert_eq!(value["streams"][0]["hlsUrl"], "/live/3/stream.m3u8");
        assert_eq!(value["streams"][0]["startedAt"], 1234);
    }

    #[test]
    fn test_unit_server_frames() {
        assert_eq!(
            serde_json::to_string(&ServerMessage::ExecuteTravel).unwrap(),
            r#"{"type":"execute_travel"}"#
        );
        assert_eq!(
            serde_json::to_string(&ServerMessage::Reset).unwrap(),
            r#"{"type":"reset"}"#
        );
    }
}
