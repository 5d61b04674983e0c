//! HTTP surface: health, stream listing and live playlist serving
//!
//! The live endpoints serve the per-slot playlist and segment files the
//! transcoder writes. Responses are never cacheable (the playlist changes
//! every second) and carry permissive CORS so browser players on other
//! origins can fetch them.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::protocol::{epoch_ms, StreamInfo};
use crate::registry::MAX_SLOTS;

use super::connection::ws_handler;
use super::hub::Hub;

/// Build the complete hub router
pub fn router(hub: Arc<Hub>) -> Router {
    Router::new()
        .route("/", get(service_descriptor))
        .route("/health", get(health))
        .route("/streams", get(streams))
        .route("/live/{agent}/{asset}", get(live_asset))
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(hub)
}

async fn service_descriptor() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": "raidhub",
        "version": env!("CARGO_PKG_VERSION"),
        "websocket": "/ws",
        "health": "/health",
        "streams": "/streams",
        "live": "/live/{agentId}/stream.m3u8",
    }))
}

async fn health(State(hub): State<Arc<Hub>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "clients": hub.client_count().await,
        "activeStreams": hub.pipelines().active_count().await,
        "timestamp": epoch_ms(),
    }))
}

/// `/streams` entry: the broadcast shape plus elapsed wall-clock seconds
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StreamDetails {
    #[serde(flatten)]
    info: StreamInfo,
    duration_seconds: u64,
}

async fn streams(State(hub): State<Arc<Hub>>) -> Json<Vec<StreamDetails>> {
    let sessions = hub.pipelines().sessions().await;
    Json(
        sessions
            .iter()
            .map(|session| StreamDetails {
                info: session.info(),
                duration_seconds: session.duration_secs(),
            })
            .collect(),
    )
}

async fn live_asset(
    State(hub): State<Arc<Hub>>,
    Path((agent, asset)): Path<(String, String)>,
) -> Response {
    let slot: u8 = match agent.parse() {
        Ok(slot) if (1..=MAX_SLOTS).contains(&slot) => slot,
        _ => return StatusCode::NOT_FOUND.into_response(),
    };
    if !is_safe_asset(&asset) {
        return StatusCode::NOT_FOUND.into_response();
    }

    let path = hub
        .config()
        .live_root
        .join(slot.to_string())
        .join(&asset);

    match tokio::fs::read(&path).await {
        Ok(body) => (
            [
                (header::CONTENT_TYPE, content_type_for(&asset)),
                (header::CACHE_CONTROL, "no-cache, no-store"),
            ],
            body,
        )
            .into_response(),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Segment and playlist names never contain separators or dot-dot; anything
/// else cannot have been written by the transcoder.
fn is_safe_asset(name: &str) -> bool {
    !name.is_empty()
        && !name.contains("..")
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

fn content_type_for(name: &str) -> &'static str {
    if name.ends_with(".m3u8") {
        "application/vnd.apple.mpegurl"
    } else if name.ends_with(".ts") {
        "video/mp2t"
    } else {
        "application/octet-stream"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for("stream.m3u8"), "application/vnd.apple.mpegurl");
        assert_eq!(content_type_for("s1700_001.ts"), "video/mp2t");
        assert_eq!(content_type_for("readme"), "application/octet-stream");
    }

    #[test]
    fn test_asset_name_safety() {
        assert!(is_safe_asset("stream.m3u8"));
        assert!(is_safe_asset("s1700000000000_042.ts"));

        assert!(!is_safe_asset(""));
        assert!(!is_safe_asset("../secrets"));
        assert!(!is_safe_asset("a/b.ts"));
        assert!(!is_safe_asset("a\\b.ts"));
    }

    #[test]
    fn test_stream_details_shape() {
        let details = StreamDetails {
            info: StreamInfo {
                agent_id: 2,
                name: "Foo".into(),
                hls_url: "/live/2/stream.m3u8".into(),
                started_at: 1700,
            },
            duration_seconds: 42,
        };
        let value = serde_json::to_value(&details).unwrap();

        assert_eq!(value["agentId"], 2);
        assert_eq!(value["hlsUrl"], "/live/2/stream.m3u8");
        assert_eq!(value["durationSeconds"], 42);
    }
}
