//! Archive upload to the external object store
//!
//! Three sequential calls: request an upload URL from the store, push the
//! archive bytes to that URL, then register the recording's metadata. Any
//! failure aborts the sequence; the caller logs it and discards the local
//! archive either way.

use std::path::Path;

use chrono::DateTime;
use serde::Deserialize;

use crate::registry::SlotId;

use super::transcoder::ARCHIVE_MIME;

/// Metadata registered with the store alongside the archive bytes
#[derive(Debug, Clone)]
pub struct ArchiveMeta {
    /// Slot of the recorded agent
    pub agent_id: SlotId,
    /// Display name captured at stream start
    pub agent_name: String,
    /// Whole seconds of wall-clock recording time
    pub duration_secs: u64,
    /// Epoch milliseconds when recording started
    pub recorded_at_ms: u64,
}

/// Error type for the upload sequence
#[derive(Debug)]
pub enum UploadError {
    /// Transport-level failure or undecodable response body
    Request(reqwest::Error),
    /// A step answered with a non-success status
    Status { step: &'static str, status: u16 },
    /// Local archive could not be read
    Io(std::io::Error),
}

impl std::fmt::Display for UploadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadError::Request(e) => write!(f, "upload request failed: {}", e),
            UploadError::Status { step, status } => {
                write!(f, "upload step '{}' answered HTTP {}", step, status)
            }
            UploadError::Io(e) => write!(f, "failed to read archive: {}", e),
        }
    }
}

impl std::error::Error for UploadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            UploadError::Request(e) => Some(e),
            UploadError::Io(e) => Some(e),
            UploadError::Status { .. } => None,
        }
    }
}

#[derive(Deserialize)]
struct UploadUrlResponse {
    #[serde(rename = "uploadUrl")]
    upload_url: String,
}

#[derive(Deserialize)]
struct StorageResponse {
    #[serde(rename = "storageId")]
    storage_id: String,
}

/// Client for the external archive store
///
/// Unconfigured (missing site URL or token) the store skips every upload
/// with a warning; the hub works fully without it.
pub struct ArchiveStore {
    site_url: Option<String>,
    token: Option<String>,
    client: reqwest::Client,
}

impl ArchiveStore {
    /// Create a store client; `None` parts leave the store unconfigured
    pub fn new(site_url: Option<String>, token: Option<String>) -> Self {
        Self {
            site_url,
            token,
            client: reqwest::Client::new(),
        }
    }

    /// Whether both the site URL and the bearer token are present
    pub fn is_configured(&self) -> bool {
        self.site_url.is_some() && self.token.is_some()
    }

    /// Run the full upload sequence for one archive
    ///
    /// A missing or empty archive and an unconfigured store are quiet
    /// successes; the session has nothing to ship.
    pub async fn upload(&self, archive: &Path, meta: &ArchiveMeta) -> Result<(), UploadError> {
        match tokio::fs::metadata(archive).await {
            Ok(stat) if stat.len() > 0 => {}
            Ok(_) => {
                tracing::debug!(slot = meta.agent_id, "archive is empty, nothing to upload");
                return Ok(());
            }
            Err(_) => {
                tracing::debug!(slot = meta.agent_id, "no archive file, nothing to upload");
                return Ok(());
            }
        }

        let (Some(site), Some(token)) = (&self.site_url, &self.token) else {
            tracing::warn!(
                slot = meta.agent_id,
                "archive store not configured, skipping upload"
            );
            return Ok(());
        };

        // Step 1: ask the store for a one-shot upload URL.
        let response = self
            .client
            .post(format!("{}/api/vod/upload-url", site))
            .bearer_auth(token)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(UploadError::Request)?;
        if !response.status().is_success() {
            return Err(UploadError::Status {
                step: "upload-url",
                status: response.status().as_u16(),
            });
        }
        let UploadUrlResponse { upload_url } =
            response.json().await.map_err(UploadError::Request)?;

        // Step 2: push the archive bytes.
        let body = tokio::fs::read(archive).await.map_err(UploadError::Io)?;
        let file_size = body.len();
        let response = self
            .client
            .post(&upload_url)
            .header(reqwest::header::CONTENT_TYPE, ARCHIVE_MIME)
            .body(body)
            .send()
            .await
            .map_err(UploadError::Request)?;
        if !response.status().is_success() {
            return Err(UploadError::Status {
                step: "upload",
                status: response.status().as_u16(),
            });
        }
        let StorageResponse { storage_id } =
            response.json().await.map_err(UploadError::Request)?;

        // Step 3: register the recording's metadata.
        let recorded_at = DateTime::from_timestamp_millis(meta.recorded_at_ms as i64)
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();
        let response = self
            .client
            .post(format!("{}/api/vod/save", site))
            .bearer_auth(token)
            .json(&serde_json::json!({
                "storageId": storage_id.as_str(),
                "agentName": meta.agent_name,
                "agentId": meta.agent_id,
                "duration": meta.duration_secs,
                "recordedAt": recorded_at,
                "fileSize": file_size,
                "mimeType": ARCHIVE_MIME,
            }))
            .send()
            .await
            .map_err(UploadError::Request)?;
        if !response.status().is_success() {
            return Err(UploadError::Status {
                step: "save",
                status: response.status().as_u16(),
            });
        }

        tracing::info!(
            slot = meta.agent_id,
            storage_id = %storage_id,
            file_size,
            "archive uploaded"
        );
        Ok(())
    }
}
