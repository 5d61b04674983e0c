//! Hub configuration

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::pipeline::PipelineConfig;

/// Default listen port
pub const DEFAULT_PORT: u16 = 3001;

/// Maximum inbound WebSocket payload (sized for video chunks)
pub const MAX_FRAME_BYTES: usize = 5 * 1024 * 1024;

/// Default bound of each peer's outbound frame queue; a peer that falls this
/// far behind is considered dead and disconnected
pub const OUTBOUND_QUEUE_FRAMES: usize = 64;

/// Hub configuration options
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Root directory for per-slot live playlists and segments
    pub live_root: PathBuf,

    /// Root directory for local archives awaiting upload
    pub recording_root: PathBuf,

    /// Path of the external transcoder binary
    pub transcoder_path: PathBuf,

    /// Base URL of the external archive store
    pub site_url: Option<String>,

    /// Bearer token for the archive store
    pub api_token: Option<String>,

    /// Bound of each peer's outbound frame queue
    pub outbound_queue: usize,

    /// Maximum inbound WebSocket payload in bytes
    pub max_frame_bytes: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            live_root: PathBuf::from("./live"),
            recording_root: PathBuf::from("./recordings"),
            transcoder_path: PathBuf::from("ffmpeg"),
            site_url: None,
            api_token: None,
            outbound_queue: OUTBOUND_QUEUE_FRAMES,
            max_frame_bytes: MAX_FRAME_BYTES,
        }
    }
}

impl HubConfig {
    /// Build a config from the process environment
    ///
    /// Recognized variables: `HOST`, `PORT`, `LIVE_ROOT`, `RECORDING_ROOT`,
    /// `FFMPEG_PATH`, `VOD_SITE_URL`, `VOD_API_TOKEN`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self {
            bind_addr: parse_bind(std::env::var("HOST").ok(), std::env::var("PORT").ok())?,
            ..Default::default()
        };

        if let Ok(root) = std::env::var("LIVE_ROOT") {
            config.live_root = PathBuf::from(root);
        }
        if let Ok(root) = std::env::var("RECORDING_ROOT") {
            config.recording_root = PathBuf::from(root);
        }
        if let Ok(path) = std::env::var("FFMPEG_PATH") {
            config.transcoder_path = PathBuf::from(path);
        }
        if let Ok(url) = std::env::var("VOD_SITE_URL") {
            config.site_url = Some(url.trim_end_matches('/').to_string());
        }
        if let Ok(token) = std::env::var("VOD_API_TOKEN") {
            config.api_token = Some(token);
        }

        Ok(config)
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the live playlist root
    pub fn live_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.live_root = root.into();
        self
    }

    /// Set the archive root
    pub fn recording_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.recording_root = root.into();
        self
    }

    /// Set the transcoder binary path
    pub fn transcoder_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.transcoder_path = path.into();
        self
    }

    /// Configure the external archive store
    pub fn archive_store(mut self, site_url: impl Into<String>, token: impl Into<String>) -> Self {
        self.site_url = Some(site_url.into());
        self.api_token = Some(token.into());
        self
    }

    /// Set the per-peer outbound queue bound
    pub fn outbound_queue(mut self, frames: usize) -> Self {
        self.outbound_queue = frames;
        self
    }

    /// Derive the pipeline configuration
    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            live_root: self.live_root.clone(),
            recording_root: self.recording_root.clone(),
            transcoder_path: self.transcoder_path.clone(),
            site_url: self.site_url.clone(),
            api_token: self.api_token.clone(),
        }
    }
}

/// Resolve the bind address from optional `HOST`/`PORT` values
fn parse_bind(host: Option<String>, port: Option<String>) -> Result<SocketAddr> {
    let ip: IpAddr = match host {
        Some(raw) => raw
            .parse()
            .map_err(|_| Error::Config(format!("HOST is not a valid IP address: {}", raw)))?,
        None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
    };

    let port: u16 = match port {
        Some(raw) => raw
            .parse()
            .map_err(|_| Error::Config(format!("PORT is not a valid port: {}", raw)))?,
        None => DEFAULT_PORT,
    };

    Ok(SocketAddr::new(ip, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HubConfig::default();

        assert_eq!(config.bind_addr.port(), DEFAULT_PORT);
        assert_eq!(config.max_frame_bytes, MAX_FRAME_BYTES);
        assert_eq!(config.outbound_queue, OUTBOUND_QUEUE_FRAMES);
        assert!(config.site_url.is_none());
        assert!(config.api_token.is_none());
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        let config = HubConfig::default()
            .bind(addr)
            .live_root("/srv/live")
            .recording_root("/srv/recordings")
            .transcoder_path("/usr/bin/ffmpeg")
            .archive_store("https://vod.example.com", "secret")
            .outbound_queue(16);

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.live_root, PathBuf::from("/srv/live"));
        assert_eq!(config.recording_root, PathBuf::from("/srv/recordings"));
        assert_eq!(config.site_url.as_deref(), Some("https://vod.example.com"));
        assert_eq!(config.api_token.as_deref(), Some("secret"));
        assert_eq!(config.outbound_queue, 16);
    }

    #[test]
    fn test_parse_bind_defaults() {
        let addr = parse_bind(None, None).unwrap();
        assert_eq!(addr.port(), DEFAULT_PORT);
        assert!(addr.ip().is_unspecified());
    }

    #[test]
    fn test_parse_bind_explicit() {
        let addr = parse_bind(Some("127.0.0.1".into()), Some("8080".into())).unwrap();
        assert_eq!(addr, "127.0.0.1:8080".parse().unwrap());
    }

    #[test]
    fn test_parse_bind_rejects_garbage() {
        assert!(parse_bind(Some("not-an-ip".into()), None).is_err());
        assert!(parse_bind(None, Some("70000".into())).is_err());
    }

    #[test]
    fn test_pipeline_config_derivation() {
        let config = HubConfig::default().live_root("/a").recording_root("/b");
        let pipeline = config.pipeline();

        assert_eq!(pipeline.live_root, PathBuf::from("/a"));
        assert_eq!(pipeline.recording_root, PathBuf::from("/b"));
        assert_eq!(pipeline.transcoder_path, PathBuf::from("ffmpeg"));
    }
}
