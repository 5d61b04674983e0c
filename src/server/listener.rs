//! Hub server assembly and run loop
//!
//! Wires the hub, pipeline manager and HTTP router together, binds the
//! listener and runs until shut down.

use std::future::IntoFuture;
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::error::Result;
use crate::pipeline::{PipelineEvent, PipelineManager};

use super::config::HubConfig;
use super::http::router;
use super::hub::Hub;

/// The coordination hub server
pub struct HubServer {
    config: HubConfig,
}

impl HubServer {
    /// Create a server with the given configuration
    pub fn new(config: HubConfig) -> Self {
        Self { config }
    }

    /// Bind address from the configuration
    pub fn bind_addr(&self) -> std::net::SocketAddr {
        self.config.bind_addr
    }

    /// Run the server until the process is killed
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server until `shutdown` resolves
    ///
    /// On shutdown: stop accepting connections, close every peer, and run
    /// the standard stop procedure for every active pipeline. The
    /// per-pipeline kill timeout bounds the total shutdown time.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let (pipelines, mut pipeline_events) = PipelineManager::new(self.config.pipeline());
        let hub = Arc::new(Hub::new(self.config.clone(), pipelines));

        // Every completed pipeline stop is announced to the fireteam.
        let status_hub = Arc::clone(&hub);
        let status_task = tokio::spawn(async move {
            while let Some(PipelineEvent::Stopped { slot }) = pipeline_events.recv().await {
                tracing::debug!(slot, "pipeline stopped");
                status_hub.broadcast_stream_status().await;
            }
        });

        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "hub listening");

        let serve = axum::serve(listener, router(Arc::clone(&hub))).into_future();

        let result = tokio::select! {
            result = serve => result.map_err(Into::into),
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
        };

        hub.close_all_peers().await;
        hub.pipelines().stop_all().await;
        status_task.abort();

        result
    }
}
