//! API Server
//!
//! Runs the REST API until a shutdown signal arrives.

use crate::domain::ports::ClusterAdminClientRef;
use crate::error::{Error, Result};
use crate::metrics::OperationMetrics;
use std::net::SocketAddr;
use tokio::sync::broadcast;
use tracing::info;

use super::rest::RestRouter;

// =============================================================================
// Server Configuration
// =============================================================================

/// Configuration for the API server
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// REST API bind address
    pub rest_addr: SocketAddr,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            rest_addr: SocketAddr::from(([0, 0, 0, 0], 8090)),
        }
    }
}

// =============================================================================
// API Server
// =============================================================================

/// REST API server for backup and restore requests
pub struct ApiServer {
    config: ApiServerConfig,
    client: ClusterAdminClientRef,
    metrics: OperationMetrics,
    shutdown_tx: broadcast::Sender<()>,
}

impl ApiServer {
    pub fn new(
        config: ApiServerConfig,
        client: ClusterAdminClientRef,
        metrics: OperationMetrics,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            client,
            metrics,
            shutdown_tx,
        }
    }

    /// Bind the configured address and serve until [`ApiServer::shutdown`]
    pub async fn run(&self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(self.config.rest_addr)
            .await
            .map_err(|e| Error::Internal(format!("Failed to bind REST server: {}", e)))?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener
    pub async fn serve(&self, listener: tokio::net::TcpListener) -> Result<()> {
        let app = RestRouter::new(self.client.clone(), self.metrics.clone()).build();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        info!(
            "REST API listening on {} using the {} client",
            listener.local_addr()?,
            self.client.client_name()
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("REST server shutting down");
            })
            .await
            .map_err(|e| Error::Internal(format!("REST server error: {}", e)))?;

        Ok(())
    }

    /// Trigger graceful shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}
