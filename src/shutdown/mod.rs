//! Graceful shutdown handling for the chat broadcaster.
//!
//! On shutdown every connection is asked to close with code 1001, then we
//! wait (bounded) for their handlers to deregister.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::signal;

use crate::error::CloseReason;
use crate::hub::BroadcastHub;

/// Poll interval while waiting for connections to drain
const DRAIN_POLL: Duration = Duration::from_millis(50);

/// Outcome of a graceful shutdown
#[derive(Debug, Clone, Default)]
pub struct ShutdownResult {
    pub clients_notified: usize,
    pub connections_remaining: usize,
    pub duration: Duration,
}

/// Closes every chat connection before the server exits
pub struct GracefulShutdown {
    hub: Arc<BroadcastHub>,
    drain_timeout: Duration,
}

impl GracefulShutdown {
    pub fn new(hub: Arc<BroadcastHub>) -> Self {
        Self::with_timeout(hub, Duration::from_secs(5))
    }

    pub fn with_timeout(hub: Arc<BroadcastHub>, drain_timeout: Duration) -> Self {
        Self { hub, drain_timeout }
    }

    #[tracing::instrument(
        name = "graceful_shutdown",
        skip(self),
        fields(total_connections = self.hub.registry().len())
    )]
    pub async fn execute(&self) -> ShutdownResult {
        let start = Instant::now();

        tracing::info!("Closing chat connections");
        let clients_notified = self.hub.close_all(CloseReason::GOING_AWAY);

        let registry = self.hub.registry();
        let deadline = start + self.drain_timeout;
        while !registry.is_empty() && Instant::now() < deadline {
            tokio::time::sleep(DRAIN_POLL).await;
        }

        let result = ShutdownResult {
            clients_notified,
            connections_remaining: registry.len(),
            duration: start.elapsed(),
        };

        if result.connections_remaining > 0 {
            tracing::warn!(
                remaining = result.connections_remaining,
                "Connections still open after drain timeout"
            );
        }
        tracing::info!(
            clients_notified = result.clients_notified,
            duration_ms = result.duration.as_millis() as u64,
            "Graceful shutdown completed"
        );

        result
    }
}

/// Resolves on Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    use crate::connection_manager::{ConnectionHandle, ConnectionRegistry};
    use crate::identity::UserIdentity;
    use crate::metrics::ChatMetrics;
    use crate::websocket::OutboundFrame;

    #[tokio::test]
    async fn test_empty_room_shuts_down_immediately() {
        let registry = Arc::new(ConnectionRegistry::new());
        let hub = Arc::new(BroadcastHub::new(registry, Arc::new(ChatMetrics::new().unwrap())));

        let result = GracefulShutdown::new(hub).execute().await;
        assert_eq!(result.clients_notified, 0);
        assert_eq!(result.connections_remaining, 0);
    }

    #[tokio::test]
    async fn test_waits_for_connections_to_deregister() {
        let registry = Arc::new(ConnectionRegistry::new());
        let hub = Arc::new(BroadcastHub::new(
            registry.clone(),
            Arc::new(ChatMetrics::new().unwrap()),
        ));

        let (tx, mut rx) = mpsc::channel(4);
        let handle = Arc::new(ConnectionHandle::new(UserIdentity::new(1u64, "Alice", 1), tx));
        registry.register(handle.clone()).unwrap();

        // Stand-in for a connection handler reacting to the close request
        let handler_registry = registry.clone();
        let handler = tokio::spawn(async move {
            if let Some(OutboundFrame::Close { code, .. }) = rx.recv().await {
                assert_eq!(code, 1001);
                handler_registry.deregister(handle.id);
            }
        });

        let result = GracefulShutdown::with_timeout(hub, Duration::from_secs(2))
            .execute()
            .await;
        handler.await.unwrap();

        assert_eq!(result.clients_notified, 1);
        assert_eq!(result.connections_remaining, 0);
    }
}
