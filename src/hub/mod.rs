//! Fanout of chat events to every connection in the room.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::connection_manager::{ConnectionHandle, ConnectionRegistry, SendError};
use crate::error::CloseReason;
use crate::metrics::ChatMetrics;
use crate::websocket::{ChatEvent, EncodedFrame, EnvelopeCodec};

/// Result of pushing one event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    /// Sequence id stamped on the frame
    pub id: u64,
    /// Connections the frame was queued to
    pub delivered: usize,
    /// Connections that were too slow or already gone
    pub dropped: usize,
}

/// Statistics for the hub
#[derive(Debug, Default)]
pub struct HubStats {
    pub events_sent: AtomicU64,
    pub frames_delivered: AtomicU64,
    pub frames_dropped: AtomicU64,
}

impl HubStats {
    pub fn snapshot(&self) -> HubStatsSnapshot {
        HubStatsSnapshot {
            events_sent: self.events_sent.load(Ordering::Relaxed),
            frames_delivered: self.frames_delivered.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of hub statistics
#[derive(Debug, Clone, Serialize)]
pub struct HubStatsSnapshot {
    pub events_sent: u64,
    pub frames_delivered: u64,
    pub frames_dropped: u64,
}

/// Serializes chat events and pushes them to registered connections.
///
/// Stamping a sequence id and fanning the frame out happen under one lock,
/// so every connection receives frames in increasing id order. Pushes never
/// wait on a peer: a full or closed outbound queue drops the frame. Dropping
/// does not deregister; that is left to the connection's own teardown.
pub struct BroadcastHub {
    registry: Arc<ConnectionRegistry>,
    codec: Mutex<EnvelopeCodec>,
    metrics: Arc<ChatMetrics>,
    stats: HubStats,
}

impl BroadcastHub {
    pub fn new(registry: Arc<ConnectionRegistry>, metrics: Arc<ChatMetrics>) -> Self {
        Self {
            registry,
            codec: Mutex::new(EnvelopeCodec::new()),
            metrics,
            stats: HubStats::default(),
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn stats(&self) -> &HubStats {
        &self.stats
    }

    /// Sequence id of the most recent event
    pub async fn last_sequence_id(&self) -> u64 {
        self.codec.lock().await.last_id()
    }

    /// Push an event to every registered connection
    pub async fn broadcast(&self, event: ChatEvent) -> Result<DeliveryReport, serde_json::Error> {
        let mut codec = self.codec.lock().await;
        let frame = codec.encode(&event)?;

        let mut delivered = 0;
        let mut dropped = 0;
        self.registry.for_each(|conn| {
            if self.push(conn, frame.clone()) {
                delivered += 1;
            } else {
                dropped += 1;
            }
        });
        drop(codec);

        let report = self.record(frame.id, delivered, dropped);

        tracing::debug!(
            sequence_id = report.id,
            event_type = ?event.kind(),
            delivered = report.delivered,
            dropped = report.dropped,
            "Broadcast chat event"
        );

        Ok(report)
    }

    /// Send the current member list to a single connection
    pub async fn send_roster(
        &self,
        target: &ConnectionHandle,
    ) -> Result<DeliveryReport, serde_json::Error> {
        let mut codec = self.codec.lock().await;
        let members = self.registry.snapshot();
        let member_count = members.len();
        let frame = codec.encode(&ChatEvent::roster(target.identity.clone(), members))?;
        let sent = self.push(target, frame.clone());
        drop(codec);

        let report = if sent {
            self.record(frame.id, 1, 0)
        } else {
            self.record(frame.id, 0, 1)
        };

        tracing::debug!(
            connection_id = %target.id,
            sequence_id = report.id,
            members = member_count,
            "Sent roster"
        );

        Ok(report)
    }

    /// Ask every registered connection to close; returns how many accepted
    pub fn close_all(&self, reason: CloseReason) -> usize {
        let mut closed = 0;
        self.registry.for_each(|conn| match conn.close(reason) {
            Ok(()) => closed += 1,
            Err(e) => {
                tracing::debug!(connection_id = %conn.id, error = %e, "Failed to request close");
            }
        });

        tracing::info!(
            connections = closed,
            code = reason.code,
            "Requested close of all connections"
        );
        closed
    }

    fn push(&self, conn: &ConnectionHandle, frame: EncodedFrame) -> bool {
        let sequence_id = frame.id;
        match conn.try_send(frame) {
            Ok(()) => true,
            Err(SendError::Full) => {
                tracing::warn!(
                    connection_id = %conn.id,
                    user_id = %conn.identity.id,
                    sequence_id = sequence_id,
                    "Outbound queue full, dropping frame"
                );
                false
            }
            Err(SendError::Closed) => {
                tracing::debug!(
                    connection_id = %conn.id,
                    sequence_id = sequence_id,
                    "Connection already closed, dropping frame"
                );
                false
            }
        }
    }

    fn record(&self, id: u64, delivered: usize, dropped: usize) -> DeliveryReport {
        self.stats.events_sent.fetch_add(1, Ordering::Relaxed);
        self.stats
            .frames_delivered
            .fetch_add(delivered as u64, Ordering::Relaxed);
        self.stats
            .frames_dropped
            .fetch_add(dropped as u64, Ordering::Relaxed);

        self.metrics.frames_delivered.inc_by(delivered as u64);
        self.metrics.frames_dropped.inc_by(dropped as u64);

        DeliveryReport {
            id,
            delivered,
            dropped,
        }
    }
}
