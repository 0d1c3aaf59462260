//! Prometheus metrics for the chat broadcaster.
//!
//! Metrics live in a registry owned by [`ChatMetrics`] rather than the
//! process-wide default, so every server instance (and every test) gets its
//! own counters:
//! - Connection metrics (active, opened, rejected by reason)
//! - Message metrics (chat lines received, frames delivered and dropped)

use crate::error::{AppError, Result};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "chat";

pub struct ChatMetrics {
    registry: Registry,
    /// Connections currently in the room
    pub connections_active: IntGauge,
    /// Connections that completed the handshake
    pub connections_opened: IntCounter,
    /// Upgrades closed before joining, by reason
    pub connections_rejected: IntCounterVec,
    /// Non-empty chat lines received from clients
    pub messages_received: IntCounter,
    /// Frames queued to a connection
    pub frames_delivered: IntCounter,
    /// Frames dropped because a peer was slow or gone
    pub frames_dropped: IntCounter,
}

impl ChatMetrics {
    pub fn new() -> std::result::Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let connections_active = IntGauge::new(
            format!("{}_connections_active", METRIC_PREFIX),
            "Number of connections currently in the chat room",
        )?;
        let connections_opened = IntCounter::new(
            format!("{}_connections_opened_total", METRIC_PREFIX),
            "Total connections that joined the chat room",
        )?;
        let connections_rejected = IntCounterVec::new(
            Opts::new(
                format!("{}_connections_rejected_total", METRIC_PREFIX),
                "Total upgrades closed before joining",
            ),
            &["reason"],
        )?;
        let messages_received = IntCounter::new(
            format!("{}_messages_received_total", METRIC_PREFIX),
            "Total chat messages received from clients",
        )?;
        let frames_delivered = IntCounter::new(
            format!("{}_frames_delivered_total", METRIC_PREFIX),
            "Total frames queued for delivery to connections",
        )?;
        let frames_dropped = IntCounter::new(
            format!("{}_frames_dropped_total", METRIC_PREFIX),
            "Total frames dropped due to slow or closed connections",
        )?;

        registry.register(Box::new(connections_active.clone()))?;
        registry.register(Box::new(connections_opened.clone()))?;
        registry.register(Box::new(connections_rejected.clone()))?;
        registry.register(Box::new(messages_received.clone()))?;
        registry.register(Box::new(frames_delivered.clone()))?;
        registry.register(Box::new(frames_dropped.clone()))?;

        Ok(Self {
            registry,
            connections_active,
            connections_opened,
            connections_rejected,
            messages_received,
            frames_delivered,
            frames_dropped,
        })
    }

    pub fn record_rejected(&self, reason: &str) {
        self.connections_rejected.with_label_values(&[reason]).inc();
    }

    /// Encode all metrics to Prometheus text format
    pub fn encode(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        exposition_text(buffer)
    }
}

fn exposition_text(buffer: Vec<u8>) -> Result<String> {
    String::from_utf8(buffer)
        .map_err(|e| AppError::Internal(format!("metrics output is not UTF-8: {}", e)))
}
