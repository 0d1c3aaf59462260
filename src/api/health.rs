//! Health check and statistics endpoints.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::connection_manager::ConnectionStats;
use crate::hub::HubStatsSnapshot;
use crate::identity::UserIdentity;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub connections: usize,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub connections: ConnectionStats,
    /// Current room members in join order
    pub members: Vec<MemberInfo>,
    pub hub: HubStatsSnapshot,
    pub last_sequence_id: u64,
}

#[derive(Debug, Serialize)]
pub struct MemberInfo {
    #[serde(flatten)]
    pub user: UserIdentity,
    pub connected_at: DateTime<Utc>,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        connections: state.registry.len(),
    })
}

/// GET /stats
pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let mut members = Vec::with_capacity(state.registry.len());
    state.registry.for_each(|conn| {
        members.push(MemberInfo {
            user: conn.identity.clone(),
            connected_at: conn.connected_at,
        })
    });

    Json(StatsResponse {
        connections: state.registry.stats(),
        members,
        hub: state.hub.stats().snapshot(),
        last_sequence_id: state.hub.last_sequence_id().await,
    })
}
