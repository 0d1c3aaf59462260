//! Operational HTTP endpoints served next to the chat socket.

mod health;
mod metrics;
mod routes;

pub use health::{health, stats, HealthResponse, MemberInfo, StatsResponse};
pub use metrics::prometheus_metrics;
pub use routes::api_routes;
