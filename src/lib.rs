// Shared components
pub mod config;
pub mod error;
pub mod metrics;
pub mod telemetry;

// Domain
pub mod connection_manager;
pub mod hooks;
pub mod hub;
pub mod identity;

// Application layer
pub mod api;
pub mod server;
pub mod websocket;

pub mod shutdown;
