// Infrastructure
pub mod config;
pub mod error;
pub mod metrics;
pub mod telemetry;

// Relay core
pub mod broadcast;
pub mod connection;
pub mod presence;
pub mod room;
pub mod session;

// Application layer
pub mod api;
pub mod server;
pub mod websocket;

// Supporting modules
pub mod shutdown;
