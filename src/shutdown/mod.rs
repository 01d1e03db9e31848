//! Graceful shutdown handling for the relay.
//!
//! 1. Tells every room the server is going away
//! 2. Evicts every member so each session closes its transport and leaves
//! 3. Waits, bounded, for the registry to empty

use std::sync::Arc;
use std::time::Duration;

use crate::broadcast::BroadcastEngine;
use crate::config::ShutdownSettings;
use crate::room::RoomRegistry;
use crate::session::Relay;
use crate::websocket::ServerMessage;

/// Poll interval while waiting for sessions to deregister
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Configuration for graceful shutdown behavior
#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    /// Time to wait for sessions to deregister (default: 10 seconds)
    pub drain_timeout: Duration,
    /// System message sent to every room
    pub reason: String,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        ShutdownSettings::default().into()
    }
}

impl From<ShutdownSettings> for ShutdownConfig {
    fn from(settings: ShutdownSettings) -> Self {
        Self {
            drain_timeout: Duration::from_secs(settings.drain_timeout),
            reason: settings.reason,
        }
    }
}

/// Coordinates closing every open session
pub struct GracefulShutdown {
    registry: Arc<RoomRegistry>,
    engine: Arc<BroadcastEngine>,
    config: ShutdownConfig,
}

impl GracefulShutdown {
    pub fn new(relay: &Relay, config: ShutdownConfig) -> Self {
        Self {
            registry: relay.registry.clone(),
            engine: relay.engine.clone(),
            config,
        }
    }

    /// Execute graceful shutdown sequence
    #[tracing::instrument(
        name = "graceful_shutdown",
        skip(self),
        fields(total_members = self.registry.stats().total_members)
    )]
    pub async fn execute(&self) -> ShutdownResult {
        let start = std::time::Instant::now();
        let mut result = ShutdownResult::default();

        tracing::info!(reason = %self.config.reason, "Starting graceful shutdown - Phase 1: Notifying rooms");
        result.rooms_notified = self.notify_rooms();

        tracing::info!("Phase 2: Evicting members");
        result.members_evicted = self.registry.evict_all();

        tracing::info!("Phase 3: Waiting for sessions to close");
        result.members_remaining = self.wait_for_sessions_to_close().await;

        result.duration = start.elapsed();
        result.success = result.members_remaining == 0;

        tracing::info!(
            rooms_notified = result.rooms_notified,
            members_evicted = result.members_evicted,
            members_remaining = result.members_remaining,
            duration_ms = result.duration.as_millis(),
            "Graceful shutdown completed"
        );

        result
    }

    fn notify_rooms(&self) -> usize {
        let message = ServerMessage::system(self.config.reason.clone());
        let rooms = self.registry.room_ids();
        for room_id in &rooms {
            self.engine.broadcast(room_id, &message, None);
        }
        rooms.len()
    }

    /// Returns the number of members still registered after the wait
    async fn wait_for_sessions_to_close(&self) -> usize {
        let registry = self.registry.clone();
        let wait = async move {
            while !registry.is_empty() {
                tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
            }
        };

        if tokio::time::timeout(self.config.drain_timeout, wait)
            .await
            .is_err()
        {
            tracing::warn!(
                remaining_members = self.registry.stats().total_members,
                "Some sessions did not close before the drain timeout"
            );
        }

        self.registry.stats().total_members
    }
}

/// Result of a graceful shutdown operation
#[derive(Debug, Default)]
pub struct ShutdownResult {
    /// Every session deregistered in time
    pub success: bool,
    pub rooms_notified: usize,
    pub members_evicted: usize,
    /// Members still registered when the drain timeout expired
    pub members_remaining: usize,
    pub duration: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_shutdown_no_sessions() {
        let relay = Relay::default();
        let shutdown = GracefulShutdown::new(&relay, ShutdownConfig::default());

        let result = shutdown.execute().await;

        assert!(result.success);
        assert_eq!(result.rooms_notified, 0);
        assert_eq!(result.members_evicted, 0);
    }

    #[tokio::test]
    async fn test_shutdown_times_out_when_members_linger() {
        let relay = Relay::default();
        // Registered directly, so no session task will ever leave
        let (tx, mut rx) = mpsc::channel(8);
        let member = relay.registry.join("r1", Uuid::new_v4(), "A", tx).member;

        let config = ShutdownConfig {
            drain_timeout: Duration::from_millis(100),
            reason: "bye".to_string(),
        };
        let result = GracefulShutdown::new(&relay, config).execute().await;

        assert!(!result.success);
        assert_eq!(result.rooms_notified, 1);
        assert_eq!(result.members_evicted, 1);
        assert_eq!(result.members_remaining, 1);
        assert!(member.is_evicted());
        assert_eq!(rx.try_recv().unwrap(), ServerMessage::system("bye"));
    }

    #[test]
    fn test_shutdown_config_defaults() {
        let config = ShutdownConfig::default();
        assert_eq!(config.drain_timeout, Duration::from_secs(10));
        assert_eq!(config.reason, "Server is shutting down");
    }
}
