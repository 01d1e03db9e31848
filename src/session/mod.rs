//! Per-connection session lifecycle

mod controller;

pub use controller::{CloseReason, SessionController, SessionState, SessionSummary};

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::broadcast::BroadcastEngine;
use crate::config::SessionConfig;
use crate::connection::Connection;
use crate::presence::PresenceNotifier;
use crate::room::RoomRegistry;

/// Shared collaborators every session needs
#[derive(Clone)]
pub struct Relay {
    pub registry: Arc<RoomRegistry>,
    pub engine: Arc<BroadcastEngine>,
    pub presence: PresenceNotifier,
    pub config: SessionConfig,
}

impl Relay {
    pub fn new(config: SessionConfig) -> Self {
        let registry = Arc::new(RoomRegistry::new());
        let engine = Arc::new(BroadcastEngine::new(registry.clone()));
        let presence = PresenceNotifier::new(engine.clone());

        Self {
            registry,
            engine,
            presence,
            config,
        }
    }

    /// Build a controller for an accepted connection
    pub fn session<C: Connection>(
        &self,
        connection: C,
        room_id: impl Into<String>,
        display_name: impl Into<String>,
    ) -> SessionController<C> {
        SessionController::new(self.clone(), connection, room_id, display_name)
    }

    /// Run a session on its own task
    pub fn spawn<C: Connection + 'static>(
        &self,
        connection: C,
        room_id: impl Into<String>,
        display_name: impl Into<String>,
    ) -> JoinHandle<SessionSummary> {
        let session = self.session(connection, room_id, display_name);
        tokio::spawn(session.run())
    }
}

impl Default for Relay {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}
