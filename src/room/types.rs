//! Member handle and room entry types

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, Notify};

use crate::connection::ConnectionId;
use crate::error::SendError;
use crate::websocket::ServerMessage;

/// One participant bound to a room.
///
/// The registry keeps an `Arc<Member>` so broadcasts can enqueue frames into
/// the member's outbox; the connection itself stays with its session.
pub struct Member {
    pub connection_id: ConnectionId,
    pub display_name: String,
    pub joined_at: DateTime<Utc>,
    outbox: mpsc::Sender<ServerMessage>,
    evicted: AtomicBool,
    eviction: Notify,
}

impl Member {
    pub fn new(
        connection_id: ConnectionId,
        display_name: impl Into<String>,
        outbox: mpsc::Sender<ServerMessage>,
    ) -> Self {
        Self {
            connection_id,
            display_name: display_name.into(),
            joined_at: Utc::now(),
            outbox,
            evicted: AtomicBool::new(false),
            eviction: Notify::new(),
        }
    }

    /// Enqueue a record without waiting. A full or closed outbox is a send
    /// failure so one slow member never stalls the caller.
    pub fn send(&self, message: ServerMessage) -> Result<(), SendError> {
        self.outbox.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::new("outbox full"),
            mpsc::error::TrySendError::Closed(_) => SendError::new("outbox closed"),
        })
    }

    /// Ask the owning session to close. Idempotent.
    pub fn evict(&self) {
        if !self.evicted.swap(true, Ordering::AcqRel) {
            self.eviction.notify_one();
        }
    }

    pub fn is_evicted(&self) -> bool {
        self.evicted.load(Ordering::Acquire)
    }

    /// Resolves once [`evict`](Self::evict) has been called.
    pub async fn evicted(&self) {
        if self.is_evicted() {
            return;
        }
        self.eviction.notified().await;
    }
}

impl std::fmt::Debug for Member {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Member")
            .field("connection_id", &self.connection_id)
            .field("display_name", &self.display_name)
            .field("joined_at", &self.joined_at)
            .field("evicted", &self.is_evicted())
            .finish()
    }
}

/// Registry entry for one room; members are kept in join order
pub(crate) struct Room {
    pub created_at: DateTime<Utc>,
    pub members: Vec<std::sync::Arc<Member>>,
}

impl Room {
    pub fn new() -> Self {
        Self {
            created_at: Utc::now(),
            members: Vec::new(),
        }
    }

    pub fn remove(&mut self, connection_id: ConnectionId) -> Option<std::sync::Arc<Member>> {
        let idx = self
            .members
            .iter()
            .position(|m| m.connection_id == connection_id)?;
        Some(self.members.remove(idx))
    }
}

/// Result of [`RoomRegistry::join`](super::RoomRegistry::join)
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub member: std::sync::Arc<Member>,
    /// This join created the room
    pub room_created: bool,
    /// Display names already present, in join order
    pub other_members: Vec<String>,
}

/// Result of [`RoomRegistry::leave`](super::RoomRegistry::leave)
#[derive(Debug, Clone)]
pub struct LeaveOutcome {
    /// The removed member, `None` when the call was a no-op
    pub removed: Option<std::sync::Arc<Member>>,
    /// Members left in the room after removal
    pub remaining: usize,
    /// Removal emptied the room and deleted its entry
    pub room_deleted: bool,
}

impl LeaveOutcome {
    pub(crate) fn noop() -> Self {
        Self {
            removed: None,
            remaining: 0,
            room_deleted: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_send_reports_full_outbox() {
        let (tx, _rx) = mpsc::channel(1);
        let member = Member::new(Uuid::new_v4(), "A", tx);

        assert!(member.send(ServerMessage::system("one")).is_ok());
        let err = member.send(ServerMessage::system("two")).unwrap_err();
        assert_eq!(err.reason, "outbox full");
    }

    #[test]
    fn test_send_reports_closed_outbox() {
        let (tx, rx) = mpsc::channel(1);
        let member = Member::new(Uuid::new_v4(), "A", tx);
        drop(rx);

        let err = member.send(ServerMessage::system("x")).unwrap_err();
        assert_eq!(err.reason, "outbox closed");
    }

    #[tokio::test]
    async fn test_evict_is_idempotent_and_observable() {
        let (tx, _rx) = mpsc::channel(1);
        let member = Member::new(Uuid::new_v4(), "A", tx);
        assert!(!member.is_evicted());

        member.evict();
        member.evict();
        assert!(member.is_evicted());

        // Resolves immediately once evicted
        member.evicted().await;
    }
}
