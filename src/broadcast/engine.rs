use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::connection::ConnectionId;
use crate::metrics::{MessageMetrics, SessionMetrics};
use crate::room::{Member, RoomRegistry};
use crate::websocket::ServerMessage;

/// Result of a fan-out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    /// Members the record was enqueued for
    pub delivered: usize,
    /// Members whose outbox rejected the record (now evicted)
    pub failed: usize,
}

/// Statistics for the broadcast engine
#[derive(Debug, Default)]
pub struct EngineStats {
    pub broadcasts: AtomicU64,
    pub direct_sends: AtomicU64,
    pub total_delivered: AtomicU64,
    pub total_failed: AtomicU64,
}

impl EngineStats {
    pub fn snapshot(&self) -> EngineStatsSnapshot {
        EngineStatsSnapshot {
            broadcasts: self.broadcasts.load(Ordering::Relaxed),
            direct_sends: self.direct_sends.load(Ordering::Relaxed),
            total_delivered: self.total_delivered.load(Ordering::Relaxed),
            total_failed: self.total_failed.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of engine statistics
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatsSnapshot {
    pub broadcasts: u64,
    pub direct_sends: u64,
    pub total_delivered: u64,
    pub total_failed: u64,
}

/// Fans records out to room members.
///
/// Delivery enqueues into each member's bounded outbox and never waits, so a
/// slow or dead member cannot hold up the others. A rejected enqueue evicts
/// that member; its own session then closes and deregisters. Because each
/// outbox is FIFO and a broadcast finishes enqueueing before it returns,
/// consecutive broadcasts from one sender reach every recipient in order.
pub struct BroadcastEngine {
    registry: Arc<RoomRegistry>,
    stats: EngineStats,
}

impl BroadcastEngine {
    pub fn new(registry: Arc<RoomRegistry>) -> Self {
        Self {
            registry,
            stats: EngineStats::default(),
        }
    }

    pub fn stats(&self) -> EngineStatsSnapshot {
        self.stats.snapshot()
    }

    /// Deliver `message` to every member of `room_id` except `exclude`
    #[tracing::instrument(
        name = "broadcast",
        skip(self, message),
        fields(kind = message.kind())
    )]
    pub fn broadcast(
        &self,
        room_id: &str,
        message: &ServerMessage,
        exclude: Option<ConnectionId>,
    ) -> DeliveryReport {
        let members = self.registry.members_of(room_id);
        let recipients = members
            .iter()
            .filter(|m| Some(m.connection_id) != exclude);

        self.fan_out(room_id, message, recipients)
    }

    /// Deliver `message` only to members who joined `room_id` before
    /// `newcomer`. Anyone who joined later already saw the newcomer in their
    /// own member listing.
    #[tracing::instrument(
        name = "broadcast_to_earlier",
        skip(self, message),
        fields(kind = message.kind())
    )]
    pub fn broadcast_to_earlier(
        &self,
        room_id: &str,
        message: &ServerMessage,
        newcomer: ConnectionId,
    ) -> DeliveryReport {
        let members = self.registry.members_of(room_id);
        let recipients = members
            .iter()
            .take_while(|m| m.connection_id != newcomer);

        self.fan_out(room_id, message, recipients)
    }

    fn fan_out<'a>(
        &self,
        room_id: &str,
        message: &ServerMessage,
        recipients: impl Iterator<Item = &'a Arc<Member>>,
    ) -> DeliveryReport {
        let mut delivered = 0;
        let mut failed = 0;
        for member in recipients {
            if self.deliver(member, message.clone()) {
                delivered += 1;
            } else {
                failed += 1;
            }
        }

        self.stats.broadcasts.fetch_add(1, Ordering::Relaxed);
        self.stats
            .total_delivered
            .fetch_add(delivered as u64, Ordering::Relaxed);
        self.stats
            .total_failed
            .fetch_add(failed as u64, Ordering::Relaxed);

        MessageMetrics::record_broadcast(message.kind());
        MessageMetrics::record_delivered(delivered as u64);
        MessageMetrics::record_failed(failed as u64);

        tracing::debug!(
            room_id = %room_id,
            delivered = delivered,
            failed = failed,
            "Broadcast to room"
        );

        DeliveryReport { delivered, failed }
    }

    /// Private send to one member; not visible to anyone else
    pub fn send_direct(&self, member: &Member, message: ServerMessage) -> bool {
        let ok = self.deliver(member, message);

        self.stats.direct_sends.fetch_add(1, Ordering::Relaxed);
        if ok {
            self.stats.total_delivered.fetch_add(1, Ordering::Relaxed);
            MessageMetrics::record_delivered(1);
        } else {
            self.stats.total_failed.fetch_add(1, Ordering::Relaxed);
            MessageMetrics::record_failed(1);
        }
        MessageMetrics::record_direct();

        ok
    }

    fn deliver(&self, member: &Member, message: ServerMessage) -> bool {
        match member.send(message) {
            Ok(()) => true,
            Err(e) => {
                if !member.is_evicted() {
                    tracing::warn!(
                        connection_id = %member.connection_id,
                        display_name = %member.display_name,
                        error = %e,
                        "Delivery failed, evicting member"
                    );
                    SessionMetrics::record_evicted();
                }
                member.evict();
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    struct Joined {
        id: ConnectionId,
        rx: mpsc::Receiver<ServerMessage>,
        member: Arc<Member>,
    }

    fn join(registry: &RoomRegistry, room: &str, name: &str, capacity: usize) -> Joined {
        let (tx, rx) = mpsc::channel(capacity);
        let id = Uuid::new_v4();
        let member = registry.join(room, id, name, tx).member;
        Joined { id, rx, member }
    }

    #[test]
    fn test_broadcast_excludes_sender() {
        let registry = Arc::new(RoomRegistry::new());
        let engine = BroadcastEngine::new(registry.clone());
        let mut a = join(&registry, "r1", "A", 8);
        let mut b = join(&registry, "r1", "B", 8);
        let mut c = join(&registry, "r1", "C", 8);

        let msg = ServerMessage::chat("A", "hi");
        let report = engine.broadcast("r1", &msg, Some(a.id));

        assert_eq!(report, DeliveryReport { delivered: 2, failed: 0 });
        assert!(a.rx.try_recv().is_err());
        assert_eq!(b.rx.try_recv().unwrap(), msg);
        assert_eq!(c.rx.try_recv().unwrap(), msg);
    }

    #[test]
    fn test_broadcast_without_exclude_reaches_everyone() {
        let registry = Arc::new(RoomRegistry::new());
        let engine = BroadcastEngine::new(registry.clone());
        let mut a = join(&registry, "r1", "A", 8);
        let mut b = join(&registry, "r1", "B", 8);

        let report = engine.broadcast("r1", &ServerMessage::system("notice"), None);
        assert_eq!(report.delivered, 2);
        assert!(a.rx.try_recv().is_ok());
        assert!(b.rx.try_recv().is_ok());
    }

    #[test]
    fn test_broadcast_to_absent_room_is_empty() {
        let registry = Arc::new(RoomRegistry::new());
        let engine = BroadcastEngine::new(registry);

        let report = engine.broadcast("nobody", &ServerMessage::system("x"), None);
        assert_eq!(report, DeliveryReport { delivered: 0, failed: 0 });
    }

    #[test]
    fn test_broadcast_does_not_cross_rooms() {
        let registry = Arc::new(RoomRegistry::new());
        let engine = BroadcastEngine::new(registry.clone());
        let _a = join(&registry, "r1", "A", 8);
        let mut b = join(&registry, "r2", "B", 8);

        engine.broadcast("r1", &ServerMessage::system("only r1"), None);
        assert!(b.rx.try_recv().is_err());
    }

    #[test]
    fn test_failed_member_is_evicted_and_others_still_served() {
        let registry = Arc::new(RoomRegistry::new());
        let engine = BroadcastEngine::new(registry.clone());
        let slow = join(&registry, "r1", "Slow", 1);
        let mut fast = join(&registry, "r1", "Fast", 8);

        engine.broadcast("r1", &ServerMessage::system("one"), None);
        let report = engine.broadcast("r1", &ServerMessage::system("two"), None);

        assert_eq!(report, DeliveryReport { delivered: 1, failed: 1 });
        assert!(slow.member.is_evicted());
        assert!(!fast.member.is_evicted());
        assert_eq!(fast.rx.try_recv().unwrap(), ServerMessage::system("one"));
        assert_eq!(fast.rx.try_recv().unwrap(), ServerMessage::system("two"));

        let stats = engine.stats();
        assert_eq!(stats.broadcasts, 2);
        assert_eq!(stats.total_failed, 1);
    }

    #[test]
    fn test_per_sender_order_is_preserved() {
        let registry = Arc::new(RoomRegistry::new());
        let engine = BroadcastEngine::new(registry.clone());
        let a = join(&registry, "r1", "A", 64);
        let mut b = join(&registry, "r1", "B", 64);

        for i in 0..20 {
            engine.broadcast("r1", &ServerMessage::chat("A", i.to_string()), Some(a.id));
        }

        for i in 0..20 {
            assert_eq!(b.rx.try_recv().unwrap(), ServerMessage::chat("A", i.to_string()));
        }
    }

    #[test]
    fn test_broadcast_to_earlier_skips_later_joiners() {
        let registry = Arc::new(RoomRegistry::new());
        let engine = BroadcastEngine::new(registry.clone());
        let mut a = join(&registry, "r1", "A", 8);
        let mut b = join(&registry, "r1", "B", 8);
        let mut c = join(&registry, "r1", "C", 8);

        let msg = ServerMessage::system("B joined the group");
        let report = engine.broadcast_to_earlier("r1", &msg, b.id);

        assert_eq!(report, DeliveryReport { delivered: 1, failed: 0 });
        assert_eq!(a.rx.try_recv().unwrap(), msg);
        assert!(b.rx.try_recv().is_err());
        assert!(c.rx.try_recv().is_err());
    }

    #[test]
    fn test_send_direct_reaches_only_target() {
        let registry = Arc::new(RoomRegistry::new());
        let engine = BroadcastEngine::new(registry.clone());
        let mut a = join(&registry, "r1", "A", 8);
        let mut b = join(&registry, "r1", "B", 8);

        assert!(engine.send_direct(&b.member, ServerMessage::system("psst")));
        assert_eq!(b.rx.try_recv().unwrap(), ServerMessage::system("psst"));
        assert!(a.rx.try_recv().is_err());
        assert_eq!(engine.stats().direct_sends, 1);
    }
}
