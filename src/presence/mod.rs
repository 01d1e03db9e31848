//! Join and leave announcements

use std::sync::Arc;

use crate::broadcast::{BroadcastEngine, DeliveryReport};
use crate::room::Member;
use crate::websocket::ServerMessage;

/// Emits system records on membership changes
#[derive(Clone)]
pub struct PresenceNotifier {
    engine: Arc<BroadcastEngine>,
}

impl PresenceNotifier {
    pub fn new(engine: Arc<BroadcastEngine>) -> Self {
        Self { engine }
    }

    /// Tell the members who were already there that a member arrived, and
    /// privately tell the newcomer who they are. A member who joins between
    /// the registry insert and this call learns about the newcomer from its
    /// own listing and is not told twice.
    pub fn announce_join(
        &self,
        room_id: &str,
        newcomer: &Member,
        room_created: bool,
        other_members: &[String],
    ) -> DeliveryReport {
        let content = if room_created {
            format!("{} created the group", newcomer.display_name)
        } else {
            format!("{} joined the group", newcomer.display_name)
        };
        let report = self.engine.broadcast_to_earlier(
            room_id,
            &ServerMessage::system(content),
            newcomer.connection_id,
        );

        if !other_members.is_empty() {
            let listing = format!("Currently in group: {}", other_members.join(", "));
            self.engine
                .send_direct(newcomer, ServerMessage::system(listing));
        }

        report
    }

    /// Tell the remaining members someone left
    pub fn announce_leave(&self, room_id: &str, display_name: &str) -> DeliveryReport {
        let content = format!("{} left the group", display_name);
        self.engine
            .broadcast(room_id, &ServerMessage::system(content), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::RoomRegistry;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    fn setup() -> (Arc<RoomRegistry>, PresenceNotifier) {
        let registry = Arc::new(RoomRegistry::new());
        let engine = Arc::new(BroadcastEngine::new(registry.clone()));
        (registry, PresenceNotifier::new(engine))
    }

    #[test]
    fn test_first_member_hears_nothing() {
        let (registry, presence) = setup();
        let (tx, mut rx) = mpsc::channel(8);
        let outcome = registry.join("r1", Uuid::new_v4(), "A", tx);

        let report = presence.announce_join(
            "r1",
            &outcome.member,
            outcome.room_created,
            &outcome.other_members,
        );

        assert_eq!(report.delivered, 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_join_announced_to_others_and_listing_sent_privately() {
        let (registry, presence) = setup();
        let (tx_a, mut rx_a) = mpsc::channel(8);
        let (tx_b, mut rx_b) = mpsc::channel(8);
        registry.join("r1", Uuid::new_v4(), "A", tx_a);
        let b = registry.join("r1", Uuid::new_v4(), "B", tx_b);

        presence.announce_join("r1", &b.member, b.room_created, &b.other_members);

        assert_eq!(
            rx_a.try_recv().unwrap(),
            ServerMessage::system("B joined the group")
        );
        assert!(rx_a.try_recv().is_err());
        assert_eq!(
            rx_b.try_recv().unwrap(),
            ServerMessage::system("Currently in group: A")
        );
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn test_listing_names_all_present_members() {
        let (registry, presence) = setup();
        let (tx, _rx_a) = mpsc::channel(8);
        registry.join("r1", Uuid::new_v4(), "A", tx);
        let (tx, _rx_b) = mpsc::channel(8);
        registry.join("r1", Uuid::new_v4(), "B", tx);
        let (tx, mut rx_c) = mpsc::channel(8);
        let c = registry.join("r1", Uuid::new_v4(), "C", tx);

        presence.announce_join("r1", &c.member, c.room_created, &c.other_members);
        assert_eq!(
            rx_c.try_recv().unwrap(),
            ServerMessage::system("Currently in group: A, B")
        );
    }

    #[test]
    fn test_concurrent_joiner_is_not_told_twice() {
        let (registry, presence) = setup();
        let (tx, mut rx_a) = mpsc::channel(8);
        registry.join("r1", Uuid::new_v4(), "A", tx);
        let (tx, mut rx_b) = mpsc::channel(8);
        let b = registry.join("r1", Uuid::new_v4(), "B", tx);
        // C registers before B's announcement goes out
        let (tx, mut rx_c) = mpsc::channel(8);
        let c = registry.join("r1", Uuid::new_v4(), "C", tx);
        assert_eq!(c.other_members, vec!["A".to_string(), "B".to_string()]);

        presence.announce_join("r1", &b.member, b.room_created, &b.other_members);
        presence.announce_join("r1", &c.member, c.room_created, &c.other_members);

        assert_eq!(rx_a.try_recv().unwrap(), ServerMessage::system("B joined the group"));
        assert_eq!(rx_a.try_recv().unwrap(), ServerMessage::system("C joined the group"));
        assert_eq!(rx_b.try_recv().unwrap(), ServerMessage::system("Currently in group: A"));
        assert_eq!(rx_b.try_recv().unwrap(), ServerMessage::system("C joined the group"));
        assert_eq!(
            rx_c.try_recv().unwrap(),
            ServerMessage::system("Currently in group: A, B")
        );
        assert!(rx_c.try_recv().is_err());
    }

    #[test]
    fn test_leave_announced_to_remaining() {
        let (registry, presence) = setup();
        let (tx_a, mut rx_a) = mpsc::channel(8);
        let (tx_b, _rx_b) = mpsc::channel(8);
        registry.join("r1", Uuid::new_v4(), "A", tx_a);
        let b = Uuid::new_v4();
        registry.join("r1", b, "B", tx_b);

        registry.leave("r1", b);
        let report = presence.announce_leave("r1", "B");

        assert_eq!(report.delivered, 1);
        assert_eq!(
            rx_a.try_recv().unwrap(),
            ServerMessage::system("B left the group")
        );
    }
}
