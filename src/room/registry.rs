use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::connection::ConnectionId;
use crate::metrics::RoomMetrics;
use crate::websocket::ServerMessage;

use super::stats::{MemberInfo, RegistryStats, RoomInfo, RoomSummary};
use super::types::{JoinOutcome, LeaveOutcome, Member, Room};

/// Point-in-time membership snapshot; most rooms are small
pub type MemberList = SmallVec<[Arc<Member>; 8]>;

/// Owns all room membership state.
///
/// Every mutation and snapshot runs under the shard lock of the room's
/// entry, so a concurrent reader sees a member either fully in or fully
/// out. A room entry exists only while it has at least one member.
pub struct RoomRegistry {
    /// room_id -> Room
    rooms: DashMap<String, Room>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
        }
    }

    /// Add a connection to a room, creating the room on first join
    pub fn join(
        &self,
        room_id: &str,
        connection_id: ConnectionId,
        display_name: &str,
        outbox: mpsc::Sender<ServerMessage>,
    ) -> JoinOutcome {
        let member = Arc::new(Member::new(connection_id, display_name, outbox));

        let mut room_created = false;
        let other_members = {
            let mut room = self.rooms.entry(room_id.to_string()).or_insert_with(|| {
                room_created = true;
                Room::new()
            });

            // A connection joins once; replace rather than duplicate
            if room.remove(connection_id).is_some() {
                tracing::warn!(
                    room_id = %room_id,
                    connection_id = %connection_id,
                    "Connection joined twice, replacing previous membership"
                );
                RoomMetrics::member_left();
            }

            let others: Vec<String> = room
                .members
                .iter()
                .map(|m| m.display_name.clone())
                .collect();
            room.members.push(member.clone());
            others
        };

        if room_created {
            RoomMetrics::room_created();
        }
        RoomMetrics::member_joined();

        tracing::info!(
            room_id = %room_id,
            connection_id = %connection_id,
            display_name = %display_name,
            room_created = room_created,
            members = other_members.len() + 1,
            "Member joined room"
        );

        JoinOutcome {
            member,
            room_created,
            other_members,
        }
    }

    /// Remove a connection from a room, deleting the room if it empties.
    /// Absent rooms or connections make this a no-op.
    pub fn leave(&self, room_id: &str, connection_id: ConnectionId) -> LeaveOutcome {
        let outcome = match self.rooms.entry(room_id.to_string()) {
            Entry::Vacant(_) => LeaveOutcome::noop(),
            Entry::Occupied(mut occupied) => {
                let removed = occupied.get_mut().remove(connection_id);
                let remaining = occupied.get().members.len();
                let room_deleted = remaining == 0;
                if room_deleted {
                    occupied.remove();
                }
                LeaveOutcome {
                    removed,
                    remaining,
                    room_deleted,
                }
            }
        };

        if let Some(member) = &outcome.removed {
            RoomMetrics::member_left();
            if outcome.room_deleted {
                RoomMetrics::room_deleted();
            }
            tracing::info!(
                room_id = %room_id,
                connection_id = %connection_id,
                display_name = %member.display_name,
                remaining = outcome.remaining,
                room_deleted = outcome.room_deleted,
                "Member left room"
            );
        } else {
            tracing::debug!(
                room_id = %room_id,
                connection_id = %connection_id,
                "Leave ignored, connection not in room"
            );
        }

        outcome
    }

    /// Snapshot of a room's members in join order; empty if the room is absent
    pub fn members_of(&self, room_id: &str) -> MemberList {
        self.rooms
            .get(room_id)
            .map(|room| room.members.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }

    pub fn member_count(&self, room_id: &str) -> usize {
        self.rooms
            .get(room_id)
            .map(|room| room.members.len())
            .unwrap_or(0)
    }

    pub fn room_ids(&self) -> Vec<String> {
        self.rooms.iter().map(|r| r.key().clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// List all rooms, largest first
    pub fn list_rooms(&self) -> Vec<RoomSummary> {
        let mut rooms: Vec<RoomSummary> = self
            .rooms
            .iter()
            .map(|entry| RoomSummary {
                room_id: entry.key().clone(),
                member_count: entry.value().members.len(),
                created_at: entry.value().created_at,
            })
            .collect();
        rooms.sort_by(|a, b| {
            b.member_count
                .cmp(&a.member_count)
                .then_with(|| a.room_id.cmp(&b.room_id))
        });
        rooms
    }

    pub fn room_info(&self, room_id: &str) -> Option<RoomInfo> {
        self.rooms.get(room_id).map(|room| RoomInfo {
            room_id: room_id.to_string(),
            created_at: room.created_at,
            members: room
                .members
                .iter()
                .map(|m| MemberInfo {
                    display_name: m.display_name.clone(),
                    joined_at: m.joined_at,
                })
                .collect(),
        })
    }

    /// Ask every member's session to close; returns the number signalled
    pub fn evict_all(&self) -> usize {
        let members: Vec<Arc<Member>> = self
            .rooms
            .iter()
            .flat_map(|entry| entry.value().members.clone())
            .collect();

        for member in &members {
            member.evict();
        }
        members.len()
    }

    pub fn stats(&self) -> RegistryStats {
        let mut rooms = HashMap::new();
        let mut total_members = 0;
        for entry in self.rooms.iter() {
            let count = entry.value().members.len();
            total_members += count;
            rooms.insert(entry.key().clone(), count);
        }

        RegistryStats {
            total_rooms: rooms.len(),
            total_members,
            rooms,
        }
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}
