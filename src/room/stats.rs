//! Registry statistics and info structures

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// Registry statistics
#[derive(Debug, Clone, Serialize)]
pub struct RegistryStats {
    pub total_rooms: usize,
    pub total_members: usize,
    /// room_id -> member count
    pub rooms: HashMap<String, usize>,
}

/// Summary of one room for listings
#[derive(Debug, Clone, Serialize)]
pub struct RoomSummary {
    pub room_id: String,
    pub member_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Member detail exposed over the API
#[derive(Debug, Clone, Serialize)]
pub struct MemberInfo {
    pub display_name: String,
    pub joined_at: DateTime<Utc>,
}

/// Full room detail
#[derive(Debug, Clone, Serialize)]
pub struct RoomInfo {
    pub room_id: String,
    pub created_at: DateTime<Utc>,
    pub members: Vec<MemberInfo>,
}
