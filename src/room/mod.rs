//! Room membership registry

mod registry;
mod stats;
mod types;

pub use registry::{MemberList, RoomRegistry};
pub use stats::{MemberInfo, RegistryStats, RoomInfo, RoomSummary};
pub use types::{JoinOutcome, LeaveOutcome, Member};
