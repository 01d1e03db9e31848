//! Fan-out of records to room members

mod engine;

pub use engine::{BroadcastEngine, DeliveryReport, EngineStats, EngineStatsSnapshot};
