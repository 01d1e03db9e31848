//! Prometheus metrics for the relay.
//!
//! - Session metrics (opened, closed, duration, evictions)
//! - Room metrics (active rooms, active members)
//! - Message metrics (relayed by kind, deliveries, failures, malformed input)

mod helpers;

pub use helpers::{encode_metrics, MessageMetrics, RoomMetrics, SessionMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "relay";

lazy_static! {
    // ============================================================================
    // Room Metrics
    // ============================================================================

    /// Rooms with at least one member
    pub static ref ROOMS_ACTIVE: IntGauge = register_int_gauge!(
        format!("{}_rooms_active", METRIC_PREFIX),
        "Number of rooms with at least one member"
    ).unwrap();

    /// Members across all rooms
    pub static ref MEMBERS_ACTIVE: IntGauge = register_int_gauge!(
        format!("{}_members_active", METRIC_PREFIX),
        "Number of joined members across all rooms"
    ).unwrap();

    // ============================================================================
    // Message Metrics
    // ============================================================================

    /// Records relayed, by kind (message, system, direct)
    pub static ref MESSAGES_RELAYED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_messages_relayed_total", METRIC_PREFIX),
        "Total records relayed",
        &["kind"]
    ).unwrap();

    /// Successful per-member deliveries
    pub static ref DELIVERIES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_deliveries_total", METRIC_PREFIX),
        "Total records enqueued to member outboxes"
    ).unwrap();

    /// Failed per-member deliveries
    pub static ref DELIVERY_FAILURES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_delivery_failures_total", METRIC_PREFIX),
        "Total records that could not be enqueued"
    ).unwrap();

    /// Inbound frames that did not parse
    pub static ref MALFORMED_PAYLOADS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_malformed_payloads_total", METRIC_PREFIX),
        "Total inbound frames rejected as malformed"
    ).unwrap();

    // ============================================================================
    // Session Metrics
    // ============================================================================

    pub static ref SESSIONS_OPENED: IntCounter = register_int_counter!(
        format!("{}_sessions_opened_total", METRIC_PREFIX),
        "Total sessions opened"
    ).unwrap();

    pub static ref SESSIONS_CLOSED: IntCounter = register_int_counter!(
        format!("{}_sessions_closed_total", METRIC_PREFIX),
        "Total sessions closed"
    ).unwrap();

    /// Members evicted after a failed delivery or at shutdown
    pub static ref SESSIONS_EVICTED: IntCounter = register_int_counter!(
        format!("{}_sessions_evicted_total", METRIC_PREFIX),
        "Total sessions closed by eviction"
    ).unwrap();

    pub static ref SESSION_DURATION: Histogram = register_histogram!(
        format!("{}_session_duration_seconds", METRIC_PREFIX),
        "Session duration in seconds",
        vec![1.0, 10.0, 60.0, 300.0, 900.0, 3600.0, 14400.0]
    ).unwrap();
}
