//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use super::{
    DELIVERIES_TOTAL, DELIVERY_FAILURES_TOTAL, MALFORMED_PAYLOADS_TOTAL, MEMBERS_ACTIVE,
    MESSAGES_RELAYED_TOTAL, ROOMS_ACTIVE, SESSIONS_CLOSED, SESSIONS_EVICTED, SESSIONS_OPENED,
    SESSION_DURATION,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for room membership gauges
pub struct RoomMetrics;

impl RoomMetrics {
    pub fn room_created() {
        ROOMS_ACTIVE.inc();
    }

    pub fn room_deleted() {
        ROOMS_ACTIVE.dec();
    }

    pub fn member_joined() {
        MEMBERS_ACTIVE.inc();
    }

    pub fn member_left() {
        MEMBERS_ACTIVE.dec();
    }
}

/// Helper struct for recording message metrics
pub struct MessageMetrics;

impl MessageMetrics {
    /// Record a broadcast of the given record kind
    pub fn record_broadcast(kind: &str) {
        MESSAGES_RELAYED_TOTAL.with_label_values(&[kind]).inc();
    }

    /// Record a private send to a single member
    pub fn record_direct() {
        MESSAGES_RELAYED_TOTAL.with_label_values(&["direct"]).inc();
    }

    pub fn record_delivered(count: u64) {
        DELIVERIES_TOTAL.inc_by(count);
    }

    pub fn record_failed(count: u64) {
        DELIVERY_FAILURES_TOTAL.inc_by(count);
    }

    pub fn record_malformed() {
        MALFORMED_PAYLOADS_TOTAL.inc();
    }
}

/// Helper struct for session lifecycle metrics
pub struct SessionMetrics;

impl SessionMetrics {
    pub fn record_opened() {
        SESSIONS_OPENED.inc();
    }

    pub fn record_closed(duration_secs: f64) {
        SESSIONS_CLOSED.inc();
        SESSION_DURATION.observe(duration_secs);
    }

    pub fn record_evicted() {
        SESSIONS_EVICTED.inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_contains_registered_metrics() {
        MessageMetrics::record_broadcast("message");
        SessionMetrics::record_opened();

        let output = encode_metrics().unwrap();
        assert!(output.contains("relay_messages_relayed_total"));
        assert!(output.contains("relay_sessions_opened_total"));
    }
}
