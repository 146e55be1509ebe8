//! Metrics collection and export for Huddle.
//!
//! Uses the `metrics` crate for instrumentation and exports
//! to Prometheus format.

use huddle_core::RegistryStats;
use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

/// Metric names.
pub mod names {
    pub const CONTROL_CONNECTIONS_ACTIVE: &str = "huddle_control_connections_active";
    pub const CONTROL_REQUESTS_TOTAL: &str = "huddle_control_requests_total";
    pub const DATAGRAMS_RECEIVED_TOTAL: &str = "huddle_datagrams_received_total";
    pub const DATAGRAMS_RELAYED_TOTAL: &str = "huddle_datagrams_relayed_total";
    pub const DATAGRAMS_DROPPED_TOTAL: &str = "huddle_datagrams_dropped_total";
    pub const RELAY_BYTES_TOTAL: &str = "huddle_relay_bytes_total";
    pub const ROOMS_ACTIVE: &str = "huddle_rooms_active";
    pub const MEMBERS_ACTIVE: &str = "huddle_members_active";
    pub const ERRORS_TOTAL: &str = "huddle_errors_total";
}

/// Initialize the metrics system.
pub fn init_metrics() {
    metrics::describe_gauge!(
        names::CONTROL_CONNECTIONS_ACTIVE,
        "Control connections currently being served"
    );
    metrics::describe_counter!(
        names::CONTROL_REQUESTS_TOTAL,
        "Control requests by action and outcome"
    );
    metrics::describe_counter!(names::DATAGRAMS_RECEIVED_TOTAL, "Relay datagrams received");
    metrics::describe_counter!(
        names::DATAGRAMS_RELAYED_TOTAL,
        "Relay datagrams sent, one per recipient"
    );
    metrics::describe_counter!(
        names::DATAGRAMS_DROPPED_TOTAL,
        "Relay datagrams dropped by reason"
    );
    metrics::describe_counter!(names::RELAY_BYTES_TOTAL, "Message bytes sent by the relay");
    metrics::describe_gauge!(names::ROOMS_ACTIVE, "Rooms in the registry");
    metrics::describe_gauge!(names::MEMBERS_ACTIVE, "Tokens issued across all rooms");
    metrics::describe_counter!(names::ERRORS_TOTAL, "Total number of errors");

    info!("Metrics initialized");
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the server cannot be started.
pub fn start_metrics_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Metrics server listening on {}", addr);
    Ok(())
}

/// Record a handled control request.
pub fn record_control_request(action: &'static str, outcome: &'static str) {
    counter!(names::CONTROL_REQUESTS_TOTAL, "action" => action, "outcome" => outcome).increment(1);
}

/// Record a received datagram.
pub fn record_datagram_received() {
    counter!(names::DATAGRAMS_RECEIVED_TOTAL).increment(1);
}

/// Record a dropped datagram.
pub fn record_datagram_dropped(reason: &'static str) {
    counter!(names::DATAGRAMS_DROPPED_TOTAL, "reason" => reason).increment(1);
}

/// Record a completed fan-out.
pub fn record_relayed(recipients: usize, message_len: usize) {
    counter!(names::DATAGRAMS_RELAYED_TOTAL).increment(recipients as u64);
    counter!(names::RELAY_BYTES_TOTAL).increment((recipients * message_len) as u64);
}

/// Update room and member gauges.
pub fn set_registry_gauges(stats: RegistryStats) {
    gauge!(names::ROOMS_ACTIVE).set(stats.room_count as f64);
    gauge!(names::MEMBERS_ACTIVE).set(stats.member_count as f64);
}

/// Record an error.
pub fn record_error(error_type: &'static str) {
    counter!(names::ERRORS_TOTAL, "type" => error_type).increment(1);
}

/// Metrics guard that tracks an open control connection.
pub struct ConnectionMetricsGuard;

impl ConnectionMetricsGuard {
    /// Create a new metrics guard, recording a connection.
    #[must_use]
    pub fn new() -> Self {
        gauge!(names::CONTROL_CONNECTIONS_ACTIVE).increment(1.0);
        Self
    }
}

impl Default for ConnectionMetricsGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ConnectionMetricsGuard {
    fn drop(&mut self) {
        gauge!(names::CONTROL_CONNECTIONS_ACTIVE).decrement(1.0);
    }
}
