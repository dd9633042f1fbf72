use std::net::SocketAddr;

use crate::sql::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total queries executed. Labels: command, status.
pub const QUERIES_TOTAL: &str = "slotwise_queries_total";

/// Histogram: query latency in seconds. Labels: command.
pub const QUERY_DURATION_SECONDS: &str = "slotwise_query_duration_seconds";

/// Counter: slot generation calls. Labels: outcome (open, closed, error).
pub const SLOT_QUERIES_TOTAL: &str = "slotwise_slot_queries_total";

/// Histogram: slot generation duration in seconds, open days only.
pub const SLOT_GENERATION_DURATION_SECONDS: &str = "slotwise_slot_generation_duration_seconds";

/// Counter: conflict checks run against the sources.
pub const CONFLICT_CHECKS_TOTAL: &str = "slotwise_conflict_checks_total";

/// Counter: bookings refused because they overlap live intervals.
pub const BOOKINGS_REJECTED_TOTAL: &str = "slotwise_bookings_rejected_total";

/// Counter: failed data-store lookups. Labels: lookup.
pub const SOURCE_ERRORS_TOTAL: &str = "slotwise_source_errors_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "slotwise_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "slotwise_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "slotwise_connections_rejected_total";

/// Gauge: number of registered tenants.
pub const TENANTS_ACTIVE: &str = "slotwise_tenants_active";

/// Counter: connections refused because the database name is not a valid tenant.
pub const TENANT_REJECTIONS_TOTAL: &str = "slotwise_tenant_rejections_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::InsertDayHours(_) => "insert_day_hours",
        Command::DeleteDayHours { .. } => "delete_day_hours",
        Command::InsertClosures(_) => "insert_closures",
        Command::DeleteClosure { .. } => "delete_closure",
        Command::InsertBookings(_) => "insert_bookings",
        Command::CancelBooking { .. } => "cancel_booking",
        Command::InsertBlockedTime(_) => "insert_blocked_time",
        Command::DeleteBlockedTime { .. } => "delete_blocked_time",
        Command::SelectSlots(_) => "select_slots",
        Command::SelectAvailability(_) => "select_availability",
        Command::SelectConflicts { .. } => "select_conflicts",
        Command::SelectSchedule { .. } => "select_schedule",
        Command::SelectBookings { .. } => "select_bookings",
    }
}
