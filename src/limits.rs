/// Maximum number of tenants served by one process.
pub const MAX_TENANTS: usize = 1024;

/// Tenant names come from the pgwire database name.
pub const MAX_TENANT_NAME_LEN: usize = 63;

/// Longest slot a caller may ask for.
pub const MAX_DURATION_MINUTES: i64 = 24 * 60;

/// Longest single booking, blocked range, or conflict query.
pub const MAX_SPAN_MINUTES: i64 = 7 * 24 * 60;

/// Labels, closure reasons and blocked-time reasons.
pub const MAX_LABEL_LEN: usize = 256;

/// Bookings (any status) the reference store keeps per staff member or resource.
pub const MAX_BOOKINGS_PER_TARGET: usize = 10_000;

/// Blocked-time ranges the reference store keeps per staff member or resource.
pub const MAX_BLOCKED_PER_TARGET: usize = 1_000;
