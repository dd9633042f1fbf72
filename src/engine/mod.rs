mod booking;
mod calendar;
mod conflict;
mod error;
mod slots;
mod source;

pub use booking::{BookingDesk, Placement};
pub use calendar::schedule_from_hours;
pub use conflict::{collect_conflicts, is_blocked};
pub use error::{EngineError, SourceError};
pub use slots::candidate_spans;
pub use source::{BookingLedger, CalendarSource, ConflictSource};

use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveTime;

use crate::model::*;

/// How the slot generator consults the conflict sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LookupMode {
    /// One conflict check per candidate slot, awaited in order.
    PerSlot,
    /// One fetch per source over the whole open window, then every
    /// candidate is evaluated in memory.
    #[default]
    Prefetch,
}

impl FromStr for LookupMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "per_slot" | "per-slot" => Ok(LookupMode::PerSlot),
            "prefetch" => Ok(LookupMode::Prefetch),
            other => Err(format!("unknown lookup mode: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EnginePolicy {
    /// Window used when a weekday has no hours row.
    pub default_open: NaiveTime,
    pub default_close: NaiveTime,
    pub default_duration_minutes: u32,
    /// Distance between candidate slot starts. Not settable per request.
    pub step_minutes: u32,
    pub lookup: LookupMode,
}

impl Default for EnginePolicy {
    fn default() -> Self {
        Self {
            default_open: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            default_close: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or_default(),
            default_duration_minutes: 30,
            step_minutes: 30,
            lookup: LookupMode::Prefetch,
        }
    }
}

/// Availability and conflict engine. Holds no booking state of its own:
/// every answer is recomputed from the sources on each call.
pub struct Engine {
    calendar: Arc<dyn CalendarSource>,
    sources: Vec<Arc<dyn ConflictSource>>,
    policy: EnginePolicy,
}

impl Engine {
    pub fn new(calendar: Arc<dyn CalendarSource>, policy: EnginePolicy) -> Self {
        Self {
            calendar,
            sources: Vec::new(),
            policy,
        }
    }

    /// Register another family of blocking intervals.
    pub fn with_source(mut self, source: Arc<dyn ConflictSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn policy(&self) -> &EnginePolicy {
        &self.policy
    }

    pub fn source_kinds(&self) -> Vec<ConflictKind> {
        self.sources.iter().map(|s| s.kind()).collect()
    }

    /// Log and count a failed lookup, then hand it back for propagation.
    fn source_failure(&self, what: &'static str, tenant: &TenantId, err: SourceError) -> EngineError {
        tracing::warn!(tenant = %tenant, lookup = what, "lookup failed: {err}");
        metrics::counter!(crate::observability::SOURCE_ERRORS_TOTAL, "lookup" => what).increment(1);
        EngineError::Source(err)
    }
}
