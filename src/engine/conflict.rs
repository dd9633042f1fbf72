use ulid::Ulid;

use crate::limits::MAX_SPAN_MINUTES;
use crate::model::*;

use super::{Engine, EngineError};

pub(crate) fn validate_span(start: Stamp, end: Stamp) -> Result<Span, EngineError> {
    let span = Span::checked(start, end)
        .ok_or_else(|| EngineError::Validation(format!("empty range [{start}, {end})")))?;
    if span.duration().num_minutes() > MAX_SPAN_MINUTES {
        return Err(EngineError::LimitExceeded("span too wide"));
    }
    Ok(span)
}

/// Every interval in `candidates` that overlaps `span`, skipping `exclude`.
/// Adjacent intervals (`a.end == b.start`) never overlap.
pub fn collect_conflicts<'a>(
    kind: ConflictKind,
    candidates: &'a [Busy],
    span: &'a Span,
    exclude: Option<Ulid>,
) -> impl Iterator<Item = ConflictRef> + 'a {
    candidates
        .iter()
        .filter(move |b| Some(b.id) != exclude)
        .filter(move |b| b.span.overlaps(span))
        .map(move |b| ConflictRef {
            kind,
            id: b.id,
            start_at: b.span.start,
            end_at: b.span.end,
        })
}

/// Whether anything in `sorted` (ordered by `span.start`) blocks `span`.
pub fn is_blocked(sorted: &[Busy], span: &Span, exclude: Option<Ulid>) -> bool {
    // Everything at index >= right_bound starts at or after span.end → can't overlap.
    let right_bound = sorted.partition_point(|b| b.span.start < span.end);
    sorted[..right_bound]
        .iter()
        .any(|b| Some(b.id) != exclude && b.span.end > span.start)
}

impl Engine {
    /// Every live interval for `target` overlapping `[start, end)`.
    ///
    /// `exclude_booking_id` is the booking being rescheduled, so it does not
    /// collide with itself. A failed lookup is an error, never "no conflict".
    pub async fn check_conflicts(
        &self,
        tenant: &TenantId,
        target: BookingTarget,
        start: Stamp,
        end: Stamp,
        exclude_booking_id: Option<Ulid>,
    ) -> Result<ConflictReport, EngineError> {
        let span = validate_span(start, end)?;
        let conflicts = self
            .lookup_conflicts(tenant, target, &span, exclude_booking_id)
            .await?;
        Ok(ConflictReport::from(conflicts))
    }

    /// Query every source for `span` and apply the overlap test. No validation.
    pub(super) async fn lookup_conflicts(
        &self,
        tenant: &TenantId,
        target: BookingTarget,
        span: &Span,
        exclude: Option<Ulid>,
    ) -> Result<Vec<ConflictRef>, EngineError> {
        metrics::counter!(crate::observability::CONFLICT_CHECKS_TOTAL).increment(1);
        let mut conflicts = Vec::new();
        for source in &self.sources {
            let busy = source
                .busy(tenant, target, span)
                .await
                .map_err(|e| self.source_failure("conflicts", tenant, e))?;
            conflicts.extend(collect_conflicts(source.kind(), &busy, span, exclude));
        }
        conflicts.sort_by_key(|c| (c.start_at, c.id));
        tracing::debug!(
            tenant = %tenant,
            target = %target,
            start = %span.start,
            end = %span.end,
            found = conflicts.len(),
            "conflict check"
        );
        Ok(conflicts)
    }
}
