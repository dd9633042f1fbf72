use std::time::Instant;

use chrono::{Duration, NaiveDate};
use ulid::Ulid;

use crate::limits::MAX_DURATION_MINUTES;
use crate::model::*;

use super::conflict::is_blocked;
use super::{Engine, EngineError, LookupMode};

/// Fixed-size candidates inside `window`, one every `step`, starting at
/// `window.start`. A candidate is emitted only if it ends by `window.end`.
pub fn candidate_spans(window: &Span, duration: Duration, step: Duration) -> Vec<Span> {
    let mut out = Vec::new();
    if duration <= Duration::zero() || step <= Duration::zero() {
        return out;
    }
    let mut t = window.start;
    while t + duration <= window.end {
        out.push(Span::new(t, t + duration));
        t += step;
    }
    out
}

fn validate_duration(requested: Option<i64>, default: u32) -> Result<u32, EngineError> {
    match requested {
        None => Ok(default),
        Some(m) if m <= 0 => Err(EngineError::Validation(format!(
            "duration_minutes must be positive, got {m}"
        ))),
        Some(m) if m > MAX_DURATION_MINUTES => Err(EngineError::LimitExceeded("duration too long")),
        Some(m) => Ok(m as u32),
    }
}

impl Engine {
    /// Candidate slots for `target` on `date`, each tagged available or not.
    ///
    /// A closed day returns no slots and performs no conflict lookups. Any
    /// failed lookup aborts the whole call; a partial list is never returned.
    pub async fn generate_slots(
        &self,
        tenant: &TenantId,
        target: BookingTarget,
        date: NaiveDate,
        duration_minutes: Option<i64>,
        exclude_booking_id: Option<Ulid>,
    ) -> Result<SlotList, EngineError> {
        let started = Instant::now();
        let minutes = validate_duration(duration_minutes, self.policy.default_duration_minutes)?;
        let day = self.resolve_day(tenant, date).await?;

        if day.is_closed {
            let reason = day.reason.unwrap_or(ClosureReason::WeekdayClosed);
            tracing::debug!(tenant = %tenant, %date, reason = reason.as_str(), "closed, no slots");
            metrics::counter!(crate::observability::SLOT_QUERIES_TOTAL, "outcome" => "closed").increment(1);
            return Ok(SlotList {
                date,
                target,
                duration_minutes: minutes,
                open_time: day.open_time,
                close_time: day.close_time,
                slots: Vec::new(),
                closure: Some(reason),
            });
        }

        let duration = Duration::minutes(i64::from(minutes));
        let step = Duration::minutes(i64::from(self.policy.step_minutes));
        let candidates = day
            .window()
            .map(|w| candidate_spans(&w, duration, step))
            .unwrap_or_default();

        let tagged = match self.policy.lookup {
            LookupMode::PerSlot => {
                self.tag_per_slot(tenant, target, &candidates, exclude_booking_id)
                    .await
            }
            LookupMode::Prefetch => {
                self.tag_prefetched(tenant, target, &candidates, exclude_booking_id)
                    .await
            }
        };
        let slots = match tagged {
            Ok(slots) => slots,
            Err(e) => {
                metrics::counter!(crate::observability::SLOT_QUERIES_TOTAL, "outcome" => "error").increment(1);
                return Err(e);
            }
        };

        metrics::counter!(crate::observability::SLOT_QUERIES_TOTAL, "outcome" => "open").increment(1);
        metrics::histogram!(crate::observability::SLOT_GENERATION_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        tracing::debug!(
            tenant = %tenant,
            target = %target,
            %date,
            candidates = slots.len(),
            free = slots.iter().filter(|s| s.available).count(),
            "slots generated"
        );

        Ok(SlotList {
            date,
            target,
            duration_minutes: minutes,
            open_time: day.open_time,
            close_time: day.close_time,
            slots,
            closure: None,
        })
    }

    async fn tag_per_slot(
        &self,
        tenant: &TenantId,
        target: BookingTarget,
        candidates: &[Span],
        exclude: Option<Ulid>,
    ) -> Result<Vec<Slot>, EngineError> {
        let mut slots = Vec::with_capacity(candidates.len());
        for span in candidates {
            let conflicts = self.lookup_conflicts(tenant, target, span, exclude).await?;
            slots.push(Slot {
                start: span.start,
                end: span.end,
                available: conflicts.is_empty(),
            });
        }
        Ok(slots)
    }

    async fn tag_prefetched(
        &self,
        tenant: &TenantId,
        target: BookingTarget,
        candidates: &[Span],
        exclude: Option<Ulid>,
    ) -> Result<Vec<Slot>, EngineError> {
        let (Some(first), Some(last)) = (candidates.first(), candidates.last()) else {
            return Ok(Vec::new());
        };
        let window = Span::new(first.start, last.end);

        let mut busy = Vec::new();
        for source in &self.sources {
            let found = source
                .busy(tenant, target, &window)
                .await
                .map_err(|e| self.source_failure("prefetch", tenant, e))?;
            busy.extend(found);
        }
        busy.sort_by_key(|b| b.span.start);

        Ok(candidates
            .iter()
            .map(|span| Slot {
                start: span.start,
                end: span.end,
                available: !is_blocked(&busy, span, exclude),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32) -> Stamp {
        NaiveDate::from_ymd_opt(2026, 3, 15)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn mins(m: i64) -> Duration {
        Duration::minutes(m)
    }

    #[test]
    fn nine_to_six_half_hour_gives_eighteen() {
        let window = Span::new(at(9, 0), at(18, 0));
        let slots = candidate_spans(&window, mins(30), mins(30));
        assert_eq!(slots.len(), 18);
        assert_eq!(slots[0], Span::new(at(9, 0), at(9, 30)));
        assert_eq!(slots[17], Span::new(at(17, 30), at(18, 0)));
    }

    #[test]
    fn never_spills_past_close() {
        let window = Span::new(at(9, 0), at(18, 0));
        let slots = candidate_spans(&window, mins(45), mins(30));
        // floor((540 - 45) / 30) + 1
        assert_eq!(slots.len(), 17);
        let last = slots.last().unwrap();
        assert_eq!(last.start, at(17, 0));
        assert_eq!(last.end, at(17, 45));
        assert!(slots.iter().all(|s| window.contains_span(s)));
    }

    #[test]
    fn count_matches_formula() {
        for window_min in [30i64, 59, 60, 90, 240, 541] {
            for duration in [15i64, 30, 45, 60, 90] {
                for step in [15i64, 30, 60] {
                    let window = Span::new(at(8, 0), at(8, 0) + mins(window_min));
                    let slots = candidate_spans(&window, mins(duration), mins(step));
                    let expected = if window_min >= duration {
                        ((window_min - duration) / step + 1) as usize
                    } else {
                        0
                    };
                    assert_eq!(slots.len(), expected, "window={window_min} d={duration} s={step}");
                    for s in &slots {
                        assert_eq!(s.end - s.start, mins(duration));
                        assert!(window.start <= s.start && s.end <= window.end);
                    }
                }
            }
        }
    }

    #[test]
    fn duration_longer_than_window_gives_nothing() {
        let window = Span::new(at(9, 0), at(10, 0));
        assert!(candidate_spans(&window, mins(90), mins(30)).is_empty());
    }

    #[test]
    fn duration_equal_to_window_gives_one() {
        let window = Span::new(at(9, 0), at(10, 0));
        assert_eq!(candidate_spans(&window, mins(60), mins(30)), vec![window]);
    }

    #[test]
    fn validate_duration_rules() {
        assert_eq!(validate_duration(None, 30).unwrap(), 30);
        assert_eq!(validate_duration(Some(60), 30).unwrap(), 60);
        assert!(matches!(validate_duration(Some(0), 30), Err(EngineError::Validation(_))));
        assert!(matches!(validate_duration(Some(-15), 30), Err(EngineError::Validation(_))));
        assert!(matches!(
            validate_duration(Some(MAX_DURATION_MINUTES + 1), 30),
            Err(EngineError::LimitExceeded(_))
        ));
    }
}
