use chrono::NaiveDate;

use crate::model::*;

use super::{Engine, EnginePolicy, EngineError};

/// Schedule for a date that has no closure row: its weekday hours, or the
/// policy default window when the weekday has no row.
pub fn schedule_from_hours(date: NaiveDate, hours: Option<&DayHours>, policy: &EnginePolicy) -> DaySchedule {
    match hours {
        Some(h) => DaySchedule {
            date,
            open_time: h.open_time,
            close_time: h.close_time,
            is_closed: h.is_closed,
            reason: h.is_closed.then_some(ClosureReason::WeekdayClosed),
        },
        None => DaySchedule {
            date,
            open_time: policy.default_open,
            close_time: policy.default_close,
            is_closed: false,
            reason: None,
        },
    }
}

impl Engine {
    /// Effective opening window for `date`.
    ///
    /// Precedence: a closure for the exact date, then the weekday's hours,
    /// then the policy default. A closure short-circuits; the weekday is not
    /// looked up and the default window is reported alongside it.
    pub async fn resolve_day(&self, tenant: &TenantId, date: NaiveDate) -> Result<DaySchedule, EngineError> {
        let closure = self
            .calendar
            .date_closure(tenant, date)
            .await
            .map_err(|e| self.source_failure("date_closure", tenant, e))?;
        if closure.is_some() {
            return Ok(DaySchedule {
                date,
                open_time: self.policy.default_open,
                close_time: self.policy.default_close,
                is_closed: true,
                reason: Some(ClosureReason::DateClosure),
            });
        }

        let weekday = weekday_index(date);
        let hours = self
            .calendar
            .day_hours(tenant, weekday)
            .await
            .map_err(|e| self.source_failure("day_hours", tenant, e))?;
        Ok(schedule_from_hours(date, hours.as_ref(), &self.policy))
    }
}
