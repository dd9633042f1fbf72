use async_trait::async_trait;
use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::*;

use super::SourceError;

/// Weekday hours and date closures for a tenant.
#[async_trait]
pub trait CalendarSource: Send + Sync {
    async fn day_hours(&self, tenant: &TenantId, weekday: u8) -> Result<Option<DayHours>, SourceError>;

    async fn date_closure(
        &self,
        tenant: &TenantId,
        date: NaiveDate,
    ) -> Result<Option<DateClosure>, SourceError>;
}

/// One family of intervals that make a target unavailable. The conflict
/// checker unions every registered source.
#[async_trait]
pub trait ConflictSource: Send + Sync {
    fn kind(&self) -> ConflictKind;

    /// Live intervals for `target` that may intersect `window`.
    /// Returning extra intervals is fine; every one is re-tested by the caller.
    async fn busy(
        &self,
        tenant: &TenantId,
        target: BookingTarget,
        window: &Span,
    ) -> Result<Vec<Busy>, SourceError>;
}

/// Where the booking desk reads and commits bookings.
#[async_trait]
pub trait BookingLedger: Send + Sync {
    async fn booking(&self, tenant: &TenantId, id: Ulid) -> Result<Option<Booking>, SourceError>;

    /// Insert or replace by id. A replaced booking may move to another target.
    async fn put_booking(&self, booking: Booking) -> Result<(), SourceError>;
}
