use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use ulid::Ulid;

use crate::limits::MAX_LABEL_LEN;
use crate::model::*;

use super::conflict::validate_span;
use super::{BookingLedger, Engine, EngineError};

/// What `BookingDesk::place` did with the booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Created,
    Updated,
}

impl Placement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Placement::Created => "created",
            Placement::Updated => "updated",
        }
    }
}

/// The write path. Every booking committed through the desk is re-checked
/// against the conflict sources while its target's gate is held, so two
/// writers cannot both land on the same free slot.
///
/// Lock order: the booking id's gate first, then target gates sorted by
/// `(kind, id)`. Holding the id gate across read and commit keeps writers of
/// one id from acting on a stale copy.
pub struct BookingDesk {
    engine: Arc<Engine>,
    ledger: Arc<dyn BookingLedger>,
    gates: DashMap<(TenantId, BookingTarget), Arc<Mutex<()>>>,
    ids: DashMap<(TenantId, Ulid), Arc<Mutex<()>>>,
}

impl BookingDesk {
    pub fn new(engine: Arc<Engine>, ledger: Arc<dyn BookingLedger>) -> Self {
        Self {
            engine,
            ledger,
            gates: DashMap::new(),
            ids: DashMap::new(),
        }
    }

    async fn lock_id(&self, tenant: &TenantId, id: Ulid) -> OwnedMutexGuard<()> {
        let gate = self.ids.entry((tenant.clone(), id)).or_default().value().clone();
        gate.lock_owned().await
    }

    /// Lock every distinct target in `targets`, in a fixed order.
    async fn lock_targets(&self, tenant: &TenantId, mut targets: Vec<BookingTarget>) -> Vec<OwnedMutexGuard<()>> {
        targets.sort_by_key(|t| (t.kind(), t.id()));
        targets.dedup();
        let mut guards = Vec::with_capacity(targets.len());
        for target in targets {
            let gate = self
                .gates
                .entry((tenant.clone(), target))
                .or_default()
                .value()
                .clone();
            guards.push(gate.lock_owned().await);
        }
        guards
    }

    /// Create or edit a booking. An edit is a booking whose id already
    /// exists; it is checked with its own id excluded. Non-live bookings
    /// occupy no time and skip the check.
    pub async fn place(&self, booking: Booking) -> Result<Placement, EngineError> {
        validate_span(booking.span.start, booking.span.end)?;
        if booking.label.as_ref().is_some_and(|l| l.len() > MAX_LABEL_LEN) {
            return Err(EngineError::LimitExceeded("label too long"));
        }

        let _id_guard = self.lock_id(&booking.tenant, booking.id).await;
        let existing = self.ledger.booking(&booking.tenant, booking.id).await?;

        // A move also holds the old target so its writers see the removal atomically.
        let mut targets = vec![booking.target];
        targets.extend(existing.as_ref().map(|b| b.target));
        let _target_guards = self.lock_targets(&booking.tenant, targets).await;

        if booking.is_live() {
            let exclude = existing.as_ref().map(|b| b.id);
            let report = self
                .engine
                .check_conflicts(
                    &booking.tenant,
                    booking.target,
                    booking.span.start,
                    booking.span.end,
                    exclude,
                )
                .await?;
            if report.has_conflict {
                metrics::counter!(crate::observability::BOOKINGS_REJECTED_TOTAL).increment(1);
                tracing::debug!(
                    tenant = %booking.tenant,
                    target = %booking.target,
                    id = %booking.id,
                    conflicts = report.conflicts.len(),
                    "booking rejected"
                );
                return Err(EngineError::Conflict(report.conflicts));
            }
        }

        let placement = if existing.is_some() {
            Placement::Updated
        } else {
            Placement::Created
        };
        tracing::debug!(
            tenant = %booking.tenant,
            target = %booking.target,
            id = %booking.id,
            status = booking.status.as_str(),
            placement = placement.as_str(),
            "booking placed"
        );
        self.ledger.put_booking(booking).await?;
        Ok(placement)
    }

    /// Mark a booking cancelled. The row is kept; it just stops blocking.
    pub async fn cancel(&self, tenant: &TenantId, id: Ulid) -> Result<Booking, EngineError> {
        let _id_guard = self.lock_id(tenant, id).await;
        let current = self
            .ledger
            .booking(tenant, id)
            .await?
            .ok_or(EngineError::NotFound(id))?;
        let _target_guards = self.lock_targets(tenant, vec![current.target]).await;

        let booking = Booking {
            status: BookingStatus::Cancelled,
            ..current
        };
        self.ledger.put_booking(booking.clone()).await?;
        tracing::debug!(tenant = %tenant, id = %id, "booking cancelled");
        Ok(booking)
    }
}
