use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use ulid::Ulid;

use crate::engine::{BookingLedger, CalendarSource, ConflictSource, SourceError};
use crate::limits::{MAX_BLOCKED_PER_TARGET, MAX_BOOKINGS_PER_TARGET};
use crate::model::*;

/// Everything one tenant owns. Interval lists are kept sorted by start.
#[derive(Default)]
struct TenantData {
    day_hours: DashMap<u8, DayHours>,
    closures: DashMap<NaiveDate, DateClosure>,
    bookings: DashMap<BookingTarget, Vec<Booking>>,
    booking_targets: DashMap<Ulid, BookingTarget>,
    blocked: DashMap<BookingTarget, Vec<BlockedTime>>,
    blocked_targets: DashMap<Ulid, BookingTarget>,
}

/// Reference data store. Tenants never share a map, so a lookup scoped to
/// one tenant cannot see another tenant's rows.
pub struct InMemoryStore {
    tenants: DashMap<TenantId, Arc<TenantData>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn insert_sorted<T>(items: &mut Vec<T>, item: T, start: impl Fn(&T) -> Stamp) {
    let key = start(&item);
    let pos = items.partition_point(|i| start(i) <= key);
    items.insert(pos, item);
}

/// Items whose span may overlap `window`. Skips everything starting at or
/// after `window.end` by binary search.
fn overlapping<'a, T>(
    items: &'a [T],
    window: &'a Span,
    span: impl Fn(&T) -> Span + 'a,
) -> impl Iterator<Item = &'a T> + 'a {
    let right_bound = items.partition_point(|i| span(i).start < window.end);
    items[..right_bound]
        .iter()
        .filter(move |i| span(*i).end > window.start)
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tenants: DashMap::new(),
        }
    }

    // ── Tenants ──────────────────────────────────────────────

    /// Returns true if the tenant was not known before.
    pub fn register_tenant(&self, tenant: &TenantId) -> bool {
        if self.tenants.contains_key(tenant) {
            return false;
        }
        self.tenants.entry(tenant.clone()).or_default();
        true
    }

    pub fn contains_tenant(&self, tenant: &TenantId) -> bool {
        self.tenants.contains_key(tenant)
    }

    pub fn tenant_count(&self) -> usize {
        self.tenants.len()
    }

    fn data(&self, tenant: &TenantId) -> Option<Arc<TenantData>> {
        self.tenants.get(tenant).map(|e| e.value().clone())
    }

    fn data_mut(&self, tenant: &TenantId) -> Arc<TenantData> {
        self.tenants
            .entry(tenant.clone())
            .or_default()
            .value()
            .clone()
    }

    // ── Calendar ─────────────────────────────────────────────

    /// Insert or replace the hours for `hours.weekday`.
    pub fn set_day_hours(&self, tenant: &TenantId, hours: DayHours) -> Option<DayHours> {
        self.data_mut(tenant).day_hours.insert(hours.weekday, hours)
    }

    pub fn clear_day_hours(&self, tenant: &TenantId, weekday: u8) -> bool {
        self.data(tenant)
            .is_some_and(|d| d.day_hours.remove(&weekday).is_some())
    }

    pub fn day_hours_for(&self, tenant: &TenantId, weekday: u8) -> Option<DayHours> {
        let data = self.data(tenant)?;
        data.day_hours.get(&weekday).map(|e| e.value().clone())
    }

    pub fn add_closure(&self, tenant: &TenantId, closure: DateClosure) -> Option<DateClosure> {
        self.data_mut(tenant).closures.insert(closure.date, closure)
    }

    pub fn remove_closure(&self, tenant: &TenantId, date: NaiveDate) -> bool {
        self.data(tenant)
            .is_some_and(|d| d.closures.remove(&date).is_some())
    }

    pub fn closure_for(&self, tenant: &TenantId, date: NaiveDate) -> Option<DateClosure> {
        let data = self.data(tenant)?;
        data.closures.get(&date).map(|e| e.value().clone())
    }

    // ── Bookings ─────────────────────────────────────────────

    /// Insert, or replace the booking with the same id. A replacement may
    /// move the booking to another target. Returns true on replacement.
    pub fn insert_booking(&self, booking: Booking) -> Result<bool, SourceError> {
        let data = self.data_mut(&booking.tenant);
        let previous = data.booking_targets.get(&booking.id).map(|e| *e.value());

        if previous != Some(booking.target) {
            let len = data.bookings.get(&booking.target).map_or(0, |v| v.len());
            if len >= MAX_BOOKINGS_PER_TARGET {
                return Err(SourceError::Full("bookings per target"));
            }
        }
        if let Some(old) = previous
            && let Some(mut list) = data.bookings.get_mut(&old)
        {
            list.retain(|b| b.id != booking.id);
        }

        data.booking_targets.insert(booking.id, booking.target);
        let mut list = data.bookings.entry(booking.target).or_default();
        insert_sorted(list.value_mut(), booking, |b| b.span.start);
        Ok(previous.is_some())
    }

    pub fn get_booking(&self, tenant: &TenantId, id: Ulid) -> Option<Booking> {
        let data = self.data(tenant)?;
        let target = data.booking_targets.get(&id).map(|e| *e.value())?;
        let list = data.bookings.get(&target)?;
        list.iter().find(|b| b.id == id).cloned()
    }

    /// All bookings of the tenant, or of one target, ordered by start.
    pub fn list_bookings(&self, tenant: &TenantId, target: Option<BookingTarget>) -> Vec<Booking> {
        let Some(data) = self.data(tenant) else {
            return Vec::new();
        };
        let mut out: Vec<Booking> = match target {
            Some(t) => data.bookings.get(&t).map(|e| e.value().clone()).unwrap_or_default(),
            None => data
                .bookings
                .iter()
                .flat_map(|e| e.value().clone())
                .collect(),
        };
        out.sort_by_key(|b| (b.span.start, b.id));
        out
    }

    /// Live bookings of `target` that may overlap `window`.
    pub fn busy_bookings(&self, tenant: &TenantId, target: BookingTarget, window: &Span) -> Vec<Busy> {
        let Some(data) = self.data(tenant) else {
            return Vec::new();
        };
        let Some(list) = data.bookings.get(&target) else {
            return Vec::new();
        };
        overlapping(list.value(), window, |b: &Booking| b.span)
            .filter(|b| b.is_live())
            .map(|b| Busy { id: b.id, span: b.span })
            .collect()
    }

    // ── Blocked time ─────────────────────────────────────────

    /// Insert or replace by id.
    pub fn add_blocked(&self, tenant: &TenantId, blocked: BlockedTime) -> Result<(), SourceError> {
        let data = self.data_mut(tenant);
        let previous = data.blocked_targets.get(&blocked.id).map(|e| *e.value());

        if previous != Some(blocked.target) {
            let len = data.blocked.get(&blocked.target).map_or(0, |v| v.len());
            if len >= MAX_BLOCKED_PER_TARGET {
                return Err(SourceError::Full("blocked time per target"));
            }
        }
        if let Some(old) = previous
            && let Some(mut list) = data.blocked.get_mut(&old)
        {
            list.retain(|b| b.id != blocked.id);
        }

        data.blocked_targets.insert(blocked.id, blocked.target);
        let mut list = data.blocked.entry(blocked.target).or_default();
        insert_sorted(list.value_mut(), blocked, |b| b.span.start);
        Ok(())
    }

    pub fn remove_blocked(&self, tenant: &TenantId, id: Ulid) -> Option<BlockedTime> {
        let data = self.data(tenant)?;
        let (_, target) = data.blocked_targets.remove(&id)?;
        let mut list = data.blocked.get_mut(&target)?;
        let pos = list.iter().position(|b| b.id == id)?;
        Some(list.remove(pos))
    }

    pub fn busy_blocked(&self, tenant: &TenantId, target: BookingTarget, window: &Span) -> Vec<Busy> {
        let Some(data) = self.data(tenant) else {
            return Vec::new();
        };
        let Some(list) = data.blocked.get(&target) else {
            return Vec::new();
        };
        overlapping(list.value(), window, |b: &BlockedTime| b.span)
            .map(|b| Busy { id: b.id, span: b.span })
            .collect()
    }
}

#[async_trait]
impl CalendarSource for InMemoryStore {
    async fn day_hours(&self, tenant: &TenantId, weekday: u8) -> Result<Option<DayHours>, SourceError> {
        Ok(self.day_hours_for(tenant, weekday))
    }

    async fn date_closure(
        &self,
        tenant: &TenantId,
        date: NaiveDate,
    ) -> Result<Option<DateClosure>, SourceError> {
        Ok(self.closure_for(tenant, date))
    }
}

#[async_trait]
impl BookingLedger for InMemoryStore {
    async fn booking(&self, tenant: &TenantId, id: Ulid) -> Result<Option<Booking>, SourceError> {
        Ok(self.get_booking(tenant, id))
    }

    async fn put_booking(&self, booking: Booking) -> Result<(), SourceError> {
        self.insert_booking(booking).map(|_| ())
    }
}

/// Live bookings as a conflict source.
pub struct BookingConflicts(pub Arc<InMemoryStore>);

#[async_trait]
impl ConflictSource for BookingConflicts {
    fn kind(&self) -> ConflictKind {
        ConflictKind::Booking
    }

    async fn busy(
        &self,
        tenant: &TenantId,
        target: BookingTarget,
        window: &Span,
    ) -> Result<Vec<Busy>, SourceError> {
        Ok(self.0.busy_bookings(tenant, target, window))
    }
}

/// Blocked time as a conflict source.
pub struct BlockedTimeConflicts(pub Arc<InMemoryStore>);

#[async_trait]
impl ConflictSource for BlockedTimeConflicts {
    fn kind(&self) -> ConflictKind {
        ConflictKind::BlockedTime
    }

    async fn busy(
        &self,
        tenant: &TenantId,
        target: BookingTarget,
        window: &Span,
    ) -> Result<Vec<Busy>, SourceError> {
        Ok(self.0.busy_blocked(tenant, target, window))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(d: u32, h: u32, m: u32) -> Stamp {
        NaiveDate::from_ymd_opt(2026, 3, d)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn booking(tenant: &TenantId, target: BookingTarget, start: Stamp, end: Stamp) -> Booking {
        Booking {
            id: Ulid::new(),
            tenant: tenant.clone(),
            target,
            span: Span::new(start, end),
            status: BookingStatus::Confirmed,
            label: None,
        }
    }

    #[test]
    fn tenants_are_isolated() {
        let store = InMemoryStore::new();
        let a = TenantId::new("a");
        let b = TenantId::new("b");
        let staff = BookingTarget::Staff(Ulid::new());
        let window = Span::new(at(15, 0, 0), at(16, 0, 0));

        store.insert_booking(booking(&a, staff, at(15, 9, 0), at(15, 10, 0))).unwrap();
        store.add_closure(&a, DateClosure { date: NaiveDate::from_ymd_opt(2026, 3, 15).unwrap(), reason: None });

        assert_eq!(store.busy_bookings(&a, staff, &window).len(), 1);
        assert!(store.busy_bookings(&b, staff, &window).is_empty());
        assert!(store.closure_for(&b, NaiveDate::from_ymd_opt(2026, 3, 15).unwrap()).is_none());
        assert!(store.list_bookings(&b, None).is_empty());
    }

    #[test]
    fn register_tenant_reports_new() {
        let store = InMemoryStore::new();
        let t = TenantId::new("salon");
        assert!(store.register_tenant(&t));
        assert!(!store.register_tenant(&t));
        assert_eq!(store.tenant_count(), 1);
    }

    #[test]
    fn busy_bookings_prefilters_and_skips_dead() {
        let store = InMemoryStore::new();
        let t = TenantId::new("t");
        let staff = BookingTarget::Staff(Ulid::new());
        store.insert_booking(booking(&t, staff, at(15, 8, 0), at(15, 9, 0))).unwrap();
        store.insert_booking(booking(&t, staff, at(15, 9, 30), at(15, 10, 30))).unwrap();
        store.insert_booking(booking(&t, staff, at(15, 11, 0), at(15, 12, 0))).unwrap();
        let mut cancelled = booking(&t, staff, at(15, 10, 0), at(15, 11, 0));
        cancelled.status = BookingStatus::Cancelled;
        store.insert_booking(cancelled).unwrap();

        let hits = store.busy_bookings(&t, staff, &Span::new(at(15, 9, 0), at(15, 11, 0)));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].span.start, at(15, 9, 30));
    }

    #[test]
    fn replacing_booking_moves_it_between_targets() {
        let store = InMemoryStore::new();
        let t = TenantId::new("t");
        let alice = BookingTarget::Staff(Ulid::new());
        let bob = BookingTarget::Staff(Ulid::new());
        let original = booking(&t, alice, at(15, 9, 0), at(15, 10, 0));
        assert!(!store.insert_booking(original.clone()).unwrap());

        let moved = Booking { target: bob, ..original.clone() };
        assert!(store.insert_booking(moved).unwrap());

        assert!(store.list_bookings(&t, Some(alice)).is_empty());
        assert_eq!(store.list_bookings(&t, Some(bob)).len(), 1);
        assert_eq!(store.get_booking(&t, original.id).unwrap().target, bob);
    }

    #[test]
    fn list_bookings_is_ordered() {
        let store = InMemoryStore::new();
        let t = TenantId::new("t");
        let staff = BookingTarget::Staff(Ulid::new());
        let room = BookingTarget::Resource(Ulid::new());
        store.insert_booking(booking(&t, staff, at(15, 14, 0), at(15, 15, 0))).unwrap();
        store.insert_booking(booking(&t, room, at(15, 9, 0), at(15, 10, 0))).unwrap();
        store.insert_booking(booking(&t, staff, at(15, 11, 0), at(15, 12, 0))).unwrap();

        let all = store.list_bookings(&t, None);
        let starts: Vec<_> = all.iter().map(|b| b.span.start).collect();
        assert_eq!(starts, vec![at(15, 9, 0), at(15, 11, 0), at(15, 14, 0)]);
    }

    #[test]
    fn blocked_time_add_and_remove() {
        let store = InMemoryStore::new();
        let t = TenantId::new("t");
        let room = BookingTarget::Resource(Ulid::new());
        let blocked = BlockedTime {
            id: Ulid::new(),
            target: room,
            span: Span::new(at(15, 12, 0), at(15, 13, 0)),
            reason: Some("cleaning".into()),
        };
        store.add_blocked(&t, blocked.clone()).unwrap();
        let window = Span::new(at(15, 9, 0), at(15, 18, 0));
        assert_eq!(store.busy_blocked(&t, room, &window).len(), 1);

        assert_eq!(store.remove_blocked(&t, blocked.id), Some(blocked.clone()));
        assert!(store.busy_blocked(&t, room, &window).is_empty());
        assert_eq!(store.remove_blocked(&t, blocked.id), None);
    }

    #[test]
    fn day_hours_set_and_clear() {
        let store = InMemoryStore::new();
        let t = TenantId::new("t");
        let hours = DayHours {
            weekday: 0,
            open_time: chrono::NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            close_time: chrono::NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
            is_closed: false,
        };
        assert!(store.set_day_hours(&t, hours.clone()).is_none());
        assert_eq!(store.day_hours_for(&t, 0), Some(hours));
        assert!(store.clear_day_hours(&t, 0));
        assert!(!store.clear_day_hours(&t, 0));
        assert_eq!(store.day_hours_for(&t, 0), None);
    }

    #[test]
    fn booking_cap_per_target() {
        let store = InMemoryStore::new();
        let t = TenantId::new("t");
        let staff = BookingTarget::Staff(Ulid::new());
        let base = at(1, 0, 0);
        for i in 0..MAX_BOOKINGS_PER_TARGET as i64 {
            let start = base + chrono::Duration::minutes(i);
            store
                .insert_booking(booking(&t, staff, start, start + chrono::Duration::minutes(1)))
                .unwrap();
        }
        let extra = booking(&t, staff, at(20, 9, 0), at(20, 10, 0));
        assert!(matches!(store.insert_booking(extra), Err(SourceError::Full(_))));

        // Replacing an existing booking on a full target is still allowed
        let mut existing = store.list_bookings(&t, Some(staff)).remove(0);
        existing.status = BookingStatus::Cancelled;
        assert!(store.insert_booking(existing).unwrap());
    }
}
