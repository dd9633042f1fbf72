//! Startup seed for the reference store.
//!
//! ```json
//! { "tenants": { "salon": {
//!     "day_hours": [{ "weekday": 0, "open_time": "10:00", "close_time": "16:00" }],
//!     "closures":  [{ "date": "2026-12-25", "reason": "holiday" }],
//!     "bookings":  [{ "id": "01…", "staff_id": "01…", "start_at": "2026-03-15 10:00", "end_at": "2026-03-15 10:30" }],
//!     "blocked_time": []
//! } } }
//! ```
//!
//! Rows go through the same typed boundary as SQL input. Seeded bookings
//! are loaded as-is, without conflict checks.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::engine::SourceError;
use crate::model::*;
use crate::rows::{BlockedTimeRow, BookingRow, ClosureRow, DayHoursRow, RowError};
use crate::store::InMemoryStore;
use crate::tenant::{TenantError, TenantRegistry};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("reading seed file: {0}")]
    Io(#[from] std::io::Error),
    #[error("parsing seed file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("tenant {tenant}: {source}")]
    Tenant { tenant: String, source: TenantError },
    #[error("tenant {tenant}, {table} row {index}: {source}")]
    Row {
        tenant: String,
        table: &'static str,
        index: usize,
        source: RowError,
    },
    #[error("tenant {tenant}: {source}")]
    Store { tenant: String, source: SourceError },
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedFile {
    #[serde(default)]
    pub tenants: BTreeMap<String, TenantSeed>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TenantSeed {
    #[serde(default)]
    pub day_hours: Vec<DayHoursRow>,
    #[serde(default)]
    pub closures: Vec<ClosureRow>,
    #[serde(default)]
    pub bookings: Vec<BookingRow>,
    #[serde(default)]
    pub blocked_time: Vec<BlockedTimeRow>,
}

/// Counts of what was loaded, for the startup log.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub tenants: usize,
    pub day_hours: usize,
    pub closures: usize,
    pub bookings: usize,
    pub blocked_time: usize,
}

pub fn load_seed(path: &Path) -> Result<SeedFile, SeedError> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Validate every row of every tenant, then write them into the store.
/// Nothing is written if any row is malformed.
pub fn apply_seed(
    seed: SeedFile,
    tenants: &TenantRegistry,
    store: &InMemoryStore,
) -> Result<SeedSummary, SeedError> {
    let mut staged = Vec::with_capacity(seed.tenants.len());
    for (name, data) in seed.tenants {
        let tenant = tenants.resolve(&name).map_err(|source| SeedError::Tenant {
            tenant: name.clone(),
            source,
        })?;
        let row_err = |table: &'static str| {
            let tenant = name.clone();
            move |(index, source): (usize, RowError)| SeedError::Row {
                tenant: tenant.clone(),
                table,
                index,
                source,
            }
        };

        let day_hours = convert(data.day_hours, DayHours::try_from).map_err(row_err("day_hours"))?;
        let closures = convert(data.closures, DateClosure::try_from).map_err(row_err("closures"))?;
        let bookings = convert(data.bookings, |r| r.into_booking(&tenant)).map_err(row_err("bookings"))?;
        let blocked = convert(data.blocked_time, BlockedTime::try_from).map_err(row_err("blocked_time"))?;
        staged.push((tenant, day_hours, closures, bookings, blocked));
    }

    let mut summary = SeedSummary::default();
    for (tenant, day_hours, closures, bookings, blocked) in staged {
        summary.tenants += 1;
        summary.day_hours += day_hours.len();
        summary.closures += closures.len();
        summary.bookings += bookings.len();
        summary.blocked_time += blocked.len();

        for hours in day_hours {
            store.set_day_hours(&tenant, hours);
        }
        for closure in closures {
            store.add_closure(&tenant, closure);
        }
        let store_err = |source| SeedError::Store {
            tenant: tenant.to_string(),
            source,
        };
        for booking in bookings {
            store.insert_booking(booking).map_err(store_err)?;
        }
        for b in blocked {
            store.add_blocked(&tenant, b).map_err(store_err)?;
        }
    }
    Ok(summary)
}

fn convert<R, T>(
    rows: Vec<R>,
    f: impl Fn(R) -> Result<T, RowError>,
) -> Result<Vec<T>, (usize, RowError)> {
    rows.into_iter()
        .enumerate()
        .map(|(i, r)| f(r).map_err(|e| (i, e)))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;
    use ulid::Ulid;

    use super::*;

    const STAFF: &str = "01ARZ3NDEKTSV4RRFFQ69G5FAV";
    const BOOKING: &str = "01BX5ZZKBKACTAV9WEVGEMMVRZ";

    fn setup() -> (Arc<InMemoryStore>, TenantRegistry) {
        let store = Arc::new(InMemoryStore::new());
        let registry = TenantRegistry::new(store.clone());
        (store, registry)
    }

    #[test]
    fn seed_loads_all_tables() {
        let json = format!(
            r#"{{ "tenants": {{ "salon": {{
                "day_hours": [{{ "weekday": 0, "open_time": "10:00", "close_time": "16:00" }}],
                "closures": [{{ "date": "2026-12-25", "reason": "holiday" }}],
                "bookings": [{{ "id": "{BOOKING}", "staff_id": "{STAFF}",
                                "start_at": "2026-03-15 10:00", "end_at": "2026-03-15 10:30" }}]
            }} }} }}"#
        );
        let seed: SeedFile = serde_json::from_str(&json).unwrap();
        let (store, registry) = setup();
        let summary = apply_seed(seed, &registry, &store).unwrap();
        assert_eq!(
            summary,
            SeedSummary {
                tenants: 1,
                day_hours: 1,
                closures: 1,
                bookings: 1,
                blocked_time: 0
            }
        );

        let t = TenantId::new("salon");
        assert!(store.day_hours_for(&t, 0).is_some());
        assert!(store
            .closure_for(&t, NaiveDate::from_ymd_opt(2026, 12, 25).unwrap())
            .is_some());
        let booking = store
            .get_booking(&t, Ulid::from_string(BOOKING).unwrap())
            .unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);
    }

    #[test]
    fn bad_row_writes_nothing() {
        let json = r#"{ "tenants": {
            "a": { "closures": [{ "date": "2026-12-25" }] },
            "b": { "day_hours": [{ "weekday": 9, "open_time": "10:00", "close_time": "16:00" }] }
        } }"#;
        let seed: SeedFile = serde_json::from_str(json).unwrap();
        let (store, registry) = setup();
        let err = apply_seed(seed, &registry, &store).unwrap_err();
        match err {
            SeedError::Row { tenant, table, index, source } => {
                assert_eq!(tenant, "b");
                assert_eq!(table, "day_hours");
                assert_eq!(index, 0);
                assert_eq!(source, RowError::Weekday(9));
            }
            other => panic!("expected Row error, got {other:?}"),
        }
        assert!(store
            .closure_for(&TenantId::new("a"), NaiveDate::from_ymd_opt(2026, 12, 25).unwrap())
            .is_none());
    }

    #[test]
    fn bad_tenant_name_rejected() {
        let seed: SeedFile = serde_json::from_str(r#"{ "tenants": { "no spaces": {} } }"#).unwrap();
        let (store, registry) = setup();
        assert!(matches!(
            apply_seed(seed, &registry, &store),
            Err(SeedError::Tenant { .. })
        ));
    }

    #[test]
    fn unknown_keys_rejected() {
        let result: Result<SeedFile, _> =
            serde_json::from_str(r#"{ "tenants": { "a": { "holidays": [] } } }"#);
        assert!(result.is_err());
    }
}
