//! Loosely-typed rows as they arrive from outside the engine (SQL values,
//! seed files) and their fallible conversion into the typed model.
//!
//! Nothing untyped gets past this module: a row that does not fit its
//! record shape is rejected here, before it can reach the overlap predicate.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;
use thiserror::Error;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    #[error("bad {column}: {value:?}")]
    Invalid { column: &'static str, value: String },
    #[error("unknown booking status: {0}")]
    UnknownStatus(String),
    #[error("exactly one of staff_id or resource_id must be set")]
    AmbiguousTarget,
    #[error("start_at must be before end_at")]
    EmptySpan,
    #[error("weekday {0} out of range 0..=6")]
    Weekday(i64),
    #[error("close_time must be after open_time on an open day")]
    InvertedHours,
    #[error("{0} too long")]
    TooLong(&'static str),
}

fn invalid(column: &'static str, value: &str) -> RowError {
    RowError::Invalid {
        column,
        value: value.to_string(),
    }
}

pub fn parse_ulid(column: &'static str, s: &str) -> Result<Ulid, RowError> {
    Ulid::from_string(s.trim()).map_err(|_| invalid(column, s))
}

fn parse_optional_ulid(column: &'static str, s: Option<&str>) -> Result<Option<Ulid>, RowError> {
    s.map(|s| parse_ulid(column, s)).transpose()
}

/// `YYYY-MM-DD`, nothing else.
pub fn parse_date(column: &'static str, s: &str) -> Result<NaiveDate, RowError> {
    let shaped = s.len() == 10
        && s.bytes().enumerate().all(|(i, b)| match i {
            4 | 7 => b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !shaped {
        return Err(invalid(column, s));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| invalid(column, s))
}

/// `HH:MM` or `HH:MM:SS`.
pub fn parse_time(column: &'static str, s: &str) -> Result<NaiveTime, RowError> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| invalid(column, s))
}

/// `YYYY-MM-DD HH:MM[:SS]`, with either a space or `T` separator.
pub fn parse_stamp(column: &'static str, s: &str) -> Result<Stamp, RowError> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s.trim(), f).ok())
        .ok_or_else(|| invalid(column, s))
}

fn parse_target(staff_id: Option<&str>, resource_id: Option<&str>) -> Result<BookingTarget, RowError> {
    let staff = parse_optional_ulid("staff_id", staff_id)?;
    let resource = parse_optional_ulid("resource_id", resource_id)?;
    BookingTarget::from_columns(staff, resource).ok_or(RowError::AmbiguousTarget)
}

fn parse_span(start_at: &str, end_at: &str) -> Result<Span, RowError> {
    let start = parse_stamp("start_at", start_at)?;
    let end = parse_stamp("end_at", end_at)?;
    Span::checked(start, end).ok_or(RowError::EmptySpan)
}

fn check_text(column: &'static str, text: &Option<String>) -> Result<(), RowError> {
    match text {
        Some(t) if t.len() > MAX_LABEL_LEN => Err(RowError::TooLong(column)),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BookingRow {
    pub id: String,
    pub staff_id: Option<String>,
    pub resource_id: Option<String>,
    pub start_at: String,
    pub end_at: String,
    pub status: Option<String>,
    pub label: Option<String>,
}

impl BookingRow {
    /// Validate the row and bind it to `tenant`. A missing status means confirmed.
    pub fn into_booking(self, tenant: &TenantId) -> Result<Booking, RowError> {
        check_text("label", &self.label)?;
        let status = match self.status.as_deref() {
            Some(s) => s.parse()?,
            None => BookingStatus::Confirmed,
        };
        Ok(Booking {
            id: parse_ulid("id", &self.id)?,
            tenant: tenant.clone(),
            target: parse_target(self.staff_id.as_deref(), self.resource_id.as_deref())?,
            span: parse_span(&self.start_at, &self.end_at)?,
            status,
            label: self.label,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DayHoursRow {
    pub weekday: i64,
    pub open_time: String,
    pub close_time: String,
    #[serde(default)]
    pub is_closed: bool,
}

impl TryFrom<DayHoursRow> for DayHours {
    type Error = RowError;

    fn try_from(row: DayHoursRow) -> Result<Self, Self::Error> {
        if !(0..=6).contains(&row.weekday) {
            return Err(RowError::Weekday(row.weekday));
        }
        let open_time = parse_time("open_time", &row.open_time)?;
        let close_time = parse_time("close_time", &row.close_time)?;
        if !row.is_closed && close_time <= open_time {
            return Err(RowError::InvertedHours);
        }
        Ok(DayHours {
            weekday: row.weekday as u8,
            open_time,
            close_time,
            is_closed: row.is_closed,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ClosureRow {
    pub date: String,
    pub reason: Option<String>,
}

impl TryFrom<ClosureRow> for DateClosure {
    type Error = RowError;

    fn try_from(row: ClosureRow) -> Result<Self, Self::Error> {
        check_text("reason", &row.reason)?;
        Ok(DateClosure {
            date: parse_date("date", &row.date)?,
            reason: row.reason,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BlockedTimeRow {
    pub id: String,
    pub staff_id: Option<String>,
    pub resource_id: Option<String>,
    pub start_at: String,
    pub end_at: String,
    pub reason: Option<String>,
}

impl TryFrom<BlockedTimeRow> for BlockedTime {
    type Error = RowError;

    fn try_from(row: BlockedTimeRow) -> Result<Self, Self::Error> {
        check_text("reason", &row.reason)?;
        Ok(BlockedTime {
            id: parse_ulid("id", &row.id)?,
            target: parse_target(row.staff_id.as_deref(), row.resource_id.as_deref())?,
            span: parse_span(&row.start_at, &row.end_at)?,
            reason: row.reason,
        })
    }
}
