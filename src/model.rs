use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::rows::RowError;

/// Store-local wall-clock instant. No time zone is ever attached.
pub type Stamp = NaiveDateTime;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: Stamp,
    pub end: Stamp,
}

impl Span {
    pub fn new(start: Stamp, end: Stamp) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    /// `None` unless `start < end`.
    pub fn checked(start: Stamp, end: Stamp) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains_span(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// One store. Every lookup is scoped to exactly one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The calendar being queried: a staff member or a physical resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum BookingTarget {
    Staff(Ulid),
    Resource(Ulid),
}

impl BookingTarget {
    /// Build a target from the two optional id columns. Exactly one must be set.
    pub fn from_columns(staff_id: Option<Ulid>, resource_id: Option<Ulid>) -> Option<Self> {
        match (staff_id, resource_id) {
            (Some(id), None) => Some(BookingTarget::Staff(id)),
            (None, Some(id)) => Some(BookingTarget::Resource(id)),
            _ => None,
        }
    }

    pub fn id(&self) -> Ulid {
        match self {
            BookingTarget::Staff(id) | BookingTarget::Resource(id) => *id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BookingTarget::Staff(_) => "staff",
            BookingTarget::Resource(_) => "resource",
        }
    }
}

impl fmt::Display for BookingTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    Rejected,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Rejected => "rejected",
        }
    }

    /// Only live bookings occupy time.
    pub fn is_live(&self) -> bool {
        !matches!(self, BookingStatus::Cancelled | BookingStatus::Rejected)
    }
}

impl FromStr for BookingStatus {
    type Err = RowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "completed" => Ok(BookingStatus::Completed),
            "cancelled" | "canceled" => Ok(BookingStatus::Cancelled),
            "rejected" => Ok(BookingStatus::Rejected),
            _ => Err(RowError::UnknownStatus(s.to_string())),
        }
    }
}

/// A booking as read from the data store. The engine never writes these
/// except through the booking desk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub tenant: TenantId,
    pub target: BookingTarget,
    pub span: Span,
    pub status: BookingStatus,
    pub label: Option<String>,
}

impl Booking {
    pub fn is_live(&self) -> bool {
        self.status.is_live()
    }
}

/// Recurring opening hours for one weekday (0 = Sunday).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayHours {
    pub weekday: u8,
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
    pub is_closed: bool,
}

/// Whole-day closure for one calendar date. Wins over `DayHours`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateClosure {
    pub date: NaiveDate,
    pub reason: Option<String>,
}

/// Time a target is unavailable for reasons other than a booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedTime {
    pub id: Ulid,
    pub target: BookingTarget,
    pub span: Span,
    pub reason: Option<String>,
}

/// Weekday index used by `DayHours`: 0 = Sunday … 6 = Saturday.
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

/// An occupied interval handed to the overlap predicate by a conflict source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Busy {
    pub id: Ulid,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    Booking,
    BlockedTime,
}

impl ConflictKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictKind::Booking => "booking",
            ConflictKind::BlockedTime => "blocked_time",
        }
    }
}

/// What blocks a requested range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRef {
    #[serde(rename = "type")]
    pub kind: ConflictKind,
    pub id: Ulid,
    pub start_at: Stamp,
    pub end_at: Stamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictReport {
    pub has_conflict: bool,
    pub conflicts: Vec<ConflictRef>,
}

impl From<Vec<ConflictRef>> for ConflictReport {
    fn from(conflicts: Vec<ConflictRef>) -> Self {
        Self {
            has_conflict: !conflicts.is_empty(),
            conflicts,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosureReason {
    WeekdayClosed,
    DateClosure,
}

impl ClosureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClosureReason::WeekdayClosed => "weekday_closed",
            ClosureReason::DateClosure => "date_closure",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ClosureReason::WeekdayClosed => "Store is closed on this day of the week",
            ClosureReason::DateClosure => "Store is closed on this date",
        }
    }
}

/// Effective opening window for one date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySchedule {
    pub date: NaiveDate,
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
    pub is_closed: bool,
    pub reason: Option<ClosureReason>,
}

impl DaySchedule {
    /// `date @ open .. date @ close`, or `None` when closed or the hours are empty.
    pub fn window(&self) -> Option<Span> {
        if self.is_closed {
            return None;
        }
        Span::checked(self.date.and_time(self.open_time), self.date.and_time(self.close_time))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub start: Stamp,
    pub end: Stamp,
    pub available: bool,
}

/// Result of slot generation for one target and date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotList {
    pub date: NaiveDate,
    pub target: BookingTarget,
    pub duration_minutes: u32,
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
    pub slots: Vec<Slot>,
    pub closure: Option<ClosureReason>,
}

impl SlotList {
    pub fn message(&self) -> Option<&'static str> {
        self.closure.map(|c| c.message())
    }
}

/// Response body of an availability query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AvailabilityResponse {
    Open {
        date: NaiveDate,
        target: BookingTarget,
        duration_minutes: u32,
        open_time: String,
        close_time: String,
        slots: Vec<Slot>,
    },
    Closed {
        slots: Vec<Slot>,
        message: String,
    },
}

impl From<SlotList> for AvailabilityResponse {
    fn from(list: SlotList) -> Self {
        match list.closure {
            Some(reason) => AvailabilityResponse::Closed {
                slots: Vec::new(),
                message: reason.message().to_string(),
            },
            None => AvailabilityResponse::Open {
                date: list.date,
                target: list.target,
                duration_minutes: list.duration_minutes,
                open_time: list.open_time.format("%H:%M").to_string(),
                close_time: list.close_time.format("%H:%M").to_string(),
                slots: list.slots,
            },
        }
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

    #[test]
    fn span_basics() {
        let s = Span::new(at(9, 0), at(9, 30));
        assert_eq!(s.duration(), Duration::minutes(30));
        assert!(Span::checked(at(9, 30), at(9, 30)).is_none());
        assert!(Span::checked(at(10, 0), at(9, 0)).is_none());
    }

    #[test]
    fn span_overlap() {
        let a = Span::new(at(9, 0), at(10, 0));
        let b = Span::new(at(9, 30), at(10, 30));
        let c = Span::new(at(10, 0), at(11, 0));
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c)); // adjacent, not overlapping
        assert!(!c.overlaps(&a));
    }

    #[test]
    fn span_contains_span() {
        let outer = Span::new(at(9, 0), at(18, 0));
        let inner = Span::new(at(17, 30), at(18, 0));
        let spill = Span::new(at(17, 45), at(18, 15));
        assert!(outer.contains_span(&inner));
        assert!(outer.contains_span(&outer));
        assert!(!outer.contains_span(&spill));
    }

    #[test]
    fn target_from_columns_requires_exactly_one() {
        let id = Ulid::new();
        assert_eq!(BookingTarget::from_columns(Some(id), None), Some(BookingTarget::Staff(id)));
        assert_eq!(BookingTarget::from_columns(None, Some(id)), Some(BookingTarget::Resource(id)));
        assert_eq!(BookingTarget::from_columns(Some(id), Some(id)), None);
        assert_eq!(BookingTarget::from_columns(None, None), None);
    }

    #[test]
    fn weekday_index_starts_on_sunday() {
        // 2026-03-15 is a Sunday
        assert_eq!(weekday_index(NaiveDate::from_ymd_opt(2026, 3, 15).unwrap()), 0);
        assert_eq!(weekday_index(NaiveDate::from_ymd_opt(2026, 3, 21).unwrap()), 6);
    }

    #[test]
    fn status_liveness() {
        assert!(BookingStatus::Pending.is_live());
        assert!(BookingStatus::Confirmed.is_live());
        assert!(BookingStatus::Completed.is_live());
        assert!(!BookingStatus::Cancelled.is_live());
        assert!(!BookingStatus::Rejected.is_live());
    }

    #[test]
    fn status_parse() {
        assert_eq!("CONFIRMED".parse::<BookingStatus>().unwrap(), BookingStatus::Confirmed);
        assert_eq!("canceled".parse::<BookingStatus>().unwrap(), BookingStatus::Cancelled);
        assert!(matches!(
            "archived".parse::<BookingStatus>(),
            Err(RowError::UnknownStatus(_))
        ));
    }

    #[test]
    fn closed_schedule_has_no_window() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        let six = NaiveTime::from_hms_opt(18, 0, 0).unwrap();
        let mut day = DaySchedule {
            date,
            open_time: nine,
            close_time: six,
            is_closed: false,
            reason: None,
        };
        assert_eq!(day.window(), Some(Span::new(at(9, 0), at(18, 0))));

        day.is_closed = true;
        day.reason = Some(ClosureReason::DateClosure);
        assert_eq!(day.window(), None);

        // Inverted hours yield an empty day, not a panic
        let inverted = DaySchedule {
            date,
            open_time: six,
            close_time: nine,
            is_closed: false,
            reason: None,
        };
        assert_eq!(inverted.window(), None);
    }

    #[test]
    fn closed_response_shape() {
        let list = SlotList {
            date: NaiveDate::from_ymd_opt(2026, 3, 15).unwrap(),
            target: BookingTarget::Staff(Ulid::new()),
            duration_minutes: 30,
            open_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            close_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            slots: Vec::new(),
            closure: Some(ClosureReason::DateClosure),
        };
        let json = serde_json::to_value(AvailabilityResponse::from(list)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "slots": [], "message": "Store is closed on this date" })
        );
    }

    #[test]
    fn open_response_shape() {
        let staff = Ulid::new();
        let list = SlotList {
            date: NaiveDate::from_ymd_opt(2026, 3, 15).unwrap(),
            target: BookingTarget::Staff(staff),
            duration_minutes: 30,
            open_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            close_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            slots: vec![Slot { start: at(9, 0), end: at(9, 30), available: true }],
            closure: None,
        };
        let json = serde_json::to_value(AvailabilityResponse::from(list)).unwrap();
        assert_eq!(json["date"], "2026-03-15");
        assert_eq!(json["target"]["type"], "staff");
        assert_eq!(json["target"]["id"], staff.to_string());
        assert_eq!(json["open_time"], "09:00");
        assert_eq!(json["close_time"], "18:00");
        assert_eq!(json["slots"][0]["start"], "2026-03-15T09:00:00");
        assert_eq!(json["slots"][0]["available"], true);
        assert!(json.get("message").is_none());
    }
}
