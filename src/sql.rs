use sqlparser::ast::{self, Expr, FromTable, ObjectNamePart, SetExpr, Statement, TableFactor, TableObject, Value, ValueWithSpan};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use thiserror::Error;
use ulid::Ulid;

use chrono::NaiveDate;

use crate::model::*;
use crate::rows::{self, BlockedTimeRow, BookingRow, ClosureRow, DayHoursRow, RowError};

/// Filters shared by `slots` and `availability`.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotQuery {
    pub target: BookingTarget,
    pub date: NaiveDate,
    pub duration_minutes: Option<i64>,
    pub exclude_booking_id: Option<Ulid>,
}

/// Parsed command from SQL input. Inserted rows stay untyped here and are
/// converted at execution, where the tenant is known.
#[derive(Debug, PartialEq)]
pub enum Command {
    InsertDayHours(Vec<DayHoursRow>),
    DeleteDayHours {
        weekday: u8,
    },
    InsertClosures(Vec<ClosureRow>),
    DeleteClosure {
        date: NaiveDate,
    },
    InsertBookings(Vec<BookingRow>),
    CancelBooking {
        id: Ulid,
    },
    InsertBlockedTime(Vec<BlockedTimeRow>),
    DeleteBlockedTime {
        id: Ulid,
    },
    SelectSlots(SlotQuery),
    SelectAvailability(SlotQuery),
    SelectConflicts {
        target: BookingTarget,
        start_at: Stamp,
        end_at: Stamp,
        exclude_booking_id: Option<Ulid>,
    },
    SelectSchedule {
        date: NaiveDate,
    },
    SelectBookings {
        target: Option<BookingTarget>,
    },
}

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    let Some(first) = stmts.first() else {
        return Err(SqlError::Empty);
    };

    match first {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

/// Table a SELECT reads from, without looking at its filters. Describes
/// prepared statements whose parameters are not bound yet.
pub fn select_table(sql: &str) -> Option<String> {
    let stmts = Parser::parse_sql(&PostgreSqlDialect {}, sql).ok()?;
    let Statement::Query(query) = stmts.first()? else {
        return None;
    };
    let SetExpr::Select(select) = query.body.as_ref() else {
        return None;
    };
    table_factor_name(&select.from.first()?.relation).ok()
}

// ── INSERT ────────────────────────────────────────────────────

const DAY_HOURS_COLUMNS: &[&str] = &["weekday", "open_time", "close_time", "is_closed"];
const CLOSURE_COLUMNS: &[&str] = &["date", "reason"];
const BOOKING_COLUMNS: &[&str] = &["id", "staff_id", "resource_id", "start_at", "end_at", "status", "label"];
const BLOCKED_COLUMNS: &[&str] = &["id", "staff_id", "resource_id", "start_at", "end_at", "reason"];

/// One VALUES row, keyed by column name. NULL is stored as `None`.
struct Record {
    table: &'static str,
    fields: Vec<(String, Option<String>)>,
}

impl Record {
    fn optional(&self, column: &'static str) -> Option<String> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .and_then(|(_, v)| v.clone())
    }

    fn required(&self, column: &'static str) -> Result<String, SqlError> {
        self.optional(column)
            .ok_or(SqlError::MissingColumn(self.table, column))
    }
}

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    let (table, allowed): (&'static str, &[&str]) = match table.as_str() {
        "day_hours" => ("day_hours", DAY_HOURS_COLUMNS),
        "closures" => ("closures", CLOSURE_COLUMNS),
        "bookings" => ("bookings", BOOKING_COLUMNS),
        "blocked_time" => ("blocked_time", BLOCKED_COLUMNS),
        _ => return Err(SqlError::UnknownTable(table)),
    };

    let columns: Vec<String> = if insert.columns.is_empty() {
        allowed.iter().map(|c| c.to_string()).collect()
    } else {
        insert.columns.iter().map(|c| c.value.to_lowercase()).collect()
    };
    if let Some(bad) = columns.iter().find(|c| !allowed.contains(&c.as_str())) {
        return Err(SqlError::UnknownColumn(table, bad.clone()));
    }

    let mut records = Vec::new();
    for (i, row) in extract_all_insert_rows(insert)?.iter().enumerate() {
        if row.len() > columns.len() {
            return Err(SqlError::WrongArity(table, columns.len(), row.len()));
        }
        let fields = columns
            .iter()
            .zip(row)
            .map(|(col, expr)| Ok((col.clone(), literal_text(expr)?)))
            .collect::<Result<Vec<_>, SqlError>>()
            .map_err(|e| SqlError::Parse(format!("row {i}: {e}")))?;
        records.push(Record { table, fields });
    }

    match table {
        "day_hours" => records
            .iter()
            .map(|r| {
                Ok(DayHoursRow {
                    weekday: parse_int("weekday", &r.required("weekday")?)?,
                    open_time: r.required("open_time")?,
                    close_time: r.required("close_time")?,
                    is_closed: r
                        .optional("is_closed")
                        .map(|v| parse_flag("is_closed", &v))
                        .transpose()?
                        .unwrap_or(false),
                })
            })
            .collect::<Result<_, SqlError>>()
            .map(Command::InsertDayHours),
        "closures" => records
            .iter()
            .map(|r| {
                Ok(ClosureRow {
                    date: r.required("date")?,
                    reason: r.optional("reason"),
                })
            })
            .collect::<Result<_, SqlError>>()
            .map(Command::InsertClosures),
        "bookings" => records
            .iter()
            .map(|r| {
                Ok(BookingRow {
                    id: r.required("id")?,
                    staff_id: r.optional("staff_id"),
                    resource_id: r.optional("resource_id"),
                    start_at: r.required("start_at")?,
                    end_at: r.required("end_at")?,
                    status: r.optional("status"),
                    label: r.optional("label"),
                })
            })
            .collect::<Result<_, SqlError>>()
            .map(Command::InsertBookings),
        _ => records
            .iter()
            .map(|r| {
                Ok(BlockedTimeRow {
                    id: r.required("id")?,
                    staff_id: r.optional("staff_id"),
                    resource_id: r.optional("resource_id"),
                    start_at: r.required("start_at")?,
                    end_at: r.required("end_at")?,
                    reason: r.optional("reason"),
                })
            })
            .collect::<Result<_, SqlError>>()
            .map(Command::InsertBlockedTime),
    }
}

// ── DELETE ────────────────────────────────────────────────────

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = delete_table_name(delete)?;
    let filters = Filters::from_selection(delete.selection.as_ref())?;

    match table.as_str() {
        "day_hours" => {
            let weekday = parse_int("weekday", &filters.required("weekday")?)?;
            let weekday = u8::try_from(weekday)
                .ok()
                .filter(|w| *w <= 6)
                .ok_or(RowError::Weekday(weekday))?;
            Ok(Command::DeleteDayHours { weekday })
        }
        "closures" => Ok(Command::DeleteClosure {
            date: rows::parse_date("date", &filters.required("date")?)?,
        }),
        "bookings" => Ok(Command::CancelBooking {
            id: rows::parse_ulid("id", &filters.required("id")?)?,
        }),
        "blocked_time" => Ok(Command::DeleteBlockedTime {
            id: rows::parse_ulid("id", &filters.required("id")?)?,
        }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

// ── SELECT ────────────────────────────────────────────────────

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };

    let Some(from) = select.from.first() else {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    };
    let table = table_factor_name(&from.relation)?;
    let filters = Filters::from_selection(select.selection.as_ref())?;

    match table.as_str() {
        "slots" => Ok(Command::SelectSlots(slot_query(&filters)?)),
        "availability" => Ok(Command::SelectAvailability(slot_query(&filters)?)),
        "conflicts" => Ok(Command::SelectConflicts {
            target: filters.target()?.ok_or(SqlError::MissingFilter("staff_id or resource_id"))?,
            start_at: rows::parse_stamp("start_at", &filters.required("start_at")?)?,
            end_at: rows::parse_stamp("end_at", &filters.required("end_at")?)?,
            exclude_booking_id: filters.exclude_booking_id()?,
        }),
        "schedule" => Ok(Command::SelectSchedule {
            date: rows::parse_date("date", &filters.required("date")?)?,
        }),
        "bookings" => Ok(Command::SelectBookings {
            target: filters.target()?,
        }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn slot_query(filters: &Filters) -> Result<SlotQuery, SqlError> {
    Ok(SlotQuery {
        target: filters.target()?.ok_or(SqlError::MissingFilter("staff_id or resource_id"))?,
        date: rows::parse_date("date", &filters.required("date")?)?,
        duration_minutes: filters
            .optional("duration_minutes")
            .map(|v| parse_int("duration_minutes", &v))
            .transpose()?,
        exclude_booking_id: filters.exclude_booking_id()?,
    })
}

/// `column = literal` terms of a WHERE clause joined by AND.
#[derive(Debug, Default)]
struct Filters(Vec<(String, Option<String>)>);

impl Filters {
    fn from_selection(selection: Option<&Expr>) -> Result<Self, SqlError> {
        let mut filters = Filters::default();
        if let Some(expr) = selection {
            filters.collect(expr)?;
        }
        Ok(filters)
    }

    fn collect(&mut self, expr: &Expr) -> Result<(), SqlError> {
        match expr {
            Expr::Nested(inner) => self.collect(inner),
            Expr::BinaryOp {
                left,
                op: ast::BinaryOperator::And,
                right,
            } => {
                self.collect(left)?;
                self.collect(right)
            }
            Expr::BinaryOp {
                left,
                op: ast::BinaryOperator::Eq,
                right,
            } => {
                let col = expr_column_name(left)
                    .ok_or_else(|| SqlError::Unsupported(format!("filter on {left}")))?;
                if self.0.iter().any(|(c, _)| *c == col) {
                    return Err(SqlError::DuplicateFilter(col));
                }
                self.0.push((col, literal_text(right)?));
                Ok(())
            }
            other => Err(SqlError::Unsupported(format!("WHERE {other}"))),
        }
    }

    fn optional(&self, column: &'static str) -> Option<String> {
        self.0
            .iter()
            .find(|(name, _)| name == column)
            .and_then(|(_, v)| v.clone())
    }

    fn required(&self, column: &'static str) -> Result<String, SqlError> {
        self.optional(column).ok_or(SqlError::MissingFilter(column))
    }

    /// `None` when neither id column is filtered; an error when both are.
    fn target(&self) -> Result<Option<BookingTarget>, SqlError> {
        let staff = self
            .optional("staff_id")
            .map(|s| rows::parse_ulid("staff_id", &s))
            .transpose()?;
        let resource = self
            .optional("resource_id")
            .map(|s| rows::parse_ulid("resource_id", &s))
            .transpose()?;
        match (staff, resource) {
            (None, None) => Ok(None),
            (s, r) => BookingTarget::from_columns(s, r)
                .map(Some)
                .ok_or(SqlError::Row(RowError::AmbiguousTarget)),
        }
    }

    fn exclude_booking_id(&self) -> Result<Option<Ulid>, SqlError> {
        Ok(self
            .optional("exclude_booking_id")
            .map(|s| rows::parse_ulid("exclude_booking_id", &s))
            .transpose()?)
    }
}

// ── Helpers ───────────────────────────────────────────────────

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn delete_table_name(delete: &ast::Delete) -> Result<String, SqlError> {
    let tables_with_joins = match &delete.from {
        FromTable::WithFromKeyword(t) | FromTable::WithoutKeyword(t) => t,
    };
    match tables_with_joins.first() {
        Some(first) => table_factor_name(&first.relation),
        None => Err(SqlError::Parse("DELETE without table".into())),
    }
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

fn extract_all_insert_rows(insert: &ast::Insert) -> Result<Vec<Vec<Expr>>, SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) => {
            if values.rows.is_empty() {
                return Err(SqlError::Parse("empty VALUES".into()));
            }
            Ok(values.rows.clone())
        }
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        _ => None,
    }
}

/// A literal as text, `None` for NULL. Every typed parse happens in `rows`.
fn literal_text(expr: &Expr) -> Result<Option<String>, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Null => Ok(None),
            Value::SingleQuotedString(s) | Value::Number(s, _) => Ok(Some(s.clone())),
            Value::Boolean(b) => Ok(Some(b.to_string())),
            _ => Err(SqlError::Parse(format!("expected literal, got {value:?}"))),
        }
    } else if let Expr::UnaryOp {
        op: ast::UnaryOperator::Minus,
        expr,
    } = expr
    {
        Ok(literal_text(expr)?.map(|s| format!("-{s}")))
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr}")))
    }
}

fn parse_int(column: &'static str, s: &str) -> Result<i64, SqlError> {
    s.trim().parse().map_err(|_| {
        SqlError::Row(RowError::Invalid {
            column,
            value: s.to_string(),
        })
    })
}

fn parse_flag(column: &'static str, s: &str) -> Result<bool, SqlError> {
    match s.to_lowercase().as_str() {
        "true" | "t" | "1" => Ok(true),
        "false" | "f" | "0" => Ok(false),
        _ => Err(SqlError::Row(RowError::Invalid {
            column,
            value: s.to_string(),
        })),
    }
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SqlError {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("empty query")]
    Empty,
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("unknown table: {0}")]
    UnknownTable(String),
    #[error("{0}: unknown column {1}")]
    UnknownColumn(&'static str, String),
    #[error("{0}: expected at most {1} values, got {2}")]
    WrongArity(&'static str, usize, usize),
    #[error("{0}: missing column {1}")]
    MissingColumn(&'static str, &'static str),
    #[error("missing filter: {0}")]
    MissingFilter(&'static str),
    #[error("duplicate filter: {0}")]
    DuplicateFilter(String),
    #[error(transparent)]
    Row(#[from] RowError),
}

impl SqlError {
    /// Whether the statement was well-formed but its values were not.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SqlError::Row(_) | SqlError::MissingFilter(_) | SqlError::MissingColumn(..) | SqlError::DuplicateFilter(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "01ARZ3NDEKTSV4RRFFQ69G5FAV";

    #[test]
    fn parse_insert_day_hours() {
        let sql = "INSERT INTO day_hours (weekday, open_time, close_time) VALUES (1, '10:00', '16:30')";
        let cmd = parse_sql(sql).unwrap();
        match cmd {
            Command::InsertDayHours(rows) => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].weekday, 1);
                assert_eq!(rows[0].open_time, "10:00");
                assert_eq!(rows[0].close_time, "16:30");
                assert!(!rows[0].is_closed);
            }
            _ => panic!("expected InsertDayHours, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_day_hours_closed_flag() {
        let sql = "INSERT INTO day_hours (weekday, open_time, close_time, is_closed) VALUES (0, '09:00', '18:00', true)";
        let cmd = parse_sql(sql).unwrap();
        match cmd {
            Command::InsertDayHours(rows) => assert!(rows[0].is_closed),
            _ => panic!("expected InsertDayHours, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_without_column_list_uses_table_order() {
        let sql = "INSERT INTO closures VALUES ('2026-03-15', 'inventory')";
        let cmd = parse_sql(sql).unwrap();
        assert_eq!(
            cmd,
            Command::InsertClosures(vec![ClosureRow {
                date: "2026-03-15".into(),
                reason: Some("inventory".into()),
            }])
        );
    }

    #[test]
    fn parse_insert_booking_by_column_name() {
        let sql = format!(
            "INSERT INTO bookings (start_at, end_at, id, staff_id) VALUES ('2026-03-15 09:00', '2026-03-15 09:30', '{ID}', '{ID}')"
        );
        let cmd = parse_sql(&sql).unwrap();
        match cmd {
            Command::InsertBookings(rows) => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].id, ID);
                assert_eq!(rows[0].staff_id.as_deref(), Some(ID));
                assert_eq!(rows[0].resource_id, None);
                assert_eq!(rows[0].start_at, "2026-03-15 09:00");
                assert_eq!(rows[0].status, None);
            }
            _ => panic!("expected InsertBookings, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_multi_row_insert() {
        let sql = format!(
            "INSERT INTO blocked_time (id, resource_id, start_at, end_at) VALUES \
             ('{ID}', '{ID}', '2026-03-15 12:00', '2026-03-15 13:00'), \
             ('{ID}', '{ID}', '2026-03-16 12:00', '2026-03-16 13:00')"
        );
        match parse_sql(&sql).unwrap() {
            Command::InsertBlockedTime(rows) => {
                assert_eq!(rows.len(), 2);
                assert_eq!(rows[1].start_at, "2026-03-16 12:00");
            }
            other => panic!("expected InsertBlockedTime, got {other:?}"),
        }
    }

    #[test]
    fn parse_insert_null_becomes_none() {
        let sql = format!(
            "INSERT INTO bookings (id, staff_id, resource_id, start_at, end_at) VALUES ('{ID}', '{ID}', NULL, '2026-03-15 09:00', '2026-03-15 09:30')"
        );
        match parse_sql(&sql).unwrap() {
            Command::InsertBookings(rows) => assert_eq!(rows[0].resource_id, None),
            other => panic!("expected InsertBookings, got {other:?}"),
        }
    }

    #[test]
    fn parse_insert_unknown_column_errors() {
        let sql = "INSERT INTO closures (date, colour) VALUES ('2026-03-15', 'red')";
        assert!(matches!(parse_sql(sql), Err(SqlError::UnknownColumn("closures", _))));
    }

    #[test]
    fn parse_insert_missing_column_errors() {
        let sql = "INSERT INTO day_hours (weekday, open_time) VALUES (1, '09:00')";
        let err = parse_sql(sql).unwrap_err();
        assert!(matches!(err, SqlError::MissingColumn("day_hours", "close_time")));
        assert!(err.is_validation());
    }

    #[test]
    fn parse_delete_day_hours() {
        let cmd = parse_sql("DELETE FROM day_hours WHERE weekday = 3").unwrap();
        assert_eq!(cmd, Command::DeleteDayHours { weekday: 3 });
        assert!(matches!(
            parse_sql("DELETE FROM day_hours WHERE weekday = 7"),
            Err(SqlError::Row(RowError::Weekday(7)))
        ));
    }

    #[test]
    fn parse_delete_booking_cancels() {
        let cmd = parse_sql(&format!("DELETE FROM bookings WHERE id = '{ID}'")).unwrap();
        assert_eq!(
            cmd,
            Command::CancelBooking {
                id: Ulid::from_string(ID).unwrap()
            }
        );
    }

    #[test]
    fn parse_delete_without_filter_errors() {
        assert!(matches!(
            parse_sql("DELETE FROM closures"),
            Err(SqlError::MissingFilter("date"))
        ));
    }

    #[test]
    fn parse_select_slots() {
        let sql = format!(
            "SELECT * FROM slots WHERE staff_id = '{ID}' AND date = '2026-03-15' AND duration_minutes = 60"
        );
        match parse_sql(&sql).unwrap() {
            Command::SelectSlots(q) => {
                assert_eq!(q.target, BookingTarget::Staff(Ulid::from_string(ID).unwrap()));
                assert_eq!(q.date, NaiveDate::from_ymd_opt(2026, 3, 15).unwrap());
                assert_eq!(q.duration_minutes, Some(60));
                assert_eq!(q.exclude_booking_id, None);
            }
            other => panic!("expected SelectSlots, got {other:?}"),
        }
    }

    #[test]
    fn parse_select_availability_with_exclusion() {
        let sql = format!(
            "SELECT * FROM availability WHERE resource_id = '{ID}' AND date = '2026-03-15' AND exclude_booking_id = '{ID}'"
        );
        match parse_sql(&sql).unwrap() {
            Command::SelectAvailability(q) => {
                assert!(matches!(q.target, BookingTarget::Resource(_)));
                assert_eq!(q.duration_minutes, None);
                assert_eq!(q.exclude_booking_id, Some(Ulid::from_string(ID).unwrap()));
            }
            other => panic!("expected SelectAvailability, got {other:?}"),
        }
    }

    #[test]
    fn parse_select_slots_requires_one_target() {
        let neither = "SELECT * FROM slots WHERE date = '2026-03-15'";
        assert!(matches!(parse_sql(neither), Err(SqlError::MissingFilter(_))));

        let both = format!(
            "SELECT * FROM slots WHERE staff_id = '{ID}' AND resource_id = '{ID}' AND date = '2026-03-15'"
        );
        assert!(matches!(
            parse_sql(&both),
            Err(SqlError::Row(RowError::AmbiguousTarget))
        ));
    }

    #[test]
    fn parse_select_slots_rejects_loose_date() {
        let sql = format!("SELECT * FROM slots WHERE staff_id = '{ID}' AND date = '2026-3-15'");
        let err = parse_sql(&sql).unwrap_err();
        assert!(matches!(err, SqlError::Row(RowError::Invalid { column: "date", .. })));
        assert!(err.is_validation());
    }

    #[test]
    fn parse_select_conflicts() {
        let sql = format!(
            "SELECT * FROM conflicts WHERE staff_id = '{ID}' AND start_at = '2026-03-15 09:00' AND end_at = '2026-03-15T10:00:00'"
        );
        match parse_sql(&sql).unwrap() {
            Command::SelectConflicts { start_at, end_at, .. } => {
                assert_eq!(end_at - start_at, chrono::Duration::hours(1));
            }
            other => panic!("expected SelectConflicts, got {other:?}"),
        }
    }

    #[test]
    fn parse_select_schedule_and_bookings() {
        assert!(matches!(
            parse_sql("SELECT * FROM schedule WHERE date = '2026-03-15'").unwrap(),
            Command::SelectSchedule { .. }
        ));
        assert_eq!(
            parse_sql("SELECT * FROM bookings").unwrap(),
            Command::SelectBookings { target: None }
        );
    }

    #[test]
    fn parse_range_filter_unsupported() {
        let sql = format!("SELECT * FROM slots WHERE staff_id = '{ID}' AND date >= '2026-03-15'");
        assert!(matches!(parse_sql(&sql), Err(SqlError::Unsupported(_))));
    }

    #[test]
    fn parse_duplicate_filter_errors() {
        let sql = "SELECT * FROM schedule WHERE date = '2026-03-15' AND date = '2026-03-16'";
        assert!(matches!(parse_sql(sql), Err(SqlError::DuplicateFilter(_))));
    }

    #[test]
    fn parse_unknown_table_errors() {
        let sql = format!("INSERT INTO foobar (id) VALUES ('{ID}')");
        assert!(matches!(parse_sql(&sql), Err(SqlError::UnknownTable(_))));
    }

    #[test]
    fn select_table_ignores_placeholders() {
        assert_eq!(
            select_table("SELECT * FROM slots WHERE staff_id = $1 AND date = $2").as_deref(),
            Some("slots")
        );
        assert_eq!(select_table("DELETE FROM bookings WHERE id = $1"), None);
    }

    #[test]
    fn parse_empty_errors() {
        assert!(matches!(parse_sql(""), Err(SqlError::Empty)));
    }
}
