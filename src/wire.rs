use std::fmt::Debug;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::stream;
use futures::Sink;
use pgwire::api::auth::cleartext::CleartextPasswordAuthStartupHandler;
use pgwire::api::auth::{DefaultServerParameterProvider, StartupHandler};
use pgwire::api::copy::CopyHandler;
use pgwire::api::portal::{Format, Portal};
use pgwire::api::query::{ExtendedQueryHandler, SimpleQueryHandler};
use pgwire::api::results::{
    DataRowEncoder, DescribePortalResponse, DescribeStatementResponse, FieldFormat, FieldInfo,
    QueryResponse, Response, Tag,
};
use pgwire::api::stmt::{QueryParser, StoredStatement};
use pgwire::api::store::PortalStore;
use pgwire::api::{ClientInfo, ClientPortalStore, NoopHandler, PgWireServerHandlers, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::PgWireBackendMessage;
use pgwire::tokio::TlsAcceptor;
use tokio::net::TcpStream;

use crate::app::AppState;
use crate::auth::SlotwiseAuthSource;
use crate::engine::{EngineError, SourceError};
use crate::model::*;
use crate::rows::RowError;
use crate::sql::{self, Command, SlotQuery, SqlError};
use crate::tenant::TenantError;

pub struct SlotwiseHandler {
    state: AppState,
    query_parser: Arc<SlotwiseQueryParser>,
}

impl SlotwiseHandler {
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            query_parser: Arc::new(SlotwiseQueryParser),
        }
    }

    fn resolve_tenant<C: ClientInfo>(&self, client: &C) -> PgWireResult<TenantId> {
        let db = client
            .metadata()
            .get("database")
            .cloned()
            .unwrap_or_else(|| "default".to_string());
        self.state.tenants.resolve(&db).map_err(tenant_err)
    }

    /// Execute with query metrics recorded.
    async fn run(&self, tenant: &TenantId, cmd: Command) -> PgWireResult<Response> {
        let label = crate::observability::command_label(&cmd);
        let started = Instant::now();
        let result = self.execute_command(tenant, cmd).await;
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(crate::observability::QUERIES_TOTAL, "command" => label, "status" => status)
            .increment(1);
        metrics::histogram!(crate::observability::QUERY_DURATION_SECONDS, "command" => label)
            .record(started.elapsed().as_secs_f64());
        result
    }

    async fn execute_command(&self, tenant: &TenantId, cmd: Command) -> PgWireResult<Response> {
        let state = &self.state;
        match cmd {
            Command::InsertDayHours(rows) => {
                let hours = convert_rows(rows, DayHours::try_from)?;
                let count = hours.len();
                for h in hours {
                    state.store.set_day_hours(tenant, h);
                }
                Ok(Response::Execution(Tag::new("INSERT").with_rows(count)))
            }
            Command::DeleteDayHours { weekday } => {
                let removed = state.store.clear_day_hours(tenant, weekday);
                Ok(Response::Execution(Tag::new("DELETE").with_rows(usize::from(removed))))
            }
            Command::InsertClosures(rows) => {
                let closures = convert_rows(rows, DateClosure::try_from)?;
                let count = closures.len();
                for c in closures {
                    state.store.add_closure(tenant, c);
                }
                Ok(Response::Execution(Tag::new("INSERT").with_rows(count)))
            }
            Command::DeleteClosure { date } => {
                let removed = state.store.remove_closure(tenant, date);
                Ok(Response::Execution(Tag::new("DELETE").with_rows(usize::from(removed))))
            }
            Command::InsertBookings(rows) => {
                let bookings = convert_rows(rows, |r| r.into_booking(tenant))?;
                let count = bookings.len();
                for booking in bookings {
                    state.desk.place(booking).await.map_err(engine_err)?;
                }
                Ok(Response::Execution(Tag::new("INSERT").with_rows(count)))
            }
            Command::CancelBooking { id } => {
                let cancelled = match state.desk.cancel(tenant, id).await {
                    Ok(_) => 1,
                    Err(EngineError::NotFound(_)) => 0,
                    Err(e) => return Err(engine_err(e)),
                };
                Ok(Response::Execution(Tag::new("DELETE").with_rows(cancelled)))
            }
            Command::InsertBlockedTime(rows) => {
                let blocked = convert_rows(rows, BlockedTime::try_from)?;
                let count = blocked.len();
                for b in blocked {
                    state
                        .store
                        .add_blocked(tenant, b)
                        .map_err(|e| engine_err(EngineError::Source(e)))?;
                }
                Ok(Response::Execution(Tag::new("INSERT").with_rows(count)))
            }
            Command::DeleteBlockedTime { id } => {
                let removed = state.store.remove_blocked(tenant, id).is_some();
                Ok(Response::Execution(Tag::new("DELETE").with_rows(usize::from(removed))))
            }
            Command::SelectSlots(q) => {
                let list = self.slot_list(tenant, &q).await?;
                let schema = Arc::new(slots_schema());
                let rows: Vec<PgWireResult<_>> = list
                    .slots
                    .into_iter()
                    .map(|slot| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&stamp_text(slot.start))?;
                        encoder.encode_field(&stamp_text(slot.end))?;
                        encoder.encode_field(&slot.available)?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(Response::Query(QueryResponse::new(schema, stream::iter(rows))))
            }
            Command::SelectAvailability(q) => {
                let list = self.slot_list(tenant, &q).await?;
                let body = serde_json::to_string(&AvailabilityResponse::from(list)).map_err(|e| {
                    user_error("XX000", format!("encoding availability: {e}"))
                })?;
                let schema = Arc::new(availability_schema());
                let mut encoder = DataRowEncoder::new(schema.clone());
                encoder.encode_field(&body)?;
                let rows: Vec<PgWireResult<_>> = vec![Ok(encoder.take_row())];
                Ok(Response::Query(QueryResponse::new(schema, stream::iter(rows))))
            }
            Command::SelectConflicts {
                target,
                start_at,
                end_at,
                exclude_booking_id,
            } => {
                let report = state
                    .engine
                    .check_conflicts(tenant, target, start_at, end_at, exclude_booking_id)
                    .await
                    .map_err(engine_err)?;
                let schema = Arc::new(conflicts_schema());
                let rows: Vec<PgWireResult<_>> = report
                    .conflicts
                    .into_iter()
                    .map(|c| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&c.kind.as_str().to_string())?;
                        encoder.encode_field(&c.id.to_string())?;
                        encoder.encode_field(&stamp_text(c.start_at))?;
                        encoder.encode_field(&stamp_text(c.end_at))?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(Response::Query(QueryResponse::new(schema, stream::iter(rows))))
            }
            Command::SelectSchedule { date } => {
                let day = state.engine.resolve_day(tenant, date).await.map_err(engine_err)?;
                let schema = Arc::new(schedule_schema());
                let mut encoder = DataRowEncoder::new(schema.clone());
                encoder.encode_field(&day.date.format("%Y-%m-%d").to_string())?;
                encoder.encode_field(&day.open_time.format("%H:%M").to_string())?;
                encoder.encode_field(&day.close_time.format("%H:%M").to_string())?;
                encoder.encode_field(&day.is_closed)?;
                encoder.encode_field(&day.reason.map(|r| r.as_str().to_string()))?;
                let rows: Vec<PgWireResult<_>> = vec![Ok(encoder.take_row())];
                Ok(Response::Query(QueryResponse::new(schema, stream::iter(rows))))
            }
            Command::SelectBookings { target } => {
                let bookings = state.store.list_bookings(tenant, target);
                let schema = Arc::new(bookings_schema());
                let rows: Vec<PgWireResult<_>> = bookings
                    .into_iter()
                    .map(|b| {
                        let (staff_id, resource_id) = match b.target {
                            BookingTarget::Staff(id) => (Some(id.to_string()), None),
                            BookingTarget::Resource(id) => (None, Some(id.to_string())),
                        };
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&b.id.to_string())?;
                        encoder.encode_field(&staff_id)?;
                        encoder.encode_field(&resource_id)?;
                        encoder.encode_field(&stamp_text(b.span.start))?;
                        encoder.encode_field(&stamp_text(b.span.end))?;
                        encoder.encode_field(&b.status.as_str().to_string())?;
                        encoder.encode_field(&b.label)?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(Response::Query(QueryResponse::new(schema, stream::iter(rows))))
            }
        }
    }

    async fn slot_list(&self, tenant: &TenantId, q: &SlotQuery) -> PgWireResult<SlotList> {
        self.state
            .engine
            .generate_slots(tenant, q.target, q.date, q.duration_minutes, q.exclude_booking_id)
            .await
            .map_err(engine_err)
    }
}

fn stamp_text(s: Stamp) -> String {
    s.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn convert_rows<R, T>(rows: Vec<R>, f: impl Fn(R) -> Result<T, RowError>) -> PgWireResult<Vec<T>> {
    rows.into_iter()
        .enumerate()
        .map(|(i, r)| f(r).map_err(|e| user_error("22023", format!("row {i}: {e}"))))
        .collect()
}

// ── Result schemas ───────────────────────────────────────────────

fn text_field(name: &str) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, Type::VARCHAR, FieldFormat::Text)
}

fn bool_field(name: &str) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, Type::BOOL, FieldFormat::Text)
}

fn slots_schema() -> Vec<FieldInfo> {
    vec![text_field("start"), text_field("end"), bool_field("available")]
}

fn availability_schema() -> Vec<FieldInfo> {
    vec![text_field("availability")]
}

fn conflicts_schema() -> Vec<FieldInfo> {
    vec![
        text_field("type"),
        text_field("id"),
        text_field("start_at"),
        text_field("end_at"),
    ]
}

fn schedule_schema() -> Vec<FieldInfo> {
    vec![
        text_field("date"),
        text_field("open_time"),
        text_field("close_time"),
        bool_field("is_closed"),
        text_field("reason"),
    ]
}

fn bookings_schema() -> Vec<FieldInfo> {
    vec![
        text_field("id"),
        text_field("staff_id"),
        text_field("resource_id"),
        text_field("start_at"),
        text_field("end_at"),
        text_field("status"),
        text_field("label"),
    ]
}

/// Result columns for a statement, empty for anything that is not a SELECT.
fn result_schema(sql: &str) -> Vec<FieldInfo> {
    match sql::select_table(sql).as_deref() {
        Some("slots") => slots_schema(),
        Some("availability") => availability_schema(),
        Some("conflicts") => conflicts_schema(),
        Some("schedule") => schedule_schema(),
        Some("bookings") => bookings_schema(),
        _ => vec![],
    }
}

#[async_trait]
impl SimpleQueryHandler for SlotwiseHandler {
    async fn do_query<C>(
        &self,
        client: &mut C,
        query: &str,
    ) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let tenant = self.resolve_tenant(client)?;
        let cmd = sql::parse_sql(query).map_err(sql_err)?;
        Ok(vec![self.run(&tenant, cmd).await?])
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct SlotwiseQueryParser;

#[async_trait]
impl QueryParser for SlotwiseQueryParser {
    type Statement = String;

    async fn parse_sql<C>(
        &self,
        _client: &C,
        sql: &str,
        _types: &[Option<Type>],
    ) -> PgWireResult<String>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        Ok(sql.to_string())
    }

    fn get_parameter_types(&self, stmt: &String) -> PgWireResult<Vec<Type>> {
        Ok(vec![Type::VARCHAR; count_params(stmt)])
    }

    fn get_result_schema(
        &self,
        stmt: &String,
        _column_format: Option<&Format>,
    ) -> PgWireResult<Vec<FieldInfo>> {
        Ok(result_schema(stmt))
    }
}

#[async_trait]
impl ExtendedQueryHandler for SlotwiseHandler {
    type Statement = String;
    type QueryParser = SlotwiseQueryParser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.query_parser.clone()
    }

    async fn do_query<C>(
        &self,
        client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let tenant = self.resolve_tenant(client)?;
        let sql = substitute_params(portal);
        let cmd = sql::parse_sql(&sql).map_err(sql_err)?;
        self.run(&tenant, cmd).await
    }

    async fn do_describe_statement<C>(
        &self,
        _client: &mut C,
        target: &StoredStatement<Self::Statement>,
    ) -> PgWireResult<DescribeStatementResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let param_types = vec![Type::VARCHAR; count_params(&target.statement)];
        Ok(DescribeStatementResponse::new(
            param_types,
            result_schema(&target.statement),
        ))
    }

    async fn do_describe_portal<C>(
        &self,
        _client: &mut C,
        target: &Portal<Self::Statement>,
    ) -> PgWireResult<DescribePortalResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(DescribePortalResponse::new(result_schema(
            &target.statement.statement,
        )))
    }
}

/// Count the highest $N parameter placeholder in the SQL string.
fn count_params(sql: &str) -> usize {
    let mut max = 0usize;
    let bytes = sql.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' {
            i += 1;
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i > start
                && let Ok(n) = sql[start..i].parse::<usize>()
            {
                max = max.max(n);
            }
        } else {
            i += 1;
        }
    }
    max
}

/// Substitute $1, $2, ... placeholders with bound parameter values (text format).
/// Replaced from the highest index down so `$1` never clobbers `$10`.
fn substitute_params(portal: &Portal<String>) -> String {
    let mut result = portal.statement.statement.to_string();
    for (i, param) in portal.parameters.iter().enumerate().rev() {
        let placeholder = format!("${}", i + 1);
        let value = match param {
            Some(bytes) => {
                let text = String::from_utf8_lossy(bytes);
                format!("'{}'", text.replace('\'', "''"))
            }
            None => "NULL".to_string(),
        };
        result = result.replace(&placeholder, &value);
    }
    result
}

// ── Factory ──────────────────────────────────────────────────────

pub struct SlotwiseFactory {
    handler: Arc<SlotwiseHandler>,
    auth_handler:
        Arc<CleartextPasswordAuthStartupHandler<SlotwiseAuthSource, DefaultServerParameterProvider>>,
    noop: Arc<NoopHandler>,
}

impl SlotwiseFactory {
    pub fn new(state: AppState, password: String) -> Self {
        let auth_source = SlotwiseAuthSource::new(password);
        let param_provider = DefaultServerParameterProvider::default();
        Self {
            handler: Arc::new(SlotwiseHandler::new(state)),
            auth_handler: Arc::new(CleartextPasswordAuthStartupHandler::new(
                auth_source,
                param_provider,
            )),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for SlotwiseFactory {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.handler.clone()
    }

    fn extended_query_handler(&self) -> Arc<impl ExtendedQueryHandler> {
        self.handler.clone()
    }

    fn startup_handler(&self) -> Arc<impl StartupHandler> {
        self.auth_handler.clone()
    }

    fn copy_handler(&self) -> Arc<impl CopyHandler> {
        self.noop.clone()
    }
}

/// Serve one client connection until it closes.
pub async fn process_connection(
    socket: TcpStream,
    state: AppState,
    password: String,
    tls: Option<TlsAcceptor>,
) -> std::io::Result<()> {
    let factory = Arc::new(SlotwiseFactory::new(state, password));
    pgwire::tokio::process_socket(socket, tls, factory).await
}

// ── Error mapping ────────────────────────────────────────────────

fn user_error(code: &str, message: String) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new("ERROR".into(), code.into(), message)))
}

/// SQLSTATE for an engine failure.
fn engine_code(e: &EngineError) -> &'static str {
    match e {
        EngineError::Validation(_) => "22023",
        EngineError::Conflict(_) => "23P01",
        EngineError::NotFound(_) => "P0002",
        EngineError::LimitExceeded(_) | EngineError::Source(SourceError::Full(_)) => "54000",
        EngineError::Source(_) => "58000",
    }
}

fn engine_err(e: EngineError) -> PgWireError {
    user_error(engine_code(&e), e.to_string())
}

fn sql_code(e: &SqlError) -> &'static str {
    match e {
        SqlError::UnknownTable(_) => "42P01",
        e if e.is_validation() => "22023",
        _ => "42601",
    }
}

fn sql_err(e: SqlError) -> PgWireError {
    user_error(sql_code(&e), e.to_string())
}

fn tenant_err(e: TenantError) -> PgWireError {
    tracing::warn!("tenant rejected: {e}");
    metrics::counter!(crate::observability::TENANT_REJECTIONS_TOTAL).increment(1);
    user_error("3D000", format!("tenant error: {e}"))
}
