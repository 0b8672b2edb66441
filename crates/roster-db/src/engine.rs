//! # Execution Engine
//!
//! Runs translated statements against SQLite and materializes the rows
//! as entities, DTOs or scalars.
//!
//! ## Execution Paths
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       QueryEngine                                       │
//! │                                                                         │
//! │  QueryDescriptor ──► translate() ──► TranslatedQuery                    │
//! │                                            │                            │
//! │        ┌───────────────┬──────────────┬────┴─────────┬──────────────┐   │
//! │        ▼               ▼              ▼              ▼              ▼   │
//! │   fetch_all       fetch_page     fetch_slice    fetch_locked   execute_ │
//! │   fetch_one       data + count   size + 1 rows  lock, then     update   │
//! │        │               │              │         data on the     │       │
//! │        ▼               ▼              ▼         caller's tx     ▼       │
//! │   QueryCache (cacheable descriptors only)            invalidate cache   │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   Record ──► FromRecord ──► Member / MemberDto / String / i64           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Round Trips
//! Every statement sent to SQLite bumps [`EngineStats::statements`]. A fetch
//! join answers "members with their teams" in one statement; lazily
//! resolving each team would cost one more per member.
//!
//! ## Cache
//! Results of descriptors built with `.cacheable()` are kept per
//! `(sql, params)`. Any write through the engine clears the whole cache.
//! A result whose query overlapped a clear is returned but not stored.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use roster_core::query::{DtoShape, Field, LockMode, Projection, ValueType, Window};
use roster_core::translator::{self, Statement};
use roster_core::{
    CoreError, Member, MemberDto, MemberRow, Page, QueryDescriptor, Slice, Team, TeamRef, Value,
};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteQueryResult, SqliteRow};
use sqlx::{Row, Sqlite, SqliteConnection, SqliteExecutor, SqlitePool};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{is_busy, DbError, DbResult};

// =============================================================================
// Records
// =============================================================================

/// One decoded result row, in statement column order.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    values: Vec<Value>,
}

impl Record {
    /// Decodes a row using the declared type of each result column.
    fn decode(row: &SqliteRow, columns: &[Field]) -> DbResult<Self> {
        let values = columns
            .iter()
            .enumerate()
            .map(|(idx, field)| {
                let value = match field.value_type() {
                    ValueType::Integer => Value::from(row.try_get::<Option<i64>, _>(idx)?),
                    ValueType::Text => Value::from(row.try_get::<Option<String>, _>(idx)?),
                    ValueType::Timestamp => {
                        Value::from(row.try_get::<Option<DateTime<Utc>>, _>(idx)?)
                    }
                };
                Ok(value)
            })
            .collect::<DbResult<Vec<_>>>()?;

        Ok(Record { values })
    }

    fn get(&self, columns: &[Field], field: Field) -> DbResult<&Value> {
        columns
            .iter()
            .position(|c| *c == field)
            .and_then(|idx| self.values.get(idx))
            .ok_or_else(|| DbError::Internal(format!("column {} not selected", field.qualified())))
    }

    fn opt_integer(&self, columns: &[Field], field: Field) -> DbResult<Option<i64>> {
        match self.get(columns, field)? {
            Value::Null => Ok(None),
            Value::Integer(v) => Ok(Some(*v)),
            other => Err(unexpected(field, other)),
        }
    }

    fn integer(&self, columns: &[Field], field: Field) -> DbResult<i64> {
        self.opt_integer(columns, field)?
            .ok_or_else(|| unexpected(field, &Value::Null))
    }

    fn opt_text(&self, columns: &[Field], field: Field) -> DbResult<Option<String>> {
        match self.get(columns, field)? {
            Value::Null => Ok(None),
            Value::Text(v) => Ok(Some(v.clone())),
            other => Err(unexpected(field, other)),
        }
    }

    fn text(&self, columns: &[Field], field: Field) -> DbResult<String> {
        self.opt_text(columns, field)?
            .ok_or_else(|| unexpected(field, &Value::Null))
    }

    fn timestamp(&self, columns: &[Field], field: Field) -> DbResult<DateTime<Utc>> {
        match self.get(columns, field)? {
            Value::Timestamp(v) => Ok(*v),
            other => Err(unexpected(field, other)),
        }
    }
}

fn unexpected(field: Field, value: &Value) -> DbError {
    DbError::Internal(format!(
        "unexpected value {value:?} in column {}",
        field.qualified()
    ))
}

// =============================================================================
// Materialization
// =============================================================================

/// A result type the engine can build from a [`Record`].
pub trait FromRecord: Sized {
    /// Whether rows of `projection` can become `Self`.
    fn accepts(projection: &Projection) -> bool;

    /// Builds one value. `read_only` applies to entities only.
    fn from_record(columns: &[Field], record: &Record, read_only: bool) -> DbResult<Self>;
}

/// Entities. The team is `Loaded` when the statement fetch-joined it,
/// otherwise only its id is known.
impl FromRecord for Member {
    fn accepts(projection: &Projection) -> bool {
        matches!(projection, Projection::Entity)
    }

    fn from_record(columns: &[Field], record: &Record, read_only: bool) -> DbResult<Self> {
        let age = record.integer(columns, Field::Age)?;
        let row = MemberRow {
            id: record.integer(columns, Field::MemberId)?,
            username: record.text(columns, Field::Username)?,
            age: i32::try_from(age)
                .map_err(|_| DbError::Internal(format!("age {age} out of range")))?,
            team_id: record.opt_integer(columns, Field::TeamId)?,
            version: record.integer(columns, Field::Version)?,
            created_at: record.timestamp(columns, Field::CreatedAt)?,
            updated_at: record.timestamp(columns, Field::UpdatedAt)?,
        };

        let team = match row.team_id {
            None => TeamRef::None,
            Some(id) if !columns.contains(&Field::TeamKey) => TeamRef::Reference { id },
            Some(_) => TeamRef::Loaded(Team::restore(
                record.integer(columns, Field::TeamKey)?,
                record.text(columns, Field::TeamName)?,
            )?),
        };

        Ok(Member::restore(row, team, read_only)?)
    }
}

impl FromRecord for MemberDto {
    fn accepts(projection: &Projection) -> bool {
        matches!(projection, Projection::Dto { shape, .. } if *shape == DtoShape::MEMBER_DTO)
    }

    fn from_record(columns: &[Field], record: &Record, _read_only: bool) -> DbResult<Self> {
        Ok(MemberDto {
            id: record.integer(columns, Field::MemberId)?,
            username: record.text(columns, Field::Username)?,
            team_name: record.opt_text(columns, Field::TeamName)?,
        })
    }
}

impl FromRecord for String {
    fn accepts(projection: &Projection) -> bool {
        matches!(projection, Projection::Scalar(f) if f.value_type() == ValueType::Text)
    }

    fn from_record(columns: &[Field], record: &Record, _read_only: bool) -> DbResult<Self> {
        match columns.first() {
            Some(field) => record.text(columns, *field),
            None => Err(DbError::Internal("scalar query selected no column".into())),
        }
    }
}

impl FromRecord for i64 {
    fn accepts(projection: &Projection) -> bool {
        matches!(projection, Projection::Scalar(f) if f.value_type() == ValueType::Integer)
    }

    fn from_record(columns: &[Field], record: &Record, _read_only: bool) -> DbResult<Self> {
        match columns.first() {
            Some(field) => record.integer(columns, *field),
            None => Err(DbError::Internal("scalar query selected no column".into())),
        }
    }
}

/// Raw rows, for any projection.
impl FromRecord for Record {
    fn accepts(_projection: &Projection) -> bool {
        true
    }

    fn from_record(_columns: &[Field], record: &Record, _read_only: bool) -> DbResult<Self> {
        Ok(record.clone())
    }
}

fn materialize<T: FromRecord>(
    descriptor: &QueryDescriptor,
    statement: &Statement,
    records: &[Record],
) -> DbResult<Vec<T>> {
    records
        .iter()
        .map(|r| T::from_record(&statement.columns, r, descriptor.is_read_only()))
        .collect()
}

// =============================================================================
// Cache and statistics
// =============================================================================

#[derive(Debug)]
struct QueryCache {
    capacity: usize,
    entries: RwLock<HashMap<String, Arc<Vec<Record>>>>,
    /// Bumped on every clear; results read under an older generation are not stored.
    generation: AtomicU64,
}

impl QueryCache {
    fn new(capacity: usize) -> Self {
        QueryCache {
            capacity,
            entries: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn key(statement: &Statement) -> String {
        format!("{}|{:?}", statement.sql, statement.params)
    }

    async fn get(&self, key: &str) -> Option<Arc<Vec<Record>>> {
        self.entries.read().await.get(key).cloned()
    }

    /// Stores `records` read under `generation`. Returns false when a clear
    /// happened since, in which case nothing is stored.
    async fn put(&self, key: String, records: Vec<Record>, generation: u64) -> bool {
        if self.capacity == 0 {
            return false;
        }
        let mut entries = self.entries.write().await;
        if self.generation.load(Ordering::Acquire) != generation {
            return false;
        }
        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            entries.clear();
        }
        entries.insert(key, Arc::new(records));
        true
    }

    async fn clear(&self) -> usize {
        let mut entries = self.entries.write().await;
        self.generation.fetch_add(1, Ordering::AcqRel);
        let evicted = entries.len();
        entries.clear();
        evicted
    }
}

#[derive(Debug, Default)]
struct Counters {
    statements: AtomicU64,
    cache_hits: AtomicU64,
}

/// Snapshot of engine activity since creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Statements sent to SQLite (round trips).
    pub statements: u64,
    /// Queries answered from the cache without touching SQLite.
    pub cache_hits: u64,
}

// =============================================================================
// Engine
// =============================================================================

/// Executes descriptors and raw statements.
///
/// Cheap to clone: clones share the pool, the cache and the counters.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    pool: SqlitePool,
    cache: Arc<QueryCache>,
    counters: Arc<Counters>,
    lock_timeout: Duration,
}

impl QueryEngine {
    /// Creates an engine over `pool`. A `cache_capacity` of 0 disables caching.
    pub fn new(pool: SqlitePool, lock_timeout: Duration, cache_capacity: usize) -> Self {
        QueryEngine {
            pool,
            cache: Arc::new(QueryCache::new(cache_capacity)),
            counters: Arc::new(Counters::default()),
            lock_timeout,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Configured wait bound for pessimistic locks.
    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            statements: self.counters.statements.load(Ordering::Relaxed),
            cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
        }
    }

    /// Runs an unwindowed, unlocked select and returns every row.
    ///
    /// ## Errors
    /// * `DbError::Core` - wrong projection for `T`, windowed or locked
    ///   descriptor, empty `IN` list
    pub async fn fetch_all<T: FromRecord>(&self, descriptor: &QueryDescriptor) -> DbResult<Vec<T>> {
        check_select::<T>(descriptor)?;
        if descriptor.window() != &Window::All {
            return Err(invalid(descriptor, "is windowed; use fetch_page or fetch_slice"));
        }
        if descriptor.lock() != LockMode::None {
            return Err(invalid(descriptor, "is locked; use fetch_locked in a transaction"));
        }

        let translated = translator::translate(descriptor)?;
        let records = self.cached_records(descriptor, &translated.data).await?;
        materialize(descriptor, &translated.data, &records)
    }

    /// Runs a select expected to match at most one row.
    ///
    /// ## Returns
    /// * `Ok(None)` - no row matched
    /// * `Err(DbError::AmbiguousResult)` - more than one row matched
    pub async fn fetch_one<T: FromRecord>(
        &self,
        descriptor: &QueryDescriptor,
    ) -> DbResult<Option<T>> {
        let mut rows = self.fetch_all::<T>(descriptor).await?;
        match rows.len() {
            0 | 1 => Ok(rows.pop()),
            count => {
                warn!(query = descriptor.name(), count, "Single-result query matched several rows");
                Err(DbError::AmbiguousResult {
                    query: descriptor.name().to_string(),
                    count,
                })
            }
        }
    }

    /// Runs a paged select: the data statement plus a separate count.
    pub async fn fetch_page<T: FromRecord>(&self, descriptor: &QueryDescriptor) -> DbResult<Page<T>> {
        check_select::<T>(descriptor)?;
        let Window::Page(request) = descriptor.window() else {
            return Err(invalid(descriptor, "has no page window"));
        };

        let translated = translator::translate(descriptor)?;
        let count = translated
            .count
            .as_ref()
            .ok_or_else(|| DbError::Internal("paged query without count statement".into()))?;

        let records = self.cached_records(descriptor, &translated.data).await?;
        let content = materialize(descriptor, &translated.data, &records)?;
        let total = self.run_count(count).await?;

        debug!(
            query = descriptor.name(),
            page = request.page,
            rows = content.len(),
            total,
            "Page fetched"
        );
        Ok(Page::new(content, request, total))
    }

    /// Runs a sliced select: one extra row tells whether a next slice exists.
    pub async fn fetch_slice<T: FromRecord>(
        &self,
        descriptor: &QueryDescriptor,
    ) -> DbResult<Slice<T>> {
        check_select::<T>(descriptor)?;
        let Window::Slice(request) = descriptor.window() else {
            return Err(invalid(descriptor, "has no slice window"));
        };

        let translated = translator::translate(descriptor)?;
        let records = self.cached_records(descriptor, &translated.data).await?;
        let content = materialize(descriptor, &translated.data, &records)?;
        Ok(Slice::from_overfetch(content, request))
    }

    /// Counts the rows a select matches, ignoring its window.
    pub async fn count(&self, descriptor: &QueryDescriptor) -> DbResult<u64> {
        let statement = translator::translate_count(descriptor)?;
        self.run_count(&statement).await
    }

    /// Runs a locked select on the caller's transaction connection.
    ///
    /// The lock statement runs first and holds SQLite's write lock until the
    /// transaction ends. Another writer holding it makes this wait up to the
    /// configured lock timeout. `conn` must not have read inside its current
    /// transaction yet; a stale read snapshot fails the lock without waiting.
    ///
    /// ## Errors
    /// * `DbError::LockTimeout` - the lock was not granted in time
    pub async fn fetch_locked<T: FromRecord>(
        &self,
        conn: &mut SqliteConnection,
        descriptor: &QueryDescriptor,
    ) -> DbResult<Vec<T>> {
        check_select::<T>(descriptor)?;
        let translated = translator::translate(descriptor)?;
        let Some(lock) = translated.lock.as_ref() else {
            return Err(invalid(descriptor, "has no lock mode"));
        };

        self.acquire_lock(&mut *conn, lock).await?;
        let records = self.run_query(&mut *conn, &translated.data).await?;
        materialize(descriptor, &translated.data, &records)
    }

    /// Runs a bulk update and returns the number of rows it changed.
    ///
    /// Clears the query cache; entities loaded before the update keep their
    /// old state and version.
    pub async fn execute_update(&self, descriptor: &QueryDescriptor) -> DbResult<u64> {
        if !descriptor.is_update() {
            return Err(invalid(descriptor, "is not a bulk update"));
        }

        let translated = translator::translate(descriptor)?;
        let result = self.execute(&self.pool, &translated.data).await?;
        self.invalidate_cache().await;

        debug!(
            query = descriptor.name(),
            affected = result.rows_affected(),
            "Bulk update executed"
        );
        Ok(result.rows_affected())
    }

    /// Runs one write statement on any executor (pool, connection or
    /// transaction). The caller decides when to invalidate the cache.
    pub async fn execute<'c, E>(&self, executor: E, statement: &Statement) -> DbResult<SqliteQueryResult>
    where
        E: SqliteExecutor<'c>,
    {
        self.record_statement(statement);
        Ok(bind(sqlx::query(&statement.sql), &statement.params)
            .execute(executor)
            .await?)
    }

    /// Drops every cached result.
    pub async fn invalidate_cache(&self) {
        let evicted = self.cache.clear().await;
        if evicted > 0 {
            debug!(evicted, "Query cache invalidated");
        }
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    async fn cached_records(
        &self,
        descriptor: &QueryDescriptor,
        statement: &Statement,
    ) -> DbResult<Vec<Record>> {
        if !descriptor.is_cacheable() {
            return self.run_query(&self.pool, statement).await;
        }

        let key = QueryCache::key(statement);
        if let Some(hit) = self.cache.get(&key).await {
            self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
            debug!(query = descriptor.name(), rows = hit.len(), "Query cache hit");
            return Ok(hit.as_ref().clone());
        }

        let generation = self.cache.generation();
        let records = self.run_query(&self.pool, statement).await?;
        if !self.cache.put(key, records.clone(), generation).await {
            debug!(query = descriptor.name(), "Cache invalidated during query; result not stored");
        }
        Ok(records)
    }

    async fn run_query<'c, E>(&self, executor: E, statement: &Statement) -> DbResult<Vec<Record>>
    where
        E: SqliteExecutor<'c>,
    {
        self.record_statement(statement);
        let rows = bind(sqlx::query(&statement.sql), &statement.params)
            .fetch_all(executor)
            .await?;

        rows.iter()
            .map(|row| Record::decode(row, &statement.columns))
            .collect()
    }

    async fn run_count(&self, statement: &Statement) -> DbResult<u64> {
        self.record_statement(statement);
        let total: i64 = bind(sqlx::query(&statement.sql), &statement.params)
            .fetch_one(&self.pool)
            .await?
            .try_get(0)?;

        u64::try_from(total).map_err(|_| DbError::Internal(format!("negative count {total}")))
    }

    async fn acquire_lock(&self, conn: &mut SqliteConnection, statement: &Statement) -> DbResult<()> {
        self.record_statement(statement);
        let started = Instant::now();

        match bind(sqlx::query(&statement.sql), &statement.params)
            .execute(&mut *conn)
            .await
        {
            Ok(_) => {
                debug!(
                    waited_ms = started.elapsed().as_millis() as u64,
                    "Write lock acquired"
                );
                Ok(())
            }
            Err(err) if is_busy(&err) => {
                warn!(
                    timeout_ms = self.lock_timeout.as_millis() as u64,
                    "Write lock not granted in time"
                );
                Err(DbError::LockTimeout {
                    timeout: self.lock_timeout,
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    fn record_statement(&self, statement: &Statement) {
        self.counters.statements.fetch_add(1, Ordering::Relaxed);
        debug!(
            role = ?statement.role,
            sql = %statement.sql,
            params = statement.params.len(),
            "Executing statement"
        );
    }
}

fn check_select<T: FromRecord>(descriptor: &QueryDescriptor) -> DbResult<()> {
    if descriptor.is_update() {
        return Err(invalid(descriptor, "is a bulk update; use execute_update"));
    }
    if !T::accepts(descriptor.projection()) {
        return Err(invalid(
            descriptor,
            &format!(
                "projection {:?} cannot be read as {}",
                descriptor.projection(),
                std::any::type_name::<T>()
            ),
        ));
    }
    Ok(())
}

fn invalid(descriptor: &QueryDescriptor, reason: &str) -> DbError {
    CoreError::invalid(format!("{} {reason}", descriptor.name())).into()
}

fn bind<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &'q [Value],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for value in params {
        query = match value {
            Value::Null => query.bind(None::<i64>),
            Value::Integer(v) => query.bind(*v),
            Value::Text(v) => query.bind(v.as_str()),
            Value::Timestamp(v) => query.bind(*v),
        };
    }
    query
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use roster_core::query::Sort;
    use roster_core::PageRequest;

    async fn seeded() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let team = db.teams().save("teamA").await.unwrap();
        for (name, age, with_team) in [("member1", 10, true), ("member2", 20, false)] {
            let member = if with_team {
                Member::with_team(name, age, &team).unwrap()
            } else {
                Member::new(name, age).unwrap()
            };
            db.engine()
                .execute(db.pool(), &translator::insert_member(&member))
                .await
                .unwrap();
        }
        db
    }

    #[tokio::test]
    async fn test_fetch_join_loads_team_in_one_statement() {
        let db = seeded().await;
        let engine = db.engine();
        let query = QueryDescriptor::select()
            .fetch_team()
            .order_by(Sort::asc(Field::Username))
            .build()
            .unwrap();

        let before = engine.stats().statements;
        let members: Vec<Member> = engine.fetch_all(&query).await.unwrap();
        assert_eq!(engine.stats().statements - before, 1);

        assert_eq!(members.len(), 2);
        assert_eq!(members[0].team().unwrap().unwrap().name, "teamA");
        assert!(members[1].team().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_plain_select_keeps_team_reference() {
        let db = seeded().await;
        let query = QueryDescriptor::select()
            .eq(Field::Username, "member1")
            .build()
            .unwrap();

        let member: Member = db.engine().fetch_one(&query).await.unwrap().unwrap();
        assert!(matches!(member.team_ref(), TeamRef::Reference { .. }));
        assert!(matches!(member.team(), Err(CoreError::UnloadedReference { .. })));
    }

    #[tokio::test]
    async fn test_projection_mismatch_rejected() {
        let db = seeded().await;
        let query = QueryDescriptor::select()
            .project(Projection::Scalar(Field::Username))
            .build()
            .unwrap();

        assert!(db.engine().fetch_all::<String>(&query).await.is_ok());
        assert!(matches!(
            db.engine().fetch_all::<Member>(&query).await,
            Err(DbError::Core(CoreError::InvalidDescriptor { .. }))
        ));
    }

    #[tokio::test]
    async fn test_windowed_descriptor_needs_windowed_fetch() {
        let db = seeded().await;
        let query = QueryDescriptor::select()
            .page(PageRequest::of(0, 1))
            .build()
            .unwrap();

        assert!(db.engine().fetch_all::<Member>(&query).await.is_err());
        let page: Page<Member> = db.engine().fetch_page(&query).await.unwrap();
        assert_eq!(page.content.len(), 1);
        assert_eq!(page.total_elements, 2);
    }

    #[tokio::test]
    async fn test_cache_hit_and_invalidation() {
        let db = seeded().await;
        let engine = db.engine();
        let query = QueryDescriptor::select().cacheable().build().unwrap();

        let first: Vec<Member> = engine.fetch_all(&query).await.unwrap();
        let statements = engine.stats().statements;
        let second: Vec<Member> = engine.fetch_all(&query).await.unwrap();

        assert_eq!(first.len(), second.len());
        assert_eq!(engine.stats().statements, statements);
        assert_eq!(engine.stats().cache_hits, 1);

        engine.invalidate_cache().await;
        let _: Vec<Member> = engine.fetch_all(&query).await.unwrap();
        assert_eq!(engine.stats().statements, statements + 1);
    }

    #[tokio::test]
    async fn test_result_read_before_invalidation_is_not_cached() {
        let db = seeded().await;
        let engine = db.engine();
        let query = QueryDescriptor::select().cacheable().build().unwrap();
        let translated = translator::translate(&query).unwrap();
        let key = QueryCache::key(&translated.data);

        // Reader starts, a writer invalidates, then the reader stores its rows.
        let generation = engine.cache.generation();
        let records = engine.run_query(engine.pool(), &translated.data).await.unwrap();
        engine.invalidate_cache().await;
        assert!(!engine.cache.put(key.clone(), records.clone(), generation).await);
        assert!(engine.cache.get(&key).await.is_none());

        // A read under the current generation is stored.
        let current = engine.cache.generation();
        assert!(engine.cache.put(key.clone(), records, current).await);
        assert!(engine.cache.get(&key).await.is_some());
    }

    #[tokio::test]
    async fn test_disabled_cache_always_queries() {
        let db = Database::new(DbConfig::in_memory().query_cache_capacity(0))
            .await
            .unwrap();
        let query = QueryDescriptor::select().cacheable().build().unwrap();

        let _: Vec<Member> = db.engine().fetch_all(&query).await.unwrap();
        let _: Vec<Member> = db.engine().fetch_all(&query).await.unwrap();
        assert_eq!(db.engine().stats().cache_hits, 0);
    }
}
