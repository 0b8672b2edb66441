//! # Member Repository
//!
//! Finder, bulk-update and persistence operations for members.
//!
//! ## Key Operations
//! - Derived-style finders, each an explicit [`QueryDescriptor`]
//! - Paged and sliced age lookup
//! - Set-based age bump
//! - Fetch joins and entity graphs for eager team loading
//! - Read-only and pessimistically locked reads
//! - Insert, dirty-checking flush, refresh and delete
//!
//! ## Bulk Updates and Loaded Members
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 Why a member goes stale                                 │
//! │                                                                         │
//! │  let mut m = find_by_id(1)     m.age = 20, m.version = 0                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  bulk_age_plus(20)             row: age = 21, version = 1               │
//! │       │                        (m still says 20 / 0)                    │
//! │       ▼                                                                 │
//! │  m.set_age(30); flush([m])     UPDATE ... WHERE version = 0             │
//! │       │                        matches nothing                          │
//! │       ▼                                                                 │
//! │  Err(StaleEntity)              refresh(&mut m) first, then retry        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use roster_core::query::{Assignment, DtoShape, Projection};
use roster_core::translator;
use roster_core::{
    CoreError, Field, LockMode, Member, MemberDto, Page, PageRequest, QueryDescriptor, Slice,
};
use sqlx::{Sqlite, Transaction};
use tracing::{debug, warn};

use crate::engine::QueryEngine;
use crate::error::{DbError, DbResult};

const ENTITY: &str = "Member";

/// Repository for member database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.members();
///
/// let mut member = Member::new("member1", 10)?;
/// repo.save(&mut member).await?;
///
/// let page = repo.find_by_age(10, PageRequest::of(0, 3)).await?;
/// let affected = repo.bulk_age_plus(20).await?;
/// ```
#[derive(Debug, Clone)]
pub struct MemberRepository {
    engine: QueryEngine,
}

impl MemberRepository {
    /// Creates a new MemberRepository.
    pub fn new(engine: QueryEngine) -> Self {
        MemberRepository { engine }
    }

    // =========================================================================
    // Finders
    // =========================================================================

    /// Members with exactly `username` and an age strictly above `age`.
    pub async fn find_by_username_and_age_greater_than(
        &self,
        username: &str,
        age: i32,
    ) -> DbResult<Vec<Member>> {
        let query = QueryDescriptor::select()
            .named("find_by_username_and_age_greater_than")
            .eq(Field::Username, username)
            .gt(Field::Age, age)
            .build()?;
        self.engine.fetch_all(&query).await
    }

    /// Members matching both `username` and `age` exactly.
    pub async fn find_user(&self, username: &str, age: i32) -> DbResult<Vec<Member>> {
        let query = QueryDescriptor::select()
            .named("find_user")
            .eq(Field::Username, username)
            .eq(Field::Age, age)
            .build()?;
        self.engine.fetch_all(&query).await
    }

    /// Every username, one per member. Served from the query cache until
    /// the next write.
    pub async fn find_username_list(&self) -> DbResult<Vec<String>> {
        let query = QueryDescriptor::select()
            .named("find_username_list")
            .project(Projection::Scalar(Field::Username))
            .cacheable()
            .build()?;
        self.engine.fetch_all(&query).await
    }

    /// `(id, username, team_name)` for every member that has a team.
    pub async fn find_member_dto(&self) -> DbResult<Vec<MemberDto>> {
        let shape = DtoShape::MEMBER_DTO;
        let query = QueryDescriptor::select()
            .named("find_member_dto")
            .project(Projection::dto(shape, shape.fields))
            .inner_join_team()
            .build()?;
        self.engine.fetch_all(&query).await
    }

    /// Members whose username is one of `names`.
    ///
    /// ## Errors
    /// * `CoreError::EmptyInList` - `names` is empty
    pub async fn find_by_names<S: AsRef<str>>(&self, names: &[S]) -> DbResult<Vec<Member>> {
        let query = QueryDescriptor::select()
            .named("find_by_names")
            .in_list(Field::Username, names.iter().map(AsRef::<str>::as_ref))
            .build()?;
        self.engine.fetch_all(&query).await
    }

    pub async fn find_list_by_username(&self, username: &str) -> DbResult<Vec<Member>> {
        let query = QueryDescriptor::select()
            .named("find_list_by_username")
            .eq(Field::Username, username)
            .build()?;
        self.engine.fetch_all(&query).await
    }

    /// The single member named `username`.
    ///
    /// ## Returns
    /// * `Ok(None)` - no member has that username
    /// * `Err(DbError::AmbiguousResult)` - several do
    pub async fn find_member_by_username(&self, username: &str) -> DbResult<Option<Member>> {
        let query = QueryDescriptor::select()
            .named("find_member_by_username")
            .eq(Field::Username, username)
            .build()?;
        self.engine.fetch_one(&query).await
    }

    /// Same contract as [`find_member_by_username`](Self::find_member_by_username).
    pub async fn find_optional_by_username(&self, username: &str) -> DbResult<Option<Member>> {
        let query = QueryDescriptor::select()
            .named("find_optional_by_username")
            .eq(Field::Username, username)
            .build()?;
        self.engine.fetch_one(&query).await
    }

    /// One page of members aged exactly `age`.
    ///
    /// ## How It Works
    /// 1. Data statement: left outer join on team, `LIMIT/OFFSET` window
    /// 2. Count statement: same filter, join dropped
    ///
    /// Sorts in `request` apply to the data statement only.
    pub async fn find_by_age(&self, age: i32, request: PageRequest) -> DbResult<Page<Member>> {
        let query = QueryDescriptor::select()
            .named("find_by_age")
            .eq(Field::Age, age)
            .left_join_team()
            .page(request)
            .build()?;
        self.engine.fetch_page(&query).await
    }

    /// Like [`find_by_age`](Self::find_by_age) without the count statement.
    pub async fn find_slice_by_age(&self, age: i32, request: PageRequest) -> DbResult<Slice<Member>> {
        let query = QueryDescriptor::select()
            .named("find_slice_by_age")
            .eq(Field::Age, age)
            .left_join_team()
            .slice(request)
            .build()?;
        self.engine.fetch_slice(&query).await
    }

    /// Adds one to the age of every member aged `age` or older.
    ///
    /// Returns the number of rows changed. Members loaded before the call
    /// are stale afterwards; see the module docs.
    pub async fn bulk_age_plus(&self, age: i32) -> DbResult<u64> {
        let query = QueryDescriptor::update(Assignment::Increment {
            field: Field::Age,
            by: 1,
        })
        .named("bulk_age_plus")
        .ge(Field::Age, age)
        .build()?;
        self.engine.execute_update(&query).await
    }

    /// Every member with its team loaded in the same statement.
    pub async fn find_member_fetch_join(&self) -> DbResult<Vec<Member>> {
        let query = QueryDescriptor::select()
            .named("find_member_fetch_join")
            .fetch_team()
            .build()?;
        self.engine.fetch_all(&query).await
    }

    /// Every member, team eagerly loaded.
    pub async fn find_all(&self) -> DbResult<Vec<Member>> {
        let query = QueryDescriptor::select()
            .named("find_all")
            .entity_graph(["team"])
            .build()?;
        self.engine.fetch_all(&query).await
    }

    /// Members named `username`, team eagerly loaded.
    pub async fn find_by_username(&self, username: &str) -> DbResult<Vec<Member>> {
        let query = QueryDescriptor::select()
            .named("find_by_username")
            .eq(Field::Username, username)
            .entity_graph(["team"])
            .build()?;
        self.engine.fetch_all(&query).await
    }

    /// The single member named `username`, without change tracking.
    ///
    /// Changes made to the returned member are ignored by [`flush`](Self::flush).
    pub async fn find_read_only_by_username(&self, username: &str) -> DbResult<Option<Member>> {
        let query = QueryDescriptor::select()
            .named("find_read_only_by_username")
            .eq(Field::Username, username)
            .read_only()
            .build()?;
        self.engine.fetch_one(&query).await
    }

    /// Members named `username`, read under the database write lock.
    ///
    /// The lock is held until `tx` commits or rolls back. It must be the
    /// first statement on `tx`: after an earlier read, a commit by another
    /// connection leaves `tx` on a stale snapshot and SQLite refuses the
    /// lock at once (SQLITE_BUSY_SNAPSHOT) instead of waiting.
    ///
    /// ## Errors
    /// * `DbError::LockTimeout` - another transaction kept the lock past
    ///   the configured lock timeout, or `tx` read a snapshot that another
    ///   connection has since written past
    pub async fn find_lock_by_username(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        username: &str,
    ) -> DbResult<Vec<Member>> {
        let query = QueryDescriptor::select()
            .named("find_lock_by_username")
            .eq(Field::Username, username)
            .lock(LockMode::PessimisticWrite)
            .build()?;
        self.engine.fetch_locked(&mut **tx, &query).await
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Gets a member by ID. The team is reference-only.
    pub async fn find_by_id(&self, id: i64) -> DbResult<Option<Member>> {
        let query = QueryDescriptor::select()
            .named("find_by_id")
            .eq(Field::MemberId, id)
            .build()?;
        self.engine.fetch_one(&query).await
    }

    /// Total number of members.
    pub async fn count(&self) -> DbResult<u64> {
        let query = QueryDescriptor::select().named("count").build()?;
        self.engine.count(&query).await
    }

    /// Inserts a new member or flushes a tracked one.
    ///
    /// ## Behavior
    /// - Unsaved: inserted; the generated id is assigned and tracking starts
    /// - Tracked and dirty: written back as by [`flush`](Self::flush)
    /// - Read-only or unchanged: nothing is written
    pub async fn save(&self, member: &mut Member) -> DbResult<()> {
        if member.id().is_some() {
            self.flush(std::slice::from_mut(member)).await?;
            return Ok(());
        }

        let statement = translator::insert_member(member);
        let result = self.engine.execute(self.engine.pool(), &statement).await?;
        member.on_inserted(result.last_insert_rowid());
        self.engine.invalidate_cache().await;

        debug!(id = ?member.id(), username = %member.username(), "Member inserted");
        Ok(())
    }

    /// Writes back every dirty tracked member in one transaction.
    ///
    /// Read-only and unchanged members are skipped. Returns the number of
    /// rows written.
    ///
    /// ## Errors
    /// * `DbError::StaleEntity` - a row was changed or removed since the
    ///   member was loaded; nothing is written
    pub async fn flush(&self, members: &mut [Member]) -> DbResult<u64> {
        let dirty: Vec<usize> = members
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_dirty())
            .map(|(idx, _)| idx)
            .collect();

        let read_only = members.iter().filter(|m| m.is_read_only()).count();
        if read_only > 0 {
            debug!(skipped = read_only, "Read-only members not flushed");
        }
        if dirty.is_empty() {
            return Ok(0);
        }

        let touched_at = Utc::now();
        let mut tx = self
            .engine
            .pool()
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        for &idx in &dirty {
            let member = &members[idx];
            let statement = translator::flush_member(member, touched_at)?;
            let result = self.engine.execute(&mut *tx, &statement).await?;

            if result.rows_affected() == 0 {
                let id = member.id().unwrap_or_default();
                warn!(id, version = member.version(), "Stale member rejected by flush");
                return Err(DbError::StaleEntity {
                    entity: ENTITY.to_string(),
                    id,
                });
            }
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        for &idx in &dirty {
            members[idx].on_flushed(touched_at);
        }
        self.engine.invalidate_cache().await;

        debug!(flushed = dirty.len(), "Members flushed");
        Ok(dirty.len() as u64)
    }

    /// Reloads a member from its row, discarding unsaved changes.
    ///
    /// A loaded team is fetched again; read-only members stay read-only.
    pub async fn refresh(&self, member: &mut Member) -> DbResult<()> {
        let id = member
            .id()
            .ok_or_else(|| CoreError::invalid("cannot refresh a member that was never inserted"))?;

        let mut builder = QueryDescriptor::select()
            .named("refresh")
            .eq(Field::MemberId, id);
        if member.team_ref().is_loaded() {
            builder = builder.fetch_team();
        }
        if member.is_read_only() {
            builder = builder.read_only();
        }

        *member = self
            .engine
            .fetch_one(&builder.build()?)
            .await?
            .ok_or_else(|| DbError::not_found(ENTITY, id))?;
        Ok(())
    }

    /// Deletes a member row.
    pub async fn delete(&self, member: &Member) -> DbResult<()> {
        let id = member
            .id()
            .ok_or_else(|| CoreError::invalid("cannot delete a member that was never inserted"))?;

        let result = self
            .engine
            .execute(self.engine.pool(), &translator::delete_member(id))
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found(ENTITY, id));
        }
        self.engine.invalidate_cache().await;

        debug!(id, "Member deleted");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
