//! # Query Translator
//!
//! Lowers a [`QueryDescriptor`] into SQLite statements with positional
//! parameters. Translation is deterministic: the same descriptor always
//! yields the same SQL text and parameter list.
//!
//! ## Lowering
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  QueryDescriptor                          TranslatedQuery               │
//! │                                                                         │
//! │  lock = PessimisticWrite   ──────────►   lock:  UPDATE member ... 1 = 0 │
//! │  filters / join / sort /   ──────────►   data:  SELECT ... FROM member m│
//! │  window / projection                            LEFT OUTER JOIN team t  │
//! │                                                 WHERE ... LIMIT ?n ...  │
//! │  window = Page             ──────────►   count: SELECT COUNT(m.member_id│
//! │                                                 FROM member m WHERE ... │
//! │                                                                         │
//! │  entity_graph(["team"])  ≡  fetch_team()  →  same FetchLeft lowering    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Joins
//! - Left outer join keeps members without a team.
//! - Fetch joins additionally select `t.team_id, t.name` so the team is
//!   materialized in the same round trip.
//! - The count statement drops a left outer join (a many-to-one outer join
//!   never changes the number of member rows) but keeps an inner join.
//!
//! ## Locking
//! SQLite has no `SELECT ... FOR UPDATE`. A pessimistic write lock is
//! lowered to a no-op write executed first inside the caller's transaction;
//! it takes the database write lock, which is then held until the
//! transaction ends.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};

use crate::error::{CoreError, CoreResult};
use crate::query::{
    Assignment, Direction, Field, LockMode, Operator, Predicate, Projection, QueryDescriptor,
    StatementKind, TeamJoin, Value, Window,
};
use crate::types::Member;

/// Name of the member table.
pub const MEMBER_TABLE: &str = "member";

/// Name of the team table.
pub const TEAM_TABLE: &str = "team";

/// What a statement does, for logging and dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementRole {
    Query,
    Count,
    Insert,
    Update,
    Delete,
    Lock,
}

/// One executable statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub role: StatementRole,
    pub sql: String,
    pub params: Vec<Value>,
    /// Result columns in select order. Empty for non-query statements.
    pub columns: Vec<Field>,
}

/// All statements needed to answer one descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedQuery {
    /// Lock acquisition, run first in the same transaction.
    pub lock: Option<Statement>,
    /// The data (or update) statement.
    pub data: Statement,
    /// Separate total-count statement for `Window::Page`.
    pub count: Option<Statement>,
}

/// Translates a descriptor.
///
/// ## Errors
/// * `CoreError::EmptyInList` - an `IN` predicate has no values
///
/// ## Example
/// ```rust
/// use roster_core::query::{Field, QueryDescriptor};
/// use roster_core::translator::translate;
///
/// let query = QueryDescriptor::select()
///     .eq(Field::Username, "AAA")
///     .gt(Field::Age, 15)
///     .build()
///     .unwrap();
/// let translated = translate(&query).unwrap();
///
/// assert!(translated.data.sql.ends_with("WHERE m.username = ?1 AND m.age > ?2"));
/// assert_eq!(translated.data.params.len(), 2);
/// ```
pub fn translate(descriptor: &QueryDescriptor) -> CoreResult<TranslatedQuery> {
    reject_empty_in_lists(descriptor)?;

    match descriptor.kind() {
        StatementKind::Select => Ok(TranslatedQuery {
            lock: match descriptor.lock() {
                LockMode::None => None,
                LockMode::PessimisticWrite => Some(lock_statement()),
            },
            data: select_statement(descriptor),
            count: match descriptor.window() {
                Window::Page(_) => Some(count_statement(descriptor)),
                Window::All | Window::Slice(_) => None,
            },
        }),
        StatementKind::Update {
            assignment,
            touched_at,
        } => Ok(TranslatedQuery {
            lock: None,
            data: update_statement(descriptor, assignment, touched_at),
            count: None,
        }),
    }
}

/// Translates only the count statement of a select, whatever its window.
pub fn translate_count(descriptor: &QueryDescriptor) -> CoreResult<Statement> {
    reject_empty_in_lists(descriptor)?;
    if descriptor.is_update() {
        return Err(CoreError::invalid("cannot count a bulk update"));
    }
    Ok(count_statement(descriptor))
}

fn reject_empty_in_lists(descriptor: &QueryDescriptor) -> CoreResult<()> {
    match descriptor
        .filters()
        .iter()
        .find(|p| p.op == Operator::In && p.values.is_empty())
    {
        Some(predicate) => Err(CoreError::EmptyInList {
            field: predicate.field.qualified().to_string(),
        }),
        None => Ok(()),
    }
}

/// Result columns for a descriptor's projection and join.
pub fn result_columns(descriptor: &QueryDescriptor) -> Vec<Field> {
    match descriptor.projection() {
        Projection::Entity => {
            let mut columns = Field::MEMBER_COLUMNS.to_vec();
            if descriptor.join().is_fetch() {
                columns.extend(Field::TEAM_COLUMNS);
            }
            columns
        }
        Projection::Scalar(field) => vec![*field],
        Projection::Dto { fields, .. } => fields.clone(),
    }
}

// =============================================================================
// Statement builders
// =============================================================================

/// Positional parameter accumulator (`?1`, `?2`, ...).
#[derive(Default)]
struct Params {
    values: Vec<Value>,
}

impl Params {
    fn bind(&mut self, value: Value) -> String {
        self.values.push(value);
        format!("?{}", self.values.len())
    }
}

fn select_statement(descriptor: &QueryDescriptor) -> Statement {
    let columns = result_columns(descriptor);
    let mut params = Params::default();

    let select_list = columns
        .iter()
        .map(Field::qualified)
        .collect::<Vec<_>>()
        .join(", ");
    let mut sql = format!("SELECT {select_list} FROM {MEMBER_TABLE} m");
    push_join(&mut sql, descriptor.join());
    push_where(&mut sql, descriptor.filters(), &mut params, true);

    let mut order = descriptor
        .sort()
        .iter()
        .map(|s| {
            let dir = match s.direction {
                Direction::Asc => "ASC",
                Direction::Desc => "DESC",
            };
            format!("{} {dir}", s.field.qualified())
        })
        .collect::<Vec<_>>();
    if let Some(request) = descriptor.window().request() {
        // Stable pages need a total order
        if !descriptor.sort().iter().any(|s| s.field == Field::MemberId) {
            order.push("m.member_id ASC".to_string());
        }

        let limit = match descriptor.window() {
            Window::Slice(_) => i64::from(request.size) + 1,
            _ => i64::from(request.size),
        };
        let offset = i64::try_from(request.offset()).unwrap_or(i64::MAX);
        if !order.is_empty() {
            let _ = write!(sql, " ORDER BY {}", order.join(", "));
        }
        let limit = params.bind(Value::Integer(limit));
        let offset = params.bind(Value::Integer(offset));
        let _ = write!(sql, " LIMIT {limit} OFFSET {offset}");
    } else if !order.is_empty() {
        let _ = write!(sql, " ORDER BY {}", order.join(", "));
    }

    Statement {
        role: StatementRole::Query,
        sql,
        params: params.values,
        columns,
    }
}

fn count_statement(descriptor: &QueryDescriptor) -> Statement {
    let mut params = Params::default();
    let mut sql = format!("SELECT COUNT(m.member_id) FROM {MEMBER_TABLE} m");

    let needs_team = descriptor.join().is_inner()
        || descriptor.filters().iter().any(|p| p.field.is_team_field());
    if needs_team {
        let join = if descriptor.join().is_inner() {
            TeamJoin::Inner
        } else {
            TeamJoin::LeftOuter
        };
        push_join(&mut sql, join);
    }
    push_where(&mut sql, descriptor.filters(), &mut params, true);

    Statement {
        role: StatementRole::Count,
        sql,
        params: params.values,
        columns: Vec::new(),
    }
}

fn update_statement(
    descriptor: &QueryDescriptor,
    assignment: &Assignment,
    touched_at: &DateTime<Utc>,
) -> Statement {
    let mut params = Params::default();

    let set = match assignment {
        Assignment::Increment { field, by } => {
            let by = params.bind(Value::Integer(*by));
            format!("{col} = {col} + {by}", col = field.column())
        }
        Assignment::Set { field, value } => {
            let value = params.bind(value.clone());
            format!("{} = {value}", field.column())
        }
    };
    let touched = params.bind(Value::Timestamp(*touched_at));
    let mut sql = format!(
        "UPDATE {MEMBER_TABLE} SET {set}, version = version + 1, updated_at = {touched}"
    );
    push_where(&mut sql, descriptor.filters(), &mut params, false);

    Statement {
        role: StatementRole::Update,
        sql,
        params: params.values,
        columns: Vec::new(),
    }
}

// =============================================================================
// Entity write statements
// =============================================================================

/// `INSERT` of a new member row. The store assigns `member_id`.
pub fn insert_member(member: &Member) -> Statement {
    Statement {
        role: StatementRole::Insert,
        sql: format!(
            "INSERT INTO {MEMBER_TABLE} (username, age, team_id, version, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
        ),
        params: vec![
            Value::from(member.username()),
            Value::from(member.age()),
            Value::from(member.team_id()),
            Value::from(member.version()),
            Value::from(member.created_at()),
            Value::from(member.updated_at()),
        ],
        columns: Vec::new(),
    }
}

/// Version-checked write-back of a tracked member.
///
/// Matches zero rows when the stored version moved on (for example after a
/// bulk update), which the caller reports as a stale entity.
pub fn flush_member(member: &Member, touched_at: DateTime<Utc>) -> CoreResult<Statement> {
    let id = member
        .id()
        .ok_or_else(|| CoreError::invalid("cannot flush a member that was never inserted"))?;

    Ok(Statement {
        role: StatementRole::Update,
        sql: format!(
            "UPDATE {MEMBER_TABLE} SET username = ?1, age = ?2, team_id = ?3, \
             version = version + 1, updated_at = ?4 WHERE member_id = ?5 AND version = ?6"
        ),
        params: vec![
            Value::from(member.username()),
            Value::from(member.age()),
            Value::from(member.team_id()),
            Value::from(touched_at),
            Value::from(id),
            Value::from(member.version()),
        ],
        columns: Vec::new(),
    })
}

/// `DELETE` of one member row.
pub fn delete_member(id: i64) -> Statement {
    Statement {
        role: StatementRole::Delete,
        sql: format!("DELETE FROM {MEMBER_TABLE} WHERE member_id = ?1"),
        params: vec![Value::from(id)],
        columns: Vec::new(),
    }
}

/// A write that matches no rows but still takes SQLite's write lock.
pub fn lock_statement() -> Statement {
    Statement {
        role: StatementRole::Lock,
        sql: format!("UPDATE {MEMBER_TABLE} SET version = version WHERE 1 = 0"),
        params: Vec::new(),
        columns: Vec::new(),
    }
}

fn push_join(sql: &mut String, join: TeamJoin) {
    let keyword = match join {
        TeamJoin::None => return,
        TeamJoin::LeftOuter | TeamJoin::FetchLeft => "LEFT OUTER JOIN",
        TeamJoin::Inner | TeamJoin::FetchInner => "INNER JOIN",
    };
    let _ = write!(sql, " {keyword} {TEAM_TABLE} t ON t.team_id = m.team_id");
}

fn push_where(sql: &mut String, filters: &[Predicate], params: &mut Params, qualified: bool) {
    if filters.is_empty() {
        return;
    }

    let clauses = filters
        .iter()
        .map(|p| {
            let column = if qualified {
                p.field.qualified()
            } else {
                p.field.column()
            };
            match p.op {
                Operator::In => {
                    let placeholders = p
                        .values
                        .iter()
                        .map(|v| params.bind(v.clone()))
                        .collect::<Vec<_>>()
                        .join(", ");
                    format!("{column} IN ({placeholders})")
                }
                Operator::Eq if p.values[0].is_null() => format!("{column} IS NULL"),
                op => {
                    let placeholder = params.bind(p.values[0].clone());
                    format!("{column} {} {placeholder}", op.sql())
                }
            }
        })
        .collect::<Vec<_>>()
        .join(" AND ");

    let _ = write!(sql, " WHERE {clauses}");
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{DtoShape, PageRequest, Sort};

    const MEMBER_SELECT: &str = "SELECT m.member_id, m.username, m.age, m.team_id, m.version, m.created_at, m.updated_at";

    #[test]
    fn test_equality_and_greater_than() {
        let query = QueryDescriptor::select()
            .eq(Field::Username, "AAA")
            .gt(Field::Age, 15)
            .build()
            .unwrap();
        let translated = translate(&query).unwrap();

        assert_eq!(
            translated.data.sql,
            format!("{MEMBER_SELECT} FROM member m WHERE m.username = ?1 AND m.age > ?2")
        );
        assert_eq!(
            translated.data.params,
            vec![Value::Text("AAA".into()), Value::Integer(15)]
        );
        assert!(translated.lock.is_none());
        assert!(translated.count.is_none());
    }

    #[test]
    fn test_in_list() {
        let query = QueryDescriptor::select()
            .in_list(Field::Username, ["A", "B"])
            .build()
            .unwrap();
        let translated = translate(&query).unwrap();
        assert!(translated
            .data
            .sql
            .ends_with("WHERE m.username IN (?1, ?2)"));
        assert_eq!(translated.data.params.len(), 2);
    }

    #[test]
    fn test_empty_in_list_rejected() {
        let query = QueryDescriptor::select()
            .in_list(Field::Username, Vec::<String>::new())
            .build()
            .unwrap();
        assert!(matches!(
            translate(&query),
            Err(CoreError::EmptyInList { field }) if field == "m.username"
        ));
    }

    #[test]
    fn test_null_equality() {
        let query = QueryDescriptor::select()
            .eq(Field::TeamId, Value::Null)
            .build()
            .unwrap();
        let translated = translate(&query).unwrap();
        assert!(translated.data.sql.ends_with("WHERE m.team_id IS NULL"));
        assert!(translated.data.params.is_empty());
    }

    #[test]
    fn test_outer_join_does_not_select_team() {
        let query = QueryDescriptor::select().left_join_team().build().unwrap();
        let translated = translate(&query).unwrap();
        assert_eq!(
            translated.data.sql,
            format!("{MEMBER_SELECT} FROM member m LEFT OUTER JOIN team t ON t.team_id = m.team_id")
        );
        assert_eq!(translated.data.columns, Field::MEMBER_COLUMNS.to_vec());
    }

    #[test]
    fn test_fetch_join_selects_team() {
        let query = QueryDescriptor::select().fetch_team().build().unwrap();
        let translated = translate(&query).unwrap();
        assert_eq!(
            translated.data.sql,
            format!("{MEMBER_SELECT}, t.team_id, t.name FROM member m LEFT OUTER JOIN team t ON t.team_id = m.team_id")
        );
        assert_eq!(translated.data.columns.len(), 9);
    }

    #[test]
    fn test_entity_graph_and_fetch_join_lower_identically() {
        let graph = QueryDescriptor::select()
            .eq(Field::Username, "a")
            .entity_graph(["team"])
            .build()
            .unwrap();
        let fetch = QueryDescriptor::select()
            .eq(Field::Username, "a")
            .fetch_team()
            .build()
            .unwrap();
        assert_eq!(translate(&graph).unwrap(), translate(&fetch).unwrap());
    }

    #[test]
    fn test_dto_projection() {
        let query = QueryDescriptor::select()
            .inner_join_team()
            .project(Projection::dto(
                DtoShape::MEMBER_DTO,
                DtoShape::MEMBER_DTO.fields.to_vec(),
            ))
            .build()
            .unwrap();
        let translated = translate(&query).unwrap();
        assert_eq!(
            translated.data.sql,
            "SELECT m.member_id, m.username, t.name FROM member m INNER JOIN team t ON t.team_id = m.team_id"
        );
    }

    #[test]
    fn test_scalar_projection() {
        let query = QueryDescriptor::select()
            .project(Projection::Scalar(Field::Username))
            .build()
            .unwrap();
        let translated = translate(&query).unwrap();
        assert_eq!(translated.data.sql, "SELECT m.username FROM member m");
        assert_eq!(translated.data.columns, vec![Field::Username]);
    }

    #[test]
    fn test_page_with_separate_count() {
        let query = QueryDescriptor::select()
            .eq(Field::Age, 10)
            .left_join_team()
            .page(PageRequest::of(2, 3).with_sort(Sort::desc(Field::Username)))
            .build()
            .unwrap();
        let translated = translate(&query).unwrap();

        assert!(translated.data.sql.ends_with(
            "WHERE m.age = ?1 ORDER BY m.username DESC, m.member_id ASC LIMIT ?2 OFFSET ?3"
        ));
        assert_eq!(
            translated.data.params,
            vec![Value::Integer(10), Value::Integer(3), Value::Integer(6)]
        );

        let count = translated.count.unwrap();
        assert_eq!(
            count.sql,
            "SELECT COUNT(m.member_id) FROM member m WHERE m.age = ?1"
        );
        assert_eq!(count.params, vec![Value::Integer(10)]);
    }

    #[test]
    fn test_count_keeps_inner_join_and_team_filters() {
        let inner = QueryDescriptor::select()
            .inner_join_team()
            .page(PageRequest::of(0, 5))
            .build()
            .unwrap();
        assert_eq!(
            translate(&inner).unwrap().count.unwrap().sql,
            "SELECT COUNT(m.member_id) FROM member m INNER JOIN team t ON t.team_id = m.team_id"
        );

        let filtered = QueryDescriptor::select()
            .left_join_team()
            .eq(Field::TeamName, "teamA")
            .page(PageRequest::of(0, 5))
            .build()
            .unwrap();
        assert_eq!(
            translate(&filtered).unwrap().count.unwrap().sql,
            "SELECT COUNT(m.member_id) FROM member m LEFT OUTER JOIN team t ON t.team_id = m.team_id WHERE t.name = ?1"
        );
    }

    #[test]
    fn test_slice_over_fetches_one_row() {
        let query = QueryDescriptor::select()
            .slice(PageRequest::of(1, 3))
            .build()
            .unwrap();
        let translated = translate(&query).unwrap();
        assert!(translated.data.sql.ends_with("ORDER BY m.member_id ASC LIMIT ?1 OFFSET ?2"));
        assert_eq!(
            translated.data.params,
            vec![Value::Integer(4), Value::Integer(3)]
        );
        assert!(translated.count.is_none());
    }

    #[test]
    fn test_bulk_update() {
        let query = QueryDescriptor::update(Assignment::Increment {
            field: Field::Age,
            by: 1,
        })
        .ge(Field::Age, 20)
        .build()
        .unwrap();
        let translated = translate(&query).unwrap();

        assert_eq!(
            translated.data.sql,
            "UPDATE member SET age = age + ?1, version = version + 1, updated_at = ?2 WHERE age >= ?3"
        );
        assert_eq!(translated.data.role, StatementRole::Update);
        assert_eq!(translated.data.params[0], Value::Integer(1));
        assert_eq!(translated.data.params[2], Value::Integer(20));
    }

    #[test]
    fn test_lock_prelude() {
        let query = QueryDescriptor::select()
            .eq(Field::Username, "a")
            .lock(LockMode::PessimisticWrite)
            .build()
            .unwrap();
        let translated = translate(&query).unwrap();
        assert_eq!(translated.lock, Some(lock_statement()));
        assert_eq!(translated.data.role, StatementRole::Query);
    }

    #[test]
    fn test_translate_count_ignores_window() {
        let query = QueryDescriptor::select()
            .eq(Field::Username, "a")
            .build()
            .unwrap();
        assert_eq!(
            translate_count(&query).unwrap().sql,
            "SELECT COUNT(m.member_id) FROM member m WHERE m.username = ?1"
        );
    }

    #[test]
    fn test_entity_writes() {
        let mut member = Member::new("member1", 10).unwrap();
        let insert = insert_member(&member);
        assert_eq!(insert.role, StatementRole::Insert);
        assert_eq!(insert.params[2], Value::Null);

        assert!(flush_member(&member, chrono::Utc::now()).is_err());
        member.on_inserted(5);
        let flush = flush_member(&member, chrono::Utc::now()).unwrap();
        assert!(flush.sql.ends_with("WHERE member_id = ?5 AND version = ?6"));
        assert_eq!(flush.params[4], Value::Integer(5));
        assert_eq!(flush.params[5], Value::Integer(0));

        assert_eq!(
            delete_member(5).sql,
            "DELETE FROM member WHERE member_id = ?1"
        );
    }

    #[test]
    fn test_translation_is_deterministic() {
        let query = QueryDescriptor::select()
            .in_list(Field::Username, ["A", "B"])
            .fetch_team()
            .order_by(Sort::asc(Field::Age))
            .build()
            .unwrap();
        assert_eq!(translate(&query).unwrap(), translate(&query).unwrap());
    }
}
