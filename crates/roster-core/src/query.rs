//! # Query Descriptors
//!
//! A [`QueryDescriptor`] is the structured intent of one query: filters,
//! projection, team join / fetch strategy, sort, window, lock mode and
//! execution hints. Descriptors are built with [`QueryBuilder`] and are
//! validated once, in [`QueryBuilder::build`].
//!
//! ## Anatomy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        QueryDescriptor                                  │
//! │                                                                         │
//! │  kind        Select | Update(assignment)                                │
//! │  filters     [ m.username = 'a' ] AND [ m.age > 10 ] AND ...            │
//! │  projection  Entity | Scalar(field) | Dto(shape, fields)                │
//! │  join        None | LeftOuter | Inner | FetchLeft | FetchInner          │
//! │  sort        [ m.age DESC, ... ]                                        │
//! │  window      All | Page(req) | Slice(req)                               │
//! │  lock        None | PessimisticWrite                                    │
//! │  hints       read_only, cacheable                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//! ```rust
//! use roster_core::query::{Field, QueryDescriptor};
//!
//! let query = QueryDescriptor::select()
//!     .named("find_by_username_and_age_greater_than")
//!     .eq(Field::Username, "AAA")
//!     .gt(Field::Age, 15)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(query.filters().len(), 2);
//! ```

use chrono::{DateTime, Utc};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::validation::{validate_age, validate_username};

// =============================================================================
// Fields and Values
// =============================================================================

/// A column addressable by filters, projections and sorts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// `member.member_id`
    MemberId,
    /// `member.username`
    Username,
    /// `member.age`
    Age,
    /// `member.team_id` (the foreign key; no join needed)
    TeamId,
    /// `member.version`
    Version,
    /// `member.created_at`
    CreatedAt,
    /// `member.updated_at`
    UpdatedAt,
    /// `team.team_id` (requires a team join)
    TeamKey,
    /// `team.name` (requires a team join)
    TeamName,
}

/// Storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Integer,
    Text,
    Timestamp,
}

impl Field {
    /// Column name without table alias.
    pub fn column(&self) -> &'static str {
        match self {
            Field::MemberId => "member_id",
            Field::Username => "username",
            Field::Age => "age",
            Field::TeamId => "team_id",
            Field::Version => "version",
            Field::CreatedAt => "created_at",
            Field::UpdatedAt => "updated_at",
            Field::TeamKey => "team_id",
            Field::TeamName => "name",
        }
    }

    /// Column name qualified with its table alias (`m` or `t`).
    pub fn qualified(&self) -> &'static str {
        match self {
            Field::MemberId => "m.member_id",
            Field::Username => "m.username",
            Field::Age => "m.age",
            Field::TeamId => "m.team_id",
            Field::Version => "m.version",
            Field::CreatedAt => "m.created_at",
            Field::UpdatedAt => "m.updated_at",
            Field::TeamKey => "t.team_id",
            Field::TeamName => "t.name",
        }
    }

    /// Whether the column lives on `team` and therefore needs a join.
    pub fn is_team_field(&self) -> bool {
        matches!(self, Field::TeamKey | Field::TeamName)
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Field::Username | Field::TeamName => ValueType::Text,
            Field::CreatedAt | Field::UpdatedAt => ValueType::Timestamp,
            Field::MemberId | Field::Age | Field::TeamId | Field::Version | Field::TeamKey => {
                ValueType::Integer
            }
        }
    }

    /// Whether the column can be NULL in a result row.
    ///
    /// Team columns are nullable because of outer joins.
    pub fn is_nullable(&self) -> bool {
        matches!(self, Field::TeamId | Field::TeamKey | Field::TeamName)
    }

    /// Columns of a full `Member` entity, in materialization order.
    pub const MEMBER_COLUMNS: [Field; 7] = [
        Field::MemberId,
        Field::Username,
        Field::Age,
        Field::TeamId,
        Field::Version,
        Field::CreatedAt,
        Field::UpdatedAt,
    ];

    /// Columns of a fetched `Team`, appended after [`Field::MEMBER_COLUMNS`].
    pub const TEAM_COLUMNS: [Field; 2] = [Field::TeamKey, Field::TeamName];
}

/// A bound parameter or decoded column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    fn value_type(&self) -> Option<ValueType> {
        match self {
            Value::Null => None,
            Value::Integer(_) => Some(ValueType::Integer),
            Value::Text(_) => Some(ValueType::Text),
            Value::Timestamp(_) => Some(ValueType::Timestamp),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

// =============================================================================
// Predicates
// =============================================================================

/// Comparison operator of a filter clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Gt,
    Ge,
    In,
}

impl Operator {
    pub fn sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::In => "IN",
        }
    }
}

/// One filter clause: `field op value(s)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field: Field,
    pub op: Operator,
    pub values: Vec<Value>,
}

impl Predicate {
    pub fn new(field: Field, op: Operator, values: Vec<Value>) -> Self {
        Predicate { field, op, values }
    }

    fn validate(&self) -> CoreResult<()> {
        if self.op != Operator::In && self.values.len() != 1 {
            return Err(CoreError::invalid(format!(
                "{} {} expects exactly one value, got {}",
                self.field.qualified(),
                self.op.sql(),
                self.values.len()
            )));
        }

        let expected = self.field.value_type();
        if let Some(bad) = self
            .values
            .iter()
            .find(|v| v.value_type().is_some_and(|t| t != expected))
        {
            return Err(CoreError::invalid(format!(
                "{} expects {:?} values, got {:?}",
                self.field.qualified(),
                expected,
                bad
            )));
        }

        if self.op != Operator::Eq && self.values.iter().any(Value::is_null) {
            return Err(CoreError::invalid(format!(
                "{} {} cannot compare against NULL",
                self.field.qualified(),
                self.op.sql()
            )));
        }

        Ok(())
    }
}

// =============================================================================
// Projection
// =============================================================================

/// A named DTO shape with its constructor field order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DtoShape {
    pub name: &'static str,
    pub fields: &'static [Field],
}

impl DtoShape {
    /// `MemberDto(id, username, team_name)`
    pub const MEMBER_DTO: DtoShape = DtoShape {
        name: "MemberDto",
        fields: &[Field::MemberId, Field::Username, Field::TeamName],
    };
}

/// What each result row becomes.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// Full `Member` entities.
    Entity,
    /// One column per row.
    Scalar(Field),
    /// A DTO built from `fields`, which must match `shape` exactly.
    Dto { shape: DtoShape, fields: Vec<Field> },
}

impl Projection {
    pub fn dto(shape: DtoShape, fields: impl Into<Vec<Field>>) -> Self {
        Projection::Dto {
            shape,
            fields: fields.into(),
        }
    }
}

// =============================================================================
// Joins
// =============================================================================

/// How `team` participates in the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TeamJoin {
    #[default]
    None,
    /// Members without a team are kept; team columns usable in filters.
    LeftOuter,
    /// Members without a team are dropped.
    Inner,
    /// Left outer join that also materializes the team.
    FetchLeft,
    /// Inner join that also materializes the team.
    FetchInner,
}

impl TeamJoin {
    pub fn is_joined(&self) -> bool {
        !matches!(self, TeamJoin::None)
    }

    pub fn is_fetch(&self) -> bool {
        matches!(self, TeamJoin::FetchLeft | TeamJoin::FetchInner)
    }

    pub fn is_inner(&self) -> bool {
        matches!(self, TeamJoin::Inner | TeamJoin::FetchInner)
    }

    fn into_fetch(self) -> Self {
        if self.is_inner() {
            TeamJoin::FetchInner
        } else {
            TeamJoin::FetchLeft
        }
    }
}

// =============================================================================
// Sort and Window
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    pub field: Field,
    pub direction: Direction,
}

impl Sort {
    pub fn asc(field: Field) -> Self {
        Sort {
            field,
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: Field) -> Self {
        Sort {
            field,
            direction: Direction::Desc,
        }
    }
}

/// Zero-based page index, page size and optional sort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
    pub sort: Vec<Sort>,
}

impl PageRequest {
    pub fn of(page: u32, size: u32) -> Self {
        PageRequest {
            page,
            size,
            sort: Vec::new(),
        }
    }

    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort.push(sort);
        self
    }

    /// Row offset of the first element of this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page) * u64::from(self.size)
    }

    /// The request for the following page. Stays put at `u32::MAX`.
    pub fn next(&self) -> Self {
        PageRequest {
            page: self.page.saturating_add(1),
            size: self.size,
            sort: self.sort.clone(),
        }
    }
}

/// Which part of the result set to return.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Window {
    #[default]
    All,
    /// A page plus a separate total count.
    Page(PageRequest),
    /// A page plus has-next, computed by over-fetching one row.
    Slice(PageRequest),
}

impl Window {
    pub fn request(&self) -> Option<&PageRequest> {
        match self {
            Window::All => None,
            Window::Page(req) | Window::Slice(req) => Some(req),
        }
    }
}

// =============================================================================
// Locking and Statement Kind
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockMode {
    #[default]
    None,
    /// Exclusive write lock held until the enclosing transaction ends.
    PessimisticWrite,
}

/// The SET clause of a bulk update.
#[derive(Debug, Clone, PartialEq)]
pub enum Assignment {
    /// `field = field + by`
    Increment { field: Field, by: i64 },
    /// `field = value`
    Set { field: Field, value: Value },
}

impl Assignment {
    pub fn field(&self) -> Field {
        match self {
            Assignment::Increment { field, .. } | Assignment::Set { field, .. } => *field,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    Select,
    /// Set-based update of every matching member row.
    Update {
        assignment: Assignment,
        touched_at: DateTime<Utc>,
    },
}

// =============================================================================
// Query Descriptor
// =============================================================================

/// A validated query intent. Construct with [`QueryDescriptor::select`] or
/// [`QueryDescriptor::update`].
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDescriptor {
    name: &'static str,
    kind: StatementKind,
    filters: Vec<Predicate>,
    projection: Projection,
    join: TeamJoin,
    sort: Vec<Sort>,
    window: Window,
    lock: LockMode,
    read_only: bool,
    cacheable: bool,
}

impl QueryDescriptor {
    /// Starts a select over `member`.
    pub fn select() -> QueryBuilder {
        QueryBuilder::new(None)
    }

    /// Starts a bulk update over `member`.
    pub fn update(assignment: Assignment) -> QueryBuilder {
        QueryBuilder::new(Some(assignment))
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> &StatementKind {
        &self.kind
    }

    pub fn is_update(&self) -> bool {
        matches!(self.kind, StatementKind::Update { .. })
    }

    pub fn filters(&self) -> &[Predicate] {
        &self.filters
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn join(&self) -> TeamJoin {
        self.join
    }

    pub fn sort(&self) -> &[Sort] {
        &self.sort
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn lock(&self) -> LockMode {
        self.lock
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn is_cacheable(&self) -> bool {
        self.cacheable
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Entity-graph attribute paths that exist on `Member`.
const GRAPH_ATTRIBUTES: &[&str] = &["team"];

/// Builder for [`QueryDescriptor`].
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    name: &'static str,
    assignment: Option<Assignment>,
    filters: Vec<Predicate>,
    projection: Projection,
    join: TeamJoin,
    sort: Vec<Sort>,
    window: Window,
    lock: LockMode,
    read_only: bool,
    cacheable: bool,
    error: Option<CoreError>,
}

impl QueryBuilder {
    fn new(assignment: Option<Assignment>) -> Self {
        QueryBuilder {
            name: "query",
            assignment,
            filters: Vec::new(),
            projection: Projection::Entity,
            join: TeamJoin::None,
            sort: Vec::new(),
            window: Window::All,
            lock: LockMode::None,
            read_only: false,
            cacheable: false,
            error: None,
        }
    }

    /// Label used in logs and error messages.
    pub fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Adds a clause to the conjunction.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filters.push(predicate);
        self
    }

    pub fn eq(self, field: Field, value: impl Into<Value>) -> Self {
        self.filter(Predicate::new(field, Operator::Eq, vec![value.into()]))
    }

    pub fn gt(self, field: Field, value: impl Into<Value>) -> Self {
        self.filter(Predicate::new(field, Operator::Gt, vec![value.into()]))
    }

    pub fn ge(self, field: Field, value: impl Into<Value>) -> Self {
        self.filter(Predicate::new(field, Operator::Ge, vec![value.into()]))
    }

    /// `field IN (values...)`. An empty list is rejected at translation.
    pub fn in_list<I, V>(self, field: Field, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.filter(Predicate::new(field, Operator::In, values))
    }

    pub fn project(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    pub fn left_join_team(mut self) -> Self {
        self.join = TeamJoin::LeftOuter;
        self
    }

    pub fn inner_join_team(mut self) -> Self {
        self.join = TeamJoin::Inner;
        self
    }

    /// Left outer fetch join: members keep their team loaded.
    pub fn fetch_team(mut self) -> Self {
        self.join = TeamJoin::FetchLeft;
        self
    }

    /// Inner fetch join: members without a team are dropped.
    pub fn fetch_team_inner(mut self) -> Self {
        self.join = TeamJoin::FetchInner;
        self
    }

    /// Eager-load hint by attribute path. Lowered exactly like
    /// [`QueryBuilder::fetch_team`]; an existing inner join stays inner.
    pub fn entity_graph<'a>(mut self, paths: impl IntoIterator<Item = &'a str>) -> Self {
        for path in paths {
            if GRAPH_ATTRIBUTES.contains(&path) {
                self.join = self.join.into_fetch();
            } else if self.error.is_none() {
                self.error = Some(CoreError::invalid(format!(
                    "unknown entity graph attribute '{path}' on Member"
                )));
            }
        }
        self
    }

    pub fn order_by(mut self, sort: Sort) -> Self {
        self.sort.push(sort);
        self
    }

    /// Returns a page plus a total count.
    pub fn page(mut self, request: PageRequest) -> Self {
        self.window = Window::Page(request);
        self
    }

    /// Returns a page plus has-next, without a count statement.
    pub fn slice(mut self, request: PageRequest) -> Self {
        self.window = Window::Slice(request);
        self
    }

    pub fn lock(mut self, mode: LockMode) -> Self {
        self.lock = mode;
        self
    }

    /// Returned entities are not change-tracked.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Results may be served from the engine's query cache.
    pub fn cacheable(mut self) -> Self {
        self.cacheable = true;
        self
    }

    /// Validates the intent and produces the descriptor.
    ///
    /// ## Errors
    /// `CoreError::InvalidDescriptor` for any combination the translator
    /// cannot lower unambiguously. Empty `IN` lists pass here and are
    /// rejected by the translator.
    pub fn build(self) -> CoreResult<QueryDescriptor> {
        if let Some(err) = self.error {
            return Err(err);
        }

        for predicate in &self.filters {
            predicate.validate()?;
            if predicate.field.is_team_field() && !self.join.is_joined() {
                return Err(CoreError::invalid(format!(
                    "filter on {} requires a team join",
                    predicate.field.qualified()
                )));
            }
        }

        for sort in &self.sort {
            if sort.field.is_team_field() && !self.join.is_joined() {
                return Err(CoreError::invalid(format!(
                    "sort on {} requires a team join",
                    sort.field.qualified()
                )));
            }
        }

        match &self.projection {
            Projection::Entity => {}
            Projection::Scalar(field) => {
                if field.is_team_field() && !self.join.is_joined() {
                    return Err(CoreError::invalid(format!(
                        "projection of {} requires a team join",
                        field.qualified()
                    )));
                }
            }
            Projection::Dto { shape, fields } => {
                if fields.as_slice() != shape.fields {
                    return Err(CoreError::invalid(format!(
                        "{} expects fields {:?}, got {:?}",
                        shape.name, shape.fields, fields
                    )));
                }
                if fields.iter().any(Field::is_team_field) && !self.join.is_joined() {
                    return Err(CoreError::invalid(format!(
                        "{} projection reads team columns and requires a team join",
                        shape.name
                    )));
                }
            }
        }

        if self.join.is_fetch() && self.projection != Projection::Entity {
            return Err(CoreError::invalid(
                "fetch join only applies to entity projections",
            ));
        }

        if let Some(request) = self.window.request() {
            if request.size == 0 {
                return Err(CoreError::invalid("page size must be greater than zero"));
            }
            for sort in &request.sort {
                if sort.field.is_team_field() && !self.join.is_joined() {
                    return Err(CoreError::invalid(format!(
                        "sort on {} requires a team join",
                        sort.field.qualified()
                    )));
                }
            }
        }

        if self.lock == LockMode::PessimisticWrite {
            if self.join.is_fetch() {
                return Err(CoreError::invalid(
                    "pessimistic lock cannot be combined with a fetch join",
                ));
            }
            if self.projection != Projection::Entity {
                return Err(CoreError::invalid(
                    "pessimistic lock requires an entity projection",
                ));
            }
            if self.window != Window::All {
                return Err(CoreError::invalid(
                    "pessimistic lock cannot be combined with pagination",
                ));
            }
            if self.read_only {
                return Err(CoreError::invalid(
                    "pessimistic lock cannot be combined with read-only mode",
                ));
            }
        }

        let kind = match self.assignment {
            None => StatementKind::Select,
            Some(assignment) => {
                validate_assignment(&assignment)?;
                if self.filters.iter().any(|p| p.field.is_team_field()) {
                    return Err(CoreError::invalid(
                        "bulk update filters may only reference member columns",
                    ));
                }
                if self.join.is_joined()
                    || self.projection != Projection::Entity
                    || self.window != Window::All
                    || self.lock != LockMode::None
                    || !self.sort.is_empty()
                    || self.read_only
                    || self.cacheable
                {
                    return Err(CoreError::invalid(
                        "bulk update accepts filters only (no join, projection, sort, window, lock or hints)",
                    ));
                }
                StatementKind::Update {
                    assignment,
                    touched_at: Utc::now(),
                }
            }
        };

        let mut sort = self.sort;
        if let Some(request) = self.window.request() {
            sort.extend(request.sort.iter().copied());
        }

        Ok(QueryDescriptor {
            name: self.name,
            kind,
            filters: self.filters,
            projection: self.projection,
            join: self.join,
            sort,
            window: self.window,
            lock: self.lock,
            read_only: self.read_only,
            cacheable: self.cacheable,
        })
    }
}

fn validate_assignment(assignment: &Assignment) -> CoreResult<()> {
    let field = assignment.field();
    if !matches!(field, Field::Username | Field::Age | Field::TeamId) {
        return Err(CoreError::invalid(format!(
            "bulk update cannot assign {}",
            field.qualified()
        )));
    }

    match assignment {
        Assignment::Increment { field, .. } if field.value_type() != ValueType::Integer => Err(
            CoreError::invalid(format!("cannot increment {}", field.qualified())),
        ),
        Assignment::Set { field, value } => {
            if value.is_null() && !field.is_nullable() {
                return Err(CoreError::invalid(format!(
                    "{} cannot be set to NULL",
                    field.qualified()
                )));
            }
            if value.value_type().is_some_and(|t| t != field.value_type()) {
                return Err(CoreError::invalid(format!(
                    "{} expects {:?} values",
                    field.qualified(),
                    field.value_type()
                )));
            }
            // Rows written here must still load as members.
            match (field, value) {
                (Field::Username, Value::Text(username)) => validate_username(username)?,
                (Field::Age, Value::Integer(age)) => validate_age(age_from_i64(*age)?)?,
                _ => {}
            }
            Ok(())
        }
        Assignment::Increment {
            field: Field::Age,
            by,
        } => {
            age_from_i64(*by)?;
            Ok(())
        }
        Assignment::Increment { .. } => Ok(()),
    }
}

fn age_from_i64(value: i64) -> CoreResult<i32> {
    i32::try_from(value).map_err(|_| {
        ValidationError::Overflow {
            field: "age".to_string(),
        }
        .into()
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_invalid(result: CoreResult<QueryDescriptor>) {
        assert!(
            matches!(result, Err(CoreError::InvalidDescriptor { .. })),
            "expected InvalidDescriptor, got {result:?}"
        );
    }

    #[test]
    fn test_dto_shape_must_match() {
        let ok = QueryDescriptor::select()
            .inner_join_team()
            .project(Projection::dto(
                DtoShape::MEMBER_DTO,
                [Field::MemberId, Field::Username, Field::TeamName],
            ))
            .build();
        assert!(ok.is_ok());

        // Wrong order
        assert_invalid(
            QueryDescriptor::select()
                .inner_join_team()
                .project(Projection::dto(
                    DtoShape::MEMBER_DTO,
                    [Field::Username, Field::MemberId, Field::TeamName],
                ))
                .build(),
        );

        // Wrong count
        assert_invalid(
            QueryDescriptor::select()
                .inner_join_team()
                .project(Projection::dto(
                    DtoShape::MEMBER_DTO,
                    [Field::MemberId, Field::Username],
                ))
                .build(),
        );
    }

    #[test]
    fn test_dto_with_team_column_requires_join() {
        assert_invalid(
            QueryDescriptor::select()
                .project(Projection::dto(
                    DtoShape::MEMBER_DTO,
                    DtoShape::MEMBER_DTO.fields.to_vec(),
                ))
                .build(),
        );
    }

    #[test]
    fn test_lock_rejects_fetch_join() {
        assert_invalid(
            QueryDescriptor::select()
                .fetch_team()
                .lock(LockMode::PessimisticWrite)
                .build(),
        );
        assert_invalid(
            QueryDescriptor::select()
                .entity_graph(["team"])
                .lock(LockMode::PessimisticWrite)
                .build(),
        );

        let locked = QueryDescriptor::select()
            .eq(Field::Username, "a")
            .lock(LockMode::PessimisticWrite)
            .build()
            .unwrap();
        assert_eq!(locked.lock(), LockMode::PessimisticWrite);
    }

    #[test]
    fn test_lock_rejects_projection_and_window() {
        assert_invalid(
            QueryDescriptor::select()
                .project(Projection::Scalar(Field::Username))
                .lock(LockMode::PessimisticWrite)
                .build(),
        );
        assert_invalid(
            QueryDescriptor::select()
                .page(PageRequest::of(0, 3))
                .lock(LockMode::PessimisticWrite)
                .build(),
        );
    }

    #[test]
    fn test_entity_graph_lowers_to_fetch_join() {
        let graph = QueryDescriptor::select()
            .entity_graph(["team"])
            .build()
            .unwrap();
        let explicit = QueryDescriptor::select().fetch_team().build().unwrap();
        assert_eq!(graph.join(), explicit.join());
        assert_eq!(graph, explicit);

        let inner = QueryDescriptor::select()
            .inner_join_team()
            .entity_graph(["team"])
            .build()
            .unwrap();
        assert_eq!(inner.join(), TeamJoin::FetchInner);
    }

    #[test]
    fn test_unknown_entity_graph_attribute() {
        assert_invalid(QueryDescriptor::select().entity_graph(["orders"]).build());
    }

    #[test]
    fn test_predicate_arity_and_types() {
        let two_values = Predicate::new(
            Field::Age,
            Operator::Eq,
            vec![Value::Integer(1), Value::Integer(2)],
        );
        assert_invalid(QueryDescriptor::select().filter(two_values).build());

        assert_invalid(QueryDescriptor::select().eq(Field::Age, "ten").build());
        assert_invalid(
            QueryDescriptor::select()
                .gt(Field::Age, Value::Null)
                .build(),
        );
    }

    #[test]
    fn test_empty_in_list_passes_builder() {
        let query = QueryDescriptor::select()
            .in_list(Field::Username, Vec::<String>::new())
            .build()
            .unwrap();
        assert!(query.filters()[0].values.is_empty());
    }

    #[test]
    fn test_team_filter_requires_join() {
        assert_invalid(
            QueryDescriptor::select()
                .eq(Field::TeamName, "teamA")
                .build(),
        );
        assert!(QueryDescriptor::select()
            .left_join_team()
            .eq(Field::TeamName, "teamA")
            .build()
            .is_ok());
    }

    #[test]
    fn test_zero_page_size() {
        assert_invalid(QueryDescriptor::select().page(PageRequest::of(0, 0)).build());
        assert_invalid(QueryDescriptor::select().slice(PageRequest::of(1, 0)).build());
    }

    #[test]
    fn test_page_sort_appended() {
        let query = QueryDescriptor::select()
            .order_by(Sort::asc(Field::Age))
            .page(PageRequest::of(0, 3).with_sort(Sort::desc(Field::Username)))
            .build()
            .unwrap();
        assert_eq!(
            query.sort(),
            &[Sort::asc(Field::Age), Sort::desc(Field::Username)]
        );
    }

    #[test]
    fn test_bulk_update_validation() {
        let ok = QueryDescriptor::update(Assignment::Increment {
            field: Field::Age,
            by: 1,
        })
        .ge(Field::Age, 20)
        .build()
        .unwrap();
        assert!(ok.is_update());

        assert_invalid(
            QueryDescriptor::update(Assignment::Increment {
                field: Field::Username,
                by: 1,
            })
            .build(),
        );
        assert_invalid(
            QueryDescriptor::update(Assignment::Set {
                field: Field::MemberId,
                value: Value::Integer(1),
            })
            .build(),
        );
        assert_invalid(
            QueryDescriptor::update(Assignment::Set {
                field: Field::Age,
                value: Value::Null,
            })
            .build(),
        );
        assert_invalid(
            QueryDescriptor::update(Assignment::Increment {
                field: Field::Age,
                by: 1,
            })
            .left_join_team()
            .build(),
        );
        assert_invalid(
            QueryDescriptor::update(Assignment::Increment {
                field: Field::Age,
                by: 1,
            })
            .page(PageRequest::of(0, 1))
            .build(),
        );
    }

    #[test]
    fn test_bulk_update_keeps_member_rules() {
        let invalid_value = |assignment| {
            let result = QueryDescriptor::update(assignment).build();
            assert!(
                matches!(result, Err(CoreError::Validation(_))),
                "expected Validation, got {result:?}"
            );
        };

        invalid_value(Assignment::Set {
            field: Field::Username,
            value: Value::from(""),
        });
        invalid_value(Assignment::Set {
            field: Field::Username,
            value: Value::from("a".repeat(crate::MAX_USERNAME_LEN + 1)),
        });
        invalid_value(Assignment::Set {
            field: Field::Age,
            value: Value::Integer(-1),
        });
        invalid_value(Assignment::Set {
            field: Field::Age,
            value: Value::Integer(i64::from(i32::MAX) + 1),
        });
        invalid_value(Assignment::Increment {
            field: Field::Age,
            by: i64::from(i32::MAX) + 10,
        });

        assert!(QueryDescriptor::update(Assignment::Set {
            field: Field::Username,
            value: Value::from("renamed"),
        })
        .build()
        .is_ok());
        assert!(QueryDescriptor::update(Assignment::Increment {
            field: Field::Age,
            by: i64::from(i32::MAX),
        })
        .build()
        .is_ok());
    }

    #[test]
    fn test_cloned_builder_carries_error() {
        let base = QueryDescriptor::select().eq(Field::Username, "member1");
        let graph = base.clone().entity_graph(["team"]).build().unwrap();
        let plain = base.build().unwrap();
        assert_eq!(graph.join(), TeamJoin::FetchLeft);
        assert_eq!(plain.join(), TeamJoin::None);

        let broken = QueryDescriptor::select().entity_graph(["orders"]);
        assert_invalid(broken.clone().build());
        assert_invalid(broken.build());
    }

    #[test]
    fn test_page_request_offset() {
        let request = PageRequest::of(2, 3);
        assert_eq!(request.offset(), 6);
        assert_eq!(request.next().page, 3);

        let last = PageRequest::of(u32::MAX, 3);
        assert_eq!(last.next().page, u32::MAX);
    }
}
