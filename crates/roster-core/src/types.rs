//! # Domain Types
//!
//! The entity model: [`Member`], [`Team`] and the read-only [`MemberDto`].
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐  team   ┌─────────────────┐                        │
//! │  │     Member      │ ──────► │      Team       │                        │
//! │  │  ─────────────  │ (0..1)  │  ─────────────  │                        │
//! │  │  id             │         │  id             │                        │
//! │  │  username       │         │  name           │                        │
//! │  │  age (>= 0)     │         └─────────────────┘                        │
//! │  │  team: TeamRef  │                                                    │
//! │  │  version        │         ┌─────────────────┐                        │
//! │  └─────────────────┘         │   MemberDto     │ (query-time only)      │
//! │                              │  id, username,  │                        │
//! │                              │  team_name      │                        │
//! │                              └─────────────────┘                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## No Lazy Proxies
//! A member loaded without a fetch join only knows its team's id
//! ([`TeamRef::Reference`]). Asking for the team itself fails fast with
//! [`CoreError::UnloadedReference`] instead of silently querying again.
//!
//! ## Change Tracking
//! Members loaded in managed mode carry a snapshot of their persistent state.
//! `MemberRepository::flush` writes back only members whose state differs
//! from that snapshot. Read-only members have no snapshot and are never
//! written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::validation::{validate_age, validate_team_name, validate_username};

// =============================================================================
// Team
// =============================================================================

/// A team that members may belong to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Team {
    /// Database identity.
    #[cfg_attr(feature = "sqlx", sqlx(rename = "team_id"))]
    pub id: i64,

    /// Display name.
    pub name: String,
}

impl Team {
    /// Builds a team from stored columns, validating the name.
    pub fn restore(id: i64, name: impl Into<String>) -> CoreResult<Self> {
        let name = name.into();
        validate_team_name(&name)?;
        Ok(Team { id, name })
    }
}

impl PartialEq for Team {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Team {}

// =============================================================================
// Team Reference
// =============================================================================

/// State of a member's team association.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TeamRef {
    /// The member has no team.
    #[default]
    None,
    /// Only the foreign key is known.
    Reference { id: i64 },
    /// The team row was materialized in the same round trip.
    Loaded(Team),
}

impl TeamRef {
    /// The referenced team id, loaded or not.
    pub fn id(&self) -> Option<i64> {
        match self {
            TeamRef::None => None,
            TeamRef::Reference { id } => Some(*id),
            TeamRef::Loaded(team) => Some(team.id),
        }
    }

    /// Whether the team row itself is available.
    pub fn is_loaded(&self) -> bool {
        matches!(self, TeamRef::Loaded(_))
    }
}

// =============================================================================
// Member
// =============================================================================

/// Columns of a `member` row, before the team association is resolved.
#[derive(Debug, Clone)]
pub struct MemberRow {
    pub id: i64,
    pub username: String,
    pub age: i32,
    pub team_id: Option<i64>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The persistent state compared by dirty checking.
#[derive(Debug, Clone, PartialEq, Eq)]
struct MemberState {
    username: String,
    age: i32,
    team_id: Option<i64>,
}

/// How the persistence layer treats a member instance.
#[derive(Debug, Clone, Default)]
enum Tracking {
    /// Not yet inserted.
    #[default]
    Transient,
    /// Loaded (or inserted) with change tracking.
    Managed(MemberState),
    /// Loaded in read-only mode; never written back.
    ReadOnly,
}

/// A member of (at most) one team.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    id: Option<i64>,
    username: String,
    age: i32,
    team: TeamRef,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip)]
    tracking: Tracking,
}

impl Member {
    /// Creates a new, unsaved member without a team.
    ///
    /// ## Example
    /// ```rust
    /// use roster_core::Member;
    ///
    /// let member = Member::new("member1", 10).unwrap();
    /// assert_eq!(member.age(), 10);
    /// assert!(member.id().is_none());
    /// assert!(Member::new("member1", -1).is_err());
    /// ```
    pub fn new(username: impl Into<String>, age: i32) -> CoreResult<Self> {
        let username = username.into();
        validate_username(&username)?;
        validate_age(age)?;

        let now = Utc::now();
        Ok(Member {
            id: None,
            username,
            age,
            team: TeamRef::None,
            version: 0,
            created_at: now,
            updated_at: now,
            tracking: Tracking::Transient,
        })
    }

    /// Creates a new, unsaved member belonging to `team`.
    pub fn with_team(username: impl Into<String>, age: i32, team: &Team) -> CoreResult<Self> {
        let mut member = Member::new(username, age)?;
        member.change_team(team);
        Ok(member)
    }

    /// Rebuilds a member from a stored row.
    ///
    /// `read_only` members skip change tracking entirely.
    pub fn restore(row: MemberRow, team: TeamRef, read_only: bool) -> CoreResult<Self> {
        validate_username(&row.username)?;
        validate_age(row.age)?;

        if team.id() != row.team_id {
            return Err(CoreError::invalid(format!(
                "team association {:?} does not match member.team_id {:?}",
                team.id(),
                row.team_id
            )));
        }

        let mut member = Member {
            id: Some(row.id),
            username: row.username,
            age: row.age,
            team,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
            tracking: Tracking::ReadOnly,
        };
        if !read_only {
            member.tracking = Tracking::Managed(member.state());
        }
        Ok(member)
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn age(&self) -> i32 {
        self.age
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// The team id, available whether or not the team was fetched.
    pub fn team_id(&self) -> Option<i64> {
        self.team.id()
    }

    /// The raw association state.
    pub fn team_ref(&self) -> &TeamRef {
        &self.team
    }

    /// The member's team.
    ///
    /// ## Returns
    /// * `Ok(None)` - Member has no team
    /// * `Ok(Some(team))` - Team was fetched with the member
    /// * `Err(CoreError::UnloadedReference)` - Only the id is known
    pub fn team(&self) -> CoreResult<Option<&Team>> {
        match &self.team {
            TeamRef::None => Ok(None),
            TeamRef::Loaded(team) => Ok(Some(team)),
            TeamRef::Reference { id } => Err(CoreError::UnloadedReference {
                entity: "Team".to_string(),
                id: *id,
            }),
        }
    }

    // -------------------------------------------------------------------------
    // Mutation
    // -------------------------------------------------------------------------

    /// Sets the age, keeping `age >= 0`.
    pub fn set_age(&mut self, age: i32) -> CoreResult<()> {
        validate_age(age)?;
        self.age = age;
        Ok(())
    }

    /// Adds `delta` to the age, keeping `age >= 0`.
    pub fn add_age(&mut self, delta: i32) -> CoreResult<()> {
        let age = self
            .age
            .checked_add(delta)
            .ok_or_else(|| ValidationError::Overflow {
                field: "age".to_string(),
            })?;
        self.set_age(age)
    }

    /// Moves the member to `team`.
    pub fn change_team(&mut self, team: &Team) {
        self.team = TeamRef::Loaded(team.clone());
    }

    /// Removes the member from its team.
    pub fn leave_team(&mut self) {
        self.team = TeamRef::None;
    }

    // -------------------------------------------------------------------------
    // Persistence hooks
    // -------------------------------------------------------------------------

    /// Whether the member was loaded in read-only mode.
    pub fn is_read_only(&self) -> bool {
        matches!(self.tracking, Tracking::ReadOnly)
    }

    /// Whether the member is tracked and differs from its loaded state.
    pub fn is_dirty(&self) -> bool {
        match &self.tracking {
            Tracking::Managed(snapshot) => *snapshot != self.state(),
            Tracking::Transient | Tracking::ReadOnly => false,
        }
    }

    /// Records the identity assigned by the store on insert and starts tracking.
    pub fn on_inserted(&mut self, id: i64) {
        self.id = Some(id);
        self.tracking = Tracking::Managed(self.state());
    }

    /// Records a successful write-back of the tracked state.
    pub fn on_flushed(&mut self, updated_at: DateTime<Utc>) {
        self.version += 1;
        self.updated_at = updated_at;
        self.tracking = Tracking::Managed(self.state());
    }

    fn state(&self) -> MemberState {
        MemberState {
            username: self.username.clone(),
            age: self.age,
            team_id: self.team.id(),
        }
    }
}

/// Identity equality: two members are equal when they share a database id.
/// Unsaved members are never equal to anything.
impl PartialEq for Member {
    fn eq(&self, other: &Self) -> bool {
        matches!((self.id, other.id), (Some(a), Some(b)) if a == b)
    }
}

// =============================================================================
// Member DTO
// =============================================================================

/// Read-only projection `(id, username, team_name)`.
///
/// Assembled directly from query columns; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDto {
    pub id: i64,
    pub username: String,
    pub team_name: Option<String>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: i64, team_id: Option<i64>) -> MemberRow {
        let now = Utc::now();
        MemberRow {
            id,
            username: "member1".to_string(),
            age: 10,
            team_id,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_age_invariant_on_mutation() {
        let mut member = Member::new("member1", 10).unwrap();
        assert!(member.set_age(-1).is_err());
        assert_eq!(member.age(), 10);

        assert!(member.add_age(-11).is_err());
        member.add_age(5).unwrap();
        assert_eq!(member.age(), 15);

        let mut old = Member::new("old", i32::MAX).unwrap();
        assert!(matches!(
            old.add_age(1),
            Err(CoreError::Validation(ValidationError::Overflow { .. }))
        ));
    }

    #[test]
    fn test_equality_by_identity() {
        let a = Member::restore(row(1, None), TeamRef::None, false).unwrap();
        let mut b = Member::restore(row(1, None), TeamRef::None, true).unwrap();
        b.set_age(99).unwrap();
        assert_eq!(a, b);

        let c = Member::restore(row(2, None), TeamRef::None, false).unwrap();
        assert_ne!(a, c);

        let unsaved = Member::new("member1", 10).unwrap();
        assert_ne!(unsaved, unsaved.clone());
    }

    #[test]
    fn test_reference_only_team_fails_fast() {
        let member = Member::restore(row(1, Some(7)), TeamRef::Reference { id: 7 }, false).unwrap();
        assert_eq!(member.team_id(), Some(7));
        assert!(matches!(
            member.team(),
            Err(CoreError::UnloadedReference { id: 7, .. })
        ));

        let team = Team::restore(7, "teamA").unwrap();
        let member = Member::restore(row(1, Some(7)), TeamRef::Loaded(team), false).unwrap();
        assert_eq!(member.team().unwrap().unwrap().name, "teamA");
    }

    #[test]
    fn test_restore_rejects_mismatched_team() {
        let result = Member::restore(row(1, Some(7)), TeamRef::None, false);
        assert!(matches!(result, Err(CoreError::InvalidDescriptor { .. })));
    }

    #[test]
    fn test_dirty_tracking() {
        let mut managed = Member::restore(row(1, None), TeamRef::None, false).unwrap();
        assert!(!managed.is_dirty());
        managed.set_age(11).unwrap();
        assert!(managed.is_dirty());
        managed.on_flushed(Utc::now());
        assert!(!managed.is_dirty());
        assert_eq!(managed.version(), 1);

        let mut read_only = Member::restore(row(2, None), TeamRef::None, true).unwrap();
        read_only.set_age(50).unwrap();
        assert!(read_only.is_read_only());
        assert!(!read_only.is_dirty());

        let mut transient = Member::new("new", 1).unwrap();
        transient.set_age(2).unwrap();
        assert!(!transient.is_dirty());
        transient.on_inserted(3);
        assert_eq!(transient.id(), Some(3));
        transient.leave_team();
        assert!(!transient.is_dirty());
    }

    #[test]
    fn test_change_team_marks_dirty() {
        let mut member = Member::restore(row(1, None), TeamRef::None, false).unwrap();
        let team = Team::restore(4, "teamB").unwrap();
        member.change_team(&team);
        assert!(member.is_dirty());
        assert_eq!(member.team().unwrap(), Some(&team));
    }

    #[test]
    fn test_dto_serializes() {
        let dto = MemberDto {
            id: 1,
            username: "AAA".to_string(),
            team_name: Some("teamA".to_string()),
        };
        let json = serde_json::to_value(&dto).unwrap();
        assert_eq!(json["team_name"], "teamA");
    }
}
