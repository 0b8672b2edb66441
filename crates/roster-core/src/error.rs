//! # Error Types
//!
//! Domain-specific error types for roster-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  roster-core errors (this file)                                        │
//! │  ├── CoreError        - Descriptor / translation / entity errors       │
//! │  └── ValidationError  - Field-level validation failures                │
//! │                                                                         │
//! │  roster-db errors (separate crate)                                     │
//! │  └── DbError          - Execution failures (wraps CoreError)           │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → caller                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant here is raised BEFORE a statement reaches the database.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Errors raised while describing, translating or inspecting queries.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    /// The query intent is malformed.
    ///
    /// ## When This Occurs
    /// - DTO projection fields don't match the DTO shape
    /// - Lock mode combined with a fetch join
    /// - Team field used without a team join
    /// - Unknown entity-graph attribute
    #[error("Invalid query descriptor: {reason}")]
    InvalidDescriptor { reason: String },

    /// An `IN` predicate was given no values.
    ///
    /// An empty list matches nothing, so the translator refuses it instead
    /// of emitting an always-false statement.
    #[error("IN list for {field} must contain at least one value")]
    EmptyInList { field: String },

    /// A reference-only association was accessed.
    ///
    /// ## User Workflow
    /// ```text
    /// repo.find_list_by_username("a")   (no fetch join)
    ///      │
    ///      ▼
    /// member.team()  ──► UnloadedReference { entity: "Team", id: 7 }
    ///
    /// repo.find_by_username("a")        (entity graph: team)
    ///      │
    ///      ▼
    /// member.team()  ──► Ok(Some(&Team { id: 7, name: "teamA" }))
    /// ```
    #[error("{entity} {id} is not loaded; request a fetch join or entity graph")]
    UnloadedReference { entity: String, id: i64 },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates an InvalidDescriptor error.
    pub fn invalid(reason: impl Into<String>) -> Self {
        CoreError::InvalidDescriptor {
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Field validation errors for entities.
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must not be negative.
    #[error("{field} must not be negative (got {value})")]
    Negative { field: String, value: i64 },

    /// Arithmetic on the field overflowed.
    #[error("{field} overflowed")]
    Overflow { field: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::EmptyInList {
            field: "m.username".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "IN list for m.username must contain at least one value"
        );

        let err = CoreError::UnloadedReference {
            entity: "Team".to_string(),
            id: 7,
        };
        assert_eq!(
            err.to_string(),
            "Team 7 is not loaded; request a fetch join or entity graph"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Negative {
            field: "age".to_string(),
            value: -1,
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(
            core_err.to_string(),
            "Validation error: age must not be negative (got -1)"
        );
    }
}
