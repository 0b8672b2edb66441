//! # Database Error Types
//!
//! Error types for statement execution.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  CoreError (descriptor / translation, before execution)                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError ◄── SQLite Error (sqlx::Error), categorized here               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Caller decides whether to retry (nothing is retried automatically)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Taxonomy
//! | Variant                 | Raised when                                   |
//! |-------------------------|-----------------------------------------------|
//! | `Core`                  | malformed descriptor, empty `IN` list         |
//! | `AmbiguousResult`       | single-result lookup matched several rows     |
//! | `LockTimeout`           | write lock not granted within the wait bound  |
//! | `StaleEntity`           | flush of a member changed behind its back     |
//! | `NotFound`              | write or refresh targeted a missing row       |
//! | storage family          | anything else surfaced by SQLite              |

use std::time::Duration;

use roster_core::CoreError;
use thiserror::Error;

/// SQLite result codes for "database is locked" (SQLITE_BUSY and its
/// extended forms).
const SQLITE_BUSY_CODES: &[&str] = &["5", "261", "517", "773"];

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// The query was rejected before reaching the database.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A single-result lookup matched more than one row.
    ///
    /// ## When This Occurs
    /// - `find_member_by_username` with a duplicated username
    #[error("{query} expected at most one result, found {count}")]
    AmbiguousResult { query: String, count: usize },

    /// The pessimistic write lock was not granted in time.
    #[error("Write lock not acquired within {}ms", timeout.as_millis())]
    LockTimeout { timeout: Duration },

    /// A flushed entity no longer matches the stored row version.
    ///
    /// ## When This Occurs
    /// - Flushing a member loaded before a bulk update touched its row
    #[error("{entity} {id} is stale; reload it before writing")]
    StaleEntity { entity: String, id: i64 },

    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - Saving a member that references a non-existent team
    /// - Deleting a team that still has members
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Whether this is an opaque failure surfaced by the storage engine,
    /// as opposed to a contract violation detected by this crate.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            DbError::UniqueViolation { .. }
                | DbError::ForeignKeyViolation { .. }
                | DbError::ConnectionFailed(_)
                | DbError::MigrationFailed(_)
                | DbError::QueryFailed(_)
                | DbError::TransactionFailed(_)
                | DbError::PoolExhausted
                | DbError::Internal(_)
        )
    }
}

/// Whether SQLite refused the statement because another connection holds
/// the lock.
pub(crate) fn is_busy(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err
                .code()
                .is_some_and(|code| SQLITE_BUSY_CODES.contains(&code.as_ref()))
                || db_err.message().contains("database is locked")
        }
        _ => false,
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // UNIQUE constraint: "UNIQUE constraint failed: <table>.<column>"
                // FK constraint: "FOREIGN KEY constraint failed"
                if let Some(field) = msg.strip_prefix("UNIQUE constraint failed: ") {
                    DbError::UniqueViolation {
                        field: field.to_string(),
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            sqlx::Error::ColumnDecode { index, source } => {
                DbError::Internal(format!("cannot decode column {index}: {source}"))
            }

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = DbError::AmbiguousResult {
            query: "find_member_by_username".to_string(),
            count: 2,
        };
        assert_eq!(
            err.to_string(),
            "find_member_by_username expected at most one result, found 2"
        );

        let err = DbError::LockTimeout {
            timeout: Duration::from_millis(250),
        };
        assert_eq!(err.to_string(), "Write lock not acquired within 250ms");
    }

    #[test]
    fn test_core_errors_pass_through() {
        let err: DbError = CoreError::EmptyInList {
            field: "m.username".to_string(),
        }
        .into();
        assert!(matches!(err, DbError::Core(CoreError::EmptyInList { .. })));
        assert!(!err.is_storage());
        assert_eq!(
            err.to_string(),
            "IN list for m.username must contain at least one value"
        );
    }

    #[test]
    fn test_storage_classification() {
        assert!(DbError::from(sqlx::Error::PoolTimedOut).is_storage());
        assert!(DbError::QueryFailed("syntax".into()).is_storage());
        assert!(!DbError::StaleEntity {
            entity: "Member".into(),
            id: 1
        }
        .is_storage());
        assert!(!is_busy(&sqlx::Error::PoolTimedOut));
    }
}
