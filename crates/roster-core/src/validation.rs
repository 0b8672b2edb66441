//! # Validation Module
//!
//! Field validation for entities.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: THIS MODULE                                                   │
//! │  ├── Member::new / set_age / add_age                                    │
//! │  └── Rows decoded from the database (Member::restore)                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Database (SQLite)                                             │
//! │  ├── NOT NULL constraints                                               │
//! │  ├── CHECK (age BETWEEN 0 AND 2147483647)                               │
//! │  └── Foreign key constraints                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use roster_core::validation::{validate_age, validate_username};
//!
//! validate_username("member1").unwrap();
//! validate_age(20).unwrap();
//! assert!(validate_age(-1).is_err());
//! ```

use crate::error::ValidationError;
use crate::{MAX_TEAM_NAME_LEN, MAX_USERNAME_LEN};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validates a username.
///
/// ## Rules
/// - Must not be empty or whitespace
/// - At most [`MAX_USERNAME_LEN`] characters
pub fn validate_username(username: &str) -> ValidationResult<()> {
    if username.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "username".to_string(),
        });
    }

    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(ValidationError::TooLong {
            field: "username".to_string(),
            max: MAX_USERNAME_LEN,
        });
    }

    Ok(())
}

/// Validates a member age (`age >= 0`).
pub fn validate_age(age: i32) -> ValidationResult<()> {
    if age < 0 {
        return Err(ValidationError::Negative {
            field: "age".to_string(),
            value: i64::from(age),
        });
    }

    Ok(())
}

/// Validates a team name: non-blank, at most [`MAX_TEAM_NAME_LEN`] characters.
pub fn validate_team_name(name: &str) -> ValidationResult<()> {
    if name.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "team.name".to_string(),
        });
    }

    if name.chars().count() > MAX_TEAM_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: "team.name".to_string(),
            max: MAX_TEAM_NAME_LEN,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_username() {
        assert!(validate_username("member1").is_ok());
        assert!(validate_username("AAA").is_ok());

        assert!(validate_username("").is_err());
        assert!(validate_username("   ").is_err());
        assert!(validate_username(&"a".repeat(MAX_USERNAME_LEN + 1)).is_err());
    }

    #[test]
    fn test_validate_age() {
        assert!(validate_age(0).is_ok());
        assert!(validate_age(120).is_ok());
        assert!(matches!(
            validate_age(-1),
            Err(ValidationError::Negative { value: -1, .. })
        ));
    }

    #[test]
    fn test_validate_team_name() {
        assert!(validate_team_name("teamA").is_ok());
        assert!(validate_team_name(" ").is_err());
        assert!(validate_team_name(&"t".repeat(MAX_TEAM_NAME_LEN)).is_ok());
        assert!(matches!(
            validate_team_name(&"t".repeat(MAX_TEAM_NAME_LEN + 1)),
            Err(ValidationError::TooLong { max: MAX_TEAM_NAME_LEN, .. })
        ));
    }
}
