//! # roster-core: Entities and Query Descriptors
//!
//! The pure half of the Roster data-access layer. It defines the entity
//! model, the structured query intent and its translation to SQL, with zero
//! I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Roster Data Flow                                 │
//! │                                                                         │
//! │  MemberRepository::find_by_names(["A", "B"])        (roster-db)         │
//! │       │                                                                 │
//! │  ┌────▼────────────────────────────────────────────────────────────┐   │
//! │  │               ★ roster-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐   ┌──────────────────┐   ┌──────────────────┐  │   │
//! │  │   │   types   │   │      query       │   │    translator    │  │   │
//! │  │   │  Member   │   │ QueryDescriptor  │──►│ SELECT ... WHERE │  │   │
//! │  │   │  Team     │   │ QueryBuilder     │   │ m.username IN    │  │   │
//! │  │   │ MemberDto │   │ PageRequest      │   │ (?1, ?2)         │  │   │
//! │  │   └───────────┘   └──────────────────┘   └──────────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • DETERMINISTIC TRANSLATION              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │  ┌────▼────────────────────────────────────────────────────────────┐   │
//! │  │            roster-db (QueryEngine executes against SQLite)       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Entity model (Member, Team, MemberDto)
//! - [`query`] - Query descriptors and their builder
//! - [`translator`] - Descriptor → SQL statements
//! - [`page`] - Page and Slice results
//! - [`error`] - Domain error types
//! - [`validation`] - Field validation
//!
//! ## Example Usage
//!
//! ```rust
//! use roster_core::query::{Field, PageRequest, QueryDescriptor};
//! use roster_core::translator::translate;
//!
//! let query = QueryDescriptor::select()
//!     .eq(Field::Age, 10)
//!     .left_join_team()
//!     .page(PageRequest::of(0, 3))
//!     .build()
//!     .unwrap();
//!
//! let translated = translate(&query).unwrap();
//! assert!(translated.count.is_some());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod page;
pub mod query;
pub mod translator;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use page::{Page, Slice};
pub use query::{Field, LockMode, PageRequest, QueryDescriptor, Value};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum username length in characters.
pub const MAX_USERNAME_LEN: usize = 100;

/// Maximum team name length in characters.
pub const MAX_TEAM_NAME_LEN: usize = 100;
