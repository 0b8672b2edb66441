//! # Repository Module
//!
//! Repository implementations for Roster.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    From finder call to rows                             │
//! │                                                                         │
//! │  db.members().find_by_age(10, PageRequest::of(0, 3))                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  MemberRepository        builds a QueryDescriptor (no SQL here)         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  QueryEngine             translate → bind → execute → materialize       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`MemberRepository`](member::MemberRepository) - Member finders, bulk update, persistence
//! - [`TeamRepository`](team::TeamRepository) - Team CRUD

pub mod member;
pub mod team;
