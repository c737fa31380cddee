//! # Repository Pattern Implementation
//!
//! Repository traits and their SQLite implementations.
//!
//! - Traits define the data-access interface
//! - SQLite implementations use sqlx over a shared `SqlitePool`
//! - All operations return `Result<T>`

pub mod playcounts;

pub use playcounts::{PlayCountRepository, SqlitePlayCountRepository};
