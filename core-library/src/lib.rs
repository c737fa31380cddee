//! # Library Module
//!
//! Owns the play-count ledger database and its consistency with the live
//! media catalog.
//!
//! ## Overview
//!
//! This module manages:
//! - SQLite connection pool and embedded migrations ([`db`])
//! - The `playcounts` repository ([`repositories`])
//! - The [`MediaCatalog`](catalog::MediaCatalog) collaborator used to detect
//!   stale rows
//! - [`PlayCountStore`](playcount_store::PlayCountStore), the ledger used by
//!   the playback core

pub mod catalog;
pub mod db;
pub mod error;
pub mod models;
pub mod playcount_store;
pub mod repositories;

pub use catalog::MediaCatalog;
pub use error::{LibraryError, Result};
pub use models::{GcReport, MediaType, PlayCountRow, PlayCounts};
pub use playcount_store::{PlayCountStore, DEFAULT_GC_SAMPLE_SIZE};
