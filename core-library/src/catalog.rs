//! # Media Catalog
//!
//! The live media library is owned by an external scanner that can add,
//! remove or renumber entities at any time. The ledger only ever asks it one
//! question: does this id still exist?

use async_trait::async_trait;

use crate::error::Result;
use crate::models::MediaType;

/// Read-only view of the live media library.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaCatalog: Send + Sync {
    /// Number of catalog rows matching `id` for `media_type`.
    ///
    /// Zero means the id is stale and its counters may be discarded.
    async fn count_by_id(&self, media_type: MediaType, id: i64) -> Result<u64>;
}
