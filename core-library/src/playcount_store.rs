//! # Play-Count Store
//!
//! Durable play/skip counters keyed by media identity, kept loosely
//! consistent with a media catalog that an external scanner may rewrite at
//! any time.
//!
//! ## Consistency
//!
//! Every recorded event is followed by a cheap garbage-collection pass: a
//! handful of random rows of the same media type are checked against the
//! catalog and deleted if the catalog no longer knows their id. Over many
//! events every stale row is eventually visited. Rows the catalog still knows
//! are never deleted, and a catalog failure for a row leaves it in place.
//! [`PlayCountStore::full_sweep`] checks every row at once when the host can
//! afford it, e.g. right after a library rescan.
//!
//! ## Failure handling
//!
//! Counters are advisory. [`PlayCountStore::record_event`] logs storage
//! failures and carries on; hosts that want to react use
//! [`PlayCountStore::try_record_event`].

use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::{debug, instrument, warn};

use crate::catalog::MediaCatalog;
use crate::error::Result;
use crate::models::{GcReport, MediaType, PlayCounts};
use crate::repositories::{PlayCountRepository, SqlitePlayCountRepository};

/// Rows sampled per opportunistic GC pass.
pub const DEFAULT_GC_SAMPLE_SIZE: u32 = 10;

pub struct PlayCountStore {
    repository: Arc<dyn PlayCountRepository>,
    catalog: Arc<dyn MediaCatalog>,
    gc_sample_size: u32,
}

impl PlayCountStore {
    pub fn new(repository: Arc<dyn PlayCountRepository>, catalog: Arc<dyn MediaCatalog>) -> Self {
        Self {
            repository,
            catalog,
            gc_sample_size: DEFAULT_GC_SAMPLE_SIZE,
        }
    }

    /// Store backed by the SQLite repository on `pool`.
    pub fn from_pool(pool: SqlitePool, catalog: Arc<dyn MediaCatalog>) -> Self {
        Self::new(Arc::new(SqlitePlayCountRepository::new(pool)), catalog)
    }

    /// A zero sample size is raised to one.
    pub fn with_gc_sample_size(mut self, sample_size: u32) -> Self {
        self.gc_sample_size = sample_size.max(1);
        self
    }

    pub fn gc_sample_size(&self) -> u32 {
        self.gc_sample_size
    }

    /// Count a completed play (`was_played`) or a skip, then run a GC pass.
    ///
    /// Never fails; storage errors are logged.
    pub async fn record_event(&self, media_type: MediaType, media_id: i64, was_played: bool) {
        if let Err(e) = self.try_record_event(media_type, media_id, was_played).await {
            warn!(
                %media_type,
                media_id,
                error = %e,
                "Failed to record play count"
            );
        }
    }

    /// Fallible form of [`record_event`](Self::record_event).
    ///
    /// Only the increment can fail; GC problems are logged.
    #[instrument(skip(self), level = "debug")]
    pub async fn try_record_event(
        &self,
        media_type: MediaType,
        media_id: i64,
        was_played: bool,
    ) -> Result<()> {
        self.repository
            .increment(media_type, media_id, was_played)
            .await?;

        if let Err(e) = self.gc(media_type).await {
            warn!(%media_type, error = %e, "Play count GC pass failed");
        }
        Ok(())
    }

    /// Ids with at least one play, most played first, ties in insertion order.
    pub async fn top_played(&self, media_type: MediaType, limit: u32) -> Result<Vec<i64>> {
        self.repository.top_played(media_type, limit).await
    }

    /// Counters of one entity; zero if it was never played or skipped.
    pub async fn counts(&self, media_type: MediaType, media_id: i64) -> Result<PlayCounts> {
        Ok(self
            .repository
            .find(media_type, media_id)
            .await?
            .map(PlayCounts::from)
            .unwrap_or_default())
    }

    /// Check a random sample of rows against the catalog and delete the
    /// stale ones.
    pub async fn gc(&self, media_type: MediaType) -> Result<GcReport> {
        let ids = self
            .repository
            .sample_ids(media_type, self.gc_sample_size)
            .await?;
        let report = self.collect(media_type, &ids).await;
        if report.removed > 0 || report.failed > 0 {
            debug!(%media_type, ?report, "Play count GC pass");
        }
        Ok(report)
    }

    /// Check every row of `media_type` against the catalog.
    #[instrument(skip(self))]
    pub async fn full_sweep(&self, media_type: MediaType) -> Result<GcReport> {
        let ids = self.repository.all_ids(media_type).await?;
        let report = self.collect(media_type, &ids).await;
        debug!(%media_type, ?report, "Play count full sweep");
        Ok(report)
    }

    async fn collect(&self, media_type: MediaType, ids: &[i64]) -> GcReport {
        let mut report = GcReport::default();

        for &id in ids {
            report.checked += 1;

            let live = match self.catalog.count_by_id(media_type, id).await {
                Ok(count) => count,
                Err(e) => {
                    warn!(%media_type, id, error = %e, "Catalog lookup failed, keeping row");
                    report.failed += 1;
                    continue;
                }
            };

            if live > 0 {
                continue;
            }

            match self.repository.delete(media_type, id).await {
                Ok(true) => report.removed += 1,
                // Already gone, e.g. removed by a concurrent pass.
                Ok(false) => {}
                Err(e) => {
                    warn!(%media_type, id, error = %e, "Failed to delete stale play count");
                    report.failed += 1;
                }
            }
        }

        report
    }
}
