//! Play-count repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::{MediaType, PlayCountRow};
use async_trait::async_trait;
use sqlx::{query, query_as, query_scalar, SqlitePool};

/// Play-count repository interface for data access operations
#[async_trait]
pub trait PlayCountRepository: Send + Sync {
    /// Add one play (or one skip) to the counters of `(media_type, media_id)`,
    /// creating the row on first use.
    ///
    /// The increment is a single statement, so concurrent callers never lose
    /// an update.
    async fn increment(&self, media_type: MediaType, media_id: i64, was_played: bool)
        -> Result<()>;

    /// Counters of one entity
    ///
    /// # Returns
    /// - `Ok(Some(row))` if the entity has ever been played or skipped
    /// - `Ok(None)` otherwise
    async fn find(&self, media_type: MediaType, media_id: i64) -> Result<Option<PlayCountRow>>;

    /// Ids with at least one play, most played first.
    ///
    /// Ties keep insertion order.
    async fn top_played(&self, media_type: MediaType, limit: u32) -> Result<Vec<i64>>;

    /// Up to `limit` ids of `media_type` in random order
    async fn sample_ids(&self, media_type: MediaType, limit: u32) -> Result<Vec<i64>>;

    /// Every id of `media_type`
    async fn all_ids(&self, media_type: MediaType) -> Result<Vec<i64>>;

    /// Delete the counters of one entity
    ///
    /// # Returns
    /// - `Ok(true)` if a row was deleted
    /// - `Ok(false)` if there was nothing to delete
    async fn delete(&self, media_type: MediaType, media_id: i64) -> Result<bool>;

    /// Number of rows of `media_type`
    async fn count(&self, media_type: MediaType) -> Result<i64>;
}

/// SQLite implementation of PlayCountRepository
pub struct SqlitePlayCountRepository {
    pool: SqlitePool,
}

impl SqlitePlayCountRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlayCountRepository for SqlitePlayCountRepository {
    async fn increment(
        &self,
        media_type: MediaType,
        media_id: i64,
        was_played: bool,
    ) -> Result<()> {
        let (plays, skips) = if was_played { (1, 0) } else { (0, 1) };

        query(
            r#"
            INSERT INTO playcounts (type, type_id, playcount, skipcount)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (type, type_id) DO UPDATE SET
                playcount = playcount + excluded.playcount,
                skipcount = skipcount + excluded.skipcount
            "#,
        )
        .bind(media_type)
        .bind(media_id)
        .bind(plays)
        .bind(skips)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find(&self, media_type: MediaType, media_id: i64) -> Result<Option<PlayCountRow>> {
        let row = query_as::<_, PlayCountRow>(
            "SELECT type, type_id, playcount, skipcount FROM playcounts WHERE type = ? AND type_id = ?",
        )
        .bind(media_type)
        .bind(media_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn top_played(&self, media_type: MediaType, limit: u32) -> Result<Vec<i64>> {
        if limit == 0 {
            return Err(LibraryError::InvalidInput {
                field: "limit".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        let ids = query_scalar::<_, i64>(
            r#"
            SELECT type_id FROM playcounts
            WHERE type = ? AND playcount > 0
            ORDER BY playcount DESC, rowid ASC
            LIMIT ?
            "#,
        )
        .bind(media_type)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn sample_ids(&self, media_type: MediaType, limit: u32) -> Result<Vec<i64>> {
        let ids = query_scalar::<_, i64>(
            "SELECT type_id FROM playcounts WHERE type = ? ORDER BY RANDOM() LIMIT ?",
        )
        .bind(media_type)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn all_ids(&self, media_type: MediaType) -> Result<Vec<i64>> {
        let ids = query_scalar::<_, i64>(
            "SELECT type_id FROM playcounts WHERE type = ? ORDER BY rowid",
        )
        .bind(media_type)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn delete(&self, media_type: MediaType, media_id: i64) -> Result<bool> {
        let result = query("DELETE FROM playcounts WHERE type = ? AND type_id = ?")
            .bind(media_type)
            .bind(media_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count(&self, media_type: MediaType) -> Result<i64> {
        let count = query_scalar::<_, i64>("SELECT COUNT(*) FROM playcounts WHERE type = ?")
            .bind(media_type)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    async fn repository() -> SqlitePlayCountRepository {
        SqlitePlayCountRepository::new(create_test_pool().await.unwrap())
    }

    #[tokio::test]
    async fn test_increment_creates_then_updates() {
        let repo = repository().await;

        assert!(repo.find(MediaType::Song, 7).await.unwrap().is_none());

        repo.increment(MediaType::Song, 7, true).await.unwrap();
        repo.increment(MediaType::Song, 7, false).await.unwrap();

        let row = repo.find(MediaType::Song, 7).await.unwrap().unwrap();
        assert_eq!(row.media_type, MediaType::Song);
        assert_eq!(row.media_id, 7);
        assert_eq!(row.play_count, 1);
        assert_eq!(row.skip_count, 1);
        assert_eq!(repo.count(MediaType::Song).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_types_are_independent() {
        let repo = repository().await;

        repo.increment(MediaType::Song, 1, true).await.unwrap();
        repo.increment(MediaType::Album, 1, true).await.unwrap();
        repo.increment(MediaType::Album, 1, true).await.unwrap();

        let song = repo.find(MediaType::Song, 1).await.unwrap().unwrap();
        let album = repo.find(MediaType::Album, 1).await.unwrap().unwrap();
        assert_eq!(song.play_count, 1);
        assert_eq!(album.play_count, 2);
    }

    #[tokio::test]
    async fn test_top_played_skips_unplayed_and_keeps_insertion_order_on_ties() {
        let repo = repository().await;

        repo.increment(MediaType::Song, 10, false).await.unwrap();
        repo.increment(MediaType::Song, 20, true).await.unwrap();
        repo.increment(MediaType::Song, 30, true).await.unwrap();
        repo.increment(MediaType::Song, 40, true).await.unwrap();
        repo.increment(MediaType::Song, 40, true).await.unwrap();

        let top = repo.top_played(MediaType::Song, 10).await.unwrap();
        assert_eq!(top, vec![40, 20, 30]);
    }

    #[tokio::test]
    async fn test_top_played_rejects_zero_limit() {
        let repo = repository().await;
        assert!(matches!(
            repo.top_played(MediaType::Song, 0).await,
            Err(LibraryError::InvalidInput { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let repo = repository().await;
        repo.increment(MediaType::Genre, 3, true).await.unwrap();

        assert!(repo.delete(MediaType::Genre, 3).await.unwrap());
        assert!(!repo.delete(MediaType::Genre, 3).await.unwrap());
        assert_eq!(repo.count(MediaType::Genre).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sample_ids_is_bounded() {
        let repo = repository().await;
        for id in 0..25 {
            repo.increment(MediaType::Artist, id, true).await.unwrap();
        }

        let sample = repo.sample_ids(MediaType::Artist, 10).await.unwrap();
        assert_eq!(sample.len(), 10);
        assert!(sample.iter().all(|id| (0..25).contains(id)));

        let all = repo.all_ids(MediaType::Artist).await.unwrap();
        assert_eq!(all, (0..25).collect::<Vec<_>>());
    }
}
