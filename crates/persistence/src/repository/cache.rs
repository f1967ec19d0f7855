//! Cache repository: set-with-expiry storage for gateway responses

use crate::DbResult;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// A single cached payload
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CacheEntryRecord {
    pub cache_key: String,
    pub value: String,
    pub expires_at: i64,
    pub created_at: Option<i64>,
}

/// Repository for the `cache_entries` table
pub struct CacheRepository<'a> {
    pool: &'a SqlitePool,
}

/// Current unix time in seconds
pub fn unix_now() -> i64 {
    Utc::now().timestamp()
}

impl<'a> CacheRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Fetch an entry that has not expired at `now`
    pub async fn get_live(&self, key: &str, now: i64) -> DbResult<Option<CacheEntryRecord>> {
        let record = sqlx::query_as::<_, CacheEntryRecord>(
            "SELECT * FROM cache_entries WHERE cache_key = ?1 AND expires_at > ?2",
        )
        .bind(key)
        .bind(now)
        .fetch_optional(self.pool)
        .await?;

        Ok(record)
    }

    /// Insert or replace an entry (last writer wins)
    pub async fn upsert(&self, key: &str, value: &str, expires_at: i64) -> DbResult<()> {
        sqlx::query(
            r#"INSERT INTO cache_entries (cache_key, value, expires_at, created_at)
               VALUES (?1, ?2, ?3, strftime('%s', 'now'))
               ON CONFLICT(cache_key) DO UPDATE SET
                 value = excluded.value,
                 expires_at = excluded.expires_at,
                 created_at = excluded.created_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(expires_at)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Delete every entry expired at `now`, returning the number removed
    pub async fn purge_expired(&self, now: i64) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE expires_at <= ?1")
            .bind(now)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Reclaim disk space after a purge
    pub async fn vacuum(&self) -> DbResult<()> {
        sqlx::query("VACUUM").execute(self.pool).await?;
        Ok(())
    }

    /// Total rows, expired or not
    pub async fn count(&self) -> DbResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cache_entries")
            .fetch_one(self.pool)
            .await?;
        Ok(row.0)
    }
}
