use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use orchestrator_core::{CacheRepository, InheritanceCacheEntry, Result, Tier};

use crate::common::{from_json, sqlx_error_to_orchestrator_error, tier_columns, to_json};

#[derive(Clone)]
pub struct SqliteCacheRepository {
    pool: SqlitePool,
}

impl SqliteCacheRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_entry(level: Tier, row: &SqliteRow) -> Result<InheritanceCacheEntry> {
    let resolved_context: String = row.get("resolved_context");
    let resolution_path: String = row.get("resolution_path");
    Ok(InheritanceCacheEntry {
        level,
        resolved_context: from_json(&resolved_context)?,
        dependencies_hash: row.get("dependencies_hash"),
        resolution_path: from_json(&resolution_path)?,
        created_at: row.get("created_at"),
        expires_at: row.get("expires_at"),
        hit_count: row.get("hit_count"),
        last_hit: row.get("last_hit"),
        size_bytes: row.get("size_bytes"),
        invalidated: row.get::<i64, _>("invalidated") != 0,
        invalidation_reason: row.get("invalidation_reason"),
    })
}

const SELECT_COLUMNS: &str = "resolved_context, dependencies_hash, resolution_path, created_at, expires_at, hit_count, last_hit, size_bytes, invalidated, invalidation_reason";

#[async_trait]
impl CacheRepository for SqliteCacheRepository {
    async fn get(&self, level: Tier) -> Result<Option<InheritanceCacheEntry>> {
        let (level_name, level_id) = tier_columns(level);
        let row = sqlx::query(&format!("SELECT {SELECT_COLUMNS} FROM inheritance_cache WHERE level = ? AND level_id = ?"))
            .bind(level_name)
            .bind(level_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        row.as_ref().map(|r| row_to_entry(level, r)).transpose()
    }

    async fn put(&self, level: Tier, entry: InheritanceCacheEntry) -> Result<()> {
        let (level_name, level_id) = tier_columns(level);
        sqlx::query(
            r#"
            INSERT INTO inheritance_cache (level, level_id, resolved_context, dependencies_hash, resolution_path, created_at, expires_at, hit_count, last_hit, size_bytes, invalidated, invalidation_reason)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (level, level_id) DO UPDATE SET
                resolved_context = excluded.resolved_context, dependencies_hash = excluded.dependencies_hash,
                resolution_path = excluded.resolution_path, created_at = excluded.created_at, expires_at = excluded.expires_at,
                hit_count = excluded.hit_count, last_hit = excluded.last_hit, size_bytes = excluded.size_bytes,
                invalidated = excluded.invalidated, invalidation_reason = excluded.invalidation_reason
            "#,
        )
        .bind(level_name)
        .bind(level_id)
        .bind(to_json(&entry.resolved_context)?)
        .bind(&entry.dependencies_hash)
        .bind(to_json(&entry.resolution_path)?)
        .bind(entry.created_at)
        .bind(entry.expires_at)
        .bind(entry.hit_count)
        .bind(entry.last_hit)
        .bind(entry.size_bytes)
        .bind(entry.invalidated as i64)
        .bind(&entry.invalidation_reason)
        .execute(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;
        Ok(())
    }

    async fn invalidate(&self, level: Tier, reason: &str) -> Result<()> {
        let (level_name, level_id) = tier_columns(level);
        sqlx::query("UPDATE inheritance_cache SET invalidated = 1, invalidation_reason = ? WHERE level = ? AND level_id = ?")
            .bind(reason)
            .bind(level_name)
            .bind(level_id)
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        Ok(())
    }

    async fn invalidate_many(&self, levels: &[Tier], reason: &str) -> Result<()> {
        for &level in levels {
            self.invalidate(level, reason).await?;
        }
        Ok(())
    }

    async fn entry_count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS c FROM inheritance_cache")
            .fetch_one(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        Ok(row.get("c"))
    }

    async fn evict_lru(&self, keep: i64) -> Result<i64> {
        let result = sqlx::query(
            r#"
            DELETE FROM inheritance_cache WHERE rowid IN (
                SELECT rowid FROM inheritance_cache
                ORDER BY COALESCE(last_hit, created_at) ASC
                LIMIT MAX((SELECT COUNT(*) FROM inheritance_cache) - ?, 0)
            )
            "#,
        )
        .bind(keep)
        .execute(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;
        Ok(result.rows_affected() as i64)
    }
}
