//! Shared row/error-mapping helpers used by every repository implementation
//! in this crate.

use orchestrator_core::{OrchestratorError, Result, Tier};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Maps a raw sqlx error to the closed orchestrator error taxonomy.
/// Unique-constraint violations become `Conflict`, foreign-key violations
/// become `Invalid` (the referenced row does not exist); everything else
/// is `Internal`. `RowNotFound` is never expected here since every lookup
/// in this crate goes through `fetch_optional`.
pub fn sqlx_error_to_orchestrator_error(err: sqlx::Error) -> OrchestratorError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            OrchestratorError::conflict(format!("unique constraint violated: {}", db_err.message()))
        }
        sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
            OrchestratorError::invalid(format!("referenced row does not exist: {}", db_err.message()))
        }
        sqlx::Error::RowNotFound => OrchestratorError::internal("unexpected RowNotFound".to_string()),
        sqlx::Error::PoolTimedOut => OrchestratorError::internal("connection pool timeout".to_string()),
        sqlx::Error::Io(io_err) => OrchestratorError::internal(format!("database I/O error: {io_err}")),
        _ => OrchestratorError::internal(format!("database operation failed: {err}")),
    }
}

pub fn to_json(value: &impl Serialize) -> Result<String> {
    serde_json::to_string(value).map_err(|e| OrchestratorError::internal(format!("serialize failed: {e}")))
}

pub fn from_json<T: DeserializeOwned>(raw: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(|e| OrchestratorError::internal(format!("deserialize failed: {e}")))
}

/// Splits a [`Tier`] into the `(level, level_id)` column pair used by every
/// tier-addressed table. `Tier::Global` stores `level_id = 0`; there is
/// exactly one global row, so the sentinel never collides with a real
/// project/branch/task id.
pub fn tier_columns(tier: Tier) -> (&'static str, i64) {
    (tier.name(), tier.id().unwrap_or(0))
}

pub fn tier_from_columns(level: &str, level_id: i64) -> Result<Tier> {
    match level {
        "global" => Ok(Tier::Global),
        "project" => Ok(Tier::Project(level_id)),
        "branch" => Ok(Tier::Branch(level_id)),
        "task" => Ok(Tier::Task(level_id)),
        other => Err(OrchestratorError::internal(format!("unknown tier level '{other}' in database"))),
    }
}

/// Merges `patch` into `base` one level deep: each top-level key in `patch`
/// replaces the same key in `base` wholesale. Used when writing a tier's own
/// `data`/`local_overrides` blob — the cross-tier deep merge happens later,
/// in the context engine's resolver, not here.
pub fn merge_json_shallow(base: &serde_json::Value, patch: &serde_json::Value) -> serde_json::Value {
    let mut merged = base.clone();
    if let (Some(base_obj), Some(patch_obj)) = (merged.as_object_mut(), patch.as_object()) {
        for (k, v) in patch_obj {
            base_obj.insert(k.clone(), v.clone());
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_columns_round_trip() {
        for tier in [Tier::Global, Tier::Project(7), Tier::Branch(3), Tier::Task(9)] {
            let (level, id) = tier_columns(tier);
            assert_eq!(tier_from_columns(level, id).unwrap(), tier);
        }
    }
}
