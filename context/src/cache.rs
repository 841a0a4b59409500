//! Cache entry construction and freshness checks for resolved contexts.
//!
//! The actual storage is behind [`orchestrator_core::CacheRepository`]
//! (SQLite-backed in `database`); this module only knows how to decide
//! whether an existing entry is still usable and how to build a new one.

use chrono::{Duration, Utc};
use orchestrator_core::InheritanceCacheEntry;

use crate::resolver::ResolveOutcome;
use crate::tiers::Tier;

#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    pub ttl_seconds: i64,
    pub max_entries: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_seconds: 300, max_entries: 10_000 }
    }
}

/// Whether a cached entry can be returned as-is for this resolve call.
pub fn is_fresh(entry: &InheritanceCacheEntry, dependencies_hash: &str, force_refresh: bool) -> bool {
    !force_refresh
        && !entry.invalidated
        && entry.expires_at > Utc::now()
        && entry.dependencies_hash == dependencies_hash
}

pub fn build_entry(level: Tier, outcome: &ResolveOutcome, config: &CacheConfig) -> InheritanceCacheEntry {
    let now = Utc::now();
    let size_bytes = serde_json::to_vec(&outcome.resolved).map(|v| v.len() as i64).unwrap_or(0);
    InheritanceCacheEntry {
        level,
        resolved_context: outcome.resolved.clone(),
        dependencies_hash: outcome.dependencies_hash.clone(),
        resolution_path: outcome.resolution_path.clone(),
        created_at: now,
        expires_at: now + Duration::seconds(config.ttl_seconds),
        hit_count: 0,
        last_hit: None,
        size_bytes,
        invalidated: false,
        invalidation_reason: None,
    }
}

/// Records a cache hit on a clone of `entry`, ready to be persisted back.
pub fn record_hit(entry: &InheritanceCacheEntry) -> InheritanceCacheEntry {
    let mut hit = entry.clone();
    hit.hit_count += 1;
    hit.last_hit = Some(Utc::now());
    hit
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn outcome() -> ResolveOutcome {
        ResolveOutcome { resolved: json!({"a": 1}), resolution_path: vec!["global".into()], dependencies_hash: "abc".into() }
    }

    #[test]
    fn fresh_entry_passes_when_hash_matches_and_not_expired() {
        let entry = build_entry(Tier::Global, &outcome(), &CacheConfig::default());
        assert!(is_fresh(&entry, "abc", false));
    }

    #[test]
    fn stale_hash_fails_freshness() {
        let entry = build_entry(Tier::Global, &outcome(), &CacheConfig::default());
        assert!(!is_fresh(&entry, "different", false));
    }

    #[test]
    fn force_refresh_always_fails_freshness() {
        let entry = build_entry(Tier::Global, &outcome(), &CacheConfig::default());
        assert!(!is_fresh(&entry, "abc", true));
    }

    #[test]
    fn expired_entry_fails_freshness() {
        let mut entry = build_entry(Tier::Global, &outcome(), &CacheConfig::default());
        entry.expires_at = Utc::now() - Duration::seconds(1);
        assert!(!is_fresh(&entry, "abc", false));
    }

    #[test]
    fn record_hit_bumps_counter() {
        let entry = build_entry(Tier::Global, &outcome(), &CacheConfig::default());
        let hit = record_hit(&entry);
        assert_eq!(hit.hit_count, 1);
        assert!(hit.last_hit.is_some());
    }
}
