//! The `Resolve` deep-merge walk (§4.2.2).

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::tiers::{merge_with_overrides, override_key_set, Tier};

/// One tier's contribution to a resolve walk, already fetched from storage.
#[derive(Debug, Clone)]
pub struct TierSnapshot {
    pub level: Tier,
    pub data: Value,
    pub overrides: Value,
    pub inheritance_disabled: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ResolveOutcome {
    pub resolved: Value,
    pub resolution_path: Vec<String>,
    pub dependencies_hash: String,
}

/// `snapshots` must be ordered global-first, leaf-last (top-down). `
/// force_local_only` applies to the leaf (last element) only.
pub fn resolve_chain(snapshots: &[TierSnapshot], force_local_only: bool) -> ResolveOutcome {
    if snapshots.is_empty() {
        return ResolveOutcome {
            resolved: Value::Object(Default::default()),
            resolution_path: Vec::new(),
            dependencies_hash: hash_tiers(&[]),
        };
    }

    if force_local_only {
        let leaf = snapshots.last().expect("checked non-empty above");
        return ResolveOutcome {
            resolved: leaf.data.clone(),
            resolution_path: vec![tier_label(&leaf.level)],
            dependencies_hash: hash_tiers(std::slice::from_ref(leaf)),
        };
    }

    // Find the tier closest to the leaf with inheritance disabled; everything
    // above it (closer to global) is dropped from the walk.
    let start = snapshots
        .iter()
        .rposition(|snap| snap.inheritance_disabled)
        .unwrap_or(0);
    let effective = &snapshots[start..];

    let mut resolved = Value::Object(Default::default());
    for snap in effective {
        let override_keys = override_key_set(&snap.overrides);
        merge_with_overrides(&mut resolved, &snap.data, &override_keys);
    }

    ResolveOutcome {
        resolved,
        resolution_path: effective.iter().map(|s| tier_label(&s.level)).collect(),
        dependencies_hash: hash_tiers(effective),
    }
}

fn tier_label(tier: &Tier) -> String {
    match tier.id() {
        Some(id) => format!("{}:{id}", tier.name()),
        None => tier.name().to_string(),
    }
}

fn hash_tiers(snapshots: &[TierSnapshot]) -> String {
    let mut hasher = DefaultHasher::new();
    for snap in snapshots {
        tier_label(&snap.level).hash(&mut hasher);
        snap.updated_at.timestamp_nanos_opt().unwrap_or_default().hash(&mut hasher);
        snap.inheritance_disabled.hash(&mut hasher);
    }
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snap(level: Tier, data: Value, disabled: bool) -> TierSnapshot {
        TierSnapshot { level, data, overrides: json!({}), inheritance_disabled: disabled, updated_at: Utc::now() }
    }

    #[test]
    fn leaf_values_win_over_global() {
        let chain = vec![
            snap(Tier::Global, json!({"a": 1, "b": 1}), false),
            snap(Tier::Project(1), json!({"b": 2}), false),
            snap(Tier::Task(5), json!({"b": 3}), false),
        ];
        let outcome = resolve_chain(&chain, false);
        assert_eq!(outcome.resolved, json!({"a": 1, "b": 3}));
        assert_eq!(outcome.resolution_path, vec!["global", "project:1", "task:5"]);
    }

    #[test]
    fn inheritance_disabled_tier_drops_everything_above_it() {
        let chain = vec![
            snap(Tier::Global, json!({"a": 1}), false),
            snap(Tier::Project(1), json!({"b": 2}), true),
            snap(Tier::Task(5), json!({"c": 3}), false),
        ];
        let outcome = resolve_chain(&chain, false);
        assert_eq!(outcome.resolved, json!({"b": 2, "c": 3}));
        assert_eq!(outcome.resolution_path, vec!["project:1", "task:5"]);
    }

    #[test]
    fn force_local_only_ignores_the_rest_of_the_chain() {
        let chain = vec![
            snap(Tier::Global, json!({"a": 1}), false),
            snap(Tier::Task(5), json!({"b": 2}), false),
        ];
        let outcome = resolve_chain(&chain, true);
        assert_eq!(outcome.resolved, json!({"b": 2}));
        assert_eq!(outcome.resolution_path, vec!["task:5"]);
    }

    #[test]
    fn hash_changes_when_an_updated_at_changes() {
        let t0 = Utc::now();
        let mut a = snap(Tier::Global, json!({}), false);
        a.updated_at = t0;
        let mut b = a.clone();
        b.updated_at = t0 + chrono::Duration::seconds(1);
        assert_ne!(hash_tiers(&[a]), hash_tiers(&[b]));
    }
}
