//! Tier identity and the deep-merge rule used to build a resolved view
//! (§4.2.1, §4.2.2 step 2).

pub use orchestrator_core::Tier;
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Deep-merges `overlay` into `base` in place, with `overlay` (the
/// lower/more specific tier) taking precedence.
///
/// - Plain objects are merged key by key, recursing into nested objects.
/// - Arrays and scalars are replaced wholesale by the overlay's value.
/// - Any key present in `override_keys` is replaced wholesale even if both
///   sides are objects (the `global_overrides`/`local_overrides` rule).
pub fn merge_with_overrides(base: &mut Value, overlay: &Value, override_keys: &HashSet<String>) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            merge_objects(base_map, overlay_map, override_keys)
        }
        (slot, overlay) => {
            *slot = overlay.clone();
        }
    }
}

fn merge_objects(base: &mut Map<String, Value>, overlay: &Map<String, Value>, override_keys: &HashSet<String>) {
    for (key, overlay_value) in overlay {
        if override_keys.contains(key) {
            base.insert(key.clone(), overlay_value.clone());
            continue;
        }
        match base.get_mut(key) {
            Some(Value::Object(existing)) => {
                if let Value::Object(overlay_obj) = overlay_value {
                    merge_objects(existing, overlay_obj, override_keys);
                } else {
                    base.insert(key.clone(), overlay_value.clone());
                }
            }
            _ => {
                base.insert(key.clone(), overlay_value.clone());
            }
        }
    }
}

/// Collects the string keys of a JSON object used as an overrides map,
/// tolerating a missing or non-object value (treated as empty).
pub fn override_key_set(overrides: &Value) -> HashSet<String> {
    match overrides {
        Value::Object(map) => map.keys().cloned().collect(),
        _ => HashSet::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deep_merges_nested_objects_with_lower_tier_winning() {
        let mut base = json!({"a": {"x": 1, "y": 2}, "b": "base"});
        let overlay = json!({"a": {"y": 20, "z": 3}, "b": "overlay"});
        merge_with_overrides(&mut base, &overlay, &HashSet::new());
        assert_eq!(base, json!({"a": {"x": 1, "y": 20, "z": 3}, "b": "overlay"}));
    }

    #[test]
    fn arrays_replace_rather_than_concatenate() {
        let mut base = json!({"tags": ["a", "b"]});
        let overlay = json!({"tags": ["c"]});
        merge_with_overrides(&mut base, &overlay, &HashSet::new());
        assert_eq!(base, json!({"tags": ["c"]}));
    }

    #[test]
    fn override_keys_replace_wholesale_even_for_objects() {
        let mut base = json!({"policy": {"a": 1, "b": 2}});
        let overlay = json!({"policy": {"a": 99}});
        let overrides: HashSet<String> = ["policy".to_string()].into_iter().collect();
        merge_with_overrides(&mut base, &overlay, &overrides);
        assert_eq!(base, json!({"policy": {"a": 99}}));
    }
}
