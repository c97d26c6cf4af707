//! Field-by-field merging of configuration tiers.

use serde_json::Value;

/// Merge `overlay` onto `base`.
///
/// Objects merge recursively. Arrays and scalars from the overlay replace the
/// base value. A null overlay means "not specified" and keeps the base.
///
/// ```
/// use serde_json::json;
/// use onboard_tracker::config::deep_merge;
///
/// let base = json!({"onboarding": {"default_om": "Unassigned", "stale_after_days": 7}});
/// let overlay = json!({"onboarding": {"stale_after_days": 14}});
/// assert_eq!(
///     deep_merge(base, overlay),
///     json!({"onboarding": {"default_om": "Unassigned", "stale_after_days": 14}})
/// );
/// ```
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

/// Fold `deep_merge` over tiers, lowest priority first.
pub fn deep_merge_all(values: impl IntoIterator<Item = Value>) -> Value {
    values.into_iter().fold(Value::Null, deep_merge)
}
