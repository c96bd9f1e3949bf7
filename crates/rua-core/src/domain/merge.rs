//! Deep-merge of JSON fragments into JSON records.
//!
//! Used when a nested settings fragment is imported (the legacy `data`
//! sub-record on first load, or a `"settings"` message exported from another
//! surface).
//!
//! Precedence: when both sides hold an object the merge recurses key by key.
//! In every other case (arrays, strings, numbers, booleans, null) the value
//! from the fragment replaces the target value wholesale.  Arrays are never
//! concatenated.

use serde_json::Value;

/// Merges `fragment` into `target` in place.
pub fn deep_merge(target: &mut Value, fragment: &Value) {
    match (target, fragment) {
        (Value::Object(target_map), Value::Object(fragment_map)) => {
            for (key, incoming) in fragment_map {
                let both_objects = incoming.is_object()
                    && target_map.get(key).is_some_and(Value::is_object);
                if !both_objects {
                    target_map.insert(key.clone(), incoming.clone());
                } else if let Some(existing) = target_map.get_mut(key) {
                    deep_merge(existing, incoming);
                }
            }
        }
        (target, incoming) => *target = incoming.clone(),
    }
}
