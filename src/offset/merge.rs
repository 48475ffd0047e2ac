// src/offset/merge.rs
use serde_json::Value;

/// Recursive structural merge of `patch` onto `base`.
///
/// Object keys merge depth-first; arrays and scalars replace the base value
/// wholesale. A non-object patch therefore replaces the whole base.
pub fn merge(base: Value, patch: Value) -> Value {
    match (base, patch) {
        (Value::Object(mut base_map), Value::Object(patch_map)) => {
            for (key, patch_value) in patch_map {
                match base_map.remove(&key) {
                    Some(base_value) => {
                        base_map.insert(key, merge(base_value, patch_value));
                    }
                    None => {
                        base_map.insert(key, patch_value);
                    }
                }
            }
            Value::Object(base_map)
        }
        (_, patch) => patch,
    }
}
