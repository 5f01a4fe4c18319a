//! Layer merge logic
//!
//! - Objects: deep-merge by key
//! - Arrays: replace (last wins)
//! - Scalars and null: override (last wins)

use serde_json::{Map, Value};

/// Deep merge `overlay` onto `base`
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

        // Glob lists are replaced wholesale, never concatenated
        (_, overlay) => overlay,
    }
}

/// Merge layers in order; the last layer has highest precedence
pub fn merge_layers(layers: Vec<Value>) -> Value {
    layers.into_iter().fold(Value::Null, deep_merge)
}

/// Parse a `key=value` override into a single-key object.
///
/// The value is read as JSON when it parses, otherwise as a plain string,
/// so `globPatterns=["**/*.js"]` and `swDest=dist/sw.js` both work.
pub fn parse_override(assignment: &str) -> Option<Value> {
    let (key, raw) = assignment.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }

    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));

    let mut map = Map::new();
    map.insert(key.to_string(), value);
    Some(Value::Object(map))
}
