//! Deep merge of free-form user data attached to class metadata.

use serde_json::{Map, Value};

/// Free-form extension data keyed by collaborator-chosen names.
pub type UserData = Map<String, Value>;

/// Recursively copies `source` into `target`.
///
/// Nested objects are merged key by key; any other value in `source`
/// replaces the value in `target`.
pub fn deep_assign(target: &mut UserData, source: &UserData) {
    for (key, value) in source {
        match (target.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                deep_assign(existing, incoming);
            }
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Returns `parent` overlaid with `child`; child keys win on collision.
pub fn merged(parent: &UserData, child: &UserData) -> UserData {
    let mut out = UserData::new();
    deep_assign(&mut out, parent);
    deep_assign(&mut out, child);
    out
}
