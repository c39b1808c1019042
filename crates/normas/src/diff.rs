//! Structural comparison of document payloads, ignoring timestamp noise.
//!
//! Every crawl the source bumps `timestamp` and `fecha-umod` on documents
//! whose content did not change. Rewriting those payloads is fine, but the
//! changelog should not report them as real updates.

use serde_json::Value;

/// Pointer paths that change on every crawl without any content change.
pub const NOISY_POINTERS: [&str; 2] = [
    "/document/metadata/timestamp",
    "/document/content/fecha-umod",
];

/// Check whether two payloads differ only in the known-noisy fields.
///
/// Returns `true` when the payloads are not identical but become identical
/// once the noisy fields are removed from both. Identical payloads return
/// `false`: nothing changed at all, not even timestamps.
pub fn timestamps_only(old: &Value, new: &Value) -> bool {
    if old == new {
        return false;
    }

    let mut old = old.clone();
    let mut new = new.clone();
    for pointer in NOISY_POINTERS {
        remove_pointer(&mut old, pointer);
        remove_pointer(&mut new, pointer);
    }

    old == new
}

/// Remove the value at a JSON pointer path, if present.
fn remove_pointer(value: &mut Value, pointer: &str) {
    let Some((parent, key)) = pointer.rsplit_once('/') else {
        return;
    };
    if let Some(Value::Object(map)) = value.pointer_mut(parent) {
        map.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn payload(timestamp: i64, modified: &str, title: &str) -> Value {
        json!({
            "document": {
                "metadata": { "uuid": "abc", "timestamp": timestamp },
                "content": { "fecha-umod": modified, "titulo-norma": title }
            }
        })
    }

    #[test]
    fn test_timestamp_and_fecha_umod_changes_are_noise() {
        let old = payload(1, "20240101000000", "Ley de tránsito");
        let new = payload(2, "20240201000000", "Ley de tránsito");

        assert!(timestamps_only(&old, &new));
    }

    #[test]
    fn test_single_noisy_field_change_is_noise() {
        let old = payload(1, "20240101000000", "Ley de tránsito");
        let new = payload(2, "20240101000000", "Ley de tránsito");

        assert!(timestamps_only(&old, &new));
    }

    #[test]
    fn test_content_change_is_not_noise() {
        let old = payload(1, "20240101000000", "Ley de tránsito");
        let new = payload(2, "20240201000000", "Ley de tránsito (modificada)");

        assert!(!timestamps_only(&old, &new));
    }

    #[test]
    fn test_identical_payloads_are_not_noise() {
        let old = payload(1, "20240101000000", "Ley de tránsito");

        assert!(!timestamps_only(&old, &old.clone()));
    }

    #[test]
    fn test_missing_noisy_fields_compare_structurally() {
        // A payload that never carried the noisy fields still compares.
        let old = json!({
            "document": {
                "metadata": { "uuid": "abc" },
                "content": { "titulo-norma": "a" }
            }
        });
        let new = payload(5, "20240101000000", "a");

        // Same content once noise is stripped, and the originals differ.
        assert!(timestamps_only(&old, &new));
    }
}
