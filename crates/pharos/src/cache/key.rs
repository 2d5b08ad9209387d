use crate::error::PharosError;
use serde::Serialize;

/// Canonical string form of a caller-supplied key. Round-tripping through
/// `serde_json::Value` sorts object keys at every level, so two keys that are
/// value-equal serialize identically regardless of field or insertion order.
pub fn canonical_key<K: Serialize>(key: &K) -> Result<String, PharosError> {
    let value = serde_json::to_value(key)?;
    Ok(serde_json::to_string(&value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashMap;
    use serde::Serialize;

    #[test]
    fn test_insertion_order_does_not_matter() {
        let mut first = FxHashMap::default();
        first.insert("page".to_string(), 1);
        first.insert("sort".to_string(), 2);

        let mut second = FxHashMap::default();
        second.insert("sort".to_string(), 2);
        second.insert("page".to_string(), 1);

        assert_eq!(canonical_key(&first).unwrap(), canonical_key(&second).unwrap());
    }

    #[test]
    fn test_nested_objects_are_sorted() {
        let first = serde_json::json!({"outer": {"b": 2, "a": 1}, "x": true});
        let second = serde_json::json!({"x": true, "outer": {"a": 1, "b": 2}});

        assert_eq!(canonical_key(&first).unwrap(), canonical_key(&second).unwrap());
    }

    #[test]
    fn test_struct_and_map_with_same_shape_agree() {
        #[derive(Serialize)]
        struct Query {
            page: u32,
            sort: String,
        }

        let from_struct =
            canonical_key(&Query { page: 1, sort: "date".to_string() }).unwrap();
        let from_value = canonical_key(&serde_json::json!({"sort": "date", "page": 1})).unwrap();

        assert_eq!(from_struct, from_value);
    }

    #[test]
    fn test_different_values_produce_different_keys() {
        let a = canonical_key(&serde_json::json!({"id": 1})).unwrap();
        let b = canonical_key(&serde_json::json!({"id": 2})).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_plain_strings_are_valid_keys() {
        assert_eq!(canonical_key(&"module-a").unwrap(), "\"module-a\"");
    }
}
