//! List response normalization.
//!
//! List endpoints answer either with a bare JSON array or with an object
//! that wraps the array under a named field (`{"provinces": [...]}`,
//! `{"data": [...]}`). Callers always get a `Vec<T>`.

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::ApiError;

/// Generic wrapper fields tried after the resource-specific one.
const GENERIC_FIELDS: &[&str] = &["data", "items", "results"];

/// Extract a list from a bare-array or wrapped-object response.
///
/// Looks for `field` first, then the generic wrapper names, then any single
/// array-valued field.
///
/// # Errors
///
/// Returns `ApiError::Parse` if no array can be found or its elements do not
/// match `T`.
pub fn extract_list<T: DeserializeOwned>(value: Value, field: &str) -> Result<Vec<T>, ApiError> {
    let array = match value {
        Value::Array(_) => value,
        Value::Object(mut map) => {
            let key = std::iter::once(field)
                .chain(GENERIC_FIELDS.iter().copied())
                .find(|key| map.get(*key).is_some_and(Value::is_array))
                .map(str::to_string)
                .or_else(|| {
                    let mut arrays = map.iter().filter(|(_, v)| v.is_array());
                    match (arrays.next(), arrays.next()) {
                        (Some((key, _)), None) => Some(key.clone()),
                        _ => None,
                    }
                })
                .ok_or_else(|| {
                    ApiError::Parse(format!("expected a list under '{field}' or a bare array"))
                })?;
            map.remove(&key).unwrap_or(Value::Null)
        }
        Value::Null => return Ok(Vec::new()),
        other => {
            return Err(ApiError::Parse(format!(
                "expected a list under '{field}', got {other}"
            )));
        }
    };

    serde_json::from_value(array).map_err(|e| ApiError::Parse(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::api::types::Province;

    #[test]
    fn test_bare_array() {
        let provinces: Vec<Province> =
            extract_list(json!([{"province_id": 1, "province_name": "Cebu"}]), "provinces")
                .unwrap();
        assert_eq!(provinces.len(), 1);
        assert_eq!(provinces[0].name, "Cebu");
    }

    #[test]
    fn test_named_wrapper() {
        let provinces: Vec<Province> = extract_list(
            json!({"provinces": [{"id": 1, "name": "Cebu"}, {"id": 2, "name": "Manila"}], "count": 2}),
            "provinces",
        )
        .unwrap();
        assert_eq!(provinces.len(), 2);
    }

    #[test]
    fn test_generic_wrapper() {
        let provinces: Vec<Province> =
            extract_list(json!({"data": [{"id": 3, "name": "Bohol"}]}), "provinces").unwrap();
        assert_eq!(provinces[0].name, "Bohol");
    }

    #[test]
    fn test_single_unknown_array_field() {
        let provinces: Vec<Province> =
            extract_list(json!({"rows": [], "total": 0}), "provinces").unwrap();
        assert!(provinces.is_empty());
    }

    #[test]
    fn test_null_is_empty() {
        let provinces: Vec<Province> = extract_list(Value::Null, "provinces").unwrap();
        assert!(provinces.is_empty());
    }

    #[test]
    fn test_rejects_non_list() {
        let result: Result<Vec<Province>, _> = extract_list(json!("nope"), "provinces");
        assert!(matches!(result, Err(ApiError::Parse(_))));

        let result: Result<Vec<Province>, _> =
            extract_list(json!({"a": [], "b": []}), "provinces");
        assert!(matches!(result, Err(ApiError::Parse(_))));
    }
}
