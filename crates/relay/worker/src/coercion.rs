//! Parameter coercion
//!
//! Parameters travel as untyped JSON. Coercion is a structural conversion into
//! the procedure's declared `Params` type: field names must match, and values
//! must convert. Missing required fields and incompatible values are rejected
//! rather than filled with defaults.

use crate::procedure::InputShape;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

/// Parameters could not be converted into the declared input shape.
#[derive(Debug, Error)]
#[error("Invalid parameters for procedure '{procedure}' (expected {expected}): {reason}")]
pub struct CoercionError {
    pub procedure: String,
    pub expected: String,
    pub reason: String,
}

/// Converts untyped parameters into typed executor inputs.
#[derive(Debug, Clone, Copy)]
pub struct ParameterCoercer {
    null_as_empty_object: bool,
}

impl ParameterCoercer {
    pub fn new() -> Self {
        Self {
            null_as_empty_object: true,
        }
    }

    /// Disable the `null` -> `{}` fallback for parameter-less procedures.
    pub fn strict() -> Self {
        Self {
            null_as_empty_object: false,
        }
    }

    /// Convert `value` into `T`.
    ///
    /// A `null` payload is first offered to `T` as-is (so `Option` and unit
    /// inputs see it), then as an empty object, so callers may omit
    /// parameters for procedures whose input has no required fields.
    pub fn coerce<T: DeserializeOwned>(
        &self,
        procedure: &str,
        shape: InputShape,
        value: Value,
    ) -> Result<T, CoercionError> {
        let was_null = value.is_null();

        match serde_json::from_value::<T>(value) {
            Ok(typed) => Ok(typed),
            Err(err) => {
                if was_null && self.null_as_empty_object {
                    if let Ok(typed) = serde_json::from_value::<T>(Value::Object(Map::new())) {
                        return Ok(typed);
                    }
                }
                Err(CoercionError {
                    procedure: procedure.to_string(),
                    expected: shape.to_string(),
                    reason: err.to_string(),
                })
            }
        }
    }
}

impl Default for ParameterCoercer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct SumParams {
        a: f64,
        b: f64,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct NoParams {}

    #[derive(Debug, Deserialize, PartialEq)]
    struct Options {
        #[serde(default)]
        verbose: bool,
    }

    fn shape<T>() -> InputShape {
        InputShape::of::<T>()
    }

    #[test]
    fn test_matching_object_converts() {
        let params: SumParams = ParameterCoercer::new()
            .coerce("calculateSum", shape::<SumParams>(), json!({"a": 5, "b": 3}))
            .unwrap();
        assert_eq!(params, SumParams { a: 5.0, b: 3.0 });
    }

    #[test]
    fn test_missing_field_is_rejected() {
        let err = ParameterCoercer::new()
            .coerce::<SumParams>("calculateSum", shape::<SumParams>(), json!({"a": 1}))
            .expect_err("b is required");
        assert_eq!(err.procedure, "calculateSum");
        assert_eq!(err.expected, "SumParams");
        assert!(err.reason.contains("missing field `b`"));
        assert!(err
            .to_string()
            .starts_with("Invalid parameters for procedure 'calculateSum' (expected SumParams)"));
    }

    #[test]
    fn test_incompatible_value_is_rejected() {
        let err = ParameterCoercer::new()
            .coerce::<SumParams>("calculateSum", shape::<SumParams>(), json!({"a": "x", "b": 1}))
            .expect_err("a must be numeric");
        assert!(err.reason.contains("invalid type"));
    }

    #[test]
    fn test_null_accepted_for_parameterless_input() {
        let coercer = ParameterCoercer::new();
        let params: NoParams = coercer
            .coerce("healthCheck", shape::<NoParams>(), Value::Null)
            .unwrap();
        assert_eq!(params, NoParams {});

        let options: Options = coercer
            .coerce("opts", shape::<Options>(), Value::Null)
            .unwrap();
        assert!(!options.verbose);
    }

    #[test]
    fn test_null_seen_as_is_by_option_inputs() {
        let params: Option<SumParams> = ParameterCoercer::new()
            .coerce("maybe", shape::<Option<SumParams>>(), Value::Null)
            .unwrap();
        assert!(params.is_none());
    }

    #[test]
    fn test_null_rejected_when_fields_required() {
        let err = ParameterCoercer::new()
            .coerce::<SumParams>("calculateSum", shape::<SumParams>(), Value::Null)
            .expect_err("fields required");
        assert!(err.reason.contains("invalid type: null"));
    }

    #[test]
    fn test_strict_coercer_rejects_null() {
        let result = ParameterCoercer::strict().coerce::<NoParams>(
            "healthCheck",
            shape::<NoParams>(),
            Value::Null,
        );
        assert!(result.is_err());
    }
}
