//! Parameter validation helpers for command handlers.

use std::fmt;

use serde_json::{Map, Value};

use super::errors::RpcError;

/// JSON value kinds as named in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// `null`
    Null,
    /// `true` / `false`
    Bool,
    /// Any number.
    Number,
    /// String.
    String,
    /// Array.
    Array,
    /// Object.
    Object,
}

impl ValueKind {
    /// Classifies a value.
    #[must_use]
    pub const fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Bool,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }

    /// Lower-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Number => "number",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Expected shape of one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeSpec {
    /// Any value is accepted.
    Any,
    /// Only values of this kind are accepted.
    Kind(ValueKind),
}

impl TypeSpec {
    fn accepts(self, kind: ValueKind) -> bool {
        match self {
            Self::Any => true,
            Self::Kind(expected) => expected == kind,
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Kind(kind) => kind.as_str(),
        }
    }
}

impl From<ValueKind> for TypeSpec {
    fn from(kind: ValueKind) -> Self {
        Self::Kind(kind)
    }
}

/// Checks positional params against `expected`, position by position.
///
/// Only positions present in both slices are checked. With `allow_null`,
/// `null` passes for any position.
///
/// # Errors
///
/// Returns a type error for the first mismatching position.
pub fn type_check(
    params: &[Value],
    expected: &[TypeSpec],
    allow_null: bool,
) -> Result<(), RpcError> {
    for (value, spec) in params.iter().zip(expected) {
        if allow_null && value.is_null() {
            continue;
        }
        type_check_argument(value, *spec)?;
    }
    Ok(())
}

/// Checks a single value.
///
/// # Errors
///
/// Returns `Expected type X, got Y` when the kinds differ.
pub fn type_check_argument(value: &Value, spec: TypeSpec) -> Result<(), RpcError> {
    let kind = ValueKind::of(value);
    if spec.accepts(kind) {
        Ok(())
    } else {
        Err(RpcError::type_error(format!(
            "Expected type {}, got {kind}",
            spec.describe()
        )))
    }
}

/// Checks the members of an object.
///
/// Missing keys are treated as `null`. When `strict` is set, keys not listed
/// in `expected` are rejected.
///
/// # Errors
///
/// Returns a type error describing the first missing, mistyped or unexpected
/// key.
pub fn type_check_object(
    object: &Map<String, Value>,
    expected: &[(&str, TypeSpec)],
    allow_null: bool,
    strict: bool,
) -> Result<(), RpcError> {
    for (key, spec) in expected {
        let value = object.get(*key).unwrap_or(&Value::Null);
        if !allow_null && value.is_null() {
            return Err(RpcError::type_error(format!("Missing {key}")));
        }
        let kind = ValueKind::of(value);
        if !(spec.accepts(kind) || (allow_null && value.is_null())) {
            return Err(RpcError::type_error(format!(
                "Expected type {} for {key}, got {kind}",
                spec.describe()
            )));
        }
    }

    if strict
        && let Some(unexpected) = object
            .keys()
            .find(|key| !expected.iter().any(|(name, _)| *name == key.as_str()))
    {
        return Err(RpcError::type_error(format!("Unexpected key {unexpected}")));
    }
    Ok(())
}

/// Parses a 32-byte hash given as 64 hex characters.
///
/// The text is the big-endian display form; the returned bytes are in
/// storage order, least significant first, so `hash[0]` holds the last two
/// hex digits.
///
/// # Errors
///
/// Returns a type error for non-strings. Strings of the wrong length and then
/// non-hex strings get an invalid parameter error, checked in that order.
pub fn parse_hash(value: &Value, name: &str) -> Result<[u8; 32], RpcError> {
    let text = expect_str(value, name)?;
    if text.len() != 64 {
        return Err(RpcError::invalid_parameter(format!(
            "{name} must be of length 64 (not {}, for '{text}')",
            text.len()
        )));
    }
    if !is_hex(text) {
        return Err(RpcError::invalid_parameter(format!(
            "{name} must be hexadecimal string (not '{text}')"
        )));
    }
    let mut hash = [0_u8; 32];
    hex::decode_to_slice(text, &mut hash).map_err(|error| {
        RpcError::invalid_parameter(format!("{name} must be hexadecimal string ({error})"))
    })?;
    hash.reverse();
    Ok(hash)
}

/// Parses an arbitrary-length hex string.
///
/// # Errors
///
/// Returns a type error for non-strings and an invalid parameter error for
/// malformed hex.
pub fn parse_hex(value: &Value, name: &str) -> Result<Vec<u8>, RpcError> {
    let text = expect_str(value, name)?;
    if !is_hex(text) {
        return Err(RpcError::invalid_parameter(format!(
            "{name} must be hexadecimal string (not '{text}')"
        )));
    }
    hex::decode(text).map_err(|error| {
        RpcError::invalid_parameter(format!("{name} must be hexadecimal string ({error})"))
    })
}

fn expect_str<'a>(value: &'a Value, name: &str) -> Result<&'a str, RpcError> {
    value.as_str().ok_or_else(|| {
        RpcError::type_error(format!(
            "Expected type string for {name}, got {}",
            ValueKind::of(value)
        ))
    })
}

fn is_hex(text: &str) -> bool {
    !text.is_empty()
        && text.len().is_multiple_of(2)
        && text.bytes().all(|byte| byte.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::dispatch::ErrorCode;

    #[test]
    fn positional_check_reports_first_mismatch() {
        let params = [json!("stop"), json!(5)];
        let expected = [TypeSpec::Kind(ValueKind::String), TypeSpec::Kind(ValueKind::String)];
        let error = type_check(&params, &expected, false).expect_err("mismatch");
        assert_eq!(error.code, ErrorCode::TypeError);
        assert_eq!(error.message, "Expected type string, got number");
    }

    #[test]
    fn positional_check_stops_at_shorter_list() {
        let params = [json!(true)];
        let expected = [TypeSpec::Kind(ValueKind::Bool), TypeSpec::Kind(ValueKind::Object)];
        assert!(type_check(&params, &expected, false).is_ok());
    }

    #[test]
    fn nulls_pass_when_allowed() {
        let params = [json!(null)];
        assert!(type_check(&params, &[TypeSpec::Kind(ValueKind::Array)], true).is_ok());
        assert!(type_check(&params, &[TypeSpec::Kind(ValueKind::Array)], false).is_err());
    }

    #[test]
    fn any_accepts_everything() {
        assert!(type_check_argument(&json!({"k": 1}), TypeSpec::Any).is_ok());
    }

    #[rstest]
    #[case::missing(json!({}), false, false, "Missing height")]
    #[case::wrong_type(json!({"height": "tall"}), false, false, "Expected type number for height, got string")]
    #[case::unexpected(json!({"height": 1, "depth": 2}), false, true, "Unexpected key depth")]
    fn object_checks_report_the_offending_key(
        #[case] object: Value,
        #[case] allow_null: bool,
        #[case] strict: bool,
        #[case] message: &str,
    ) {
        let object = object.as_object().expect("object fixture").clone();
        let error = type_check_object(
            &object,
            &[("height", TypeSpec::Kind(ValueKind::Number))],
            allow_null,
            strict,
        )
        .expect_err("check fails");
        assert_eq!(error.message, message);
    }

    #[test]
    fn object_check_allows_missing_keys_when_nullable() {
        let object = Map::new();
        assert!(type_check_object(&object, &[("height", TypeSpec::Kind(ValueKind::Number))], true, true).is_ok());
    }

    #[test]
    fn parsed_hash_is_stored_least_significant_first() {
        let text = format!("ab{}ff", "00".repeat(30));
        let hash = parse_hash(&json!(text), "blockhash").expect("valid hash");
        assert_eq!(hash[0], 0xff);
        assert_eq!(hash[31], 0xab);
        assert!(hash[1..31].iter().all(|byte| *byte == 0));
    }

    #[rstest]
    #[case::short(json!("abcd"), "blockhash must be of length 64 (not 4, for 'abcd')")]
    #[case::short_and_not_hex(json!("zz"), "blockhash must be of length 64 (not 2, for 'zz')")]
    #[case::not_hex(
        json!("zz".repeat(32)),
        format!("blockhash must be hexadecimal string (not '{}')", "zz".repeat(32))
    )]
    fn rejects_bad_hashes(#[case] value: Value, #[case] message: String) {
        let error = parse_hash(&value, "blockhash").expect_err("invalid");
        assert_eq!(error.code, ErrorCode::InvalidParameter);
        assert_eq!(error.message, message);
    }

    #[test]
    fn hash_must_be_a_string() {
        let error = parse_hash(&json!(12), "blockhash").expect_err("not a string");
        assert_eq!(error.code, ErrorCode::TypeError);
    }

    #[test]
    fn parses_hex_bytes() {
        assert_eq!(parse_hex(&json!("0aff"), "data").expect("hex"), vec![0x0a, 0xff]);
        assert!(parse_hex(&json!("abc"), "data").is_err());
    }
}
