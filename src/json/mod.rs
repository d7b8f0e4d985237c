//! Helpers over `serde_json::Value` documents.
//!
//! Documents are built with `preserve_order`, so object key order follows
//! insertion order and serialized output is reproducible byte-for-byte.

mod diff;

use serde_json::{Map, Number, Value};

use crate::error::{INVALID_JSON_KEY, Issues, PRECISION_NON_FINITE, UNSUPPORTED_JSON_VALUE};

pub use diff::structural_diff;

// ─── Safe navigation ──────────────────────────────────────────────────────────

/// One step of a path into a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathSegment<'a> {
    Key(&'a str),
    Index(i64),
}

impl<'a> From<&'a str> for PathSegment<'a> {
    fn from(key: &'a str) -> Self {
        PathSegment::Key(key)
    }
}

impl From<usize> for PathSegment<'_> {
    fn from(index: usize) -> Self {
        PathSegment::Index(i64::try_from(index).unwrap_or(i64::MAX))
    }
}

impl From<i32> for PathSegment<'_> {
    fn from(index: i32) -> Self {
        PathSegment::Index(index as i64)
    }
}

/// Build a `&[PathSegment]` from keys and indices:
/// `json_path!["extensions", "VRM", "humanoid", "humanBones", 0]`.
#[macro_export]
macro_rules! json_path {
    ($($segment:expr),* $(,)?) => {
        &[$($crate::json::PathSegment::from($segment)),*][..]
    };
}

/// Walk `path` from `value`. Returns `None` as soon as a key is missing, an
/// index is out of range or negative, or a segment does not fit the node
/// kind (an index into an object, a key into an array or scalar).
pub fn lookup<'v>(value: &'v Value, path: &[PathSegment<'_>]) -> Option<&'v Value> {
    let mut current = value;
    for segment in path {
        current = match (segment, current) {
            (PathSegment::Key(key), Value::Object(map)) => map.get(*key)?,
            (PathSegment::Index(index), Value::Array(items)) => {
                items.get(usize::try_from(*index).ok()?)?
            }
            _ => return None,
        };
    }
    Some(current)
}

/// Return the node at `path`, or `default` when it cannot be reached.
pub fn get<'v>(value: &'v Value, path: &[PathSegment<'_>], default: &'v Value) -> &'v Value {
    lookup(value, path).unwrap_or(default)
}

/// Return the array at `path`, or an empty slice when the node is missing
/// or is not an array.
pub fn get_list<'v>(value: &'v Value, path: &[PathSegment<'_>]) -> &'v [Value] {
    lookup(value, path)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

pub fn get_f64(value: &Value, path: &[PathSegment<'_>], default: f64) -> f64 {
    lookup(value, path).and_then(Value::as_f64).unwrap_or(default)
}

pub fn get_f32(value: &Value, path: &[PathSegment<'_>], default: f32) -> f32 {
    lookup(value, path)
        .and_then(Value::as_f64)
        .map(|number| number as f32)
        .unwrap_or(default)
}

pub fn get_u64(value: &Value, path: &[PathSegment<'_>]) -> Option<u64> {
    lookup(value, path).and_then(Value::as_u64)
}

pub fn get_i64(value: &Value, path: &[PathSegment<'_>]) -> Option<i64> {
    lookup(value, path).and_then(Value::as_i64)
}

pub fn get_usize(value: &Value, path: &[PathSegment<'_>]) -> Option<usize> {
    get_u64(value, path).and_then(|index| usize::try_from(index).ok())
}

pub fn get_str<'v>(value: &'v Value, path: &[PathSegment<'_>], default: &'v str) -> &'v str {
    lookup(value, path).and_then(Value::as_str).unwrap_or(default)
}

pub fn get_bool(value: &Value, path: &[PathSegment<'_>], default: bool) -> bool {
    lookup(value, path).and_then(Value::as_bool).unwrap_or(default)
}

/// Read a fixed-size float array, falling back to `default` unless the node
/// is an array of exactly `N` numbers.
pub fn get_f32_array<const N: usize>(
    value: &Value,
    path: &[PathSegment<'_>],
    default: [f32; N],
) -> [f32; N] {
    let items = get_list(value, path);
    if items.len() != N {
        return default;
    }
    let mut out = default;
    for (slot, item) in out.iter_mut().zip(items) {
        match item.as_f64() {
            Some(number) => *slot = number as f32,
            None => return default,
        }
    }
    out
}

// ─── Document construction ────────────────────────────────────────────────────

/// Convert a float into a JSON number. Non-finite values cannot be
/// represented in JSON; they become `0.0` and are recorded as a warning.
pub fn number(value: f64, issues: &mut Issues) -> Value {
    match Number::from_f64(value) {
        Some(number) => Value::Number(number),
        None => {
            issues.warn(
                PRECISION_NON_FINITE,
                format!("non-finite float {value} written as 0.0"),
            );
            Value::from(0.0)
        }
    }
}

/// [`number`] for an `f32`, widened through its shortest decimal form.
pub fn float(value: f32, issues: &mut Issues) -> Value {
    number(widen(value), issues)
}

/// Float array variant of [`number`]. Values are widened from `f32`
/// through their shortest decimal form so `0.1f32` serializes as `0.1`.
pub fn numbers(values: &[f32], issues: &mut Issues) -> Value {
    Value::Array(
        values
            .iter()
            .map(|value| number(widen(*value), issues))
            .collect(),
    )
}

/// Widen an `f32` to the `f64` with the same shortest decimal representation.
pub fn widen(value: f32) -> f64 {
    if !value.is_finite() {
        return value as f64;
    }
    value.to_string().parse::<f64>().unwrap_or(value as f64)
}

/// Loosely typed value supplied by the host (custom properties, extras).
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Lists, tuples and other iterables.
    Seq(Vec<HostValue>),
    Map(Vec<(HostKey, HostValue)>),
    /// A host value with no JSON counterpart, described by its type name.
    Opaque(String),
}

/// Key of a host mapping. Only string keys survive conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum HostKey {
    Str(String),
    Other(String),
}

/// Convert a host value into JSON, recording every lossy coercion.
pub fn make_json(value: &HostValue, issues: &mut Issues) -> Value {
    match value {
        HostValue::Null => Value::Null,
        HostValue::Bool(flag) => Value::Bool(*flag),
        HostValue::Int(integer) => Value::from(*integer),
        HostValue::Float(float) => number(*float, issues),
        HostValue::Str(text) => Value::String(text.clone()),
        HostValue::Seq(items) => {
            Value::Array(items.iter().map(|item| make_json(item, issues)).collect())
        }
        HostValue::Map(entries) => {
            let mut map = Map::new();
            for (key, item) in entries {
                match key {
                    HostKey::Str(key) => {
                        map.insert(key.clone(), make_json(item, issues));
                    }
                    HostKey::Other(description) => issues.warn(
                        INVALID_JSON_KEY,
                        format!("dropped non-string key {description}"),
                    ),
                }
            }
            Value::Object(map)
        }
        HostValue::Opaque(type_name) => {
            issues.warn(
                UNSUPPORTED_JSON_VALUE,
                format!("value of type {type_name} written as null"),
            );
            Value::Null
        }
    }
}

/// Convert a parsed document node back into a host value.
pub fn host_value(value: &Value) -> HostValue {
    match value {
        Value::Null => HostValue::Null,
        Value::Bool(flag) => HostValue::Bool(*flag),
        Value::Number(number) => match number.as_i64() {
            Some(integer) => HostValue::Int(integer),
            None => HostValue::Float(number.as_f64().unwrap_or(0.0)),
        },
        Value::String(text) => HostValue::Str(text.clone()),
        Value::Array(items) => HostValue::Seq(items.iter().map(host_value).collect()),
        Value::Object(map) => HostValue::Map(
            map.iter()
                .map(|(key, item)| (HostKey::Str(key.clone()), host_value(item)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn given_nested_document_when_walking_valid_path_then_node_is_returned() {
        let doc = json!({"extensions": {"VRM": {"humanoid": {"humanBones": [{"bone": "hips"}]}}}});
        let default = Value::Null;

        let bone = get(
            &doc,
            json_path!["extensions", "VRM", "humanoid", "humanBones", 0, "bone"],
            &default,
        );
        assert_eq!(bone, &json!("hips"));
    }

    #[test]
    fn given_type_mismatch_when_walking_path_then_default_is_returned() {
        let doc = json!({"list": [1, 2], "map": {"0": "zero"}});
        let default = json!("fallback");

        assert_eq!(get(&doc, json_path!["map", 0], &default), &default);
        assert_eq!(get(&doc, json_path!["list", "0"], &default), &default);
        assert_eq!(get(&doc, json_path!["list", 5], &default), &default);
        assert_eq!(get(&doc, json_path!["list", -1], &default), &default);
        assert_eq!(get(&doc, json_path!["list", 0, "deeper"], &default), &default);
        assert_eq!(get(&doc, json_path!["missing"], &default), &default);
    }

    #[test]
    fn given_non_array_node_when_getting_list_then_empty_slice_is_returned() {
        let doc = json!({"a": {"b": 1}, "c": [1, 2, 3]});
        assert!(get_list(&doc, json_path!["a"]).is_empty());
        assert_eq!(get_list(&doc, json_path!["c"]).len(), 3);
    }

    #[test]
    fn given_short_array_when_reading_fixed_array_then_default_is_kept() {
        let doc = json!({"v": [1.0, 2.0], "w": [1.0, 2.0, 3.0]});
        assert_eq!(get_f32_array(&doc, json_path!["v"], [0.0; 3]), [0.0; 3]);
        assert_eq!(get_f32_array(&doc, json_path!["w"], [0.0; 3]), [1.0, 2.0, 3.0]);
    }

    #[test]
    fn given_non_finite_float_when_making_json_then_zero_and_warning_are_produced() {
        let mut issues = Issues::new();
        let value = make_json(
            &HostValue::Seq(vec![
                HostValue::Float(f64::NAN),
                HostValue::Float(f64::INFINITY),
                HostValue::Float(1.5),
            ]),
            &mut issues,
        );

        assert_eq!(value, json!([0.0, 0.0, 1.5]));
        assert_eq!(issues.len(), 2);
        assert!(issues.has_code(PRECISION_NON_FINITE));
    }

    #[test]
    fn given_invalid_key_and_opaque_value_when_making_json_then_they_are_coerced() {
        let mut issues = Issues::new();
        let value = make_json(
            &HostValue::Map(vec![
                (HostKey::Str("ok".into()), HostValue::Int(3)),
                (HostKey::Other("(1, 2)".into()), HostValue::Bool(true)),
                (HostKey::Str("object".into()), HostValue::Opaque("Object".into())),
            ]),
            &mut issues,
        );

        assert_eq!(value, json!({"ok": 3, "object": null}));
        assert!(issues.has_code(INVALID_JSON_KEY));
        assert!(issues.has_code(UNSUPPORTED_JSON_VALUE));
    }

    #[test]
    fn given_parsed_extras_when_round_tripping_through_host_value_then_document_is_kept() {
        let extras = json!({"tag": "skin", "weights": [1, 2.5], "nested": {"on": true, "none": null}});
        let mut issues = Issues::new();

        assert_eq!(make_json(&host_value(&extras), &mut issues), extras);
        assert!(issues.is_empty());
    }

    #[test]
    fn given_f32_value_when_widening_then_shortest_decimal_is_kept() {
        assert_eq!(widen(0.1f32), 0.1f64);
        assert_eq!(widen(-2.5f32), -2.5f64);
    }
}
