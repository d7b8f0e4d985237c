use serde_json::{Number, Value};

/// Compare two documents and describe every structural difference.
///
/// Each line is prefixed with the JSON path of the offending node. Numbers
/// compare within `float_tolerance` unless both sides are integers, which
/// must match exactly.
pub fn structural_diff(left: &Value, right: &Value, float_tolerance: f64) -> Vec<String> {
    let mut out = Vec::new();
    diff_into(left, right, float_tolerance, "$", &mut out);
    out
}

fn diff_into(left: &Value, right: &Value, tolerance: f64, path: &str, out: &mut Vec<String>) {
    match (left, right) {
        (Value::Null, Value::Null) => {}
        (Value::Bool(a), Value::Bool(b)) => {
            if a != b {
                out.push(format!("{path}: {a} != {b}"));
            }
        }
        (Value::String(a), Value::String(b)) => {
            if a != b {
                out.push(format!("{path}: {a:?} != {b:?}"));
            }
        }
        (Value::Number(a), Value::Number(b)) => {
            if !numbers_match(a, b, tolerance) {
                out.push(format!("{path}: {a} != {b}"));
            }
        }
        (Value::Array(a), Value::Array(b)) => {
            if a.len() != b.len() {
                out.push(format!("{path}: length {} != {}", a.len(), b.len()));
                return;
            }
            for (index, (left_item, right_item)) in a.iter().zip(b).enumerate() {
                diff_into(left_item, right_item, tolerance, &format!("{path}[{index}]"), out);
            }
        }
        (Value::Object(a), Value::Object(b)) => {
            let only_left: Vec<&str> = a
                .keys()
                .filter(|key| !b.contains_key(*key))
                .map(String::as_str)
                .collect();
            let only_right: Vec<&str> = b
                .keys()
                .filter(|key| !a.contains_key(*key))
                .map(String::as_str)
                .collect();
            if !only_left.is_empty() || !only_right.is_empty() {
                out.push(format!(
                    "{path}: key mismatch (only left: {only_left:?}, only right: {only_right:?})"
                ));
            }
            for (key, left_item) in a {
                if let Some(right_item) = b.get(key) {
                    diff_into(left_item, right_item, tolerance, &format!("{path}.{key}"), out);
                }
            }
        }
        _ => out.push(format!(
            "{path}: type mismatch ({} vs {})",
            kind(left),
            kind(right)
        )),
    }
}

fn numbers_match(a: &Number, b: &Number, tolerance: f64) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => (x - y).abs() <= tolerance,
        _ => false,
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn given_identical_documents_when_diffing_then_no_lines_are_produced() {
        let doc = json!({"a": [1, 2.5, {"b": true, "c": "x"}], "d": null});
        assert!(structural_diff(&doc, &doc, 0.0).is_empty());
    }

    #[test]
    fn given_floats_within_tolerance_when_diffing_then_they_match() {
        let left = json!({"v": [0.1, 0.2]});
        let right = json!({"v": [0.1000001, 0.2]});
        assert!(structural_diff(&left, &right, 1e-5).is_empty());
        assert_eq!(structural_diff(&left, &right, 1e-9).len(), 1);
    }

    #[test]
    fn given_integer_leaves_when_diffing_then_they_compare_exactly() {
        let diff = structural_diff(&json!({"n": 1}), &json!({"n": 2}), 10.0);
        assert_eq!(diff, vec!["$.n: 1 != 2".to_string()]);
    }

    #[test]
    fn given_structural_mismatches_when_diffing_then_each_is_tagged_with_path() {
        let left = json!({"a": [1, 2], "b": {"x": 1}, "c": "s", "only": 0});
        let right = json!({"a": [1], "b": {"y": 1}, "c": 3});

        let diff = structural_diff(&left, &right, 0.0);

        assert_eq!(diff.len(), 4);
        assert!(diff[0].starts_with("$: key mismatch"));
        assert!(diff.iter().any(|line| line == "$.a: length 2 != 1"));
        assert!(diff.iter().any(|line| line.starts_with("$.b: key mismatch")));
        assert!(diff.iter().any(|line| line == "$.c: type mismatch (string vs number)"));
    }
}
