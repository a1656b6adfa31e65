//! Generic document operations usable by any resource kind.
//!
//! Paths are dotted (`"equipment.P-101.rating"`). Map segments that do not
//! exist yet are created on write; numeric segments index into lists.

use modelstore_core::{OperationError, ResourceKind, Value};

use crate::error::EngineError;
use crate::registry::{HandlerOutput, OperationRegistry};

pub const SET_FIELD: &str = "set_field";
pub const REMOVE_FIELD: &str = "remove_field";
pub const INCREMENT: &str = "increment";
pub const APPEND: &str = "append";

/// Field `increment` targets when the call names neither `path` nor `field`.
pub const DEFAULT_COUNTER_FIELD: &str = "count";

/// Register every built-in operation for `kind`.
pub fn register_builtins(
    registry: &mut OperationRegistry,
    kind: ResourceKind,
) -> Result<(), EngineError> {
    registry.register(kind, SET_FIELD, set_field)?;
    registry.register(kind, REMOVE_FIELD, remove_field)?;
    registry.register(kind, INCREMENT, increment)?;
    registry.register(kind, APPEND, append)?;
    Ok(())
}

/// `{path, value}`: write `value` at `path`, returning the previous value.
pub fn set_field(params: &Value, document: &Value) -> Result<HandlerOutput, OperationError> {
    let path = text_param(params, "path")?;
    let value = param(params, "value")?.clone();
    let mut previous = Value::Null;
    let document = update_at(document, &segments(path)?, path, |current| {
        if let Some(current) = current {
            previous = current.clone();
        }
        Ok(Some(value))
    })?;
    Ok(HandlerOutput::new(document).with_output(previous))
}

/// `{path}`: delete the field at `path`, returning the removed value.
pub fn remove_field(params: &Value, document: &Value) -> Result<HandlerOutput, OperationError> {
    let path = text_param(params, "path")?;
    let mut removed = Value::Null;
    let document = update_at(document, &segments(path)?, path, |current| match current {
        Some(current) => {
            removed = current.clone();
            Ok(None)
        }
        None => Err(OperationError::domain(
            "missing_field",
            format!("no field at '{path}'"),
        )),
    })?;
    Ok(HandlerOutput::new(document).with_output(removed))
}

/// `{path?, field?, by?}`: add `by` (default 1) to the integer at `path`.
/// `field` is accepted in place of `path`; with neither, the top-level
/// `count` field is used. A missing field counts as zero. Returns the new
/// value.
pub fn increment(params: &Value, document: &Value) -> Result<HandlerOutput, OperationError> {
    let path = match (params.get("path"), params.get("field")) {
        (Some(_), Some(_)) => {
            return Err(OperationError::invalid(
                "bad_param",
                "give either 'path' or 'field', not both",
            ));
        }
        (Some(_), None) => text_param(params, "path")?,
        (None, Some(_)) => text_param(params, "field")?,
        (None, None) => DEFAULT_COUNTER_FIELD,
    };
    let by = match params.get("by") {
        None => 1,
        Some(Value::Integer(n)) => *n,
        Some(other) => {
            return Err(OperationError::invalid(
                "bad_param",
                format!("'by' must be an integer, got {}", other.type_name()),
            ));
        }
    };
    let mut result = 0;
    let document = update_at(document, &segments(path)?, path, |current| {
        let base = match current {
            None => 0,
            Some(Value::Integer(n)) => *n,
            Some(other) => {
                return Err(OperationError::domain(
                    "not_an_integer",
                    format!("'{path}' holds {}", other.type_name()),
                ));
            }
        };
        result = base.checked_add(by).ok_or_else(|| {
            OperationError::domain("overflow", format!("'{path}' would overflow"))
        })?;
        Ok(Some(Value::Integer(result)))
    })?;
    Ok(HandlerOutput::new(document).with_output(Value::Integer(result)))
}

/// `{path, value}`: push `value` onto the list at `path`, creating the list
/// if the field is missing. Returns the new length.
pub fn append(params: &Value, document: &Value) -> Result<HandlerOutput, OperationError> {
    let path = text_param(params, "path")?;
    let value = param(params, "value")?.clone();
    let mut len = 0;
    let document = update_at(document, &segments(path)?, path, |current| {
        let mut items = match current {
            None => Vec::new(),
            Some(Value::List(items)) => items.clone(),
            Some(other) => {
                return Err(OperationError::domain(
                    "not_a_list",
                    format!("'{path}' holds {}", other.type_name()),
                ));
            }
        };
        items.push(value);
        len = items.len();
        Ok(Some(Value::List(items)))
    })?;
    Ok(HandlerOutput::new(document).with_output(Value::Integer(len as i64)))
}

fn param<'a>(params: &'a Value, key: &str) -> Result<&'a Value, OperationError> {
    params
        .get(key)
        .ok_or_else(|| OperationError::invalid("missing_param", format!("missing '{key}'")))
}

fn text_param<'a>(params: &'a Value, key: &str) -> Result<&'a str, OperationError> {
    param(params, key)?.as_text().ok_or_else(|| {
        OperationError::invalid("bad_param", format!("'{key}' must be text"))
    })
}

fn segments(path: &str) -> Result<Vec<&str>, OperationError> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(OperationError::invalid(
            "bad_path",
            format!("malformed path '{path}'"),
        ));
    }
    Ok(segments)
}

/// Rebuild `node` with the value at `path` replaced by what `f` returns
/// (`None` removes it). Everything off the path is carried over unchanged.
fn update_at<F>(node: &Value, path: &[&str], full: &str, f: F) -> Result<Value, OperationError>
where
    F: FnOnce(Option<&Value>) -> Result<Option<Value>, OperationError>,
{
    let Some((head, rest)) = path.split_first() else {
        return Err(OperationError::invalid("bad_path", "empty path"));
    };
    match node {
        Value::Map(map) => {
            let mut map = map.clone();
            if rest.is_empty() {
                match f(map.get(*head))? {
                    Some(value) => {
                        map.insert(head.to_string(), value);
                    }
                    None => {
                        map.remove(*head);
                    }
                }
            } else {
                let child = map.get(*head).cloned().unwrap_or_else(Value::map);
                let updated = update_at(&child, rest, full, f)?;
                map.insert(head.to_string(), updated);
            }
            Ok(Value::Map(map))
        }
        Value::List(items) => {
            let index = head
                .parse::<usize>()
                .ok()
                .filter(|i| *i < items.len())
                .ok_or_else(|| {
                    OperationError::domain(
                        "bad_index",
                        format!("'{head}' is not an index into the list at '{full}'"),
                    )
                })?;
            let mut items = items.clone();
            if rest.is_empty() {
                match f(Some(&items[index]))? {
                    Some(value) => items[index] = value,
                    None => {
                        items.remove(index);
                    }
                }
            } else {
                items[index] = update_at(&items[index], rest, full, f)?;
            }
            Ok(Value::List(items))
        }
        other => Err(OperationError::domain(
            "not_a_container",
            format!("cannot descend into {} along '{full}'", other.type_name()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: Vec<(&str, Value)>) -> Value {
        Value::from_pairs(pairs)
    }

    fn drawing() -> Value {
        Value::from_pairs([
            ("title", Value::from("PFD-001")),
            (
                "equipment",
                Value::from_pairs([("P-101", Value::from_pairs([("kind", Value::from("pump"))]))]),
            ),
        ])
    }

    #[test]
    fn set_field_creates_intermediate_maps_and_keeps_siblings() {
        let out = set_field(
            &params(vec![
                ("path", Value::from("equipment.V-201.kind")),
                ("value", Value::from("vessel")),
            ]),
            &drawing(),
        )
        .unwrap();
        assert_eq!(out.output, Value::Null);
        assert_eq!(out.document.get_path("equipment.V-201.kind"), Some(&Value::from("vessel")));
        assert_eq!(out.document.get_path("equipment.P-101.kind"), Some(&Value::from("pump")));
        assert_eq!(out.document.get("title"), Some(&Value::from("PFD-001")));
    }

    #[test]
    fn set_field_reports_previous_value() {
        let out = set_field(
            &params(vec![("path", Value::from("title")), ("value", Value::from("PFD-002"))]),
            &drawing(),
        )
        .unwrap();
        assert_eq!(out.output, Value::from("PFD-001"));
    }

    #[test]
    fn remove_missing_field_is_domain_error() {
        let err = remove_field(&params(vec![("path", Value::from("equipment.X-1"))]), &drawing())
            .unwrap_err();
        assert_eq!(err.code(), "missing_field");
    }

    #[test]
    fn increment_missing_counts_from_zero() {
        let out = increment(
            &params(vec![("path", Value::from("count")), ("by", Value::Integer(5))]),
            &Value::map(),
        )
        .unwrap();
        assert_eq!(out.document.get("count"), Some(&Value::Integer(5)));
        assert_eq!(out.output, Value::Integer(5));
    }

    #[test]
    fn increment_target_defaults_to_count() {
        let doc = Value::from_pairs([("count", Value::Integer(0))]);
        let out = increment(&params(vec![("by", Value::Integer(5))]), &doc).unwrap();
        assert_eq!(out.document, Value::from_pairs([("count", Value::Integer(5))]));

        let out = increment(
            &params(vec![("field", Value::from("count")), ("by", Value::Integer(2))]),
            &out.document,
        )
        .unwrap();
        assert_eq!(out.document.get("count"), Some(&Value::Integer(7)));

        let err = increment(
            &params(vec![("path", Value::from("count")), ("field", Value::from("count"))]),
            &doc,
        )
        .unwrap_err();
        assert_eq!(err.code(), "bad_param");
    }

    #[test]
    fn increment_rejects_wrong_types() {
        let err = increment(
            &params(vec![("path", Value::from("title"))]),
            &drawing(),
        )
        .unwrap_err();
        assert_eq!(err.code(), "not_an_integer");

        let err = increment(
            &params(vec![("path", Value::from("count")), ("by", Value::from("five"))]),
            &Value::map(),
        )
        .unwrap_err();
        assert!(matches!(err, OperationError::Invalid { .. }));
    }

    #[test]
    fn increment_overflow() {
        let doc = Value::from_pairs([("count", Value::Integer(i64::MAX))]);
        let err = increment(&params(vec![("path", Value::from("count"))]), &doc).unwrap_err();
        assert_eq!(err.code(), "overflow");
    }

    #[test]
    fn append_and_index_into_list() {
        let out = append(
            &params(vec![("path", Value::from("lines")), ("value", Value::from("L-1"))]),
            &Value::map(),
        )
        .unwrap();
        assert_eq!(out.output, Value::Integer(1));
        let out = set_field(
            &params(vec![("path", Value::from("lines.0")), ("value", Value::from("L-9"))]),
            &out.document,
        )
        .unwrap();
        assert_eq!(out.document.get_path("lines.0"), Some(&Value::from("L-9")));

        let err = set_field(
            &params(vec![("path", Value::from("lines.3")), ("value", Value::Null)]),
            &out.document,
        )
        .unwrap_err();
        assert_eq!(err.code(), "bad_index");
    }

    #[test]
    fn malformed_params() {
        assert_eq!(set_field(&Value::map(), &Value::map()).unwrap_err().code(), "missing_param");
        let err = set_field(
            &params(vec![("path", Value::from("a..b")), ("value", Value::Null)]),
            &Value::map(),
        )
        .unwrap_err();
        assert_eq!(err.code(), "bad_path");
    }

    #[test]
    fn descending_through_scalar_fails() {
        let err = set_field(
            &params(vec![("path", Value::from("title.sub")), ("value", Value::Null)]),
            &drawing(),
        )
        .unwrap_err();
        assert_eq!(err.code(), "not_a_container");
    }
}
