//! Structural comparison of two document states.
//!
//! The result is advisory: it feeds audit history and UIs, and is never
//! replayed to rebuild a document. The published value stays the only
//! source of truth.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Added { new: Value },
    Removed { old: Value },
    Modified { old: Value, new: Value },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    /// Location of the change. Empty means the document root.
    pub path: Vec<PathSegment>,
    pub kind: ChangeKind,
}

impl Change {
    /// Dotted rendering of the path, with list indices in brackets.
    pub fn path_string(&self) -> String {
        let mut out = String::new();
        for segment in &self.path {
            match segment {
                PathSegment::Key(key) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(key);
                }
                PathSegment::Index(i) => {
                    out.push_str(&format!("[{i}]"));
                }
            }
        }
        out
    }
}

/// Ordered list of changes between a baseline and a final document.
/// An empty diff is valid and records a no-op commit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diff {
    pub changes: Vec<Change>,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Find the change recorded at a dotted path.
    pub fn at(&self, path: &str) -> Option<&ChangeKind> {
        self.changes
            .iter()
            .find(|c| c.path_string() == path)
            .map(|c| &c.kind)
    }
}

impl fmt::Display for Diff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, change) in self.changes.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            let path = change.path_string();
            let path = if path.is_empty() { "<root>" } else { &path };
            match &change.kind {
                ChangeKind::Added { new } => write!(f, "+{path}={new:?}")?,
                ChangeKind::Removed { old } => write!(f, "-{path}={old:?}")?,
                ChangeKind::Modified { old, new } => write!(f, "{path}: {old:?} -> {new:?}")?,
            }
        }
        Ok(())
    }
}

/// Compare `baseline` against `updated`. Maps are compared key by key,
/// lists index by index; any other difference (including a change of type)
/// is a single `Modified` at that node. Never fails.
pub fn compute_diff(baseline: &Value, updated: &Value) -> Diff {
    let mut changes = Vec::new();
    let mut path = Vec::new();
    diff_node(&mut path, baseline, updated, &mut changes);
    Diff { changes }
}

fn diff_node(path: &mut Vec<PathSegment>, old: &Value, new: &Value, out: &mut Vec<Change>) {
    if old == new {
        return;
    }
    match (old, new) {
        (Value::Map(a), Value::Map(b)) => {
            let mut keys: Vec<&String> = a.keys().chain(b.keys()).collect();
            keys.sort();
            keys.dedup();
            for key in keys {
                path.push(PathSegment::Key(key.clone()));
                match (a.get(key), b.get(key)) {
                    (Some(x), Some(y)) => diff_node(path, x, y, out),
                    (Some(x), None) => push(path, ChangeKind::Removed { old: x.clone() }, out),
                    (None, Some(y)) => push(path, ChangeKind::Added { new: y.clone() }, out),
                    (None, None) => {}
                }
                path.pop();
            }
        }
        (Value::List(a), Value::List(b)) => {
            for i in 0..a.len().max(b.len()) {
                path.push(PathSegment::Index(i));
                match (a.get(i), b.get(i)) {
                    (Some(x), Some(y)) => diff_node(path, x, y, out),
                    (Some(x), None) => push(path, ChangeKind::Removed { old: x.clone() }, out),
                    (None, Some(y)) => push(path, ChangeKind::Added { new: y.clone() }, out),
                    (None, None) => {}
                }
                path.pop();
            }
        }
        _ => push(
            path,
            ChangeKind::Modified {
                old: old.clone(),
                new: new.clone(),
            },
            out,
        ),
    }
}

fn push(path: &[PathSegment], kind: ChangeKind, out: &mut Vec<Change>) {
    out.push(Change {
        path: path.to_vec(),
        kind,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn counter_change_is_single_modification() {
        let before = Value::from_pairs([("count", Value::Integer(0))]);
        let after = Value::from_pairs([("count", Value::Integer(5))]);
        let diff = compute_diff(&before, &after);
        assert_eq!(diff.len(), 1);
        assert_eq!(
            diff.at("count"),
            Some(&ChangeKind::Modified {
                old: Value::Integer(0),
                new: Value::Integer(5),
            })
        );
    }

    #[test]
    fn nested_add_remove_and_list_growth() {
        let before = Value::from_pairs([
            ("tag", Value::from("P-101")),
            ("nozzles", Value::List(vec![Value::from("N1")])),
            ("datasheet", Value::from_pairs([("material", Value::from("CS"))])),
        ]);
        let after = Value::from_pairs([
            ("nozzles", Value::List(vec![Value::from("N1"), Value::from("N2")])),
            (
                "datasheet",
                Value::from_pairs([
                    ("material", Value::from("SS316")),
                    ("rating", Value::Integer(150)),
                ]),
            ),
        ]);
        let diff = compute_diff(&before, &after);
        let paths: Vec<String> = diff.changes.iter().map(Change::path_string).collect();
        assert_eq!(paths, vec!["datasheet.material", "datasheet.rating", "nozzles[1]", "tag"]);
        assert!(matches!(diff.at("tag"), Some(ChangeKind::Removed { .. })));
        assert!(matches!(diff.at("datasheet.rating"), Some(ChangeKind::Added { .. })));
    }

    #[test]
    fn type_change_at_root() {
        let diff = compute_diff(&Value::Null, &Value::map());
        assert_eq!(diff.len(), 1);
        assert_eq!(diff.changes[0].path_string(), "");
        assert!(diff.to_string().contains("<root>"));
    }

    fn arb_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Boolean),
            any::<i64>().prop_map(Value::Integer),
            "[a-z]{0,6}".prop_map(Value::Text),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::List),
                prop::collection::btree_map("[a-d]", inner, 0..4).prop_map(Value::Map),
            ]
        })
    }

    proptest! {
        #[test]
        fn diff_is_empty_exactly_when_equal(a in arb_value(), b in arb_value()) {
            let diff = compute_diff(&a, &b);
            prop_assert_eq!(diff.is_empty(), a == b);
        }

        #[test]
        fn diff_against_self_is_empty(a in arb_value()) {
            prop_assert!(compute_diff(&a, &a).is_empty());
        }
    }
}
