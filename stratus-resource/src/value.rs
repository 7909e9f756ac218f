//! The tree value that resource specs, external state and computed fields are
//! expressed in.
//!
//! A [`MappingNode`] is exactly one of a scalar, a set of named fields or a list
//! of items. Equality is structural, and the JSON form is the plain JSON
//! document with no tagging.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl ScalarValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScalarValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ScalarValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Integers are widened, so `2` reads as `2.0`.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ScalarValue::Float(f) => Some(*f),
            ScalarValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ScalarValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ScalarValue::Null)
    }

    /// The value as text: numbers and booleans are formatted, null is empty.
    pub fn stringify(&self) -> String {
        match self {
            ScalarValue::String(s) => s.clone(),
            ScalarValue::Int(i) => i.to_string(),
            ScalarValue::Float(f) => f.to_string(),
            ScalarValue::Bool(b) => b.to_string(),
            ScalarValue::Null => String::new(),
        }
    }
}

impl From<&str> for ScalarValue {
    fn from(s: &str) -> Self {
        ScalarValue::String(s.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(s: String) -> Self {
        ScalarValue::String(s)
    }
}

impl From<i64> for ScalarValue {
    fn from(i: i64) -> Self {
        ScalarValue::Int(i)
    }
}

impl From<f64> for ScalarValue {
    fn from(f: f64) -> Self {
        ScalarValue::Float(f)
    }
}

impl From<bool> for ScalarValue {
    fn from(b: bool) -> Self {
        ScalarValue::Bool(b)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MappingNode {
    Scalar(ScalarValue),
    Fields(BTreeMap<String, MappingNode>),
    Items(Vec<MappingNode>),
}

/// An empty `Fields` node, handed out where a spec is absent.
pub(crate) static EMPTY_FIELDS: MappingNode = MappingNode::Fields(BTreeMap::new());

impl MappingNode {
    pub fn null() -> Self {
        MappingNode::Scalar(ScalarValue::Null)
    }

    pub fn string(s: impl Into<String>) -> Self {
        MappingNode::Scalar(ScalarValue::String(s.into()))
    }

    pub fn int(i: i64) -> Self {
        MappingNode::Scalar(ScalarValue::Int(i))
    }

    pub fn float(f: f64) -> Self {
        MappingNode::Scalar(ScalarValue::Float(f))
    }

    pub fn bool(b: bool) -> Self {
        MappingNode::Scalar(ScalarValue::Bool(b))
    }

    pub fn empty_fields() -> Self {
        MappingNode::Fields(BTreeMap::new())
    }

    pub fn fields<K: Into<String>>(fields: impl IntoIterator<Item = (K, MappingNode)>) -> Self {
        MappingNode::Fields(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn items(items: impl IntoIterator<Item = MappingNode>) -> Self {
        MappingNode::Items(items.into_iter().collect())
    }

    /// A list of string scalars.
    pub fn string_items<S: Into<String>>(items: impl IntoIterator<Item = S>) -> Self {
        MappingNode::Items(items.into_iter().map(MappingNode::string).collect())
    }

    /// A `Fields` node of string scalars.
    pub fn string_fields<K: Into<String>, V: Into<String>>(
        fields: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        MappingNode::Fields(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), MappingNode::string(v)))
                .collect(),
        )
    }

    pub fn as_scalar(&self) -> Option<&ScalarValue> {
        match self {
            MappingNode::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_scalar().and_then(ScalarValue::as_str)
    }

    pub fn as_int(&self) -> Option<i64> {
        self.as_scalar().and_then(ScalarValue::as_int)
    }

    pub fn as_float(&self) -> Option<f64> {
        self.as_scalar().and_then(ScalarValue::as_float)
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_scalar().and_then(ScalarValue::as_bool)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, MappingNode::Scalar(ScalarValue::Null))
    }

    pub fn as_fields(&self) -> Option<&BTreeMap<String, MappingNode>> {
        match self {
            MappingNode::Fields(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn as_items(&self) -> Option<&[MappingNode]> {
        match self {
            MappingNode::Items(items) => Some(items),
            _ => None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&MappingNode> {
        self.as_fields().and_then(|fields| fields.get(name))
    }

    /// The string items of an `Items` node. Non-string items are skipped.
    pub fn string_list(&self) -> Vec<String> {
        self.as_items()
            .unwrap_or_default()
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect()
    }

    /// The string-valued fields of a `Fields` node. Non-string values are skipped.
    pub fn string_map(&self) -> BTreeMap<String, String> {
        self.as_fields()
            .map(|fields| {
                fields
                    .iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Sets a field, replacing any previous value.
    ///
    /// A node that is not a `Fields` node is replaced by one.
    pub fn insert_field(&mut self, name: impl Into<String>, value: MappingNode) {
        match self {
            MappingNode::Fields(fields) => {
                fields.insert(name.into(), value);
            }
            _ => {
                *self = MappingNode::fields([(name.into(), value)]);
            }
        }
    }

    pub fn to_json(&self) -> Value {
        Value::from(self)
    }
}

impl From<ScalarValue> for MappingNode {
    fn from(s: ScalarValue) -> Self {
        MappingNode::Scalar(s)
    }
}

impl From<Value> for MappingNode {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => MappingNode::null(),
            Value::Bool(b) => MappingNode::bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => MappingNode::int(i),
                None => MappingNode::float(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => MappingNode::string(s),
            Value::Array(items) => MappingNode::Items(items.into_iter().map(Into::into).collect()),
            Value::Object(fields) => {
                MappingNode::Fields(fields.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<&MappingNode> for Value {
    fn from(node: &MappingNode) -> Self {
        match node {
            MappingNode::Scalar(ScalarValue::Null) => Value::Null,
            MappingNode::Scalar(ScalarValue::Bool(b)) => Value::Bool(*b),
            MappingNode::Scalar(ScalarValue::Int(i)) => Value::from(*i),
            MappingNode::Scalar(ScalarValue::Float(f)) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            MappingNode::Scalar(ScalarValue::String(s)) => Value::String(s.clone()),
            MappingNode::Items(items) => Value::Array(items.iter().map(Value::from).collect()),
            MappingNode::Fields(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from(v)))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_picks_variants() {
        let node = MappingNode::from(json!({
            "name": "fn",
            "memorySize": 256,
            "ratio": 0.5,
            "enabled": true,
            "missing": null,
            "layers": ["a", "b"]
        }));

        assert_eq!(node.field("name").unwrap().as_str(), Some("fn"));
        assert_eq!(node.field("memorySize").unwrap().as_int(), Some(256));
        assert_eq!(node.field("ratio").unwrap().as_float(), Some(0.5));
        assert_eq!(node.field("enabled").unwrap().as_bool(), Some(true));
        assert!(node.field("missing").unwrap().is_null());
        assert_eq!(
            node.field("layers").unwrap().string_list(),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn test_serde_is_plain_json() {
        let doc = json!({"variables": {"A": "1"}, "items": [1, 2.5, false, null]});
        let node: MappingNode = serde_json::from_value(doc.clone()).unwrap();
        assert_eq!(node, MappingNode::from(doc.clone()));
        assert_eq!(serde_json::to_value(&node).unwrap(), doc);
    }

    #[test]
    fn test_string_map_skips_non_strings() {
        let node = MappingNode::from(json!({"A": "1", "B": 2}));
        let map = node.string_map();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("A").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_insert_field_replaces() {
        let mut node = MappingNode::string("not fields");
        node.insert_field("arn", MappingNode::string("a"));
        node.insert_field("arn", MappingNode::string("b"));
        assert_eq!(node, MappingNode::from(json!({"arn": "b"})));
    }

    #[test]
    fn test_structural_equality() {
        let a = MappingNode::fields([("x", MappingNode::int(1)), ("y", MappingNode::int(2))]);
        let b = MappingNode::fields([("y", MappingNode::int(2)), ("x", MappingNode::int(1))]);
        assert_eq!(a, b);
        assert_ne!(a, MappingNode::fields([("x", MappingNode::int(1))]));
    }
}
