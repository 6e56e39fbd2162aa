//! Schema trees used to gate writes.
//!
//! A schema is a tagged tree of [`SchemaNode`]s. It can be built explicitly:
//!
//! ```ignore
//! use docquery_core::schema::SchemaNode;
//!
//! let schema = SchemaNode::object([
//!     ("name", SchemaNode::string()),
//!     ("age", SchemaNode::number()),
//!     ("tags", SchemaNode::array_of(SchemaNode::string())),
//! ]);
//! ```
//!
//! or derived from an example document, where every value stands for its own type:
//!
//! ```ignore
//! let schema = SchemaNode::from_example(&bson::bson!({ "name": "", "age": 0, "tags": [""] }));
//! ```

use bson::Bson;
use serde_json::Value;
use std::fmt;

/// Primitive value types a schema leaf can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    String,
    Number,
    Boolean,
}

impl ScalarKind {
    /// Returns `true` if `value` is of this kind. Any BSON numeric type counts as a number.
    pub fn matches(&self, value: &Bson) -> bool {
        match self {
            ScalarKind::String => matches!(value, Bson::String(_)),
            ScalarKind::Number => matches!(value, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_)),
            ScalarKind::Boolean => matches!(value, Bson::Boolean(_)),
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScalarKind::String => "string",
            ScalarKind::Number => "number",
            ScalarKind::Boolean => "boolean",
        })
    }
}

/// A node of a schema tree.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    /// A primitive value of the given kind.
    Scalar(ScalarKind),
    /// A nested document. An empty field list only requires the value to be a document.
    Object(Vec<(String, SchemaNode)>),
    /// An array whose elements all conform to the inner node.
    ArrayOf(Box<SchemaNode>),
    /// Any value is accepted.
    Any,
}

impl SchemaNode {
    pub fn string() -> Self {
        SchemaNode::Scalar(ScalarKind::String)
    }

    pub fn number() -> Self {
        SchemaNode::Scalar(ScalarKind::Number)
    }

    pub fn boolean() -> Self {
        SchemaNode::Scalar(ScalarKind::Boolean)
    }

    /// A nested document with the given fields, in declaration order.
    pub fn object<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, SchemaNode)>,
    {
        SchemaNode::Object(
            fields
                .into_iter()
                .map(|(key, node)| (key.into(), node))
                .collect()
        )
    }

    /// An array of elements conforming to `node`.
    pub fn array_of(node: SchemaNode) -> Self {
        SchemaNode::ArrayOf(Box::new(node))
    }

    /// An array with unconstrained elements.
    pub fn any_array() -> Self {
        SchemaNode::ArrayOf(Box::new(SchemaNode::Any))
    }

    /// Builds a schema from an example value.
    ///
    /// Strings, numbers and booleans become scalar leaves, documents become objects, and an
    /// array becomes an array of its first element's schema (or of anything, when empty).
    /// Every other value accepts anything.
    pub fn from_example(example: &Bson) -> Self {
        match example {
            Bson::String(_) => SchemaNode::string(),
            Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) => SchemaNode::number(),
            Bson::Boolean(_) => SchemaNode::boolean(),
            Bson::Document(doc) => SchemaNode::Object(
                doc
                    .iter()
                    .map(|(key, value)| (key.to_string(), SchemaNode::from_example(value)))
                    .collect()
            ),
            Bson::Array(items) => match items.first() {
                Some(first) => SchemaNode::array_of(SchemaNode::from_example(first)),
                None => SchemaNode::any_array(),
            },
            _ => SchemaNode::Any,
        }
    }

    /// Builds a schema from an example JSON value. See [`SchemaNode::from_example`].
    pub fn from_json(example: &Value) -> Self {
        match example {
            Value::String(_) => SchemaNode::string(),
            Value::Number(_) => SchemaNode::number(),
            Value::Bool(_) => SchemaNode::boolean(),
            Value::Object(map) => SchemaNode::Object(
                map
                    .iter()
                    .map(|(key, value)| (key.clone(), SchemaNode::from_json(value)))
                    .collect()
            ),
            Value::Array(items) => match items.first() {
                Some(first) => SchemaNode::array_of(SchemaNode::from_json(first)),
                None => SchemaNode::any_array(),
            },
            Value::Null => SchemaNode::Any,
        }
    }

    /// Looks up a declared field of an object node.
    pub fn field(&self, key: &str) -> Option<&SchemaNode> {
        match self {
            SchemaNode::Object(fields) => fields
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, node)| node),
            _ => None,
        }
    }

    /// Returns `true` if `value` has the shape this node declares, without looking inside it.
    pub fn accepts_shape(&self, value: &Bson) -> bool {
        match self {
            SchemaNode::Scalar(kind) => kind.matches(value),
            SchemaNode::Object(_) => matches!(value, Bson::Document(_)),
            SchemaNode::ArrayOf(_) => matches!(value, Bson::Array(_)),
            SchemaNode::Any => true,
        }
    }

    /// Name used in "should be a ..." messages.
    pub fn type_name(&self) -> String {
        match self {
            SchemaNode::Scalar(kind) => kind.to_string(),
            SchemaNode::Object(_) => "object".to_string(),
            SchemaNode::ArrayOf(_) => "array".to_string(),
            SchemaNode::Any => "value".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::bson;
    use pretty_assertions::assert_eq;

    #[test]
    fn example_document_becomes_object_tree() {
        let schema = SchemaNode::from_example(&bson!({
            "name": "",
            "age": 0,
            "active": false,
            "tags": [""],
            "meta": {},
            "anything": null
        }));

        assert_eq!(
            schema,
            SchemaNode::object([
                ("name", SchemaNode::string()),
                ("age", SchemaNode::number()),
                ("active", SchemaNode::boolean()),
                ("tags", SchemaNode::array_of(SchemaNode::string())),
                ("meta", SchemaNode::Object(vec![])),
                ("anything", SchemaNode::Any),
            ])
        );
    }

    #[test]
    fn json_example_matches_bson_example() {
        let json = serde_json::json!({ "flags": [], "pages": [{ "n": 1 }], "title": "" });
        let bson = bson!({ "flags": [], "pages": [{ "n": 1 }], "title": "" });

        assert_eq!(SchemaNode::from_json(&json), SchemaNode::from_example(&bson));
    }

    #[test]
    fn every_numeric_type_is_a_number() {
        let number = ScalarKind::Number;

        assert!(number.matches(&Bson::Int32(1)));
        assert!(number.matches(&Bson::Int64(1)));
        assert!(number.matches(&Bson::Double(1.5)));
        assert!(!number.matches(&Bson::String("1".into())));
    }

    #[test]
    fn field_lookup_only_applies_to_objects() {
        let schema = SchemaNode::object([("name", SchemaNode::string())]);

        assert_eq!(schema.field("name"), Some(&SchemaNode::string()));
        assert_eq!(schema.field("missing"), None);
        assert_eq!(SchemaNode::string().field("name"), None);
    }
}
