//! Recursive schema validation of write payloads.
//!
//! The [`Validator`] walks a data value alongside a [`SchemaNode`] tree and collects a flat list
//! of [`Violation`]s. An empty list means the data conforms.
//!
//! For every document it first reports keys the schema does not declare (recursing into
//! declared nested objects and arrays as it goes), then compares every declared key against the
//! type the schema requires.

use bson::{Bson, Document};

use crate::{
    error::Violation,
    query::ID_FIELD,
    schema::SchemaNode,
};

/// How declared keys that are absent from the data are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Every declared key must be present with the right type.
    Full,
    /// Only keys present at the top level are checked (field updates).
    Partial,
}

/// A single validation run of data against a schema tree.
///
/// # Example
///
/// ```ignore
/// use docquery_core::{schema::SchemaNode, validator::Validator};
///
/// let schema = SchemaNode::object([("name", SchemaNode::string()), ("age", SchemaNode::number())]);
/// let errors = Validator::new(&schema).validate(&bson::bson!({ "name": "x", "age": "y" }));
///
/// assert_eq!(errors[0].message, "The key age should be a number");
/// ```
#[derive(Debug)]
pub struct Validator<'a> {
    schema: &'a SchemaNode,
    mode: Mode,
    errors: Vec<Violation>,
}

impl<'a> Validator<'a> {
    pub fn new(schema: &'a SchemaNode) -> Self {
        Self { schema, mode: Mode::Full, errors: Vec::new() }
    }

    /// Skips the presence check for top-level keys missing from the data.
    pub fn partial(mut self) -> Self {
        self.mode = Mode::Partial;
        self
    }

    /// Validates a single value, or every element when `data` is an array.
    pub fn validate(mut self, data: &Bson) -> Vec<Violation> {
        let schema = self.schema;
        self.visit(schema, data, None);
        self.errors
    }

    /// Validates a batch of documents.
    pub fn validate_documents(mut self, documents: &[Document]) -> Vec<Violation> {
        let schema = self.unwrap_array(self.schema);

        for document in documents {
            self.visit_document(schema, document, None);
        }

        self.errors
    }

    fn unwrap_array<'s>(&self, schema: &'s SchemaNode) -> &'s SchemaNode {
        match schema {
            SchemaNode::ArrayOf(inner) => inner.as_ref(),
            other => other,
        }
    }

    fn visit(&mut self, schema: &SchemaNode, data: &Bson, parent: Option<&str>) {
        let schema = self.unwrap_array(schema);

        match data {
            Bson::Array(items) => {
                for item in items {
                    self.visit_item(schema, item, parent);
                }
            }
            item => self.visit_item(schema, item, parent),
        }
    }

    fn visit_item(&mut self, schema: &SchemaNode, item: &Bson, parent: Option<&str>) {
        match schema {
            SchemaNode::Object(_) => match item.as_document() {
                Some(document) => self.visit_document(schema, document, parent),
                None => self.visit_document(schema, &Document::new(), parent),
            },
            SchemaNode::ArrayOf(_) => match item {
                Bson::Array(_) => self.visit(schema, item, parent),
                _ => self.mismatch(parent, schema),
            },
            SchemaNode::Scalar(kind) => {
                if !kind.matches(item) {
                    self.mismatch(parent, schema);
                }
            }
            SchemaNode::Any => {}
        }
    }

    fn visit_document(&mut self, schema: &SchemaNode, document: &Document, parent: Option<&str>) {
        let top_level = parent.is_none();

        for (key, value) in document {
            if top_level && key == ID_FIELD {
                continue;
            }

            match schema.field(key) {
                None => self.errors.push(Violation::new(format!(
                    "The key {key} is not defined in the schema"
                ))),
                Some(node @ SchemaNode::ArrayOf(inner)) => {
                    if **inner != SchemaNode::Any && matches!(value, Bson::Array(_)) {
                        self.visit(node, value, Some(key));
                    }
                }
                Some(node @ SchemaNode::Object(fields)) => {
                    if !fields.is_empty() && matches!(value, Bson::Document(_)) {
                        self.visit(node, value, Some(key));
                    }
                }
                Some(_) => {}
            }
        }

        self.compare(schema, document, top_level && self.mode == Mode::Partial);
    }

    fn compare(&mut self, schema: &SchemaNode, document: &Document, skip_missing: bool) {
        let SchemaNode::Object(fields) = schema else {
            return;
        };

        for (key, node) in fields {
            match document.get(key) {
                Some(value) => {
                    if !node.accepts_shape(value) {
                        self.mismatch(Some(key), node);
                    }
                }
                None => {
                    if !skip_missing && *node != SchemaNode::Any {
                        self.mismatch(Some(key), node);
                    }
                }
            }
        }
    }

    fn mismatch(&mut self, key: Option<&str>, node: &SchemaNode) {
        let type_name = node.type_name();
        let article = if type_name.starts_with(['a', 'e', 'i', 'o', 'u']) { "an" } else { "a" };

        self.errors.push(Violation::new(match key {
            Some(key) => format!("The key {key} should be {article} {type_name}"),
            None => format!("The value should be {article} {type_name}"),
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{bson, doc};
    use pretty_assertions::assert_eq;

    fn messages(errors: Vec<Violation>) -> Vec<String> {
        errors
            .into_iter()
            .map(|v| v.message)
            .collect()
    }

    fn person() -> SchemaNode {
        SchemaNode::from_example(&bson!({ "name": "", "age": 0 }))
    }

    #[test]
    fn conforming_data_has_no_errors() {
        let schema = person();

        assert!(Validator::new(&schema).validate(&bson!({ "name": "x", "age": 3 })).is_empty());
    }

    #[test]
    fn wrong_type_is_reported_for_that_key_only() {
        let schema = person();
        let errors = messages(Validator::new(&schema).validate(&bson!({ "name": "x", "age": "y" })));

        assert_eq!(errors, vec!["The key age should be a number".to_string()]);
    }

    #[test]
    fn undeclared_key_is_reported() {
        let schema = SchemaNode::from_example(&bson!({ "name": "" }));
        let errors = messages(Validator::new(&schema).validate(&bson!({ "name": "x", "extra": 1 })));

        assert_eq!(errors, vec!["The key extra is not defined in the schema".to_string()]);
    }

    #[test]
    fn unknown_keys_come_before_type_checks() {
        let schema = person();
        let errors = messages(Validator::new(&schema).validate(&bson!({ "extra": true, "name": 1, "age": 2 })));

        assert_eq!(
            errors,
            vec![
                "The key extra is not defined in the schema".to_string(),
                "The key name should be a string".to_string(),
            ]
        );
    }

    #[test]
    fn missing_key_fails_in_full_mode_only() {
        let schema = person();

        assert_eq!(
            messages(Validator::new(&schema).validate(&bson!({ "name": "x" }))),
            vec!["The key age should be a number".to_string()]
        );
        assert!(Validator::new(&schema).partial().validate(&bson!({ "name": "x" })).is_empty());
    }

    #[test]
    fn partial_mode_still_checks_present_keys() {
        let schema = person();
        let errors = messages(Validator::new(&schema).partial().validate(&bson!({ "age": false, "nick": "" })));

        assert_eq!(
            errors,
            vec![
                "The key nick is not defined in the schema".to_string(),
                "The key age should be a number".to_string(),
            ]
        );
    }

    #[test]
    fn every_item_of_a_batch_is_checked() {
        let schema = person();
        let errors = messages(Validator::new(&schema).validate_documents(&[
            doc! { "name": "a", "age": 1 },
            doc! { "name": 2, "age": 2 },
            doc! { "name": "c", "age": "3" },
        ]));

        assert_eq!(
            errors,
            vec![
                "The key name should be a string".to_string(),
                "The key age should be a number".to_string(),
            ]
        );
    }

    #[test]
    fn nested_objects_are_validated_recursively() {
        let schema = SchemaNode::from_example(&bson!({ "address": { "city": "", "zip": 0 } }));
        let errors = messages(Validator::new(&schema).validate(&bson!({
            "address": { "city": "Oslo", "zip": "0150", "planet": "earth" }
        })));

        assert_eq!(
            errors,
            vec![
                "The key planet is not defined in the schema".to_string(),
                "The key zip should be a number".to_string(),
            ]
        );
    }

    #[test]
    fn shape_mismatch_is_reported_once_by_the_parent() {
        let schema = SchemaNode::from_example(&bson!({ "address": { "city": "" } }));
        let errors = messages(Validator::new(&schema).validate(&bson!({ "address": "Oslo" })));

        assert_eq!(errors, vec!["The key address should be an object".to_string()]);
    }

    #[test]
    fn bare_object_marker_only_checks_the_shape() {
        let schema = SchemaNode::from_example(&bson!({ "meta": {} }));

        assert!(Validator::new(&schema).validate(&bson!({ "meta": { "anything": 1 } })).is_empty());
        assert_eq!(
            messages(Validator::new(&schema).validate(&bson!({ "meta": [1] }))),
            vec!["The key meta should be an object".to_string()]
        );
    }

    #[test]
    fn arrays_of_documents_validate_each_element() {
        let schema = SchemaNode::from_example(&bson!({ "items": [{ "sku": "", "qty": 0 }] }));
        let errors = messages(Validator::new(&schema).validate(&bson!({
            "items": [{ "sku": "a", "qty": 1 }, { "sku": "b", "qty": "many", "color": "red" }]
        })));

        assert_eq!(
            errors,
            vec![
                "The key color is not defined in the schema".to_string(),
                "The key qty should be a number".to_string(),
            ]
        );
    }

    #[test]
    fn arrays_of_scalars_check_each_element_against_the_parent_key() {
        let schema = SchemaNode::from_example(&bson!({ "tags": [""] }));
        let errors = messages(Validator::new(&schema).validate(&bson!({ "tags": ["a", 2, "c"] })));

        assert_eq!(errors, vec!["The key tags should be a string".to_string()]);
    }

    #[test]
    fn bare_array_marker_only_checks_the_shape() {
        let schema = SchemaNode::object([("list", SchemaNode::any_array())]);

        assert!(Validator::new(&schema).validate(&bson!({ "list": [1, "two", false] })).is_empty());
        assert_eq!(
            messages(Validator::new(&schema).validate(&bson!({ "list": 1 }))),
            vec!["The key list should be an array".to_string()]
        );
    }

    #[test]
    fn array_schema_applies_to_each_document() {
        let schema = SchemaNode::array_of(person());
        let errors = messages(Validator::new(&schema).validate(&bson!([
            { "name": "a", "age": 1 },
            { "name": "b", "age": "2" }
        ])));

        assert_eq!(errors, vec!["The key age should be a number".to_string()]);
    }

    #[test]
    fn primary_key_is_never_undeclared_at_top_level() {
        let schema = person();
        let data = bson!({ "_id": "abc", "name": "x", "age": 1 });

        assert!(Validator::new(&schema).validate(&data).is_empty());
    }
}
