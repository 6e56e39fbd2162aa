//! Filter evaluation and ordering for in-memory documents.
//!
//! This module matches documents against a [`Filter`] and orders them by a list of sort keys,
//! following the document-store conventions the MongoDB driver exposes: numbers compare by
//! value whatever their width, an equality against an array field matches when any element
//! matches, and values of different types order by type.

use bson::{spec::BinarySubtype, Bson, DateTime, Document};
use std::{cmp::Ordering, collections::HashMap};

use docquery_core::{
    error::QueryError,
    query::{Filter, FilterVisitor, Sort, SortDirection},
};

/// Type-erased, comparable view of a BSON value.
///
/// Numeric types are normalized to `f64`.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Number(f64),
    String(&'a str),
    Map(HashMap<&'a str, Comparable<'a>>),
    Array(Vec<Comparable<'a>>),
    Binary(BinarySubtype, &'a [u8]),
    ObjectId([u8; 12]),
    Bool(bool),
    DateTime(DateTime),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::ObjectId(value) => Comparable::ObjectId(value.bytes()),
            Bson::Binary(value) => Comparable::Binary(value.subtype, &value.bytes),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
            // Other types are not comparable
            _ => Comparable::Null,
        }
    }
}

impl<'a> Comparable<'a> {
    /// Position of the value's type in the cross-type sort order.
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Number(_) => 1,
            Comparable::String(_) => 2,
            Comparable::Map(_) => 3,
            Comparable::Array(_) => 4,
            Comparable::Binary(..) => 5,
            Comparable::ObjectId(_) => 6,
            Comparable::Bool(_) => 7,
            Comparable::DateTime(_) => 8,
        }
    }

    /// Orders any two values; values of different types order by type.
    pub(crate) fn order(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Comparable::String(a), Comparable::String(b)) => a.cmp(b),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.cmp(b),
            (Comparable::Binary(_, a), Comparable::Binary(_, b)) => a.cmp(b),
            (Comparable::Array(a), Comparable::Array(b)) => a
                .iter()
                .zip(b.iter())
                .map(|(left, right)| left.order(right))
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::Binary(sa, a), Comparable::Binary(sb, b)) => sa == sb && a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

/// Resolves a possibly dotted field path (`address.city`) inside a document.
pub(crate) fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = current.as_document()?.get(segment)?;
    }

    Some(current)
}

/// Sets a possibly dotted field path, creating missing intermediate documents.
///
/// Fails when an intermediate segment holds something other than a document.
pub(crate) fn assign(document: &mut Document, path: &str, value: Bson) -> Result<(), QueryError> {
    let (parents, field) = match path.rsplit_once('.') {
        Some((parents, field)) => (Some(parents), field),
        None => (None, path),
    };

    let mut current = document;

    for segment in parents.into_iter().flat_map(|parents| parents.split('.')) {
        if !current.contains_key(segment) {
            current.insert(segment, Document::new());
        }

        current = match current.get_mut(segment) {
            Some(Bson::Document(inner)) => inner,
            _ => {
                return Err(QueryError::Backend(format!(
                    "cannot set {path}: {segment} is not a document"
                )));
            }
        };
    }

    current.insert(field, value);

    Ok(())
}

/// Returns `true` if setting `path` to `value` would change the document.
pub(crate) fn differs(document: &Document, path: &str, value: &Bson) -> bool {
    match lookup(document, path) {
        Some(stored) => Comparable::from(stored) != Comparable::from(value),
        None => true,
    }
}

/// Returns `true` if the stored value matches `expected`.
///
/// A missing field matches `null`; an array field matches a scalar it contains.
fn matches_value(stored: Option<&Bson>, expected: &Bson) -> bool {
    let expected = Comparable::from(expected);

    match stored.map(Comparable::from).unwrap_or(Comparable::Null) {
        Comparable::Array(items) if !matches!(expected, Comparable::Array(_)) => {
            items.iter().any(|item| *item == expected)
        }
        actual => actual == expected,
    }
}

pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Returns `true` if the document satisfies every condition. An empty filter matches all.
    pub fn matches(&mut self, filter: &Filter) -> bool {
        self.visit_filter(filter).unwrap_or(false)
    }

    pub fn filter_documents(
        documents: impl IntoIterator<Item = &'a Document>,
        filter: &Filter,
    ) -> Vec<Document> {
        documents
            .into_iter()
            .filter(|doc| DocumentEvaluator::new(doc).matches(filter))
            .cloned()
            .collect::<Vec<_>>()
    }
}

impl<'a> FilterVisitor for DocumentEvaluator<'a> {
    type Output = bool;
    type Error = QueryError;

    fn visit_eq(&mut self, field: &str, value: &Bson) -> Result<Self::Output, Self::Error> {
        Ok(matches_value(lookup(self.document, field), value))
    }

    fn visit_any_of(&mut self, field: &str, values: &[Bson]) -> Result<Self::Output, Self::Error> {
        let stored = lookup(self.document, field);

        Ok(values.iter().any(|value| matches_value(stored, value)))
    }

    fn combine(&mut self, parts: Vec<Self::Output>) -> Result<Self::Output, Self::Error> {
        Ok(parts.into_iter().all(|part| part))
    }
}

/// Stable multi-key sort. Keys apply in order; later keys break ties of earlier ones.
pub(crate) fn sort_documents(documents: &mut [Document], keys: &[Sort]) {
    if keys.is_empty() {
        return;
    }

    documents.sort_by(|a, b| {
        keys
            .iter()
            .map(|key| {
                let left = lookup(a, &key.field)
                    .map(Comparable::from)
                    .unwrap_or(Comparable::Null);
                let right = lookup(b, &key.field)
                    .map(Comparable::from)
                    .unwrap_or(Comparable::Null);

                match key.direction {
                    SortDirection::Asc => left.order(&right),
                    SortDirection::Desc => right.order(&left),
                }
            })
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{bson, doc, oid::ObjectId};
    use docquery_core::query::Condition;
    use pretty_assertions::assert_eq;

    fn filter(conditions: &[(&str, Condition)]) -> Filter {
        let mut filter = Filter::new();

        for (field, condition) in conditions {
            filter.set(*field, condition.clone());
        }

        filter
    }

    #[test]
    fn numbers_match_across_widths() {
        let document = doc! { "index": 1i64 };
        let f = filter(&[("index", Condition::Eq(bson!(1)))]);

        assert!(DocumentEvaluator::new(&document).matches(&f));
    }

    #[test]
    fn any_of_matches_any_listed_value() {
        let document = doc! { "status": "b" };

        assert!(DocumentEvaluator::new(&document).matches(&filter(&[(
            "status",
            Condition::AnyOf(vec![bson!("a"), bson!("b")])
        )])));
        assert!(!DocumentEvaluator::new(&document).matches(&filter(&[(
            "status",
            Condition::AnyOf(vec![bson!("c")])
        )])));
    }

    #[test]
    fn equality_against_an_array_field_checks_membership() {
        let document = doc! { "tags": ["red", "blue"] };

        assert!(DocumentEvaluator::new(&document).matches(&filter(&[("tags", Condition::Eq(bson!("blue")))])));
        assert!(!DocumentEvaluator::new(&document).matches(&filter(&[("tags", Condition::Eq(bson!("green")))])));
    }

    #[test]
    fn every_condition_must_hold() {
        let document = doc! { "a": 1, "b": 2 };

        assert!(DocumentEvaluator::new(&document).matches(&filter(&[
            ("a", Condition::Eq(bson!(1))),
            ("b", Condition::Eq(bson!(2))),
        ])));
        assert!(!DocumentEvaluator::new(&document).matches(&filter(&[
            ("a", Condition::Eq(bson!(1))),
            ("b", Condition::Eq(bson!(3))),
        ])));
        assert!(DocumentEvaluator::new(&document).matches(&Filter::new()));
    }

    #[test]
    fn dotted_paths_reach_into_nested_documents() {
        let document = doc! { "address": { "city": "Oslo" } };

        assert_eq!(lookup(&document, "address.city"), Some(&bson!("Oslo")));
        assert_eq!(lookup(&document, "address.zip"), None);
    }

    #[test]
    fn dotted_assignment_writes_into_nested_documents() {
        let mut document = doc! { "address": { "city": "Oslo", "zip": "0150" } };

        assign(&mut document, "address.city", bson!("Bergen")).unwrap();
        assign(&mut document, "meta.tags.primary", bson!("home")).unwrap();

        assert_eq!(
            document,
            doc! {
                "address": { "city": "Bergen", "zip": "0150" },
                "meta": { "tags": { "primary": "home" } },
            }
        );
        assert!(matches!(
            assign(&mut document, "address.city.name", bson!("x")),
            Err(QueryError::Backend(_))
        ));
    }

    #[test]
    fn numbers_of_different_widths_are_not_a_change() {
        let document = doc! { "n": 1, "nested": { "flag": true } };

        assert!(!differs(&document, "n", &bson!(1i64)));
        assert!(!differs(&document, "nested.flag", &bson!(true)));
        assert!(differs(&document, "n", &bson!(2)));
        assert!(differs(&document, "missing", &Bson::Null));
    }

    #[test]
    fn object_ids_compare_by_value() {
        let id = ObjectId::new();
        let document = doc! { "_id": id };

        assert!(DocumentEvaluator::new(&document).matches(&filter(&[("_id", Condition::Eq(Bson::ObjectId(id)))])));
        assert!(!DocumentEvaluator::new(&document).matches(&filter(&[("_id", Condition::Eq(Bson::ObjectId(ObjectId::new())))])));
    }

    #[test]
    fn multi_key_sort_is_stable_and_ordered() {
        let mut documents = vec![
            doc! { "group": 1, "n": "b" },
            doc! { "group": 2, "n": "a" },
            doc! { "group": 1, "n": "a" },
            doc! { "n": "z" },
        ];

        sort_documents(
            &mut documents,
            &[
                Sort { field: "group".into(), direction: SortDirection::Desc },
                Sort { field: "n".into(), direction: SortDirection::Asc },
            ],
        );

        assert_eq!(
            documents,
            vec![
                doc! { "group": 2, "n": "a" },
                doc! { "group": 1, "n": "a" },
                doc! { "group": 1, "n": "b" },
                doc! { "n": "z" },
            ]
        );
    }
}
