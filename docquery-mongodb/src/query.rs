//! Filter translation into MongoDB query documents.
//!
//! Equality conditions become plain `{ field: value }` pairs, so an equality against an array
//! field keeps MongoDB's membership semantics; any-of conditions become `$in`.

use bson::{doc, Bson, Document};

use docquery_core::{
    error::QueryError,
    query::{FilterVisitor, Sort},
};

/// Translates a [`Filter`](docquery_core::query::Filter) into a MongoDB query document.
pub(crate) struct MongoFilterTranslator;

impl FilterVisitor for MongoFilterTranslator {
    type Output = Document;
    type Error = QueryError;

    fn visit_eq(&mut self, field: &str, value: &Bson) -> Result<Self::Output, Self::Error> {
        Ok(doc! { field: value.clone() })
    }

    fn visit_any_of(&mut self, field: &str, values: &[Bson]) -> Result<Self::Output, Self::Error> {
        Ok(doc! { field: { "$in": values.to_vec() } })
    }

    fn combine(&mut self, parts: Vec<Self::Output>) -> Result<Self::Output, Self::Error> {
        Ok(parts.into_iter().flatten().collect())
    }
}

/// Builds a sort document with keys in the order they were added.
pub(crate) fn sort_document(keys: &[Sort]) -> Option<Document> {
    if keys.is_empty() {
        return None;
    }

    Some(
        keys
            .iter()
            .map(|key| (key.field.clone(), Bson::Int32(key.direction.as_i32())))
            .collect()
    )
}
