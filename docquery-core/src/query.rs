//! Query specification types shared by the builder and the drivers.
//!
//! A [`QuerySpec`] is the state a [`QueryBuilder`](crate::builder::QueryBuilder) accumulates
//! before a terminal call: the collection, an equality/any-of [`Filter`], an ordered list of
//! [`Sort`] keys, and skip/limit. Drivers consume it through the [`FilterVisitor`] trait, which
//! lets each backend translate or evaluate the filter its own way.

use bson::Bson;
use std::fmt;

use crate::error::QueryError;

/// The reserved primary key field.
pub const ID_FIELD: &str = "_id";

/// Public alias accepted for the primary key in filters.
pub const ID_ALIAS: &str = "id";

/// Maps the public id alias onto the reserved primary key field.
pub fn canonical_field(field: &str) -> &str {
    if field == ID_ALIAS { ID_FIELD } else { field }
}

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

impl SortDirection {
    /// The numeric form drivers use (`1` / `-1`).
    pub fn as_i32(&self) -> i32 {
        match self {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        }
    }
}

/// `"asc"` in any letter case is ascending; every other string is descending.
impl From<&str> for SortDirection {
    fn from(order: &str) -> Self {
        if order.eq_ignore_ascii_case("asc") {
            SortDirection::Asc
        } else {
            SortDirection::Desc
        }
    }
}

impl From<String> for SortDirection {
    fn from(order: String) -> Self {
        SortDirection::from(order.as_str())
    }
}

/// `1` is ascending; every other number is descending.
impl From<i32> for SortDirection {
    fn from(order: i32) -> Self {
        if order == 1 { SortDirection::Asc } else { SortDirection::Desc }
    }
}

impl From<i64> for SortDirection {
    fn from(order: i64) -> Self {
        if order == 1 { SortDirection::Asc } else { SortDirection::Desc }
    }
}

/// Sort specification for one key.
#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    /// The field name to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

/// A condition on a single field.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// The field equals the value.
    Eq(Bson),
    /// The field equals any of the values.
    AnyOf(Vec<Bson>),
}

impl Condition {
    /// Arrays become any-of conditions, everything else an equality.
    pub fn from_value(value: Bson) -> Self {
        match value {
            Bson::Array(values) => Condition::AnyOf(values),
            value => Condition::Eq(value),
        }
    }
}

/// An ordered conjunction of per-field conditions.
///
/// Setting a field that already has a condition replaces it in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Condition)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the condition for `field`, replacing any previous one.
    pub fn set(&mut self, field: impl Into<String>, condition: Condition) {
        let field = field.into();

        match self.conditions.iter_mut().find(|(name, _)| *name == field) {
            Some((_, existing)) => *existing = condition,
            None => self.conditions.push((field, condition)),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Condition> {
        self.conditions
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, condition)| condition)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Condition)> {
        self.conditions
            .iter()
            .map(|(name, condition)| (name.as_str(), condition))
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn clear(&mut self) {
        self.conditions.clear();
    }
}

/// The driver operation a terminal call selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Find,
    InsertOne,
    InsertMany,
    UpdateMany,
    RemoveMany,
    Raw,
    Stream,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Find => "find",
            Operation::InsertOne => "insertOne",
            Operation::InsertMany => "insertMany",
            Operation::UpdateMany => "updateMany",
            Operation::RemoveMany => "removeMany",
            Operation::Raw => "raw",
            Operation::Stream => "stream",
        })
    }
}

/// The state a query accumulates before its terminal call.
///
/// `limit == 0` means unbounded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySpec {
    /// The collection the query runs against.
    pub collection: String,
    /// Conditions every returned or affected document must satisfy.
    pub filter: Filter,
    /// Sort keys in the order they were added.
    pub sort: Vec<Sort>,
    /// Number of documents to skip.
    pub skip: u64,
    /// Maximum number of documents to return.
    pub limit: u64,
}

impl QuerySpec {
    pub fn new(collection: impl Into<String>) -> Self {
        Self { collection: collection.into(), ..Self::default() }
    }

    /// Adds a sort key, or changes the direction of an existing one in place.
    pub fn add_sort(&mut self, field: impl Into<String>, direction: SortDirection) {
        let field = field.into();

        match self.sort.iter_mut().find(|sort| sort.field == field) {
            Some(existing) => existing.direction = direction,
            None => self.sort.push(Sort { field, direction }),
        }
    }
}

/// Translates or evaluates a [`Filter`] one condition at a time.
pub trait FilterVisitor {
    type Output;
    type Error: Into<QueryError>;

    fn visit_eq(&mut self, field: &str, value: &Bson) -> Result<Self::Output, Self::Error>;
    fn visit_any_of(&mut self, field: &str, values: &[Bson]) -> Result<Self::Output, Self::Error>;

    /// Combines the outputs of every condition of a filter (all must hold).
    fn combine(&mut self, parts: Vec<Self::Output>) -> Result<Self::Output, Self::Error>;

    fn visit_condition(&mut self, field: &str, condition: &Condition) -> Result<Self::Output, Self::Error> {
        match condition {
            Condition::Eq(value) => self.visit_eq(field, value),
            Condition::AnyOf(values) => self.visit_any_of(field, values),
        }
    }

    fn visit_filter(&mut self, filter: &Filter) -> Result<Self::Output, Self::Error> {
        let parts = filter
            .iter()
            .map(|(field, condition)| self.visit_condition(field, condition))
            .collect::<Result<Vec<_>, _>>()?;

        self.combine(parts)
    }
}
