//! Filter clauses attached to relation sub-queries

use crate::backends::DatabaseValue;
use crate::error::ModelResult;
use crate::security::validate_qualified;

/// A single `WHERE` condition on the related table
///
/// Unqualified columns refer to the related table; qualify them
/// (`comment_likes.kind`) to filter on a joined table.
#[derive(Debug, Clone, PartialEq)]
pub enum RelationFilter {
    Eq(String, DatabaseValue),
    NotEq(String, DatabaseValue),
    Null(String),
    NotNull(String),
}

impl RelationFilter {
    pub fn column(&self) -> &str {
        match self {
            RelationFilter::Eq(column, _)
            | RelationFilter::NotEq(column, _)
            | RelationFilter::Null(column)
            | RelationFilter::NotNull(column) => column,
        }
    }

    pub fn validate(&self) -> ModelResult<()> {
        validate_qualified(self.column())
    }
}

/// Builder methods shared by everything that carries relation filters
pub trait FilterBuilder: Sized {
    fn push_filter(&mut self, filter: RelationFilter);

    fn where_eq(mut self, column: &str, value: impl Into<DatabaseValue>) -> Self {
        self.push_filter(RelationFilter::Eq(column.to_string(), value.into()));
        self
    }

    fn where_not_eq(mut self, column: &str, value: impl Into<DatabaseValue>) -> Self {
        self.push_filter(RelationFilter::NotEq(column.to_string(), value.into()));
        self
    }

    fn where_null(mut self, column: &str) -> Self {
        self.push_filter(RelationFilter::Null(column.to_string()));
        self
    }

    fn where_not_null(mut self, column: &str) -> Self {
        self.push_filter(RelationFilter::NotNull(column.to_string()));
        self
    }
}
