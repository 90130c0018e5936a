//! Aggregate requests: which relation, which function, under which attribute

use std::fmt;

use crate::backends::DatabaseValue;
use crate::relationships::{to_snake_case, FilterBuilder, RelationFilter};

/// Aggregate functions that can be loaded onto a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunction {
    Count,
    Sum,
    Min,
    Max,
    Avg,
    Exists,
}

impl AggregateFunction {
    /// Lower-case name used in default attribute names
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateFunction::Count => "count",
            AggregateFunction::Sum => "sum",
            AggregateFunction::Min => "min",
            AggregateFunction::Max => "max",
            AggregateFunction::Avg => "avg",
            AggregateFunction::Exists => "exists",
        }
    }

    pub(crate) fn sql_name(&self) -> &'static str {
        match self {
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Exists => "EXISTS",
        }
    }

    /// Whether the function aggregates a column rather than rows
    pub fn requires_column(&self) -> bool {
        !matches!(self, AggregateFunction::Count | AggregateFunction::Exists)
    }

    /// Value assigned to parents the query returned nothing for
    pub fn default_value(&self) -> DatabaseValue {
        match self {
            AggregateFunction::Count => DatabaseValue::Int64(0),
            AggregateFunction::Exists => DatabaseValue::Bool(false),
            _ => DatabaseValue::Null,
        }
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One requested relation, optionally aliased and constrained
///
/// `"comments"`, `"comments as total"` and `("comments", "total")` all
/// convert into a target.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationTarget {
    pub relation: String,
    pub alias: Option<String>,
    pub filters: Vec<RelationFilter>,
}

impl RelationTarget {
    /// Parse `relation` or `relation as alias`
    pub fn new(name: &str) -> Self {
        let lowered = name.to_ascii_lowercase();
        let (relation, alias) = match lowered.find(" as ") {
            Some(pos) => (name[..pos].trim(), Some(name[pos + 4..].trim().to_string())),
            None => (name.trim(), None),
        };

        Self {
            relation: relation.to_string(),
            alias: alias.filter(|a| !a.is_empty()),
            filters: Vec::new(),
        }
    }

    /// Store the aggregate under `alias` instead of the default name
    pub fn alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }

    /// Attribute name the aggregate is stored under
    pub fn attribute_name(&self, function: AggregateFunction, column: Option<&str>) -> String {
        if let Some(alias) = &self.alias {
            return alias.clone();
        }
        match (function, column) {
            (AggregateFunction::Count, _) | (AggregateFunction::Exists, _) | (_, None) => {
                to_snake_case(&format!("{} {}", self.relation, function))
            }
            (_, Some(column)) => {
                let column: String = column
                    .chars()
                    .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
                    .collect();
                to_snake_case(&format!("{} {} {}", self.relation, function, column))
            }
        }
    }
}

impl FilterBuilder for RelationTarget {
    fn push_filter(&mut self, filter: RelationFilter) {
        self.filters.push(filter);
    }
}

impl From<&str> for RelationTarget {
    fn from(name: &str) -> Self {
        RelationTarget::new(name)
    }
}

impl From<String> for RelationTarget {
    fn from(name: String) -> Self {
        RelationTarget::new(&name)
    }
}

impl From<&String> for RelationTarget {
    fn from(name: &String) -> Self {
        RelationTarget::new(name)
    }
}

impl From<(&str, &str)> for RelationTarget {
    fn from((relation, alias): (&str, &str)) -> Self {
        RelationTarget::new(relation).alias(alias)
    }
}

/// Anything naming one or more relations to aggregate
pub trait IntoRelationTargets {
    fn into_relation_targets(self) -> Vec<RelationTarget>;
}

impl IntoRelationTargets for &str {
    fn into_relation_targets(self) -> Vec<RelationTarget> {
        vec![self.into()]
    }
}

impl IntoRelationTargets for String {
    fn into_relation_targets(self) -> Vec<RelationTarget> {
        vec![self.into()]
    }
}

impl IntoRelationTargets for RelationTarget {
    fn into_relation_targets(self) -> Vec<RelationTarget> {
        vec![self]
    }
}

impl IntoRelationTargets for (&str, &str) {
    fn into_relation_targets(self) -> Vec<RelationTarget> {
        vec![self.into()]
    }
}

impl<T: Into<RelationTarget>> IntoRelationTargets for Vec<T> {
    fn into_relation_targets(self) -> Vec<RelationTarget> {
        self.into_iter().map(Into::into).collect()
    }
}

impl<T: Into<RelationTarget>, const N: usize> IntoRelationTargets for [T; N] {
    fn into_relation_targets(self) -> Vec<RelationTarget> {
        self.into_iter().map(Into::into).collect()
    }
}

impl IntoRelationTargets for &[&str] {
    fn into_relation_targets(self) -> Vec<RelationTarget> {
        self.iter().map(|name| RelationTarget::new(name)).collect()
    }
}
