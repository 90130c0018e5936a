//! HasMany relation definitions
//!
//! A parent has many children when the child table carries a foreign key
//! pointing at the parent's local key. A relation may additionally join
//! other tables, in which case every joined row counts (see
//! [`Relation::HasManyJoined`]).

use crate::error::{ModelError, ModelResult};
use crate::model::Model;
use crate::security::{validate_identifier, validate_qualified};

use super::filters::{FilterBuilder, RelationFilter};

/// One-to-many relation from a parent model to a related table
#[derive(Debug, Clone, PartialEq)]
pub struct HasMany {
    pub related_table: String,
    pub foreign_key: String,
    pub local_key: String,
    pub filters: Vec<RelationFilter>,
    /// Only count related rows whose column is NULL
    pub soft_delete_column: Option<String>,
}

impl HasMany {
    /// Relation to `related_table` keyed by `foreign_key`, matched against `id`
    pub fn new(related_table: &str, foreign_key: &str) -> Self {
        Self {
            related_table: related_table.to_string(),
            foreign_key: foreign_key.to_string(),
            local_key: "id".to_string(),
            filters: Vec::new(),
            soft_delete_column: None,
        }
    }

    /// Relation to the table of model `R`
    pub fn of<R: Model>(foreign_key: &str) -> Self {
        Self::new(R::table_name(), foreign_key)
    }

    /// Match the foreign key against a parent column other than `id`
    pub fn local_key(mut self, local_key: &str) -> Self {
        self.local_key = local_key.to_string();
        self
    }

    /// Exclude related rows that have been soft deleted through `column`
    pub fn without_trashed(mut self, column: &str) -> Self {
        self.soft_delete_column = Some(column.to_string());
        self
    }

    /// Exclude related rows soft deleted through model `R`'s column
    pub fn without_trashed_of<R: Model>(self) -> Self {
        match R::soft_delete_column() {
            Some(column) => self.without_trashed(column),
            None => self,
        }
    }

    /// Inner join another table onto the related rows
    pub fn join(self, table: &str, first: &str, second: &str) -> Relation {
        Relation::HasMany(self).join(table, first, second)
    }

    /// Qualify a column with the related table unless it already is
    pub fn qualify(&self, column: &str) -> String {
        if column.contains('.') {
            column.to_string()
        } else {
            format!("{}.{}", self.related_table, column)
        }
    }

    pub fn validate(&self) -> ModelResult<()> {
        validate_identifier(&self.related_table)?;
        validate_identifier(&self.foreign_key)?;
        validate_identifier(&self.local_key)?;
        if let Some(column) = &self.soft_delete_column {
            validate_identifier(column)?;
        }
        self.filters.iter().try_for_each(RelationFilter::validate)
    }
}

impl FilterBuilder for HasMany {
    fn push_filter(&mut self, filter: RelationFilter) {
        self.filters.push(filter);
    }
}

/// `INNER JOIN table ON first = second`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinClause {
    pub table: String,
    pub first: String,
    pub second: String,
}

impl JoinClause {
    pub fn validate(&self) -> ModelResult<()> {
        validate_identifier(&self.table)?;
        validate_qualified(&self.first)?;
        validate_qualified(&self.second)
    }
}

/// Relation kinds a model can declare
#[derive(Debug, Clone, PartialEq)]
pub enum Relation {
    HasMany(HasMany),
    /// A has-many relation whose related rows are joined to further tables
    HasManyJoined { base: HasMany, joins: Vec<JoinClause> },
}

impl Relation {
    /// The underlying has-many definition
    pub fn base(&self) -> &HasMany {
        match self {
            Relation::HasMany(base) | Relation::HasManyJoined { base, .. } => base,
        }
    }

    /// Join clauses, empty for a plain has-many
    pub fn joins(&self) -> &[JoinClause] {
        match self {
            Relation::HasMany(_) => &[],
            Relation::HasManyJoined { joins, .. } => joins,
        }
    }

    /// Inner join another table onto the related rows
    pub fn join(self, table: &str, first: &str, second: &str) -> Relation {
        let clause = JoinClause {
            table: table.to_string(),
            first: first.to_string(),
            second: second.to_string(),
        };
        match self {
            Relation::HasMany(base) => Relation::HasManyJoined {
                base,
                joins: vec![clause],
            },
            Relation::HasManyJoined { base, mut joins } => {
                joins.push(clause);
                Relation::HasManyJoined { base, joins }
            }
        }
    }

    /// Tables the relation's rows are read from, in join order
    ///
    /// Relations sharing a signature produce the same FROM clause.
    pub fn signature(&self) -> String {
        std::iter::once(self.base().related_table.as_str())
            .chain(self.joins().iter().map(|j| j.table.as_str()))
            .collect::<Vec<_>>()
            .join(">")
    }

    pub fn validate(&self) -> ModelResult<()> {
        self.base().validate()?;
        self.joins().iter().try_for_each(JoinClause::validate)?;
        if self.joins().iter().any(|j| j.table == self.base().related_table) {
            return Err(ModelError::Configuration(format!(
                "Relation on '{}' joins its own table",
                self.base().related_table
            )));
        }
        Ok(())
    }
}

impl From<HasMany> for Relation {
    fn from(relation: HasMany) -> Self {
        Relation::HasMany(relation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::DatabaseValue;

    #[test]
    fn test_has_many_defaults() {
        let relation = HasMany::new("comments", "post_id");
        assert_eq!(relation.local_key, "id");
        assert!(relation.filters.is_empty());
        assert!(relation.validate().is_ok());
        assert_eq!(relation.qualify("votes"), "comments.votes");
        assert_eq!(relation.qualify("comment_likes.id"), "comment_likes.id");
    }

    #[test]
    fn test_join_builds_joined_relation() {
        let relation = HasMany::new("comments", "post_id")
            .join("comment_likes", "comment_likes.comment_id", "comments.id")
            .join("users", "users.id", "comment_likes.user_id");

        assert_eq!(relation.base().related_table, "comments");
        assert_eq!(relation.joins().len(), 2);
        assert_eq!(relation.signature(), "comments>comment_likes>users");
        assert!(relation.validate().is_ok());
    }

    #[test]
    fn test_filters_and_trashed_column() {
        let relation = HasMany::new("comments", "post_id")
            .where_eq("approved", true)
            .without_trashed("deleted_at");

        assert_eq!(
            relation.filters,
            vec![RelationFilter::Eq("approved".to_string(), DatabaseValue::Bool(true))]
        );
        assert_eq!(relation.soft_delete_column.as_deref(), Some("deleted_at"));
    }

    #[test]
    fn test_validate_rejects_bad_definitions() {
        assert!(HasMany::new("comments", "post id").validate().is_err());
        assert!(HasMany::new("comments", "post_id")
            .join("comments", "comments.id", "comments.parent_id")
            .validate()
            .is_err());
        assert!(HasMany::new("comments", "post_id")
            .join("likes", "likes.comment_id;", "comments.id")
            .validate()
            .is_err());
    }
}
