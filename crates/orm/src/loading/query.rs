//! SQL for loading aggregates onto a set of parents in one round trip
//!
//! The statement selects the parent table once, restricted to the requested
//! keys, and computes every aggregate with a correlated sub-select:
//!
//! ```text
//! SELECT "__parent"."id" AS "__parent_key",
//!        (SELECT COUNT(*) FROM "comments"
//!         WHERE "comments"."post_id" = "__parent"."id") AS "comments_count"
//! FROM "posts" AS "__parent"
//! WHERE "__parent"."id" IN (1, 2)
//! ```
//!
//! Integer keys are written inline so the key list is not bounded by the
//! backend's parameter limit; other key types are bound. The parent scan carries no soft-delete condition, so trashed parents get
//! their aggregates like any other.

use crate::backends::{DatabaseValue, SqlDialect};
use crate::error::{ModelError, ModelResult};
use crate::relationships::{Relation, RelationFilter};
use crate::security::{escape_identifier, escape_qualified, validate_identifier, validate_qualified};

use super::request::AggregateFunction;

/// Alias of the parent table inside the statement
pub(crate) const PARENT_ALIAS: &str = "__parent";

/// Result column carrying the parent key
pub(crate) const PARENT_KEY_COLUMN: &str = "__parent_key";

/// One aggregate column of the statement
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateColumn {
    pub alias: String,
    pub relation: Relation,
    pub function: AggregateFunction,
    pub column: Option<String>,
    /// Filters for this column only, applied after the relation's own
    pub filters: Vec<RelationFilter>,
}

impl AggregateColumn {
    pub fn validate(&self) -> ModelResult<()> {
        validate_identifier(&self.alias)?;
        if self.alias == PARENT_KEY_COLUMN {
            return Err(ModelError::Validation(format!(
                "Alias '{}' is reserved",
                PARENT_KEY_COLUMN
            )));
        }
        match (&self.column, self.function.requires_column()) {
            (Some(column), _) => validate_qualified(column)?,
            (None, true) => {
                return Err(ModelError::Validation(format!(
                    "Aggregate {} needs a column",
                    self.function
                )))
            }
            (None, false) => {}
        }
        self.relation.validate()?;
        self.filters.iter().try_for_each(RelationFilter::validate)
    }
}

/// Rendered statement and its parameters in placeholder order
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateQuery {
    pub sql: String,
    pub params: Vec<DatabaseValue>,
}

/// Appends parameters while handing out placeholders in order
struct ParamWriter {
    dialect: SqlDialect,
    params: Vec<DatabaseValue>,
}

impl ParamWriter {
    fn bind(&mut self, value: DatabaseValue) -> String {
        let placeholder = self.dialect.parameter_placeholder(self.params.len());
        self.params.push(value);
        placeholder
    }
}

/// Build the aggregate statement for parents of `parent_table`
pub fn build_aggregate_query(
    dialect: SqlDialect,
    parent_table: &str,
    primary_key: &str,
    columns: &[AggregateColumn],
    keys: &[DatabaseValue],
) -> ModelResult<AggregateQuery> {
    validate_identifier(parent_table)?;
    validate_identifier(primary_key)?;
    if columns.is_empty() {
        return Err(ModelError::Validation("No aggregates requested".to_string()));
    }
    if keys.is_empty() {
        return Err(ModelError::Validation("No parent keys to aggregate over".to_string()));
    }

    let parent = escape_identifier(PARENT_ALIAS);
    let parent_key = format!("{}.{}", parent, escape_identifier(primary_key));
    let mut writer = ParamWriter {
        dialect,
        params: Vec::with_capacity(keys.len()),
    };

    let mut select = vec![format!("{} AS {}", parent_key, escape_identifier(PARENT_KEY_COLUMN))];
    for column in columns {
        column.validate()?;
        select.push(format!(
            "{} AS {}",
            aggregate_expression(column, &mut writer),
            escape_identifier(&column.alias)
        ));
    }

    let key_list: Vec<String> = keys.iter().map(|key| render_key(key, &mut writer)).collect();

    let sql = format!(
        "SELECT {} FROM {} AS {} WHERE {} IN ({})",
        select.join(", "),
        escape_identifier(parent_table),
        parent,
        parent_key,
        key_list.join(", ")
    );

    Ok(AggregateQuery {
        sql,
        params: writer.params,
    })
}

/// Integers render as literals, anything else becomes a parameter
fn render_key(key: &DatabaseValue, writer: &mut ParamWriter) -> String {
    match key {
        DatabaseValue::Int32(value) => value.to_string(),
        DatabaseValue::Int64(value) => value.to_string(),
        other => writer.bind(other.clone()),
    }
}

fn aggregate_expression(column: &AggregateColumn, writer: &mut ParamWriter) -> String {
    let base = column.relation.base();
    let from_where = related_rows(column, writer);

    match column.function {
        AggregateFunction::Count => format!("(SELECT COUNT(*) {})", from_where),
        AggregateFunction::Exists => format!("EXISTS(SELECT 1 {})", from_where),
        function => {
            let target = column
                .column
                .as_deref()
                .map(|c| escape_qualified(&base.qualify(c)))
                .unwrap_or_else(|| "*".to_string());
            let expression = format!("{}({})", function.sql_name(), target);
            let expression = match function {
                AggregateFunction::Sum | AggregateFunction::Avg => writer.dialect.cast_to_double(&expression),
                _ => expression,
            };
            format!("(SELECT {} {})", expression, from_where)
        }
    }
}

/// `FROM ... [INNER JOIN ...] WHERE ...` selecting the related rows of one parent
fn related_rows(column: &AggregateColumn, writer: &mut ParamWriter) -> String {
    let base = column.relation.base();
    let related = escape_identifier(&base.related_table);

    let mut sql = format!("FROM {}", related);
    for join in column.relation.joins() {
        sql.push_str(&format!(
            " INNER JOIN {} ON {} = {}",
            escape_identifier(&join.table),
            escape_qualified(&join.first),
            escape_qualified(&join.second)
        ));
    }

    let mut conditions = vec![format!(
        "{}.{} = {}.{}",
        related,
        escape_identifier(&base.foreign_key),
        escape_identifier(PARENT_ALIAS),
        escape_identifier(&base.local_key)
    )];
    if let Some(deleted) = &base.soft_delete_column {
        conditions.push(format!("{}.{} IS NULL", related, escape_identifier(deleted)));
    }
    for filter in base.filters.iter().chain(column.filters.iter()) {
        let qualified = escape_qualified(&base.qualify(filter.column()));
        conditions.push(render_filter(&qualified, filter, writer));
    }

    sql.push_str(" WHERE ");
    sql.push_str(&conditions.join(" AND "));
    sql
}

fn render_filter(column: &str, filter: &RelationFilter, writer: &mut ParamWriter) -> String {
    match filter {
        RelationFilter::Eq(_, DatabaseValue::Null) | RelationFilter::Null(_) => format!("{} IS NULL", column),
        RelationFilter::NotEq(_, DatabaseValue::Null) | RelationFilter::NotNull(_) => {
            format!("{} IS NOT NULL", column)
        }
        RelationFilter::Eq(_, value) => format!("{} = {}", column, writer.bind(value.clone())),
        RelationFilter::NotEq(_, value) => format!("{} <> {}", column, writer.bind(value.clone())),
    }
}
