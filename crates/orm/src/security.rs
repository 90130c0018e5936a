//! Security utilities for SQL injection prevention
//!
//! Relation metadata and aliases end up interpolated into SQL text, so every
//! identifier is validated and quoted before it reaches a statement. Values
//! always travel as bound parameters.

use crate::error::ModelError;

/// Characters allowed in SQL identifiers (alphanumeric, underscore)
const ALLOWED_IDENTIFIER_CHARS: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789_";

/// Maximum identifier length accepted by PostgreSQL
const MAX_IDENTIFIER_LENGTH: usize = 63;

/// SQL keywords that must not be used as bare identifiers
static SQL_KEYWORDS: &[&str] = &[
    "SELECT", "INSERT", "UPDATE", "DELETE", "FROM", "WHERE", "JOIN", "UNION", "DROP",
    "CREATE", "ALTER", "GRANT", "REVOKE", "TRUNCATE", "EXEC", "EXECUTE", "DECLARE",
];

/// Escape a SQL identifier (table name, column name, alias)
///
/// Double quotes are doubled and the result is wrapped in double quotes,
/// which both PostgreSQL and SQLite accept.
///
/// # Examples
/// ```
/// use tally_orm::security::escape_identifier;
///
/// assert_eq!(escape_identifier("comments"), "\"comments\"");
/// assert_eq!(escape_identifier("table\"name"), "\"table\"\"name\"");
/// ```
pub fn escape_identifier(identifier: &str) -> String {
    let escaped = identifier.replace('"', "\"\"");
    format!("\"{}\"", escaped)
}

/// Escape a possibly table-qualified column such as `comment_likes.comment_id`
pub fn escape_qualified(identifier: &str) -> String {
    identifier
        .split('.')
        .map(escape_identifier)
        .collect::<Vec<_>>()
        .join(".")
}

/// Validate that an identifier is safe for use in SQL
pub fn validate_identifier(identifier: &str) -> Result<(), ModelError> {
    let Some(first) = identifier.chars().next() else {
        return Err(ModelError::Validation(
            "Identifier cannot be empty".to_string(),
        ));
    };

    if identifier.len() > MAX_IDENTIFIER_LENGTH {
        return Err(ModelError::Validation(format!(
            "Identifier '{}' is too long (max {} characters)",
            identifier, MAX_IDENTIFIER_LENGTH
        )));
    }

    if let Some(c) = identifier.chars().find(|c| !ALLOWED_IDENTIFIER_CHARS.contains(*c)) {
        return Err(ModelError::Validation(format!(
            "Identifier '{}' contains invalid character '{}'",
            identifier, c
        )));
    }

    if first.is_ascii_digit() {
        return Err(ModelError::Validation(format!(
            "Identifier '{}' cannot start with a number",
            identifier
        )));
    }

    let upper_identifier = identifier.to_uppercase();
    if SQL_KEYWORDS.contains(&upper_identifier.as_str()) {
        return Err(ModelError::Validation(format!(
            "Identifier '{}' is a reserved SQL keyword",
            identifier
        )));
    }

    Ok(())
}

/// Validate a column that may be qualified with its table (`table.column`)
pub fn validate_qualified(identifier: &str) -> Result<(), ModelError> {
    let parts: Vec<&str> = identifier.split('.').collect();
    if parts.len() > 2 {
        return Err(ModelError::Validation(format!(
            "Identifier '{}' has too many qualifiers",
            identifier
        )));
    }
    parts.into_iter().try_for_each(validate_identifier)
}
