//! SQL statement construction for the relational backends.
//!
//! Identifiers cannot be bound as statement parameters, so the table name is
//! validated once by [`TableName::parse`] and interpolated when the
//! statements are built. Command names and responses are always bound.

use crate::config::StoreDefaults;
use crate::error::{BotioError, Result};
use std::fmt;

/// A table name that is safe to interpolate into SQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName(String);

impl TableName {
    /// Accepts an ASCII letter or `_` followed by ASCII alphanumerics or `_`.
    pub fn parse(name: &str) -> Result<Self> {
        let mut chars = name.chars();
        let first_ok = chars
            .next()
            .map(|c| c.is_ascii_alphabetic() || c == '_')
            .unwrap_or(false);

        if !first_ok
            || name.len() > StoreDefaults::MAX_IDENTIFIER_LEN
            || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(BotioError::invalid_argument(
                "table",
                format!(
                    "{:?} is not a valid table name (letters, digits and '_' only, at most {} characters)",
                    name,
                    StoreDefaults::MAX_IDENTIFIER_LEN
                ),
            ));
        }

        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parameter placeholder style of a SQL dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `?1`, `?2`, ...
    Sqlite,
    /// `$1`, `$2`, ...
    Postgres,
}

impl Dialect {
    fn param(self, index: usize) -> String {
        match self {
            Dialect::Sqlite => format!("?{}", index),
            Dialect::Postgres => format!("${}", index),
        }
    }
}

/// Prepared statement texts for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statements {
    pub create_table: String,
    pub upsert: String,
    pub select_one: String,
    pub select_all: String,
    pub delete: String,
}

impl Statements {
    pub fn new(table: &TableName, dialect: Dialect) -> Self {
        let p1 = dialect.param(1);
        let p2 = dialect.param(2);

        Self {
            create_table: format!(
                "CREATE TABLE IF NOT EXISTS {table} (command TEXT NOT NULL PRIMARY KEY, response TEXT NOT NULL)"
            ),
            upsert: format!(
                "INSERT INTO {table} (command, response) VALUES ({p1}, {p2}) \
                 ON CONFLICT (command) DO UPDATE SET response = excluded.response"
            ),
            select_one: format!("SELECT response FROM {table} WHERE command = {p1}"),
            select_all: format!("SELECT command, response FROM {table} ORDER BY command"),
            delete: format!("DELETE FROM {table} WHERE command = {p1}"),
        }
    }
}
