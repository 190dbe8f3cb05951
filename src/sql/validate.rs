//! Syntax check of rendered SQL.
//!
//! Parses a statement with sqlparser using the grammar closest to the target
//! dialect. Useful for asserting that a plan renders to something the engine
//! will accept before a connection is involved.

use sqlparser::dialect::{
    DuckDbDialect, MsSqlDialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect,
};
use sqlparser::parser::{Parser, ParserError};

use super::dialect::Dialect;

/// Rendered SQL that does not parse for its dialect.
#[derive(Debug, thiserror::Error)]
#[error("invalid SQL for {dialect}: {source}\nSQL: {sql}")]
pub struct InvalidSql {
    pub dialect: Dialect,
    pub sql: String,
    pub source: ParserError,
}

/// Parse `sql` with the sqlparser grammar for `dialect`.
///
/// ```ignore
/// validate_sql(&query.to_sql(Dialect::TSql), Dialect::TSql)?;
/// ```
pub fn validate_sql(sql: &str, dialect: Dialect) -> Result<(), InvalidSql> {
    let grammar: Box<dyn sqlparser::dialect::Dialect> = match dialect {
        Dialect::Sqlite => Box::new(SQLiteDialect {}),
        Dialect::Postgres => Box::new(PostgreSqlDialect {}),
        Dialect::DuckDb => Box::new(DuckDbDialect {}),
        Dialect::MySql => Box::new(MySqlDialect {}),
        Dialect::TSql => Box::new(MsSqlDialect {}),
    };

    Parser::parse_sql(&*grammar, sql)
        .map(|_| ())
        .map_err(|source| InvalidSql {
            dialect,
            sql: sql.to_string(),
            source,
        })
}
