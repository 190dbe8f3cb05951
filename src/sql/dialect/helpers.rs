//! Shared helper functions for SQL dialect implementations.
//!
//! This module provides reusable building blocks that dialects can compose
//! to implement the `SqlDialect` trait with minimal duplication.

use super::super::token::{Token, TokenStream};
use crate::value::ValueType;

// =============================================================================
// Identifier Quoting
// =============================================================================

/// Quote identifier with double quotes (ANSI style).
/// Used by: Postgres, DuckDB, SQLite
pub fn quote_double(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote identifier with backticks.
/// Used by: MySQL
pub fn quote_backtick(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

/// Quote identifier with square brackets.
/// Used by: T-SQL (SQL Server, Azure Synapse)
pub fn quote_bracket(ident: &str) -> String {
    format!("[{}]", ident.replace(']', "]]"))
}

// =============================================================================
// String Quoting
// =============================================================================

/// Quote string with single quotes (standard SQL).
pub fn quote_string_single(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Quote string with N prefix for Unicode (T-SQL).
pub fn quote_string_unicode(s: &str) -> String {
    format!("N'{}'", s.replace('\'', "''"))
}

// =============================================================================
// Boolean Formatting
// =============================================================================

/// Format boolean as literal true/false.
/// Used by: Postgres, DuckDB, SQLite
pub fn format_bool_literal(b: bool) -> &'static str {
    if b {
        "true"
    } else {
        "false"
    }
}

/// Format boolean as numeric 1/0.
/// Used by: T-SQL, MySQL
pub fn format_bool_numeric(b: bool) -> &'static str {
    if b {
        "1"
    } else {
        "0"
    }
}

// =============================================================================
// Placeholders
// =============================================================================

/// `$1`, `$2`, ... (PostgreSQL wire protocol).
pub fn placeholder_dollar(index: usize) -> String {
    format!("${}", index)
}

/// `@p1`, `@p2`, ... (SQL Server named parameters).
pub fn placeholder_at(index: usize) -> String {
    format!("@p{}", index)
}

// =============================================================================
// Pagination
// =============================================================================

/// Emit OFFSET ... ROWS FETCH NEXT ... ROWS ONLY (T-SQL style).
/// Note: Requires ORDER BY clause in T-SQL
pub fn emit_limit_offset_tsql(limit: Option<u64>, offset: Option<u64>) -> TokenStream {
    let mut ts = TokenStream::new();

    let off = offset.unwrap_or(0);
    ts.push(Token::Offset)
        .space()
        .push(Token::LitInt(off as i64))
        .space()
        .push(Token::Rows);

    if let Some(lim) = limit {
        ts.space()
            .push(Token::Fetch)
            .space()
            .push(Token::Next)
            .space()
            .push(Token::LitInt(lim as i64))
            .space()
            .push(Token::Rows)
            .space()
            .push(Token::Only);
    }

    ts
}

/// Emit LIMIT ... OFFSET ... where OFFSET requires a LIMIT.
/// Used by: SQLite, MySQL (`LIMIT -1` / huge limit means "no limit")
pub fn emit_limit_offset_required_limit(
    limit: Option<u64>,
    offset: Option<u64>,
    unbounded: &'static str,
) -> TokenStream {
    let mut ts = TokenStream::new();

    match (limit, offset) {
        (Some(lim), _) => {
            ts.push(Token::Limit)
                .space()
                .push(Token::LitInt(lim as i64));
        }
        (None, Some(_)) => {
            ts.push(Token::Limit).space().push(Token::Raw(unbounded.into()));
        }
        (None, None) => return ts,
    }

    if let Some(off) = offset {
        ts.space()
            .push(Token::Offset)
            .space()
            .push(Token::LitInt(off as i64));
    }

    ts
}

// =============================================================================
// Function Remapping
// =============================================================================

/// Remap functions for Postgres dialect.
pub fn remap_function_postgres(name: &str) -> Option<&'static str> {
    match name.to_uppercase().as_str() {
        "NVL" => Some("COALESCE"),
        "IFNULL" => Some("COALESCE"),
        "ISNULL" => Some("COALESCE"),
        "SUBSTR" => Some("SUBSTRING"),
        _ => None,
    }
}

/// Remap functions for DuckDB dialect.
pub fn remap_function_duckdb(name: &str) -> Option<&'static str> {
    match name.to_uppercase().as_str() {
        "NVL" => Some("COALESCE"),
        "IFNULL" => Some("COALESCE"),
        "ISNULL" => Some("COALESCE"),
        _ => None,
    }
}

/// Remap functions for MySQL dialect.
pub fn remap_function_mysql(name: &str) -> Option<&'static str> {
    match name.to_uppercase().as_str() {
        "NVL" => Some("IFNULL"),
        "ISNULL" => Some("IFNULL"),
        "SUBSTR" => Some("SUBSTRING"),
        _ => None,
    }
}

/// Remap functions for T-SQL dialect.
pub fn remap_function_tsql(name: &str) -> Option<&'static str> {
    match name.to_uppercase().as_str() {
        "LENGTH" => Some("LEN"),
        "SUBSTR" => Some("SUBSTRING"),
        "NVL" => Some("ISNULL"),
        "IFNULL" => Some("ISNULL"),
        "COALESCE" => None,
        _ => None,
    }
}

/// Remap functions for SQLite dialect.
pub fn remap_function_sqlite(name: &str) -> Option<&'static str> {
    match name.to_uppercase().as_str() {
        "NVL" => Some("IFNULL"),
        "ISNULL" => Some("IFNULL"),
        "SUBSTRING" => Some("SUBSTR"),
        "LEN" => Some("LENGTH"),
        _ => None,
    }
}

// =============================================================================
// Data Type Emission
// =============================================================================

/// Emit data type for ANSI/Postgres style.
/// Used by: Postgres, DuckDB
pub fn emit_data_type_ansi(vt: ValueType) -> &'static str {
    match vt {
        ValueType::Bool => "BOOLEAN",
        ValueType::Int => "BIGINT",
        ValueType::Float => "DOUBLE PRECISION",
        ValueType::Text | ValueType::Null => "TEXT",
    }
}

/// Emit data type for MySQL.
pub fn emit_data_type_mysql(vt: ValueType) -> &'static str {
    match vt {
        ValueType::Bool => "TINYINT(1)",
        ValueType::Int => "BIGINT",
        ValueType::Float => "DOUBLE",
        ValueType::Text | ValueType::Null => "TEXT",
    }
}

/// Emit data type for T-SQL.
pub fn emit_data_type_tsql(vt: ValueType) -> &'static str {
    match vt {
        ValueType::Bool => "BIT",
        ValueType::Int => "BIGINT",
        ValueType::Float => "FLOAT",
        ValueType::Text | ValueType::Null => "NVARCHAR(MAX)",
    }
}

/// Emit data type for SQLite (type affinity names).
pub fn emit_data_type_sqlite(vt: ValueType) -> &'static str {
    match vt {
        ValueType::Bool => "BOOLEAN",
        ValueType::Int => "INTEGER",
        ValueType::Float => "REAL",
        ValueType::Text | ValueType::Null => "TEXT",
    }
}
