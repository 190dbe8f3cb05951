//! SQLite dialect.
//!
//! SQLite features relevant to rendering:
//! - ANSI identifier quoting (`"`)
//! - TRUE/FALSE keywords (3.23+), stored as 1/0
//! - `?` positional parameters
//! - NULLS FIRST/LAST (3.30+)
//! - OFFSET is only valid after LIMIT (`LIMIT -1` means unbounded)

use super::helpers;
use super::SqlDialect;
use crate::sql::token::TokenStream;
use crate::value::ValueType;

/// SQLite dialect.
#[derive(Debug, Clone, Copy)]
pub struct Sqlite;

impl SqlDialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_literal(b)
    }

    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        helpers::emit_limit_offset_required_limit(limit, offset, "-1")
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        helpers::remap_function_sqlite(name)
    }

    fn emit_data_type(&self, vt: ValueType) -> &'static str {
        helpers::emit_data_type_sqlite(vt)
    }
}
