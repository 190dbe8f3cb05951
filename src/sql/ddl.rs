//! DDL generation from the schema model.
//!
//! Only CREATE TABLE is supported; it is what test fixtures and embedded
//! engines need to materialise a [`Schema`].

use super::dialect::{Dialect, SqlDialect};
use super::token::{Token, TokenStream};
use crate::schema::{Schema, TableDef};

/// CREATE TABLE statement for one table of the schema.
#[derive(Debug, Clone)]
#[must_use = "DDL statements have no effect until converted to SQL with to_sql()"]
pub struct CreateTable<'a> {
    table: &'a TableDef,
    if_not_exists: bool,
}

impl<'a> CreateTable<'a> {
    pub fn new(table: &'a TableDef) -> Self {
        Self {
            table,
            if_not_exists: false,
        }
    }

    /// Add IF NOT EXISTS where the dialect supports it.
    pub fn if_not_exists(mut self) -> Self {
        self.if_not_exists = true;
        self
    }

    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        ts.push(Token::Create).space().push(Token::Table).space();
        if self.if_not_exists && dialect.supports_if_not_exists() {
            ts.push(Token::If)
                .space()
                .push(Token::Not)
                .space()
                .push(Token::Exists)
                .space();
        }
        ts.push(Token::Ident(self.table.name.clone()))
            .space()
            .lparen();

        for (i, column) in self.table.columns.iter().enumerate() {
            if i > 0 {
                ts.comma();
            }
            ts.newline()
                .indent(1)
                .push(Token::Ident(column.name.clone()))
                .space()
                .push(Token::Raw(dialect.emit_data_type(column.value_type).into()));
            if !column.nullable {
                ts.space().push(Token::Not).space().push(Token::Null);
            }
        }

        if let Some(pk) = &self.table.primary_key {
            ts.comma()
                .newline()
                .indent(1)
                .push(Token::Primary)
                .space()
                .push(Token::Key)
                .space()
                .lparen()
                .push(Token::Ident(pk.clone()))
                .rparen();
        }

        ts.newline().rparen();
        ts
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens(dialect).serialize(dialect)
    }
}

/// CREATE TABLE statements for every table, in name order.
pub fn create_schema(schema: &Schema, dialect: Dialect) -> Vec<String> {
    schema
        .tables()
        .map(|table| CreateTable::new(table).if_not_exists().to_sql(dialect))
        .collect()
}
