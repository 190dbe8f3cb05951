//! Untyped result rows: [`Tuple`] and [`Record`].

use std::sync::Arc;

use super::decode;
use crate::error::{QueryError, QueryResult};
use crate::sql::expr::Expr;
use crate::sql::query::SelectExpr;
use crate::value::{FromValue, Value};

/// A heterogeneous row, read back by the expressions that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    items: Arc<[SelectExpr]>,
    names: Arc<[String]>,
    values: Vec<Value>,
}

impl Tuple {
    pub(crate) fn new(items: Arc<[SelectExpr]>, names: Arc<[String]>, values: Vec<Value>) -> Self {
        Self {
            items,
            names,
            values,
        }
    }

    /// Value of the select item structurally equal to `expr`.
    pub fn get<T: FromValue>(&self, expr: &Expr) -> QueryResult<T> {
        let index = self
            .items
            .iter()
            .position(|item| &item.expr == expr)
            .ok_or_else(|| QueryError::projection("tuple", "expression is not in the select list"))?;
        self.decode_at(index)
    }

    /// Value of the select item named `name` (alias or column name).
    pub fn get_named<T: FromValue>(&self, name: &str) -> QueryResult<T> {
        let index = self
            .items
            .iter()
            .position(|item| item.name() == Some(name))
            .ok_or_else(|| QueryError::projection("tuple", format!("no item named {}", name)))?;
        self.decode_at(index)
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn decode_at<T: FromValue>(&self, index: usize) -> QueryResult<T> {
        let slot = self.names.get(index).map(String::as_str).unwrap_or("?");
        let value = self.values.get(index).cloned().unwrap_or(Value::Null);
        decode(slot, value)
    }
}

/// Every column of one table, by name.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    table: Arc<str>,
    names: Arc<[String]>,
    values: Vec<Value>,
}

impl Record {
    pub(crate) fn new(table: Arc<str>, names: Arc<[String]>, values: Vec<Value>) -> Self {
        Self {
            table,
            names,
            values,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn get<T: FromValue>(&self, column: &str) -> QueryResult<T> {
        let value = self.value(column).ok_or_else(|| QueryError::UnknownColumn {
            table: self.table.to_string(),
            column: column.to_string(),
        })?;
        decode(column, value.clone())
    }

    pub fn value(&self, column: &str) -> Option<&Value> {
        self.names
            .iter()
            .position(|name| name == column)
            .and_then(|index| self.values.get(index))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
