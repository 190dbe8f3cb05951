//! Storage engine boundary.

use crate::error::BoxError;
use crate::sql::dialect::Dialect;
use crate::sql::token::Statement;
use crate::value::Value;

/// One result row, in select-list order.
pub type Row = Vec<Value>;

/// A live connection to a storage engine.
///
/// Implementations run already-rendered statements; placeholders in
/// [`Statement::sql`] follow [`Connection::dialect`] and are bound from
/// [`Statement::params`] in order.
pub trait Connection {
    /// Dialect statements for this connection are rendered in.
    fn dialect(&self) -> Dialect;

    /// Run a statement that returns rows.
    fn query(&mut self, statement: &Statement) -> Result<Vec<Row>, BoxError>;

    /// Run a statement that changes rows, returning how many it touched.
    fn execute(&mut self, statement: &Statement) -> Result<u64, BoxError>;
}

impl<C: Connection + ?Sized> Connection for &mut C {
    fn dialect(&self) -> Dialect {
        (**self).dialect()
    }

    fn query(&mut self, statement: &Statement) -> Result<Vec<Row>, BoxError> {
        (**self).query(statement)
    }

    fn execute(&mut self, statement: &Statement) -> Result<u64, BoxError> {
        (**self).execute(statement)
    }
}

impl<C: Connection + ?Sized> Connection for Box<C> {
    fn dialect(&self) -> Dialect {
        (**self).dialect()
    }

    fn query(&mut self, statement: &Statement) -> Result<Vec<Row>, BoxError> {
        (**self).query(statement)
    }

    fn execute(&mut self, statement: &Statement) -> Result<u64, BoxError> {
        (**self).execute(statement)
    }
}
