//! Embedded SQLite connection.

use std::path::Path;

use rusqlite::params_from_iter;
use rusqlite::types::Value as SqlValue;

use super::connection::{Connection, Row};
use crate::config::{Settings, SettingsError};
use crate::error::BoxError;
use crate::schema::Schema;
use crate::sql::ddl;
use crate::sql::dialect::Dialect;
use crate::sql::token::Statement;
use crate::value::Value;

/// Errors raised while opening or preparing a SQLite database.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),
}

pub type ConnectionResult<T> = Result<T, ConnectionError>;

/// [`Connection`] over an embedded SQLite database.
pub struct SqliteConnection {
    conn: rusqlite::Connection,
}

impl SqliteConnection {
    /// Open or create the database file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> ConnectionResult<Self> {
        Self::configure(rusqlite::Connection::open(path)?)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> ConnectionResult<Self> {
        Self::configure(rusqlite::Connection::open_in_memory()?)
    }

    fn configure(conn: rusqlite::Connection) -> ConnectionResult<Self> {
        // LIKE matches ASCII case-insensitively unless told otherwise
        conn.pragma_update(None, "case_sensitive_like", true)?;
        Ok(Self { conn })
    }

    /// Open the database named by `[database] path`, or an in-memory one.
    pub fn from_settings(settings: &Settings) -> ConnectionResult<Self> {
        match settings.database.resolved_path()? {
            Some(path) => Self::open(path),
            None => Self::open_in_memory(),
        }
    }

    /// Run a script of `;`-separated statements without parameters.
    pub fn execute_batch(&self, sql: &str) -> ConnectionResult<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    /// Create every table of `schema` that does not exist yet.
    pub fn create_schema(&self, schema: &Schema) -> ConnectionResult<()> {
        for statement in ddl::create_schema(schema, Dialect::Sqlite) {
            self.conn.execute_batch(&statement)?;
        }
        Ok(())
    }

    /// The underlying rusqlite connection.
    pub fn inner(&self) -> &rusqlite::Connection {
        &self.conn
    }
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("path", &self.conn.path())
            .finish()
    }
}

impl Connection for SqliteConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn query(&mut self, statement: &Statement) -> Result<Vec<Row>, BoxError> {
        let mut stmt = self.conn.prepare(&statement.sql)?;
        let width = stmt.column_count();
        let mut rows = stmt.query(params_from_iter(statement.params.iter().map(to_sql_value)))?;

        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                values.push(from_sql_value(row.get::<_, SqlValue>(i)?)?);
            }
            result.push(values);
        }
        Ok(result)
    }

    fn execute(&mut self, statement: &Statement) -> Result<u64, BoxError> {
        let changed = self.conn.execute(
            &statement.sql,
            params_from_iter(statement.params.iter().map(to_sql_value)),
        )?;
        Ok(changed as u64)
    }
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Int(i) => SqlValue::Integer(*i),
        Value::Float(f) => SqlValue::Real(*f),
        Value::Text(s) => SqlValue::Text(s.clone()),
        // SQLite has no boolean storage class
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
    }
}

fn from_sql_value(value: SqlValue) -> Result<Value, BoxError> {
    match value {
        SqlValue::Null => Ok(Value::Null),
        SqlValue::Integer(i) => Ok(Value::Int(i)),
        SqlValue::Real(f) => Ok(Value::Float(f)),
        SqlValue::Text(s) => Ok(Value::Text(s)),
        SqlValue::Blob(bytes) => Err(format!("unsupported BLOB value ({} bytes)", bytes.len()).into()),
    }
}
