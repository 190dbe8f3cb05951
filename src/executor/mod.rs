//! Plan executor.
//!
//! The [`Executor`] renders a built [`Query`] or mutation for the dialect of
//! the connection it is handed, binds the parameters, runs the statement and
//! maps the rows back through the query's projection.
//!
//! Connections are borrowed per call; the executor itself holds no state
//! besides its rendering options and may be shared freely.
//!
//! ```ignore
//! let executor = Executor::new();
//! let mut conn = SqliteConnection::open_in_memory()?;
//! let names: Vec<String> = executor.fetch_all(&mut conn, &query)?;
//! let page = executor.fetch_page(&mut conn, &query)?;
//! ```

mod connection;
mod sqlite;

pub use connection::{Connection, Row};
pub use sqlite::{ConnectionError, ConnectionResult, SqliteConnection};

use tracing::{debug, trace, warn};

use crate::config::Settings;
use crate::error::{BoxError, QueryError, QueryResult};
use crate::projection::{Extractor, RowShape};
use crate::sql::dml::Mutation;
use crate::sql::functions::FunctionMap;
use crate::sql::query::{Query, QueryPlan};
use crate::sql::render::RenderContext;
use crate::sql::token::Statement;

/// One page of results plus the size of the unpaged result.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub rows: Vec<T>,
    /// Rows the query returns without LIMIT/OFFSET.
    pub total: u64,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl<T> Page<T> {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Runs built plans against a [`Connection`].
#[derive(Debug, Clone)]
pub struct Executor {
    functions: FunctionMap,
    log_sql: bool,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor {
    pub fn new() -> Self {
        Self {
            functions: FunctionMap::new(),
            log_sql: true,
        }
    }

    /// Render function calls through `functions` before the dialect defaults.
    pub fn with_functions(functions: FunctionMap) -> Self {
        Self {
            functions,
            log_sql: true,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::with_functions(settings.functions.clone()).log_sql(settings.logging.log_sql)
    }

    /// Whether rendered SQL text is included in debug logs.
    pub fn log_sql(mut self, enabled: bool) -> Self {
        self.log_sql = enabled;
        self
    }

    pub fn functions(&self) -> &FunctionMap {
        &self.functions
    }

    /// Statement the executor would send for `plan` on `conn`.
    pub fn render<C: Connection + ?Sized>(&self, conn: &C, plan: &QueryPlan) -> Statement {
        plan.to_statement(&RenderContext::new(conn.dialect(), &self.functions))
    }

    /// Every row of the query.
    pub fn fetch_all<C, T>(&self, conn: &mut C, query: &Query<T>) -> QueryResult<Vec<T>>
    where
        C: Connection + ?Sized,
    {
        self.run(conn, query.plan(), query.extractor())
    }

    /// The single row of the query, `None` when it returns nothing.
    ///
    /// More than one row is [`QueryError::NonUniqueResult`].
    pub fn fetch_one<C, T>(&self, conn: &mut C, query: &Query<T>) -> QueryResult<Option<T>>
    where
        C: Connection + ?Sized,
    {
        let plan = query.plan().with_limit(2);
        let mut rows = self.run(conn, &plan, query.extractor())?;
        if rows.len() > 1 {
            warn!(rows = rows.len(), "expected at most one row");
            return Err(QueryError::NonUniqueResult(rows.len()));
        }
        Ok(rows.pop())
    }

    /// The first row of the query, if any.
    pub fn fetch_first<C, T>(&self, conn: &mut C, query: &Query<T>) -> QueryResult<Option<T>>
    where
        C: Connection + ?Sized,
    {
        let plan = query.plan().with_limit(1);
        let rows = self.run(conn, &plan, query.extractor())?;
        Ok(rows.into_iter().next())
    }

    /// Number of rows the query returns, ignoring its LIMIT and OFFSET.
    pub fn fetch_count<C, T>(&self, conn: &mut C, query: &Query<T>) -> QueryResult<u64>
    where
        C: Connection + ?Sized,
    {
        let count = query.count();
        let rows = self.run(conn, count.plan(), count.extractor())?;
        let total = rows.into_iter().next().unwrap_or(0);
        Ok(u64::try_from(total).unwrap_or(0))
    }

    /// The query's rows together with the unpaged total.
    ///
    /// The row query is skipped when the total is zero.
    pub fn fetch_page<C, T>(&self, conn: &mut C, query: &Query<T>) -> QueryResult<Page<T>>
    where
        C: Connection + ?Sized,
    {
        let total = self.fetch_count(conn, query)?;
        let rows = if total == 0 {
            Vec::new()
        } else {
            self.fetch_all(conn, query)?
        };
        Ok(Page {
            rows,
            total,
            limit: query.plan().limit(),
            offset: query.plan().offset(),
        })
    }

    /// Run a bulk UPDATE, DELETE or an INSERT, returning the affected-row count.
    ///
    /// The statement goes straight to the storage engine. Values fetched
    /// earlier are not refreshed; re-run the queries that produced them if
    /// they must reflect the change.
    pub fn execute<C, M>(&self, conn: &mut C, mutation: &M) -> QueryResult<u64>
    where
        C: Connection + ?Sized,
        M: Mutation,
    {
        let ctx = RenderContext::new(conn.dialect(), &self.functions);
        let statement = mutation.to_statement(&ctx);
        self.log_statement(&statement);

        let changed = conn
            .execute(&statement)
            .map_err(|source| failure(statement.sql, mutation.describe(), source))?;
        trace!(rows = changed, "statement executed");
        Ok(changed)
    }

    fn run<C, T>(&self, conn: &mut C, plan: &QueryPlan, extract: Extractor<T>) -> QueryResult<Vec<T>>
    where
        C: Connection + ?Sized,
    {
        let statement = self.render(conn, plan);
        self.log_statement(&statement);

        let mut rows = conn
            .query(&statement)
            .map_err(|source| failure(statement.sql, plan.describe(), source))?;
        trace!(rows = rows.len(), "query returned");

        if plan.distinct {
            rows = dedup(rows);
        }

        let shape = RowShape::new(plan);
        rows.into_iter().map(|row| extract(&shape, row)).collect()
    }

    fn log_statement(&self, statement: &Statement) {
        if self.log_sql {
            debug!(sql = %statement.sql, params = statement.params.len(), "executing statement");
        } else {
            debug!(params = statement.params.len(), "executing statement");
        }
    }
}

/// Drop repeated rows, keeping the first occurrence.
fn dedup(rows: Vec<Row>) -> Vec<Row> {
    let mut unique: Vec<Row> = Vec::with_capacity(rows.len());
    for row in rows {
        if !unique.contains(&row) {
            unique.push(row);
        }
    }
    unique
}

fn failure(sql: String, plan: serde_json::Result<String>, source: BoxError) -> QueryError {
    QueryError::ExecutionFailure {
        sql,
        plan: plan.unwrap_or_default(),
        source,
    }
}
