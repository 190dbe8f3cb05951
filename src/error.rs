//! Error taxonomy for plan construction and execution.

use thiserror::Error;

use crate::value::ValueType;

/// Boxed error returned by a storage engine.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for query building and execution.
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors raised while building or executing plans.
///
/// Everything except [`QueryError::ExecutionFailure`] and
/// [`QueryError::Decode`] is raised while a plan is being built, before any
/// statement reaches a connection.
#[derive(Error, Debug)]
pub enum QueryError {
    /// Operand types cannot be combined.
    #[error("type mismatch in {context}: expected {expected}, found {found}")]
    TypeMismatch {
        context: String,
        expected: ValueType,
        found: ValueType,
    },

    /// A column is not declared on its table.
    #[error("unknown column {table}.{column}")]
    UnknownColumn { table: String, column: String },

    /// A table is not declared in the schema.
    #[error("unknown table: {0}")]
    UnknownTable(String),

    /// A relationship is not declared on a table.
    #[error("unknown relationship {name} on table {table}")]
    UnknownRelationship { table: String, name: String },

    /// An expression references a source alias that is not in scope.
    #[error("source not in scope: {0}")]
    UnknownSource(String),

    /// More than one row matched where at most one was expected.
    #[error("expected at most one row, found {0}")]
    NonUniqueResult(usize),

    /// The select list and the target shape disagree.
    #[error("projection onto {target} does not fit: {detail}")]
    ProjectionArityMismatch { target: String, detail: String },

    /// Two sibling projections or sources share a name.
    #[error("duplicate alias: {0}")]
    DuplicateAlias(String),

    /// A bulk update assigns the same column twice.
    #[error("column assigned more than once: {0}")]
    DuplicateAssignment(String),

    /// A builder stage was invoked more than once.
    #[error("{0} clause specified more than once")]
    ClauseRepeated(&'static str),

    /// A query was built without any FROM source.
    #[error("query has no source table")]
    MissingSource,

    /// A join does not line up with the declared relationship.
    #[error("invalid join: {0}")]
    InvalidJoin(String),

    /// A function template references an argument that was not supplied.
    #[error("invalid function template: {0}")]
    InvalidTemplate(String),

    /// A bulk update was built without any assignment.
    #[error("update has no assignments")]
    NoAssignments,

    /// An insert row does not match its column list.
    #[error("insert expects {expected} values, got {found}")]
    InsertArity { expected: usize, found: usize },

    /// A row value could not be converted into the requested Rust type.
    #[error("cannot read {slot} as {expected}: got {found}")]
    Decode {
        slot: String,
        expected: ValueType,
        found: String,
    },

    /// The storage engine rejected or failed a statement.
    #[error("execution failed for `{sql}`: {source}")]
    ExecutionFailure {
        sql: String,
        /// JSON description of the plan that produced the statement.
        plan: String,
        #[source]
        source: BoxError,
    },
}

impl QueryError {
    pub(crate) fn type_mismatch(
        context: impl Into<String>,
        expected: ValueType,
        found: ValueType,
    ) -> Self {
        Self::TypeMismatch {
            context: context.into(),
            expected,
            found,
        }
    }

    pub(crate) fn projection(target: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::ProjectionArityMismatch {
            target: target.into(),
            detail: detail.into(),
        }
    }

    /// Whether this error was raised while building a plan.
    pub fn is_build_error(&self) -> bool {
        !matches!(self, Self::ExecutionFailure { .. } | Self::Decode { .. })
    }
}
