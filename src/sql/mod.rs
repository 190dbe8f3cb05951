//! SQL generation module.
//!
//! This module turns plans into multi-dialect SQL. It includes:
//!
//! - [`expr`] - Typed expression tree and builder DSL
//! - [`predicate`] - Boolean predicates with absent-propagation
//! - [`query`] - SELECT plans and the typed query builder
//! - [`dml`] - Bulk UPDATE/DELETE and INSERT
//! - [`ddl`] - CREATE TABLE from the schema model
//! - [`functions`] - Pluggable function translation
//! - [`token`] - Token types for SQL generation
//! - [`dialect`] - SQL dialect implementations
//! - [`validate`] - sqlparser syntax check of rendered SQL

pub mod ddl;
pub mod dialect;
pub mod dml;
pub mod expr;
pub mod functions;
pub mod predicate;
pub mod query;
pub mod render;
pub mod token;
pub mod validate;

// Re-export commonly used types at the sql module level
pub use dialect::{Dialect, SqlDialect};
pub use expr::{
    avg, coalesce, count, count_distinct, count_star, func, lit, lower, max, min, null, star, sum,
    template, upper, BinaryOperator, CaseBuilder, Column, Expr, ExprExt, UnaryOperator,
};
pub use functions::FunctionMap;
pub use predicate::{Predicate, PredicateBuilder};
pub use query::{
    FromSource, Join, JoinType, LimitOffset, NullsOrder, OrderByExpr, Query, QueryBuilder,
    QueryPlan, SelectExpr, SortDir, TableRef,
};
pub use render::RenderContext;
pub use token::{Statement, Token, TokenStream};
pub use validate::{validate_sql, InvalidSql};

// Re-export DDL/DML types
pub use ddl::{create_schema, CreateTable};
pub use dml::{
    Assignment, DeleteBuilder, InsertBuilder, InsertPlan, Mutation, MutationKind, MutationPlan,
    UpdateBuilder,
};
