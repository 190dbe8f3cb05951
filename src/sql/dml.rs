//! DML support: bulk UPDATE and DELETE, and INSERT for seeding data.
//!
//! Bulk statements touch a single table, so column references render
//! unqualified:
//!
//! ```ignore
//! let plan = factory
//!     .update(&member)
//!     .set(member.col("age")?, member.col("age")?.add(1))
//!     .filter(member.col("age")?.gte(30))
//!     .build()?;
//! // UPDATE "member" SET "age" = "age" + ? WHERE "age" >= ?
//! ```
//!
//! Bulk statements go straight to the storage engine. Rows fetched before the
//! statement ran are not refreshed.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::dialect::Dialect;
use super::expr::{Column, Expr};
use super::predicate::{self, Predicate};
use super::query::{check_predicate, check_scope, TableRef};
use super::render::RenderContext;
use super::token::{Statement, Token, TokenStream};
use crate::error::{QueryError, QueryResult};
use crate::schema::{EntityPath, Schema};
use crate::value::ValueType;

/// A statement that changes rows and reports how many it touched.
pub trait Mutation {
    /// Render to SQL with positional placeholders and bound parameters.
    fn to_statement(&self, ctx: &RenderContext) -> Statement;

    /// JSON description of the plan.
    fn describe(&self) -> serde_json::Result<String>;
}

// ============================================================================
// UPDATE / DELETE plans
// ============================================================================

/// `column = value` inside an UPDATE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub column: String,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MutationKind {
    Update { assignments: Vec<Assignment> },
    Delete,
}

/// A validated bulk UPDATE or DELETE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationPlan {
    pub kind: MutationKind,
    pub target: TableRef,
    pub filter: Option<Predicate>,
}

impl MutationPlan {
    pub fn to_tokens(&self, ctx: &RenderContext) -> TokenStream {
        let ctx = ctx.with_bare_source(&self.target.alias);
        let mut ts = TokenStream::new();

        match &self.kind {
            MutationKind::Update { assignments } => {
                ts.push(Token::Update)
                    .space()
                    .push(Token::Ident(self.target.table.clone()));

                ts.space().push(Token::Set).space();
                for (i, assignment) in assignments.iter().enumerate() {
                    if i > 0 {
                        ts.comma().space();
                    }
                    ts.push(Token::Ident(assignment.column.clone()))
                        .space()
                        .push(Token::Eq)
                        .space()
                        .append(&assignment.value.to_tokens(&ctx));
                }
            }
            MutationKind::Delete => {
                ts.push(Token::Delete)
                    .space()
                    .push(Token::From)
                    .space()
                    .push(Token::Ident(self.target.table.clone()));
            }
        }

        if let Some(filter) = &self.filter {
            ts.space()
                .push(Token::Where)
                .space()
                .append(&filter.as_expr().to_tokens(&ctx));
        }

        ts
    }

    /// Render with literals inlined, for display and debugging.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens(&RenderContext::plain(dialect))
            .serialize(dialect)
    }

    pub fn from_description(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

impl Mutation for MutationPlan {
    fn to_statement(&self, ctx: &RenderContext) -> Statement {
        self.to_tokens(ctx).bind(ctx.dialect)
    }

    fn describe(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

// ============================================================================
// INSERT plan
// ============================================================================

/// A validated multi-row INSERT.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertPlan {
    pub target: TableRef,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Expr>>,
}

impl InsertPlan {
    pub fn to_tokens(&self, ctx: &RenderContext) -> TokenStream {
        let mut ts = TokenStream::new();

        ts.push(Token::Insert)
            .space()
            .push(Token::Into)
            .space()
            .push(Token::Ident(self.target.table.clone()));

        ts.space().lparen();
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                ts.comma().space();
            }
            ts.push(Token::Ident(column.clone()));
        }
        ts.rparen();

        ts.space().push(Token::Values);
        for (row_idx, row) in self.rows.iter().enumerate() {
            if row_idx > 0 {
                ts.comma();
            }
            ts.space().lparen();
            for (i, value) in row.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.append(&value.to_tokens(ctx));
            }
            ts.rparen();
        }

        ts
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens(&RenderContext::plain(dialect))
            .serialize(dialect)
    }
}

impl Mutation for InsertPlan {
    fn to_statement(&self, ctx: &RenderContext) -> Statement {
        self.to_tokens(ctx).bind(ctx.dialect)
    }

    fn describe(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

// ============================================================================
// Builders
// ============================================================================

/// Bulk UPDATE builder.
#[derive(Debug, Clone)]
#[must_use = "builders have no effect until build() is called"]
pub struct UpdateBuilder {
    schema: Arc<Schema>,
    target: EntityPath,
    assignments: Vec<(Expr, Expr)>,
    filter: Option<Predicate>,
    filtered: bool,
    repeated: Option<&'static str>,
}

impl UpdateBuilder {
    pub(crate) fn new(schema: Arc<Schema>, target: &EntityPath) -> Self {
        Self {
            schema,
            target: target.clone(),
            assignments: Vec::new(),
            filter: None,
            filtered: false,
            repeated: None,
        }
    }

    /// `SET column = value`. `column` must be a column of the target.
    pub fn set(mut self, column: Expr, value: impl Into<Expr>) -> Self {
        self.assignments.push((column, value.into()));
        self
    }

    /// WHERE: the conjunction of every present predicate.
    pub fn filter<I>(mut self, predicates: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Option<Predicate>>,
    {
        if self.filtered {
            self.repeated.get_or_insert("WHERE");
        }
        self.filtered = true;
        self.filter = predicate::all(predicates);
        self
    }

    pub fn build(self) -> QueryResult<MutationPlan> {
        if let Some(stage) = self.repeated {
            return Err(QueryError::ClauseRepeated(stage));
        }
        self.schema.table(self.target.table_name())?;
        if self.assignments.is_empty() {
            return Err(QueryError::NoAssignments);
        }

        let scope = [&self.target];
        let mut assignments: Vec<Assignment> = Vec::with_capacity(self.assignments.len());
        for (column, value) in self.assignments {
            let column = target_column(&self.schema, &self.target, &column)?;
            if assignments.iter().any(|a| a.column == column.name()) {
                return Err(QueryError::DuplicateAssignment(column.name().to_string()));
            }
            check_scope(&self.schema, &value, &scope)?;
            check_assignable(column, &value)?;
            assignments.push(Assignment {
                column: column.name().to_string(),
                value,
            });
        }

        if let Some(filter) = &self.filter {
            check_scope(&self.schema, filter.as_expr(), &scope)?;
            check_predicate("WHERE", filter)?;
        }

        Ok(MutationPlan {
            kind: MutationKind::Update { assignments },
            target: TableRef::from(&self.target),
            filter: self.filter,
        })
    }
}

/// Bulk DELETE builder.
#[derive(Debug, Clone)]
#[must_use = "builders have no effect until build() is called"]
pub struct DeleteBuilder {
    schema: Arc<Schema>,
    target: EntityPath,
    filter: Option<Predicate>,
    filtered: bool,
    repeated: Option<&'static str>,
}

impl DeleteBuilder {
    pub(crate) fn new(schema: Arc<Schema>, target: &EntityPath) -> Self {
        Self {
            schema,
            target: target.clone(),
            filter: None,
            filtered: false,
            repeated: None,
        }
    }

    pub fn filter<I>(mut self, predicates: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Option<Predicate>>,
    {
        if self.filtered {
            self.repeated.get_or_insert("WHERE");
        }
        self.filtered = true;
        self.filter = predicate::all(predicates);
        self
    }

    pub fn build(self) -> QueryResult<MutationPlan> {
        if let Some(stage) = self.repeated {
            return Err(QueryError::ClauseRepeated(stage));
        }
        self.schema.table(self.target.table_name())?;

        if let Some(filter) = &self.filter {
            check_scope(&self.schema, filter.as_expr(), &[&self.target])?;
            check_predicate("WHERE", filter)?;
        }

        Ok(MutationPlan {
            kind: MutationKind::Delete,
            target: TableRef::from(&self.target),
            filter: self.filter,
        })
    }
}

/// INSERT builder; rows are given with repeated [`values`](Self::values) calls.
#[derive(Debug, Clone)]
#[must_use = "builders have no effect until build() is called"]
pub struct InsertBuilder {
    schema: Arc<Schema>,
    target: EntityPath,
    columns: Option<Vec<Expr>>,
    rows: Vec<Vec<Expr>>,
    repeated: Option<&'static str>,
}

impl InsertBuilder {
    pub(crate) fn new(schema: Arc<Schema>, target: &EntityPath) -> Self {
        Self {
            schema,
            target: target.clone(),
            columns: None,
            rows: Vec::new(),
            repeated: None,
        }
    }

    /// Column list; defaults to every column of the target in declaration order.
    pub fn columns<I>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = Expr>,
    {
        if self.columns.is_some() {
            self.repeated.get_or_insert("COLUMNS");
        }
        self.columns = Some(columns.into_iter().collect());
        self
    }

    /// Add one row of values.
    pub fn values<I>(mut self, row: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Expr>,
    {
        self.rows.push(row.into_iter().map(Into::into).collect());
        self
    }

    pub fn build(self) -> QueryResult<InsertPlan> {
        if let Some(stage) = self.repeated {
            return Err(QueryError::ClauseRepeated(stage));
        }
        self.schema.table(self.target.table_name())?;

        let columns = match &self.columns {
            Some(columns) => columns.clone(),
            None => self.target.columns(),
        };

        let mut resolved: Vec<&Column> = Vec::with_capacity(columns.len());
        for column in &columns {
            let column = target_column(&self.schema, &self.target, column)?;
            if resolved.iter().any(|c| c.name() == column.name()) {
                return Err(QueryError::DuplicateAssignment(column.name().to_string()));
            }
            resolved.push(column);
        }

        if self.rows.is_empty() {
            return Err(QueryError::InsertArity {
                expected: resolved.len(),
                found: 0,
            });
        }
        for row in &self.rows {
            if row.len() != resolved.len() {
                return Err(QueryError::InsertArity {
                    expected: resolved.len(),
                    found: row.len(),
                });
            }
            for (column, value) in resolved.iter().zip(row) {
                // values may not reference any source
                check_scope(&self.schema, value, &[])?;
                check_assignable(column, value)?;
            }
        }

        Ok(InsertPlan {
            target: TableRef::from(&self.target),
            columns: resolved.iter().map(|c| c.name().to_string()).collect(),
            rows: self.rows,
        })
    }
}

/// The column an assignment writes to; must belong to `target`.
fn target_column<'e>(schema: &Schema, target: &EntityPath, expr: &'e Expr) -> QueryResult<&'e Column> {
    let column = match expr {
        Expr::Column(column) => column,
        _ => {
            return Err(QueryError::UnknownColumn {
                table: target.table_name().to_string(),
                column: "<expression>".into(),
            })
        }
    };
    if column.source() != target.alias() {
        return Err(QueryError::UnknownSource(column.source().to_string()));
    }
    let declared = column.table() == target.table_name()
        && schema
            .table(column.table())?
            .find_column(column.name())
            .is_some();
    if !declared {
        return Err(QueryError::UnknownColumn {
            table: column.table().to_string(),
            column: column.name().to_string(),
        });
    }
    Ok(column)
}

fn check_assignable(column: &Column, value: &Expr) -> QueryResult<()> {
    let found = value.check()?;
    let context = format!("assignment to {}", column.name());
    if found == ValueType::Null && !column.nullable() {
        return Err(QueryError::type_mismatch(context, column.value_type(), found));
    }
    if !found.is_assignable_to(column.value_type()) {
        return Err(QueryError::type_mismatch(context, column.value_type(), found));
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
