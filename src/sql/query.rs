//! Query plans and the typed query builder.
//!
//! A [`QueryBuilder`] collects clauses in any order and validates them all at
//! once in [`QueryBuilder::build`]. The result is a [`Query<T>`]: an immutable
//! [`QueryPlan`] plus the extractor that turns each row into a `T`.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::dialect::{Dialect, SqlDialect};
use super::expr::{count_star, Column, Expr, ExprExt};
use super::predicate::{self, Predicate};
use super::render::RenderContext;
use super::token::{Statement, Token, TokenStream};
use crate::error::{QueryError, QueryResult};
use crate::projection::{self, Extractor, ItemType, Projection, ProjectionSpec, Slot};
use crate::schema::{EntityPath, RelationPath, Schema};
use crate::value::ValueType;

// =============================================================================
// Select Expression (column with optional alias)
// =============================================================================

/// A SELECT list item: expression with optional alias.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[must_use = "builders have no effect until used"]
pub struct SelectExpr {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl SelectExpr {
    pub fn new(expr: Expr) -> Self {
        Self { expr, alias: None }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Slot name: the alias, else the column's own name.
    pub fn name(&self) -> Option<&str> {
        self.alias
            .as_deref()
            .or_else(|| self.expr.natural_name())
    }

    pub fn to_tokens(&self, ctx: &RenderContext) -> TokenStream {
        let mut ts = self.expr.to_tokens(ctx);
        if let Some(alias) = &self.alias {
            ts.space()
                .push(Token::As)
                .space()
                .push(Token::Ident(alias.clone()));
        }
        ts
    }
}

impl From<Expr> for SelectExpr {
    fn from(expr: Expr) -> Self {
        SelectExpr::new(expr)
    }
}

impl From<Predicate> for SelectExpr {
    fn from(predicate: Predicate) -> Self {
        SelectExpr::new(predicate.into_expr())
    }
}

// =============================================================================
// Sources
// =============================================================================

/// A table under its alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    pub table: String,
    pub alias: String,
}

impl TableRef {
    pub fn new(table: &str, alias: &str) -> Self {
        Self {
            table: table.into(),
            alias: alias.into(),
        }
    }

    pub fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Ident(self.table.clone()));
        if self.alias != self.table {
            ts.space()
                .push(Token::As)
                .space()
                .push(Token::Ident(self.alias.clone()));
        }
        ts
    }
}

impl From<&EntityPath> for TableRef {
    fn from(entity: &EntityPath) -> Self {
        TableRef::new(entity.table_name(), entity.alias())
    }
}

/// An item of the FROM clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FromSource {
    Table(TableRef),
    /// `(SELECT ...) AS alias`
    Derived { plan: Box<QueryPlan>, alias: String },
}

impl FromSource {
    pub fn to_tokens(&self, ctx: &RenderContext) -> TokenStream {
        match self {
            FromSource::Table(table) => table.to_tokens(),
            FromSource::Derived { plan, alias } => {
                let mut ts = TokenStream::new();
                ts.lparen()
                    .append(&plan.to_inline_tokens(&ctx.nested()))
                    .rparen()
                    .space()
                    .push(Token::As)
                    .space()
                    .push(Token::Ident(alias.clone()));
                ts
            }
        }
    }
}

// =============================================================================
// Joins
// =============================================================================

/// Type of join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinType {
    Inner,
    Left,
    /// Theta join; carries no condition.
    Cross,
}

/// A JOIN clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Join {
    pub join_type: JoinType,
    pub table: TableRef,
    pub on: Option<Predicate>,
}

impl Join {
    pub fn to_tokens(&self, ctx: &RenderContext) -> TokenStream {
        let mut ts = TokenStream::new();

        match self.join_type {
            JoinType::Inner => ts.push(Token::Inner),
            JoinType::Left => ts.push(Token::Left),
            JoinType::Cross => ts.push(Token::Cross),
        };

        ts.space().push(Token::Join).space();
        ts.append(&self.table.to_tokens());

        if let Some(on) = &self.on {
            ts.space().push(Token::On).space();
            ts.append(&on.as_expr().to_tokens(ctx));
        }

        ts
    }
}

// =============================================================================
// ORDER BY
// =============================================================================

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

/// NULLS ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NullsOrder {
    First,
    Last,
}

/// An ORDER BY expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[must_use = "builders have no effect until used"]
pub struct OrderByExpr {
    pub expr: Expr,
    pub dir: SortDir,
    /// `None` leaves null placement to the engine.
    pub nulls: Option<NullsOrder>,
}

impl OrderByExpr {
    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            dir: SortDir::Asc,
            nulls: None,
        }
    }

    pub fn desc(expr: Expr) -> Self {
        Self {
            expr,
            dir: SortDir::Desc,
            nulls: None,
        }
    }

    pub fn nulls_first(mut self) -> Self {
        self.nulls = Some(NullsOrder::First);
        self
    }

    pub fn nulls_last(mut self) -> Self {
        self.nulls = Some(NullsOrder::Last);
        self
    }

    /// Convert to tokens for the context's dialect.
    ///
    /// Dialects without NULLS FIRST/LAST get a leading
    /// `CASE WHEN expr IS NULL THEN 1 ELSE 0 END` key instead.
    pub fn to_tokens(&self, ctx: &RenderContext) -> TokenStream {
        let mut ts = TokenStream::new();
        let native_nulls = ctx.dialect.supports_nulls_ordering();

        if let (Some(nulls), false) = (self.nulls, native_nulls) {
            let (if_null, otherwise) = match nulls {
                NullsOrder::First => (0, 1),
                NullsOrder::Last => (1, 0),
            };
            let test = self.expr.clone().is_null().into_expr();
            ts.push(Token::Case)
                .space()
                .push(Token::When)
                .space()
                .append(&test.to_tokens(ctx))
                .space()
                .push(Token::Then)
                .space()
                .push(Token::LitInt(if_null))
                .space()
                .push(Token::Else)
                .space()
                .push(Token::LitInt(otherwise))
                .space()
                .push(Token::End)
                .comma()
                .space();
        }

        ts.append(&self.expr.to_tokens(ctx));
        ts.space().push(match self.dir {
            SortDir::Asc => Token::Asc,
            SortDir::Desc => Token::Desc,
        });

        if let (Some(nulls), true) = (self.nulls, native_nulls) {
            ts.space().push(match nulls {
                NullsOrder::First => Token::NullsFirst,
                NullsOrder::Last => Token::NullsLast,
            });
        }

        ts
    }
}

impl From<Expr> for OrderByExpr {
    fn from(expr: Expr) -> Self {
        OrderByExpr::asc(expr)
    }
}

// =============================================================================
// LIMIT / OFFSET
// =============================================================================

/// LIMIT and OFFSET clause.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitOffset {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl LimitOffset {
    pub fn is_empty(&self) -> bool {
        self.limit.is_none() && self.offset.is_none()
    }

    /// Delegates to `SqlDialect::emit_limit_offset()` for the actual formatting.
    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        dialect.emit_limit_offset(self.limit, self.offset)
    }
}

// =============================================================================
// Query Plan
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    /// One clause per line, select items indented.
    Pretty,
    /// Single line, for subqueries.
    Inline,
}

/// A validated SELECT plan.
///
/// Plans are produced by [`QueryBuilder::build`] and never change afterwards;
/// derived plans such as [`QueryPlan::count_plan`] are built from a clone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPlan {
    pub select: Vec<SelectExpr>,
    pub projection: ProjectionSpec,
    pub distinct: bool,
    pub from: Vec<FromSource>,
    pub joins: Vec<Join>,
    pub where_clause: Option<Predicate>,
    pub group_by: Vec<Expr>,
    pub having: Option<Predicate>,
    pub order_by: Vec<OrderByExpr>,
    pub limit_offset: LimitOffset,
}

impl QueryPlan {
    pub fn limit(&self) -> Option<u64> {
        self.limit_offset.limit
    }

    pub fn offset(&self) -> Option<u64> {
        self.limit_offset.offset
    }

    /// Aliases of left-joined sources, whose columns read NULL when unmatched.
    pub fn null_extended(&self) -> Vec<&str> {
        self.joins
            .iter()
            .filter(|join| join.join_type == JoinType::Left)
            .map(|join| join.table.alias.as_str())
            .collect()
    }

    /// Ungrouped aggregate plans yield exactly one row.
    pub fn returns_single_row(&self) -> bool {
        self.group_by.is_empty()
            && self.having.is_none()
            && self.offset().unwrap_or(0) == 0
            && self.limit() != Some(0)
            && !self.select.is_empty()
            && self.select.iter().all(|item| item.expr.contains_aggregate())
    }

    /// Copy of this plan returning at most `limit` rows.
    pub fn with_limit(&self, limit: u64) -> QueryPlan {
        let mut plan = self.clone();
        plan.limit_offset.limit = Some(match self.limit_offset.limit {
            Some(existing) => existing.min(limit),
            None => limit,
        });
        plan
    }

    /// Plan counting the rows this plan would return, ignoring paging.
    ///
    /// Distinct, grouped and aggregate plans are counted through a derived
    /// table so the count matches the number of result rows rather than
    /// source rows.
    pub fn count_plan(&self) -> QueryPlan {
        let select = vec![SelectExpr::new(count_star())];
        let projection = ProjectionSpec::Scalar {
            slot: Slot::of::<i64>("count"),
        };

        if self.distinct
            || !self.group_by.is_empty()
            || self.having.is_some()
            || self.select.iter().any(|item| item.expr.contains_aggregate())
        {
            let mut inner = self.clone();
            inner.order_by.clear();
            inner.limit_offset = LimitOffset::default();
            // derived table columns must be named and unique
            for (i, item) in inner.select.iter_mut().enumerate() {
                if !matches!(item.expr, Expr::Star { .. }) {
                    item.alias = Some(format!("c{}", i + 1));
                }
            }

            return QueryPlan {
                select,
                projection,
                distinct: false,
                from: vec![FromSource::Derived {
                    plan: Box::new(inner),
                    alias: "counted".into(),
                }],
                joins: Vec::new(),
                where_clause: None,
                group_by: Vec::new(),
                having: None,
                order_by: Vec::new(),
                limit_offset: LimitOffset::default(),
            };
        }

        let mut plan = self.clone();
        plan.select = select;
        plan.projection = projection;
        plan.order_by.clear();
        plan.limit_offset = LimitOffset::default();
        plan
    }

    /// Multi-line rendering used for top-level statements.
    pub fn to_tokens(&self, ctx: &RenderContext) -> TokenStream {
        self.render(ctx, Layout::Pretty)
    }

    /// Single-line rendering used for subqueries and derived tables.
    pub fn to_inline_tokens(&self, ctx: &RenderContext) -> TokenStream {
        self.render(ctx, Layout::Inline)
    }

    fn render(&self, ctx: &RenderContext, layout: Layout) -> TokenStream {
        let dialect = ctx.dialect;
        let mut ts = TokenStream::new();
        let clause_break = |ts: &mut TokenStream| {
            match layout {
                Layout::Pretty => ts.newline(),
                Layout::Inline => ts.space(),
            };
        };

        // SELECT
        ts.push(Token::Select);
        if self.distinct {
            ts.space().push(Token::Distinct);
        }

        for (i, item) in self.select.iter().enumerate() {
            if i > 0 {
                ts.comma();
            }
            match layout {
                Layout::Pretty => ts.newline().indent(1),
                Layout::Inline => ts.space(),
            };
            ts.append(&item.to_tokens(ctx));
        }

        // FROM
        for (i, source) in self.from.iter().enumerate() {
            if i == 0 {
                clause_break(&mut ts);
                ts.push(Token::From).space();
            } else {
                ts.comma().space();
            }
            ts.append(&source.to_tokens(ctx));
        }

        // JOINs
        for join in &self.joins {
            clause_break(&mut ts);
            ts.append(&join.to_tokens(ctx));
        }

        // WHERE
        if let Some(where_clause) = &self.where_clause {
            clause_break(&mut ts);
            ts.push(Token::Where).space();
            ts.append(&where_clause.as_expr().to_tokens(ctx));
        }

        // GROUP BY
        if !self.group_by.is_empty() {
            clause_break(&mut ts);
            ts.push(Token::GroupBy).space();
            for (i, expr) in self.group_by.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.append(&expr.to_tokens(ctx));
            }
        }

        // HAVING
        if let Some(having) = &self.having {
            clause_break(&mut ts);
            ts.push(Token::Having).space();
            ts.append(&having.as_expr().to_tokens(ctx));
        }

        // ORDER BY
        let needs_order_by_placeholder = dialect.requires_order_by_for_offset()
            && self.order_by.is_empty()
            && !self.limit_offset.is_empty();

        if !self.order_by.is_empty() {
            clause_break(&mut ts);
            ts.push(Token::OrderBy).space();
            for (i, order) in self.order_by.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.append(&order.to_tokens(ctx));
            }
        } else if needs_order_by_placeholder {
            // OFFSET FETCH is only legal after an ORDER BY; row order stays unspecified
            clause_break(&mut ts);
            ts.push(Token::OrderBy)
                .space()
                .lparen()
                .push(Token::Select)
                .space()
                .push(Token::Null)
                .rparen();
        }

        // LIMIT / OFFSET
        if !self.limit_offset.is_empty() {
            clause_break(&mut ts);
            ts.append(&self.limit_offset.to_tokens(dialect));
        }

        ts
    }

    /// Render to SQL with positional placeholders and bound parameters.
    pub fn to_statement(&self, ctx: &RenderContext) -> Statement {
        self.to_tokens(ctx).bind(ctx.dialect)
    }

    /// Render with literals inlined, for display and debugging.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens(&RenderContext::plain(dialect))
            .serialize(dialect)
    }

    /// JSON description of this plan.
    pub fn describe(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Rebuild a plan from [`describe`](Self::describe) output.
    pub fn from_description(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

impl fmt::Display for QueryPlan {
    /// Formats the plan using the default dialect (SQLite).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_sql(Dialect::default()))
    }
}

// =============================================================================
// Typed Query
// =============================================================================

/// A built query whose rows are read as `T`.
#[must_use = "Query has no effect until run through an Executor"]
pub struct Query<T> {
    plan: QueryPlan,
    extract: Extractor<T>,
}

impl<T> Query<T> {
    pub fn plan(&self) -> &QueryPlan {
        &self.plan
    }

    pub fn into_plan(self) -> QueryPlan {
        self.plan
    }

    pub fn describe(&self) -> serde_json::Result<String> {
        self.plan.describe()
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.plan.to_sql(dialect)
    }

    /// Query for the number of rows this one returns, ignoring paging.
    pub fn count(&self) -> Query<i64> {
        Query {
            plan: self.plan.count_plan(),
            extract: projection::extract_scalar::<i64>,
        }
    }

    /// Same extraction over a derived plan.
    pub(crate) fn with_plan(&self, plan: QueryPlan) -> Query<T> {
        Query {
            plan,
            extract: self.extract,
        }
    }

    pub(crate) fn extractor(&self) -> Extractor<T> {
        self.extract
    }
}

impl<T> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            plan: self.plan.clone(),
            extract: self.extract,
        }
    }
}

impl<T> fmt::Debug for Query<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query").field("plan", &self.plan).finish()
    }
}

impl<T> From<Query<T>> for Expr {
    /// Scalar subquery.
    fn from(query: Query<T>) -> Self {
        Expr::Subquery(Box::new(query.into_plan()))
    }
}

// =============================================================================
// Query Builder
// =============================================================================

#[derive(Debug, Clone)]
enum JoinCondition {
    Relation(RelationPath),
    On(Predicate),
    None,
}

#[derive(Debug, Clone)]
struct PendingJoin {
    join_type: JoinType,
    target: EntityPath,
    condition: JoinCondition,
}

/// Fluent SELECT builder.
///
/// Clauses may be given in any order. Every clause except the joins may be
/// given once; a repeat is reported by [`build`](Self::build) as
/// [`QueryError::ClauseRepeated`].
#[must_use = "builders have no effect until build() is called"]
pub struct QueryBuilder<T> {
    schema: Arc<Schema>,
    select: Vec<SelectExpr>,
    projection: ProjectionSpec,
    extract: Extractor<T>,
    distinct: bool,
    from: Vec<EntityPath>,
    joins: Vec<PendingJoin>,
    where_clause: Option<Predicate>,
    group_by: Vec<Expr>,
    having: Option<Predicate>,
    order_by: Vec<OrderByExpr>,
    limit_offset: LimitOffset,
    stages: Vec<&'static str>,
    repeated: Option<&'static str>,
}

impl<T> QueryBuilder<T> {
    pub(crate) fn new(schema: Arc<Schema>, projection: Projection<T>) -> Self {
        let (select, spec, extract) = projection.into_parts();
        Self {
            schema,
            select,
            projection: spec,
            extract,
            distinct: false,
            from: Vec::new(),
            joins: Vec::new(),
            where_clause: None,
            group_by: Vec::new(),
            having: None,
            order_by: Vec::new(),
            limit_offset: LimitOffset::default(),
            stages: Vec::new(),
            repeated: None,
        }
    }

    fn stage(&mut self, name: &'static str) {
        if self.stages.contains(&name) {
            self.repeated.get_or_insert(name);
        } else {
            self.stages.push(name);
        }
    }

    /// FROM sources; more than one forms a theta join.
    pub fn from<I>(mut self, sources: I) -> Self
    where
        I: IntoIterator,
        I::Item: Borrow<EntityPath>,
    {
        self.stage("FROM");
        self.from = sources
            .into_iter()
            .map(|source| source.borrow().clone())
            .collect();
        self
    }

    /// Inner join along a declared relationship.
    pub fn join(self, relation: &RelationPath, target: &EntityPath) -> Self {
        self.push_join(
            JoinType::Inner,
            target,
            JoinCondition::Relation(relation.clone()),
        )
    }

    /// Left outer join along a declared relationship.
    pub fn left_join(self, relation: &RelationPath, target: &EntityPath) -> Self {
        self.push_join(
            JoinType::Left,
            target,
            JoinCondition::Relation(relation.clone()),
        )
    }

    /// Inner join on an explicit condition.
    pub fn join_on(self, target: &EntityPath, on: Predicate) -> Self {
        self.push_join(JoinType::Inner, target, JoinCondition::On(on))
    }

    /// Left outer join on an explicit condition.
    pub fn left_join_on(self, target: &EntityPath, on: Predicate) -> Self {
        self.push_join(JoinType::Left, target, JoinCondition::On(on))
    }

    pub fn cross_join(self, target: &EntityPath) -> Self {
        self.push_join(JoinType::Cross, target, JoinCondition::None)
    }

    fn push_join(mut self, join_type: JoinType, target: &EntityPath, condition: JoinCondition) -> Self {
        self.joins.push(PendingJoin {
            join_type,
            target: target.clone(),
            condition,
        });
        self
    }

    /// WHERE: the conjunction of every present predicate.
    ///
    /// Accepts a single [`Predicate`], an `Option<Predicate>`, or any
    /// collection of either; absent entries are skipped.
    pub fn filter<I>(mut self, predicates: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Option<Predicate>>,
    {
        self.stage("WHERE");
        self.where_clause = predicate::all(predicates);
        self
    }

    pub fn group_by<I>(mut self, exprs: I) -> Self
    where
        I: IntoIterator<Item = Expr>,
    {
        self.stage("GROUP BY");
        self.group_by = exprs.into_iter().collect();
        self
    }

    pub fn having(mut self, predicate: impl Into<Option<Predicate>>) -> Self {
        self.stage("HAVING");
        self.having = predicate.into();
        self
    }

    pub fn order_by<I>(mut self, orders: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<OrderByExpr>,
    {
        self.stage("ORDER BY");
        self.order_by = orders.into_iter().map(Into::into).collect();
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.stage("OFFSET");
        self.limit_offset.offset = Some(offset);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.stage("LIMIT");
        self.limit_offset.limit = Some(limit);
        self
    }

    pub fn distinct(mut self) -> Self {
        self.stage("DISTINCT");
        self.distinct = true;
        self
    }

    /// Validate every clause and freeze the plan.
    pub fn build(self) -> QueryResult<Query<T>> {
        if let Some(stage) = self.repeated {
            return Err(QueryError::ClauseRepeated(stage));
        }
        if self.from.is_empty() {
            return Err(QueryError::MissingSource);
        }

        let mut scope: Vec<&EntityPath> = Vec::new();
        for source in &self.from {
            self.enter_scope(&mut scope, source)?;
        }

        let mut joins = Vec::with_capacity(self.joins.len());
        for join in &self.joins {
            let on = match &join.condition {
                JoinCondition::Relation(relation) => {
                    if !scope.iter().any(|s| s.alias() == relation.owner_alias()) {
                        return Err(QueryError::UnknownSource(relation.owner_alias().to_string()));
                    }
                    Some(relation.join_condition(&join.target)?)
                }
                JoinCondition::On(on) => Some(on.clone()),
                JoinCondition::None => None,
            };
            self.enter_scope(&mut scope, &join.target)?;
            if let Some(on) = &on {
                self.check_columns(on.as_expr(), &scope)?;
                check_predicate("ON", on)?;
            }
            joins.push(Join {
                join_type: join.join_type,
                table: TableRef::from(&join.target),
                on,
            });
        }

        let null_extended: Vec<&str> = self
            .joins
            .iter()
            .filter(|join| join.join_type == JoinType::Left)
            .map(|join| join.target.alias())
            .collect();
        let mut types = Vec::with_capacity(self.select.len());
        for item in &self.select {
            self.check_columns(&item.expr, &scope)?;
            types.push(ItemType {
                value_type: item.expr.check()?,
                nullable: item.expr.may_be_null(&null_extended),
            });
        }

        if let Some(where_clause) = &self.where_clause {
            self.check_columns(where_clause.as_expr(), &scope)?;
            check_predicate("WHERE", where_clause)?;
        }
        for expr in &self.group_by {
            self.check_columns(expr, &scope)?;
            expr.check()?;
        }
        if let Some(having) = &self.having {
            self.check_columns(having.as_expr(), &scope)?;
            check_predicate("HAVING", having)?;
        }
        for order in &self.order_by {
            self.check_columns(&order.expr, &scope)?;
            order.expr.check()?;
        }

        self.projection.validate(&self.select, &types)?;

        let plan = QueryPlan {
            from: self
                .from
                .iter()
                .map(|source| FromSource::Table(TableRef::from(source)))
                .collect(),
            select: self.select,
            projection: self.projection,
            distinct: self.distinct,
            joins,
            where_clause: self.where_clause,
            group_by: self.group_by,
            having: self.having,
            order_by: self.order_by,
            limit_offset: self.limit_offset,
        };

        Ok(Query {
            plan,
            extract: self.extract,
        })
    }

    fn enter_scope<'a>(&self, scope: &mut Vec<&'a EntityPath>, source: &'a EntityPath) -> QueryResult<()> {
        if scope.iter().any(|s| s.alias() == source.alias()) {
            return Err(QueryError::DuplicateAlias(source.alias().to_string()));
        }
        self.schema.table(source.table_name())?;
        scope.push(source);
        Ok(())
    }

    fn check_columns(&self, expr: &Expr, scope: &[&EntityPath]) -> QueryResult<()> {
        check_scope(&self.schema, expr, scope)
    }
}

/// Every column must come from a source in scope and exist in the schema.
pub(crate) fn check_scope(schema: &Schema, expr: &Expr, scope: &[&EntityPath]) -> QueryResult<()> {
    let mut result = Ok(());
    expr.walk(&mut |node| {
        if result.is_err() {
            return;
        }
        result = match node {
            Expr::Column(column) => check_column(schema, column, scope),
            Expr::Star {
                source: Some(alias),
            } if !scope.iter().any(|s| s.alias() == alias) => {
                Err(QueryError::UnknownSource(alias.clone()))
            }
            _ => Ok(()),
        };
    });
    result
}

fn check_column(schema: &Schema, column: &Column, scope: &[&EntityPath]) -> QueryResult<()> {
    let source = scope
        .iter()
        .find(|s| s.alias() == column.source())
        .ok_or_else(|| QueryError::UnknownSource(column.source().to_string()))?;

    let declared = source.table_name() == column.table()
        && schema
            .table(column.table())?
            .find_column(column.name())
            .is_some();
    if declared {
        Ok(())
    } else {
        Err(QueryError::UnknownColumn {
            table: column.table().to_string(),
            column: column.name().to_string(),
        })
    }
}

/// WHERE, HAVING and ON conditions must be boolean.
pub(crate) fn check_predicate(clause: &str, predicate: &Predicate) -> QueryResult<()> {
    match predicate.as_expr().check()? {
        ValueType::Bool | ValueType::Null => Ok(()),
        other => Err(QueryError::type_mismatch(clause, ValueType::Bool, other)),
    }
}

// =============================================================================
// Tests
// =============================================================================
