//! Expression AST - the core of query building.
//!
//! This module provides a strongly-typed AST for SQL expressions
//! with exhaustive pattern matching enforced by the compiler.
//!
//! Construction never fails: column references come from an
//! [`EntityPath`](crate::schema::EntityPath), everything else from the
//! constructor functions and the [`ExprExt`] fluent methods. Typing is checked
//! separately by [`Expr::check`], which every plan builder runs at `build()`.

use serde::{Deserialize, Serialize};

use super::functions::{max_placeholder, render_template};
use super::predicate::Predicate;
use super::query::{OrderByExpr, Query, QueryPlan, SelectExpr};
use super::render::RenderContext;
use super::token::{Token, TokenStream};
use crate::error::{QueryError, QueryResult};
use crate::schema::ColumnDef;
use crate::sql::dialect::{Dialect, SqlDialect};
use crate::value::{Value, ValueType};

/// Escape character used by `contains`, `starts_with` and `ends_with`.
pub const LIKE_ESCAPE: char = '!';

// =============================================================================
// Column
// =============================================================================

/// A column of a table bound to a source alias.
///
/// Only entity handles create columns, so every column names something the
/// schema declares.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Column {
    source: String,
    table: String,
    name: String,
    value_type: ValueType,
    nullable: bool,
}

impl Column {
    pub(crate) fn new(source: &str, table: &str, def: &ColumnDef) -> Self {
        Self {
            source: source.into(),
            table: table.into(),
            name: def.name.clone(),
            value_type: def.value_type,
            nullable: def.nullable,
        }
    }

    /// Alias of the source this column is read from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn nullable(&self) -> bool {
        self.nullable
    }
}

// =============================================================================
// Expression AST
// =============================================================================

/// A SQL expression.
///
/// Every variant must be handled in `to_tokens()` and `check()` - the compiler
/// enforces this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Column reference: source.column
    Column(Column),

    /// Literal value, bound as a parameter when rendered
    Literal(Value),

    /// Binary operation: left op right
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },

    /// Unary operation: op expr
    UnaryOp { op: UnaryOperator, expr: Box<Expr> },

    /// Function call: name(args...)
    ///
    /// `value_type` overrides the inferred result type.
    Function {
        name: String,
        args: Vec<Expr>,
        distinct: bool,
        value_type: Option<ValueType>,
    },

    /// SQL template with `{n}` argument placeholders
    Template {
        template: String,
        args: Vec<Expr>,
        value_type: ValueType,
    },

    /// CASE WHEN... THEN... ELSE... END
    Case {
        operand: Option<Box<Expr>>,
        when_clauses: Vec<(Expr, Expr)>,
        else_clause: Option<Box<Expr>>,
    },

    /// Scalar subquery: (SELECT ...)
    Subquery(Box<QueryPlan>),

    /// IN: expr IN (values...)
    In {
        expr: Box<Expr>,
        values: Vec<Expr>,
        negated: bool,
    },

    /// IN subquery: expr IN (SELECT ...)
    InSubquery {
        expr: Box<Expr>,
        subquery: Box<QueryPlan>,
        negated: bool,
    },

    /// BETWEEN: expr BETWEEN low AND high (inclusive)
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },

    /// IS NULL / IS NOT NULL
    IsNull { expr: Box<Expr>, negated: bool },

    /// LIKE with optional ESCAPE: expr LIKE pattern ESCAPE escape
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        escape: Option<char>,
        negated: bool,
    },

    /// Wildcard: * or source.*
    Star { source: Option<String> },

    /// Parenthesized expression
    Paren(Box<Expr>),
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOperator {
    // Comparison
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,
    // Logical
    And,
    Or,
    // Arithmetic
    Plus,
    Minus,
    Mul,
    Div,
    Mod,
    // String
    Concat,
}

impl BinaryOperator {
    fn precedence(self) -> u8 {
        match self {
            BinaryOperator::Or => 1,
            BinaryOperator::And => 2,
            BinaryOperator::Eq
            | BinaryOperator::Ne
            | BinaryOperator::Lt
            | BinaryOperator::Gt
            | BinaryOperator::Lte
            | BinaryOperator::Gte => 4,
            BinaryOperator::Plus | BinaryOperator::Minus | BinaryOperator::Concat => 5,
            BinaryOperator::Mul | BinaryOperator::Div | BinaryOperator::Mod => 6,
        }
    }

    fn is_comparison(self) -> bool {
        self.precedence() == 4
    }

    fn token(self) -> Token {
        match self {
            BinaryOperator::Eq => Token::Eq,
            BinaryOperator::Ne => Token::Ne,
            BinaryOperator::Lt => Token::Lt,
            BinaryOperator::Gt => Token::Gt,
            BinaryOperator::Lte => Token::Lte,
            BinaryOperator::Gte => Token::Gte,
            BinaryOperator::And => Token::And,
            BinaryOperator::Or => Token::Or,
            BinaryOperator::Plus => Token::Plus,
            BinaryOperator::Minus => Token::Minus,
            BinaryOperator::Mul => Token::Mul,
            BinaryOperator::Div => Token::Div,
            BinaryOperator::Mod => Token::Mod,
            BinaryOperator::Concat => Token::Concat,
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOperator {
    Not,
    Minus,
}

// =============================================================================
// Type checking
// =============================================================================

impl Expr {
    /// Compute the static result type, rejecting incompatible operands.
    pub fn check(&self) -> QueryResult<ValueType> {
        match self {
            Expr::Column(column) => Ok(column.value_type),

            Expr::Literal(value) => Ok(value.value_type()),

            Expr::BinaryOp { left, op, right } => {
                let lt = left.check()?;
                let rt = right.check()?;
                match op {
                    op if op.is_comparison() => {
                        if !lt.is_comparable(rt) {
                            return Err(QueryError::type_mismatch("comparison", lt, rt));
                        }
                        Ok(ValueType::Bool)
                    }
                    BinaryOperator::And | BinaryOperator::Or => {
                        expect_bool("logical operand", lt)?;
                        expect_bool("logical operand", rt)?;
                        Ok(ValueType::Bool)
                    }
                    BinaryOperator::Concat => {
                        expect_text("concatenation", lt)?;
                        expect_text("concatenation", rt)?;
                        Ok(ValueType::Text)
                    }
                    _ => {
                        expect_numeric("arithmetic", lt)?;
                        expect_numeric("arithmetic", rt)?;
                        Ok(lt.promote(rt))
                    }
                }
            }

            Expr::UnaryOp { op, expr } => {
                let t = expr.check()?;
                match op {
                    UnaryOperator::Not => {
                        expect_bool("NOT", t)?;
                        Ok(ValueType::Bool)
                    }
                    UnaryOperator::Minus => {
                        expect_numeric("negation", t)?;
                        Ok(t)
                    }
                }
            }

            Expr::Function {
                name,
                args,
                value_type,
                ..
            } => {
                let arg_types = args
                    .iter()
                    .map(Expr::check)
                    .collect::<QueryResult<Vec<_>>>()?;
                match value_type {
                    Some(vt) => Ok(*vt),
                    None => function_type(name, &arg_types),
                }
            }

            Expr::Template {
                template,
                args,
                value_type,
            } => {
                for arg in args {
                    arg.check()?;
                }
                if let Some(max) = max_placeholder(template) {
                    if max >= args.len() {
                        return Err(QueryError::InvalidTemplate(format!(
                            "`{}` references {{{}}} but {} argument(s) were supplied",
                            template,
                            max,
                            args.len()
                        )));
                    }
                }
                Ok(*value_type)
            }

            Expr::Case {
                operand,
                when_clauses,
                else_clause,
            } => {
                let operand_type = operand.as_ref().map(|o| o.check()).transpose()?;
                let mut result = ValueType::Null;
                for (when, then) in when_clauses {
                    let wt = when.check()?;
                    match operand_type {
                        Some(ot) if !ot.is_comparable(wt) => {
                            return Err(QueryError::type_mismatch("CASE WHEN", ot, wt));
                        }
                        Some(_) => {}
                        None => expect_bool("CASE WHEN", wt)?,
                    }
                    result = unify("CASE result", result, then.check()?)?;
                }
                if let Some(else_expr) = else_clause {
                    result = unify("CASE result", result, else_expr.check()?)?;
                }
                Ok(result)
            }

            Expr::Subquery(plan) => subquery_type(plan),

            Expr::In { expr, values, .. } => {
                let t = expr.check()?;
                for value in values {
                    let vt = value.check()?;
                    if !t.is_comparable(vt) {
                        return Err(QueryError::type_mismatch("IN list", t, vt));
                    }
                }
                Ok(ValueType::Bool)
            }

            Expr::InSubquery { expr, subquery, .. } => {
                let t = expr.check()?;
                let st = subquery_type(subquery)?;
                if !t.is_comparable(st) {
                    return Err(QueryError::type_mismatch("IN subquery", t, st));
                }
                Ok(ValueType::Bool)
            }

            Expr::Between {
                expr, low, high, ..
            } => {
                let t = expr.check()?;
                for bound in [low, high] {
                    let bt = bound.check()?;
                    if !t.is_comparable(bt) {
                        return Err(QueryError::type_mismatch("BETWEEN", t, bt));
                    }
                }
                Ok(ValueType::Bool)
            }

            Expr::IsNull { expr, .. } => {
                expr.check()?;
                Ok(ValueType::Bool)
            }

            Expr::Like { expr, pattern, .. } => {
                expect_text("LIKE operand", expr.check()?)?;
                expect_text("LIKE pattern", pattern.check()?)?;
                Ok(ValueType::Bool)
            }

            Expr::Star { .. } => Ok(ValueType::Null),

            Expr::Paren(inner) => inner.check(),
        }
    }

    /// Visit this expression and its children, pre-order.
    ///
    /// Subqueries are opaque: they were validated against their own scope.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Expr)) {
        visit(self);
        match self {
            Expr::Column(_) | Expr::Literal(_) | Expr::Star { .. } | Expr::Subquery(_) => {}
            Expr::BinaryOp { left, right, .. } => {
                left.walk(visit);
                right.walk(visit);
            }
            Expr::UnaryOp { expr, .. }
            | Expr::IsNull { expr, .. }
            | Expr::InSubquery { expr, .. }
            | Expr::Paren(expr) => expr.walk(visit),
            Expr::Function { args, .. } | Expr::Template { args, .. } => {
                for arg in args {
                    arg.walk(visit);
                }
            }
            Expr::Case {
                operand,
                when_clauses,
                else_clause,
            } => {
                if let Some(op) = operand {
                    op.walk(visit);
                }
                for (when, then) in when_clauses {
                    when.walk(visit);
                    then.walk(visit);
                }
                if let Some(else_expr) = else_clause {
                    else_expr.walk(visit);
                }
            }
            Expr::In { expr, values, .. } => {
                expr.walk(visit);
                for value in values {
                    value.walk(visit);
                }
            }
            Expr::Between {
                expr, low, high, ..
            } => {
                expr.walk(visit);
                low.walk(visit);
                high.walk(visit);
            }
            Expr::Like { expr, pattern, .. } => {
                expr.walk(visit);
                pattern.walk(visit);
            }
        }
    }

    /// Whether this expression can evaluate to NULL.
    ///
    /// Columns read from a `null_extended` source (the right side of a left
    /// join) are nullable whatever their declaration. Aggregates other than
    /// COUNT follow their argument; over an empty input they still yield NULL.
    pub fn may_be_null(&self, null_extended: &[&str]) -> bool {
        match self {
            Expr::Column(column) => {
                column.nullable() || null_extended.contains(&column.source())
            }
            Expr::Literal(value) => value.is_null(),
            Expr::BinaryOp { left, right, .. } => {
                left.may_be_null(null_extended) || right.may_be_null(null_extended)
            }
            Expr::UnaryOp { expr, .. } | Expr::Paren(expr) => expr.may_be_null(null_extended),
            Expr::Function { name, args, .. } => match name.to_uppercase().as_str() {
                "COUNT" => false,
                "COALESCE" | "IFNULL" | "NVL" => {
                    args.iter().all(|e| e.may_be_null(null_extended))
                }
                _ => any_nullable(args, null_extended),
            },
            Expr::Template { args, .. } => any_nullable(args, null_extended),
            Expr::Case {
                when_clauses,
                else_clause,
                ..
            } => match else_clause {
                Some(else_expr) => {
                    else_expr.may_be_null(null_extended)
                        || when_clauses
                            .iter()
                            .any(|(_, then)| then.may_be_null(null_extended))
                }
                None => true,
            },
            Expr::Subquery(plan) => {
                !plan.returns_single_row()
                    || plan
                        .select
                        .iter()
                        .any(|item| item.expr.may_be_null(&plan.null_extended()))
            }
            Expr::InSubquery { .. } => true,
            Expr::In { expr, values, .. } => {
                expr.may_be_null(null_extended) || any_nullable(values, null_extended)
            }
            Expr::Between {
                expr, low, high, ..
            } => {
                expr.may_be_null(null_extended)
                    || low.may_be_null(null_extended)
                    || high.may_be_null(null_extended)
            }
            Expr::IsNull { .. } | Expr::Star { .. } => false,
            Expr::Like { expr, pattern, .. } => {
                expr.may_be_null(null_extended) || pattern.may_be_null(null_extended)
            }
        }
    }

    /// Whether an aggregate call appears in this expression, outside subqueries.
    pub fn contains_aggregate(&self) -> bool {
        let mut found = false;
        self.walk(&mut |node| {
            if let Expr::Function { name, .. } = node {
                found |= is_aggregate(name);
            }
        });
        found
    }

    /// Name a projection slot takes when the item has no alias.
    pub fn natural_name(&self) -> Option<&str> {
        match self {
            Expr::Column(column) => Some(&column.name),
            Expr::Paren(inner) => inner.natural_name(),
            _ => None,
        }
    }
}

fn expect_bool(context: &str, t: ValueType) -> QueryResult<()> {
    match t {
        ValueType::Bool | ValueType::Null => Ok(()),
        other => Err(QueryError::type_mismatch(context, ValueType::Bool, other)),
    }
}

fn expect_text(context: &str, t: ValueType) -> QueryResult<()> {
    match t {
        ValueType::Text | ValueType::Null => Ok(()),
        other => Err(QueryError::type_mismatch(context, ValueType::Text, other)),
    }
}

fn expect_numeric(context: &str, t: ValueType) -> QueryResult<()> {
    if t.is_numeric() || t == ValueType::Null {
        Ok(())
    } else {
        Err(QueryError::type_mismatch(context, ValueType::Float, t))
    }
}

/// Common type of two branches; NULL adopts the other side.
fn unify(context: &str, a: ValueType, b: ValueType) -> QueryResult<ValueType> {
    match (a, b) {
        (ValueType::Null, t) | (t, ValueType::Null) => Ok(t),
        (a, b) if a == b => Ok(a),
        (a, b) if a.is_numeric() && b.is_numeric() => Ok(a.promote(b)),
        (a, b) => Err(QueryError::type_mismatch(context, a, b)),
    }
}

fn subquery_type(plan: &QueryPlan) -> QueryResult<ValueType> {
    match plan.select.as_slice() {
        [item] => item.expr.check(),
        items => Err(QueryError::projection(
            "subquery",
            format!("expected exactly one column, found {}", items.len()),
        )),
    }
}

fn any_nullable(exprs: &[Expr], null_extended: &[&str]) -> bool {
    exprs.iter().any(|e| e.may_be_null(null_extended))
}

fn is_aggregate(name: &str) -> bool {
    matches!(
        name.to_uppercase().as_str(),
        "COUNT" | "SUM" | "AVG" | "MIN" | "MAX"
    )
}

/// Result type of a function call without a declared type.
fn function_type(name: &str, args: &[ValueType]) -> QueryResult<ValueType> {
    let first = args.first().copied().unwrap_or(ValueType::Null);
    match name.to_uppercase().as_str() {
        "COUNT" => Ok(ValueType::Int),
        "SUM" | "ABS" => {
            expect_numeric(name, first)?;
            Ok(first)
        }
        "AVG" => {
            expect_numeric(name, first)?;
            Ok(ValueType::Float)
        }
        "MIN" | "MAX" => Ok(first),
        "LOWER" | "UPPER" | "TRIM" => {
            expect_text(name, first)?;
            Ok(ValueType::Text)
        }
        "LENGTH" | "LEN" => {
            expect_text(name, first)?;
            Ok(ValueType::Int)
        }
        "COALESCE" | "IFNULL" | "NVL" => args
            .iter()
            .try_fold(ValueType::Null, |acc, t| unify(name, acc, *t)),
        _ => Ok(ValueType::Null),
    }
}

// =============================================================================
// Expression to Tokens
// =============================================================================

impl Expr {
    fn precedence(&self) -> u8 {
        match self {
            Expr::BinaryOp { op, .. } => op.precedence(),
            Expr::UnaryOp {
                op: UnaryOperator::Not,
                ..
            } => 3,
            Expr::In { .. }
            | Expr::InSubquery { .. }
            | Expr::Between { .. }
            | Expr::IsNull { .. }
            | Expr::Like { .. } => 4,
            Expr::UnaryOp {
                op: UnaryOperator::Minus,
                ..
            } => 7,
            _ => 8,
        }
    }

    /// Convert this expression to a token stream.
    pub fn to_tokens(&self, ctx: &RenderContext) -> TokenStream {
        let mut ts = TokenStream::new();

        match self {
            Expr::Column(column) => {
                if ctx.bare_source != Some(column.source.as_str()) {
                    ts.push(Token::Ident(column.source.clone()));
                    ts.push(Token::Dot);
                }
                ts.push(Token::Ident(column.name.clone()));
            }

            Expr::Literal(Value::Null) => {
                ts.push(Token::LitNull);
            }

            Expr::Literal(value) => {
                ts.push(Token::Param(value.clone()));
            }

            Expr::BinaryOp { left, op, right } => {
                // MySQL has no || operator
                if *op == BinaryOperator::Concat && !ctx.dialect.supports_concat_operator() {
                    ts.push(Token::FunctionName("CONCAT".into()));
                    ts.lparen();
                    ts.append(&left.to_tokens(ctx));
                    ts.comma().space();
                    ts.append(&right.to_tokens(ctx));
                    ts.rparen();
                } else {
                    let prec = op.precedence();
                    let left_parens =
                        left.precedence() < prec || (op.is_comparison() && left.precedence() == prec);
                    let same_logical = matches!(
                        right.as_ref(),
                        Expr::BinaryOp { op: r, .. }
                            if r == op && matches!(op, BinaryOperator::And | BinaryOperator::Or)
                    );
                    let right_parens = right.precedence() < prec
                        || (right.precedence() == prec && !same_logical);

                    ts.append(&operand(left, left_parens, ctx));
                    ts.space();
                    ts.push(op.token());
                    ts.space();
                    ts.append(&operand(right, right_parens, ctx));
                }
            }

            Expr::UnaryOp { op, expr } => match op {
                UnaryOperator::Not => {
                    ts.push(Token::Not).space();
                    ts.append(&operand(expr, expr.precedence() < 8, ctx));
                }
                UnaryOperator::Minus => {
                    ts.push(Token::Minus);
                    ts.append(&operand(expr, expr.precedence() < 7, ctx));
                }
            },

            Expr::Function {
                name,
                args,
                distinct,
                ..
            } => {
                if let Some(template) = ctx.functions.get(name) {
                    ts.append(&render_template(template, args, ctx));
                } else {
                    ts.push(Token::FunctionName(name.clone()));
                    ts.lparen();
                    if *distinct {
                        ts.push(Token::Distinct).space();
                    }
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            ts.comma().space();
                        }
                        ts.append(&arg.to_tokens(ctx));
                    }
                    ts.rparen();
                }
            }

            Expr::Template { template, args, .. } => {
                ts.append(&render_template(template, args, ctx));
            }

            Expr::Case {
                operand,
                when_clauses,
                else_clause,
            } => {
                ts.push(Token::Case);
                if let Some(op) = operand {
                    ts.space().append(&op.to_tokens(ctx));
                }
                for (when, then) in when_clauses {
                    ts.space().push(Token::When).space();
                    ts.append(&when.to_tokens(ctx));
                    ts.space().push(Token::Then).space();
                    ts.append(&then.to_tokens(ctx));
                }
                if let Some(else_expr) = else_clause {
                    ts.space().push(Token::Else).space();
                    ts.append(&else_expr.to_tokens(ctx));
                }
                ts.space().push(Token::End);
            }

            Expr::Subquery(plan) => {
                ts.lparen();
                ts.append(&plan.to_inline_tokens(&ctx.nested()));
                ts.rparen();
            }

            Expr::In {
                expr,
                values,
                negated,
            } => {
                // Empty IN list: "x IN ()" is invalid SQL
                // "x IN ()" should be FALSE, "x NOT IN ()" should be TRUE
                if values.is_empty() {
                    ts.push(if *negated { Token::True } else { Token::False });
                } else {
                    ts.append(&operand(expr, expr.precedence() <= 4, ctx));
                    if *negated {
                        ts.space().push(Token::Not);
                    }
                    ts.space().push(Token::In).space().lparen();
                    for (i, val) in values.iter().enumerate() {
                        if i > 0 {
                            ts.comma().space();
                        }
                        ts.append(&val.to_tokens(ctx));
                    }
                    ts.rparen();
                }
            }

            Expr::InSubquery {
                expr,
                subquery,
                negated,
            } => {
                ts.append(&operand(expr, expr.precedence() <= 4, ctx));
                if *negated {
                    ts.space().push(Token::Not);
                }
                ts.space().push(Token::In).space().lparen();
                ts.append(&subquery.to_inline_tokens(&ctx.nested()));
                ts.rparen();
            }

            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                ts.append(&operand(expr, expr.precedence() <= 4, ctx));
                if *negated {
                    ts.space().push(Token::Not);
                }
                ts.space().push(Token::Between).space();
                ts.append(&operand(low, low.precedence() <= 4, ctx));
                ts.space().push(Token::And).space();
                ts.append(&operand(high, high.precedence() <= 4, ctx));
            }

            Expr::IsNull { expr, negated } => {
                ts.append(&operand(expr, expr.precedence() <= 4, ctx));
                ts.space();
                ts.push(if *negated {
                    Token::IsNotNull
                } else {
                    Token::IsNull
                });
            }

            Expr::Like {
                expr,
                pattern,
                escape,
                negated,
            } => {
                ts.append(&operand(expr, expr.precedence() <= 4, ctx));
                if *negated {
                    ts.space().push(Token::Not);
                }
                ts.space().push(Token::Like).space();
                ts.append(&operand(pattern, pattern.precedence() <= 4, ctx));
                if let Some(c) = escape {
                    ts.space()
                        .push(Token::Escape)
                        .space()
                        .push(Token::LitString(c.to_string()));
                }
            }

            Expr::Star { source } => {
                if let Some(s) = source {
                    ts.push(Token::Ident(s.clone()));
                    ts.push(Token::Dot);
                }
                ts.push(Token::Star);
            }

            Expr::Paren(inner) => {
                ts.lparen();
                ts.append(&inner.to_tokens(ctx));
                ts.rparen();
            }
        }

        ts
    }

    /// Render with literals inlined, for display and debugging.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens(&RenderContext::plain(dialect))
            .serialize(dialect)
    }
}

fn operand(expr: &Expr, parens: bool, ctx: &RenderContext) -> TokenStream {
    if parens {
        let mut ts = TokenStream::new();
        ts.lparen().append(&expr.to_tokens(ctx)).rparen();
        ts
    } else {
        expr.to_tokens(ctx)
    }
}

fn binary(left: Expr, op: BinaryOperator, right: Expr) -> Expr {
    Expr::BinaryOp {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }
}

fn call(name: &str, args: Vec<Expr>) -> Expr {
    Expr::Function {
        name: name.into(),
        args,
        distinct: false,
        value_type: None,
    }
}

/// Escape `!`, `%` and `_` so `s` matches literally inside a LIKE pattern.
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '!' | '%' | '_') {
            out.push(LIKE_ESCAPE);
        }
        out.push(c);
    }
    out
}

// =============================================================================
// Expression Constructors
// =============================================================================

/// Create a literal.
pub fn lit(value: impl Into<Value>) -> Expr {
    Expr::Literal(value.into())
}

/// Create a NULL literal.
pub fn null() -> Expr {
    Expr::Literal(Value::Null)
}

/// Create a star (*) expression.
pub fn star() -> Expr {
    Expr::Star { source: None }
}

/// COUNT(*)
pub fn count_star() -> Expr {
    call("COUNT", vec![star()])
}

/// COUNT(expr)
pub fn count(expr: Expr) -> Expr {
    call("COUNT", vec![expr])
}

/// COUNT(DISTINCT expr)
pub fn count_distinct(expr: Expr) -> Expr {
    Expr::Function {
        name: "COUNT".into(),
        args: vec![expr],
        distinct: true,
        value_type: None,
    }
}

/// SUM(expr)
pub fn sum(expr: Expr) -> Expr {
    call("SUM", vec![expr])
}

/// AVG(expr)
pub fn avg(expr: Expr) -> Expr {
    call("AVG", vec![expr])
}

/// MIN(expr)
pub fn min(expr: Expr) -> Expr {
    call("MIN", vec![expr])
}

/// MAX(expr)
pub fn max(expr: Expr) -> Expr {
    call("MAX", vec![expr])
}

/// LOWER(expr)
pub fn lower(expr: Expr) -> Expr {
    call("LOWER", vec![expr])
}

/// UPPER(expr)
pub fn upper(expr: Expr) -> Expr {
    call("UPPER", vec![expr])
}

/// COALESCE(args...)
pub fn coalesce(args: Vec<Expr>) -> Expr {
    call("COALESCE", args)
}

/// Generic function call with a declared result type.
pub fn func(name: &str, value_type: ValueType, args: Vec<Expr>) -> Expr {
    Expr::Function {
        name: name.into(),
        args,
        distinct: false,
        value_type: Some(value_type),
    }
}

/// SQL template with `{0}`, `{1}`, ... argument placeholders.
///
/// The template text is emitted verbatim, so it must never carry user input;
/// values belong in `args`.
///
/// # Example
/// ```ignore
/// template(ValueType::Text, "REPLACE({0}, {1}, {2})", vec![username, lit("member"), lit("M")])
/// ```
pub fn template(value_type: ValueType, template: &str, args: Vec<Expr>) -> Expr {
    Expr::Template {
        template: template.into(),
        args,
        value_type,
    }
}

// =============================================================================
// CASE Builder
// =============================================================================

/// Builder for CASE expressions.
#[derive(Debug, Clone, Default)]
#[must_use = "CaseBuilder has no effect until otherwise() or end() is called"]
pub struct CaseBuilder {
    operand: Option<Expr>,
    when_clauses: Vec<(Expr, Expr)>,
}

impl CaseBuilder {
    /// Searched CASE: each `when` takes a condition.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simple CASE: each `when` takes a value compared with `operand`.
    pub fn on(operand: impl Into<Expr>) -> Self {
        Self {
            operand: Some(operand.into()),
            when_clauses: vec![],
        }
    }

    pub fn when(mut self, condition: impl Into<Expr>, then: impl Into<Expr>) -> Self {
        self.when_clauses.push((condition.into(), then.into()));
        self
    }

    pub fn otherwise(self, value: impl Into<Expr>) -> Expr {
        Expr::Case {
            operand: self.operand.map(Box::new),
            when_clauses: self.when_clauses,
            else_clause: Some(Box::new(value.into())),
        }
    }

    pub fn end(self) -> Expr {
        Expr::Case {
            operand: self.operand.map(Box::new),
            when_clauses: self.when_clauses,
            else_clause: None,
        }
    }
}

// =============================================================================
// Expression Builder Trait
// =============================================================================

/// Extension trait for building expressions fluently.
///
/// Comparisons and tests return [`Predicate`]; arithmetic, string and
/// aggregate methods return [`Expr`].
pub trait ExprExt: Sized {
    fn into_expr(self) -> Expr;

    // Comparison operators
    fn eq(self, other: impl Into<Expr>) -> Predicate {
        Predicate::new(binary(self.into_expr(), BinaryOperator::Eq, other.into()))
    }

    fn ne(self, other: impl Into<Expr>) -> Predicate {
        Predicate::new(binary(self.into_expr(), BinaryOperator::Ne, other.into()))
    }

    fn gt(self, other: impl Into<Expr>) -> Predicate {
        Predicate::new(binary(self.into_expr(), BinaryOperator::Gt, other.into()))
    }

    fn gte(self, other: impl Into<Expr>) -> Predicate {
        Predicate::new(binary(self.into_expr(), BinaryOperator::Gte, other.into()))
    }

    fn lt(self, other: impl Into<Expr>) -> Predicate {
        Predicate::new(binary(self.into_expr(), BinaryOperator::Lt, other.into()))
    }

    fn lte(self, other: impl Into<Expr>) -> Predicate {
        Predicate::new(binary(self.into_expr(), BinaryOperator::Lte, other.into()))
    }

    // BETWEEN operator
    fn between(self, low: impl Into<Expr>, high: impl Into<Expr>) -> Predicate {
        Predicate::new(Expr::Between {
            expr: Box::new(self.into_expr()),
            low: Box::new(low.into()),
            high: Box::new(high.into()),
            negated: false,
        })
    }

    fn not_between(self, low: impl Into<Expr>, high: impl Into<Expr>) -> Predicate {
        Predicate::new(Expr::Between {
            expr: Box::new(self.into_expr()),
            low: Box::new(low.into()),
            high: Box::new(high.into()),
            negated: true,
        })
    }

    // IN operator
    fn in_list<I>(self, values: I) -> Predicate
    where
        I: IntoIterator,
        I::Item: Into<Expr>,
    {
        Predicate::new(Expr::In {
            expr: Box::new(self.into_expr()),
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        })
    }

    fn not_in_list<I>(self, values: I) -> Predicate
    where
        I: IntoIterator,
        I::Item: Into<Expr>,
    {
        Predicate::new(Expr::In {
            expr: Box::new(self.into_expr()),
            values: values.into_iter().map(Into::into).collect(),
            negated: true,
        })
    }

    fn in_query<T>(self, query: Query<T>) -> Predicate {
        Predicate::new(Expr::InSubquery {
            expr: Box::new(self.into_expr()),
            subquery: Box::new(query.into_plan()),
            negated: false,
        })
    }

    fn not_in_query<T>(self, query: Query<T>) -> Predicate {
        Predicate::new(Expr::InSubquery {
            expr: Box::new(self.into_expr()),
            subquery: Box::new(query.into_plan()),
            negated: true,
        })
    }

    // NULL checks
    #[allow(clippy::wrong_self_convention)]
    fn is_null(self) -> Predicate {
        Predicate::new(Expr::IsNull {
            expr: Box::new(self.into_expr()),
            negated: false,
        })
    }

    #[allow(clippy::wrong_self_convention)]
    fn is_not_null(self) -> Predicate {
        Predicate::new(Expr::IsNull {
            expr: Box::new(self.into_expr()),
            negated: true,
        })
    }

    // Pattern matching
    /// LIKE with a raw pattern; `%` and `_` keep their wildcard meaning.
    fn like(self, pattern: impl Into<Expr>) -> Predicate {
        Predicate::new(Expr::Like {
            expr: Box::new(self.into_expr()),
            pattern: Box::new(pattern.into()),
            escape: None,
            negated: false,
        })
    }

    fn not_like(self, pattern: impl Into<Expr>) -> Predicate {
        Predicate::new(Expr::Like {
            expr: Box::new(self.into_expr()),
            pattern: Box::new(pattern.into()),
            escape: None,
            negated: true,
        })
    }

    /// Substring match; `text` is matched literally.
    fn contains(self, text: &str) -> Predicate {
        escaped_like(self.into_expr(), format!("%{}%", escape_like(text)))
    }

    fn starts_with(self, text: &str) -> Predicate {
        escaped_like(self.into_expr(), format!("{}%", escape_like(text)))
    }

    fn ends_with(self, text: &str) -> Predicate {
        escaped_like(self.into_expr(), format!("%{}", escape_like(text)))
    }

    // Arithmetic operators
    fn add(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Plus, other.into())
    }

    fn sub(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Minus, other.into())
    }

    fn mul(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Mul, other.into())
    }

    fn div(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Div, other.into())
    }

    // String operators
    fn concat(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Concat, other.into())
    }

    fn lower(self) -> Expr {
        lower(self.into_expr())
    }

    fn upper(self) -> Expr {
        upper(self.into_expr())
    }

    // Aggregates
    fn count(self) -> Expr {
        count(self.into_expr())
    }

    fn count_distinct(self) -> Expr {
        count_distinct(self.into_expr())
    }

    fn sum(self) -> Expr {
        sum(self.into_expr())
    }

    fn avg(self) -> Expr {
        avg(self.into_expr())
    }

    fn min(self) -> Expr {
        min(self.into_expr())
    }

    fn max(self) -> Expr {
        max(self.into_expr())
    }

    /// Alias this expression (for SELECT list).
    fn alias(self, name: &str) -> SelectExpr {
        SelectExpr {
            expr: self.into_expr(),
            alias: Some(name.into()),
        }
    }

    fn asc(self) -> OrderByExpr {
        OrderByExpr::asc(self.into_expr())
    }

    fn desc(self) -> OrderByExpr {
        OrderByExpr::desc(self.into_expr())
    }
}

impl ExprExt for Expr {
    fn into_expr(self) -> Expr {
        self
    }
}

fn escaped_like(expr: Expr, pattern: String) -> Predicate {
    Predicate::new(Expr::Like {
        expr: Box::new(expr),
        pattern: Box::new(lit(pattern)),
        escape: Some(LIKE_ESCAPE),
        negated: false,
    })
}

// =============================================================================
// Conversions
// =============================================================================

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Expr::Literal(value)
    }
}

impl From<Column> for Expr {
    fn from(column: Column) -> Self {
        Expr::Column(column)
    }
}

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        lit(n)
    }
}

impl From<i32> for Expr {
    fn from(n: i32) -> Self {
        lit(n)
    }
}

impl From<f64> for Expr {
    fn from(f: f64) -> Self {
        lit(f)
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        lit(s)
    }
}

impl From<String> for Expr {
    fn from(s: String) -> Self {
        lit(s)
    }
}

impl From<bool> for Expr {
    fn from(b: bool) -> Self {
        lit(b)
    }
}

// =============================================================================
// Tests
// =============================================================================
