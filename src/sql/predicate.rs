//! Boolean predicates and their composition.
//!
//! Optional filters are modelled as `Option<Predicate>`. Combining with an
//! absent operand yields the other operand unchanged, so a dynamic filter can
//! be assembled from parts that may or may not apply:
//!
//! ```ignore
//! let filter = and(name.map(|n| username.clone().eq(n)), age.map(|a| member_age.clone().eq(a)));
//! ```

use std::ops::Not;

use serde::{Deserialize, Serialize};

use super::dialect::Dialect;
use super::expr::{BinaryOperator, Expr, UnaryOperator};
use crate::error::{QueryError, QueryResult};
use crate::value::ValueType;

/// A boolean-valued expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Predicate(Expr);

impl Predicate {
    pub(crate) fn new(expr: Expr) -> Self {
        Self(expr)
    }

    /// Wrap an arbitrary expression, checking that it is boolean.
    pub fn from_expr(expr: Expr) -> QueryResult<Self> {
        match expr.check()? {
            ValueType::Bool | ValueType::Null => Ok(Self(expr)),
            other => Err(QueryError::type_mismatch("predicate", ValueType::Bool, other)),
        }
    }

    pub fn as_expr(&self) -> &Expr {
        &self.0
    }

    pub fn into_expr(self) -> Expr {
        self.0
    }

    /// `self AND other`; an absent `other` leaves `self` unchanged.
    pub fn and(self, other: impl Into<Option<Predicate>>) -> Predicate {
        match other.into() {
            Some(other) => Predicate(Expr::BinaryOp {
                left: Box::new(self.0),
                op: BinaryOperator::And,
                right: Box::new(other.0),
            }),
            None => self,
        }
    }

    /// `self OR other`; an absent `other` leaves `self` unchanged.
    pub fn or(self, other: impl Into<Option<Predicate>>) -> Predicate {
        match other.into() {
            Some(other) => Predicate(Expr::BinaryOp {
                left: Box::new(self.0),
                op: BinaryOperator::Or,
                right: Box::new(other.0),
            }),
            None => self,
        }
    }

    /// Render with literals inlined, for display and debugging.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.0.to_sql(dialect)
    }
}

impl Not for Predicate {
    type Output = Predicate;

    fn not(self) -> Predicate {
        Predicate(Expr::UnaryOp {
            op: UnaryOperator::Not,
            expr: Box::new(self.0),
        })
    }
}

impl From<Predicate> for Expr {
    fn from(predicate: Predicate) -> Self {
        predicate.0
    }
}

impl IntoIterator for Predicate {
    type Item = Predicate;
    type IntoIter = std::iter::Once<Predicate>;

    fn into_iter(self) -> Self::IntoIter {
        std::iter::once(self)
    }
}

// =============================================================================
// Optional combinators
// =============================================================================

/// Conjunction of two optional predicates.
///
/// `and(p, None) == Some(p)` and `and(None, None) == None`.
pub fn and(
    left: impl Into<Option<Predicate>>,
    right: impl Into<Option<Predicate>>,
) -> Option<Predicate> {
    match (left.into(), right.into()) {
        (Some(l), r) => Some(l.and(r)),
        (None, r) => r,
    }
}

/// Disjunction of two optional predicates.
///
/// `or(p, None) == Some(p)` and `or(None, None) == None`.
pub fn or(
    left: impl Into<Option<Predicate>>,
    right: impl Into<Option<Predicate>>,
) -> Option<Predicate> {
    match (left.into(), right.into()) {
        (Some(l), r) => Some(l.or(r)),
        (None, r) => r,
    }
}

/// Negation of an optional predicate; absent stays absent.
pub fn not(predicate: impl Into<Option<Predicate>>) -> Option<Predicate> {
    predicate.into().map(Not::not)
}

/// Conjunction of every present predicate, or `None` if none is present.
pub fn all<I>(predicates: I) -> Option<Predicate>
where
    I: IntoIterator,
    I::Item: Into<Option<Predicate>>,
{
    predicates.into_iter().fold(None, and)
}

/// Disjunction of every present predicate, or `None` if none is present.
pub fn any<I>(predicates: I) -> Option<Predicate>
where
    I: IntoIterator,
    I::Item: Into<Option<Predicate>>,
{
    predicates.into_iter().fold(None, or)
}

// =============================================================================
// Imperative builder
// =============================================================================

/// Accumulates optional predicates imperatively.
///
/// ```ignore
/// let mut builder = PredicateBuilder::new();
/// if let Some(name) = name {
///     builder.and(username.clone().eq(name));
/// }
/// builder.and(age_cond);
/// let filter = builder.build();
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredicateBuilder {
    current: Option<Predicate>,
}

impl PredicateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and(&mut self, predicate: impl Into<Option<Predicate>>) -> &mut Self {
        self.current = and(self.current.take(), predicate);
        self
    }

    pub fn or(&mut self, predicate: impl Into<Option<Predicate>>) -> &mut Self {
        self.current = or(self.current.take(), predicate);
        self
    }

    pub fn and_not(&mut self, predicate: impl Into<Option<Predicate>>) -> &mut Self {
        self.and(not(predicate))
    }

    pub fn has_value(&self) -> bool {
        self.current.is_some()
    }

    pub fn build(&self) -> Option<Predicate> {
        self.current.clone()
    }
}

impl From<PredicateBuilder> for Option<Predicate> {
    fn from(builder: PredicateBuilder) -> Self {
        builder.current
    }
}
