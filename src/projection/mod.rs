//! Projections: what a query returns and how rows become Rust values.
//!
//! A [`Projection<T>`] pairs the select list with a [`ProjectionSpec`]
//! describing the target shape and an extractor that turns one row into a `T`.
//! The shape is validated against the select list when the query is built, so a
//! mismatched arity, a missing slot or an incompatible type is reported before
//! anything runs.
//!
//! | Constructor | Result | Mapping |
//! |-------------|--------|---------|
//! | [`Projection::scalar`] | any [`FromValue`] | single item |
//! | [`Projection::tuple`] | [`Tuple`] | lookup by expression |
//! | [`Projection::constructor`] | [`Construct`] type | by position |
//! | [`Projection::fields`] | [`Bean`] type | by alias or column name |
//! | [`Projection::record`] | [`Record`] | every column of an entity |

mod shape;
mod tuple;

pub use shape::{decode, Args, Bean, Construct};
pub use tuple::{Record, Tuple};

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{QueryError, QueryResult};
use crate::schema::EntityPath;
use crate::sql::query::{QueryPlan, SelectExpr};
use crate::value::{FromValue, Value, ValueType};

/// A typed slot of a projection target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub name: String,
    pub value_type: ValueType,
    pub nullable: bool,
}

impl Slot {
    pub fn of<T: FromValue>(name: &str) -> Self {
        Self {
            name: name.into(),
            value_type: T::value_type(),
            nullable: T::nullable(),
        }
    }
}

/// Static type of one select item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemType {
    pub value_type: ValueType,
    pub nullable: bool,
}

/// Shape of a query's result rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProjectionSpec {
    /// One value per row.
    Scalar { slot: Slot },
    /// Heterogeneous row looked up by expression.
    Tuple,
    /// Positional construction.
    Constructor { target: String, params: Vec<Slot> },
    /// Assignment by slot name.
    Fields { target: String, slots: Vec<Slot> },
    /// All columns of one table.
    Record { table: String },
}

impl ProjectionSpec {
    /// Check the select list against this shape.
    ///
    /// `types` holds the checked type of each item.
    pub fn validate(&self, items: &[SelectExpr], types: &[ItemType]) -> QueryResult<()> {
        let mut aliases = HashSet::new();
        for alias in items.iter().filter_map(|item| item.alias.as_deref()) {
            if !aliases.insert(alias) {
                return Err(QueryError::DuplicateAlias(alias.to_string()));
            }
        }

        match self {
            ProjectionSpec::Scalar { slot } => match types {
                [found] => check_assignable("scalar", slot, *found),
                _ => Err(QueryError::projection(
                    "scalar",
                    format!("expected exactly one select item, found {}", items.len()),
                )),
            },

            ProjectionSpec::Tuple => Ok(()),

            ProjectionSpec::Constructor { target, params } => {
                if params.len() != items.len() {
                    return Err(QueryError::projection(
                        target.as_str(),
                        format!(
                            "constructor takes {} argument(s), select list has {}",
                            params.len(),
                            items.len()
                        ),
                    ));
                }
                params
                    .iter()
                    .zip(types)
                    .try_for_each(|(param, found)| check_assignable(target, param, *found))
            }

            ProjectionSpec::Fields { target, slots } => {
                let mut seen = HashSet::new();
                for (i, (item, found)) in items.iter().zip(types).enumerate() {
                    let name = item.name().ok_or_else(|| {
                        QueryError::projection(
                            target.as_str(),
                            format!("select item {} has no name; give it an alias", i + 1),
                        )
                    })?;
                    if !seen.insert(name) {
                        return Err(QueryError::DuplicateAlias(name.to_string()));
                    }
                    let slot = slots.iter().find(|s| s.name == name).ok_or_else(|| {
                        QueryError::projection(target.as_str(), format!("no field named {}", name))
                    })?;
                    check_assignable(target, slot, *found)?;
                }
                Ok(())
            }

            ProjectionSpec::Record { .. } => {
                let mut seen = HashSet::new();
                for name in items.iter().filter_map(SelectExpr::name) {
                    if !seen.insert(name) {
                        return Err(QueryError::DuplicateAlias(name.to_string()));
                    }
                }
                Ok(())
            }
        }
    }

    fn target_name(&self) -> &str {
        match self {
            ProjectionSpec::Scalar { .. } => "scalar",
            ProjectionSpec::Tuple => "tuple",
            ProjectionSpec::Constructor { target, .. } | ProjectionSpec::Fields { target, .. } => {
                target
            }
            ProjectionSpec::Record { table } => table,
        }
    }
}

fn check_assignable(target: &str, slot: &Slot, found: ItemType) -> QueryResult<()> {
    if !found.value_type.is_assignable_to(slot.value_type) {
        return Err(QueryError::projection(
            target,
            format!(
                "{} expects {}, select item is {}",
                slot.name, slot.value_type, found.value_type
            ),
        ));
    }
    if found.nullable && !slot.nullable {
        return Err(QueryError::projection(
            target,
            format!("{} cannot hold NULL, select item is nullable", slot.name),
        ));
    }
    Ok(())
}

/// Last path segment of a type name, e.g. `MemberDto`.
fn short_type_name<T>() -> String {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

// =============================================================================
// Row extraction
// =============================================================================

/// Per-fetch view of a plan's select list, shared by every extracted row.
#[derive(Debug, Clone)]
pub(crate) struct RowShape {
    items: Arc<[SelectExpr]>,
    names: Arc<[String]>,
    target: Arc<str>,
}

impl RowShape {
    pub(crate) fn new(plan: &QueryPlan) -> Self {
        let names = plan
            .select
            .iter()
            .enumerate()
            .map(|(i, item)| match item.name() {
                Some(name) => name.to_string(),
                None => format!("#{}", i + 1),
            })
            .collect();
        Self {
            items: plan.select.clone().into(),
            names,
            target: plan.projection.target_name().into(),
        }
    }
}

pub(crate) type Extractor<T> = fn(&RowShape, Vec<Value>) -> QueryResult<T>;

pub(crate) fn extract_scalar<T: FromValue>(shape: &RowShape, row: Vec<Value>) -> QueryResult<T> {
    let slot = shape.names.first().map(String::as_str).unwrap_or("#1");
    let value = row.into_iter().next().unwrap_or(Value::Null);
    decode(slot, value)
}

fn extract_tuple(shape: &RowShape, row: Vec<Value>) -> QueryResult<Tuple> {
    Ok(Tuple::new(shape.items.clone(), shape.names.clone(), row))
}

fn extract_constructor<T: Construct>(shape: &RowShape, row: Vec<Value>) -> QueryResult<T> {
    let mut args = Args::new(shape.names.clone(), row);
    T::construct(&mut args)
}

fn extract_fields<T: Bean>(shape: &RowShape, row: Vec<Value>) -> QueryResult<T> {
    let mut target = T::default();
    for (name, value) in shape.names.iter().zip(row) {
        target.assign(name, value)?;
    }
    Ok(target)
}

fn extract_record(shape: &RowShape, row: Vec<Value>) -> QueryResult<Record> {
    Ok(Record::new(shape.target.clone(), shape.names.clone(), row))
}

// =============================================================================
// Projection
// =============================================================================

/// A select list plus the recipe for turning its rows into `T`.
pub struct Projection<T> {
    items: Vec<SelectExpr>,
    spec: ProjectionSpec,
    extract: Extractor<T>,
}

impl<T> Projection<T> {
    /// Single-item projection read as `T`.
    pub fn scalar(item: impl Into<SelectExpr>) -> Self
    where
        T: FromValue,
    {
        let item = item.into();
        let name = item.name().unwrap_or("value").to_string();
        Self {
            items: vec![item],
            spec: ProjectionSpec::Scalar {
                slot: Slot::of::<T>(&name),
            },
            extract: extract_scalar::<T>,
        }
    }

    /// Positional projection through [`Construct`].
    pub fn constructor<I>(items: I) -> Self
    where
        T: Construct,
        I: IntoIterator,
        I::Item: Into<SelectExpr>,
    {
        Self {
            items: items.into_iter().map(Into::into).collect(),
            spec: ProjectionSpec::Constructor {
                target: short_type_name::<T>(),
                params: T::parameters(),
            },
            extract: extract_constructor::<T>,
        }
    }

    /// Named projection through [`Bean`]; items map by alias or column name.
    pub fn fields<I>(items: I) -> Self
    where
        T: Bean,
        I: IntoIterator,
        I::Item: Into<SelectExpr>,
    {
        Self {
            items: items.into_iter().map(Into::into).collect(),
            spec: ProjectionSpec::Fields {
                target: short_type_name::<T>(),
                slots: T::slots(),
            },
            extract: extract_fields::<T>,
        }
    }

    /// Same mapping as [`fields`](Self::fields); kept for setter-style targets.
    pub fn bean<I>(items: I) -> Self
    where
        T: Bean,
        I: IntoIterator,
        I::Item: Into<SelectExpr>,
    {
        Self::fields(items)
    }

    pub fn items(&self) -> &[SelectExpr] {
        &self.items
    }

    pub fn spec(&self) -> &ProjectionSpec {
        &self.spec
    }

    pub(crate) fn into_parts(self) -> (Vec<SelectExpr>, ProjectionSpec, Extractor<T>) {
        (self.items, self.spec, self.extract)
    }
}

impl Projection<Tuple> {
    pub fn tuple<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<SelectExpr>,
    {
        Self {
            items: items.into_iter().map(Into::into).collect(),
            spec: ProjectionSpec::Tuple,
            extract: extract_tuple,
        }
    }
}

impl Projection<Record> {
    /// Every column of `entity`, in declaration order.
    pub fn record(entity: &EntityPath) -> Self {
        Self {
            items: entity.columns().into_iter().map(SelectExpr::new).collect(),
            spec: ProjectionSpec::Record {
                table: entity.table_name().to_string(),
            },
            extract: extract_record,
        }
    }
}

impl<T> Clone for Projection<T> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
            spec: self.spec.clone(),
            extract: self.extract,
        }
    }
}

impl<T> fmt::Debug for Projection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Projection")
            .field("items", &self.items)
            .field("spec", &self.spec)
            .finish()
    }
}
