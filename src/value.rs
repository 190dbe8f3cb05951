//! Runtime values and their static types.
//!
//! [`ValueType`] is the static type every expression node reports;
//! [`Value`] is what a storage engine hands back for a single cell.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Static type of an expression or column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Int,
    Float,
    Text,
    Bool,
    /// Type of a bare NULL literal. Compatible with every other type.
    Null,
}

impl ValueType {
    /// Parse a type name as written in schema files.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "int" | "integer" | "bigint" | "long" | "int64" => Some(ValueType::Int),
            "float" | "double" | "real" | "decimal" | "float64" => Some(ValueType::Float),
            "text" | "string" | "varchar" => Some(ValueType::Text),
            "bool" | "boolean" => Some(ValueType::Bool),
            _ => None,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, ValueType::Int | ValueType::Float)
    }

    /// Whether two operands may be compared with each other.
    pub fn is_comparable(self, other: ValueType) -> bool {
        self == other
            || self == ValueType::Null
            || other == ValueType::Null
            || (self.is_numeric() && other.is_numeric())
    }

    /// Whether a value of this type can be stored in a slot of `target` type.
    ///
    /// Integers widen to floats; NULL fits anywhere.
    pub fn is_assignable_to(self, target: ValueType) -> bool {
        self == target
            || self == ValueType::Null
            || target == ValueType::Null
            || (self == ValueType::Int && target == ValueType::Float)
    }

    /// Result type of an arithmetic operation over two numeric operands.
    pub fn promote(self, other: ValueType) -> ValueType {
        match (self, other) {
            (ValueType::Int, ValueType::Int) => ValueType::Int,
            (ValueType::Null, t) | (t, ValueType::Null) => t,
            _ => ValueType::Float,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::Text => "text",
            ValueType::Bool => "bool",
            ValueType::Null => "null",
        };
        f.write_str(name)
    }
}

/// A single cell value, as bound into a statement or read from a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Null,
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::Text(_) => ValueType::Text,
            Value::Bool(_) => ValueType::Bool,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => write!(f, "'{}'", s),
            Value::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

// =============================================================================
// Conversion into Rust types
// =============================================================================

/// Conversion from a row cell into a Rust type.
///
/// `value_type()` and `nullable()` describe the slot statically so projections
/// can be checked before a query ever runs.
pub trait FromValue: Sized {
    fn value_type() -> ValueType;

    fn nullable() -> bool {
        false
    }

    /// Convert, handing the value back on failure.
    fn from_value(value: Value) -> Result<Self, Value>;
}

impl FromValue for i64 {
    fn value_type() -> ValueType {
        ValueType::Int
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Int(n) => Ok(n),
            Value::Bool(b) => Ok(b as i64),
            other => Err(other),
        }
    }
}

impl FromValue for i32 {
    fn value_type() -> ValueType {
        ValueType::Int
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Int(n) => i32::try_from(n).map_err(|_| Value::Int(n)),
            other => Err(other),
        }
    }
}

impl FromValue for f64 {
    fn value_type() -> ValueType {
        ValueType::Float
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Float(x) => Ok(x),
            Value::Int(n) => Ok(n as f64),
            other => Err(other),
        }
    }
}

impl FromValue for String {
    fn value_type() -> ValueType {
        ValueType::Text
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Text(s) => Ok(s),
            other => Err(other),
        }
    }
}

impl FromValue for bool {
    fn value_type() -> ValueType {
        ValueType::Bool
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        // SQLite and MySQL hand booleans back as 0/1 integers
        match value {
            Value::Bool(b) => Ok(b),
            Value::Int(0) => Ok(false),
            Value::Int(1) => Ok(true),
            other => Err(other),
        }
    }
}

impl FromValue for Value {
    fn value_type() -> ValueType {
        ValueType::Null
    }

    fn nullable() -> bool {
        true
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        Ok(value)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn value_type() -> ValueType {
        T::value_type()
    }

    fn nullable() -> bool {
        true
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}
