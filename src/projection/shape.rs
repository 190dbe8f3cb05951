//! Mapping rows onto user structs.

use std::sync::Arc;

use super::Slot;
use crate::error::{QueryError, QueryResult};
use crate::value::{FromValue, Value};

/// A type built positionally from the select list.
///
/// Parameters are matched to select items by position only; names are
/// informational.
pub trait Construct: Sized {
    fn parameters() -> Vec<Slot>;

    fn construct(args: &mut Args) -> QueryResult<Self>;
}

/// A type filled slot by slot, matched by name.
pub trait Bean: Default {
    fn slots() -> Vec<Slot>;

    fn assign(&mut self, slot: &str, value: Value) -> QueryResult<()>;
}

/// Positional argument reader handed to [`Construct::construct`].
pub struct Args {
    names: Arc<[String]>,
    values: std::vec::IntoIter<Value>,
    position: usize,
}

impl Args {
    pub(crate) fn new(names: Arc<[String]>, values: Vec<Value>) -> Self {
        Self {
            names,
            values: values.into_iter(),
            position: 0,
        }
    }

    /// Read the next argument as `T`.
    pub fn take<T: FromValue>(&mut self) -> QueryResult<T> {
        let slot = match self.names.get(self.position) {
            Some(name) => name.clone(),
            None => format!("#{}", self.position + 1),
        };
        self.position += 1;
        match self.values.next() {
            Some(value) => decode(&slot, value),
            None => Err(QueryError::Decode {
                slot,
                expected: T::value_type(),
                found: "no value".into(),
            }),
        }
    }
}

/// Convert a cell into `T`, naming the slot on failure.
pub fn decode<T: FromValue>(slot: &str, value: Value) -> QueryResult<T> {
    T::from_value(value).map_err(|value| QueryError::Decode {
        slot: slot.to_string(),
        expected: T::value_type(),
        found: match &value {
            Value::Null => "NULL".into(),
            other => format!("{} {}", other.value_type(), other),
        },
    })
}

/// Declare a struct usable as a constructor or field projection target.
///
/// Implements [`Construct`] (fields in declaration order) and [`Bean`] (fields
/// by name). The struct must implement `Default`.
///
/// ```ignore
/// quarry::shape! {
///     #[derive(Debug, Default)]
///     pub struct MemberDto {
///         pub username: String,
///         pub age: i64,
///     }
/// }
/// ```
#[macro_export]
macro_rules! shape {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $($(#[$fmeta:meta])* $fvis:vis $field:ident : $ty:ty),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $($(#[$fmeta])* $fvis $field: $ty),*
        }

        impl $crate::projection::Construct for $name {
            fn parameters() -> ::std::vec::Vec<$crate::projection::Slot> {
                ::std::vec![$($crate::projection::Slot::of::<$ty>(::std::stringify!($field))),*]
            }

            fn construct(
                args: &mut $crate::projection::Args,
            ) -> $crate::error::QueryResult<Self> {
                ::std::result::Result::Ok(Self {
                    $($field: args.take::<$ty>()?),*
                })
            }
        }

        impl $crate::projection::Bean for $name {
            fn slots() -> ::std::vec::Vec<$crate::projection::Slot> {
                <Self as $crate::projection::Construct>::parameters()
            }

            fn assign(
                &mut self,
                slot: &str,
                value: $crate::value::Value,
            ) -> $crate::error::QueryResult<()> {
                match slot {
                    $(::std::stringify!($field) => {
                        self.$field = $crate::projection::decode::<$ty>(slot, value)?;
                    })*
                    _ => {
                        return ::std::result::Result::Err(
                            $crate::error::QueryError::ProjectionArityMismatch {
                                target: ::std::stringify!($name).into(),
                                detail: ::std::format!("no field named {}", slot),
                            },
                        );
                    }
                }
                ::std::result::Result::Ok(())
            }
        }
    };
}
