//! # Quarry
//!
//! A typed query builder that compiles to multi-dialect SQL.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  Schema (tables, relationships)          │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [QueryFactory::entity]
//! ┌─────────────────────────────────────────────────────────┐
//! │        Entity handles → typed column expressions         │
//! │        + predicates (absent-propagating and/or/not)      │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [QueryBuilder::build]
//! ┌─────────────────────────────────────────────────────────┐
//! │            Query<T> = QueryPlan + Projection<T>          │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [Executor + Connection]
//! ┌─────────────────────────────────────────────────────────┐
//! │          SQL statement → rows → T                        │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use quarry::prelude::*;
//!
//! let factory = QueryFactory::new(Schema::from_file("schema.toml")?);
//! let member = factory.entity("member")?;
//! let (username, age) = (member.col("username")?, member.col("age")?);
//! let name: Option<&str> = Some("member1");
//! let query = factory
//!     .select(Projection::<Option<String>>::scalar(username.clone()))
//!     .from([&member])
//!     .filter([
//!         name.map(|n| username.clone().eq(n)),
//!         Some(age.clone().gte(18)),
//!     ])
//!     .order_by([OrderByExpr::desc(age)])
//!     .build()?;
//!
//! let mut conn = SqliteConnection::open_in_memory()?;
//! let names = Executor::new().fetch_all(&mut conn, &query)?;
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod factory;
pub mod projection;
pub mod schema;
pub mod sql;
pub mod value;

// Re-export SQL submodules at crate level
pub use sql::ddl;
pub use sql::dialect;
pub use sql::dml;
pub use sql::expr;
pub use sql::predicate;
pub use sql::query;
pub use sql::token;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::dialect::{Dialect, SqlDialect};
    pub use crate::error::{QueryError, QueryResult};
    pub use crate::executor::{Connection, Executor, Page, SqliteConnection};
    pub use crate::expr::{
        // Constructors
        avg,
        coalesce,
        count,
        count_distinct,
        count_star,
        func,
        lit,
        lower,
        max,
        min,
        null,
        star,
        sum,
        template,
        upper,
        // Types
        CaseBuilder,
        Expr,
        ExprExt,
    };
    pub use crate::factory::QueryFactory;
    pub use crate::predicate::{all, any, Predicate, PredicateBuilder};
    pub use crate::projection::{Bean, Construct, Projection, Record, Tuple};
    pub use crate::query::{OrderByExpr, Query, SelectExpr};
    pub use crate::schema::{EntityPath, Schema, TableDef};
    pub use crate::shape;
    pub use crate::sql::functions::FunctionMap;
    pub use crate::value::{FromValue, Value, ValueType};
}

// Also export at crate root for convenience
pub use error::{QueryError, QueryResult};
pub use executor::{Executor, Page, SqliteConnection};
pub use factory::QueryFactory;
pub use projection::Projection;
pub use schema::Schema;
pub use value::{Value, ValueType};
