//! Entry point tying a [`Schema`] to the query and mutation builders.
//!
//! ```ignore
//! let factory = QueryFactory::new(schema);
//! let member = factory.entity("member")?;
//! let query = factory
//!     .select(Projection::<Option<String>>::scalar(member.col("username")?))
//!     .from([&member])
//!     .filter(member.col("age")?.gt(18))
//!     .build()?;
//! ```

use std::sync::Arc;

use crate::error::QueryResult;
use crate::projection::{Projection, Record};
use crate::schema::{EntityPath, Schema};
use crate::sql::dml::{DeleteBuilder, InsertBuilder, UpdateBuilder};
use crate::sql::query::QueryBuilder;

/// Hands out entity handles and builders bound to one schema.
#[derive(Debug, Clone)]
pub struct QueryFactory {
    schema: Arc<Schema>,
}

impl QueryFactory {
    pub fn new(schema: impl Into<Arc<Schema>>) -> Self {
        Self {
            schema: schema.into(),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Handle for `table`, aliased by its own name.
    pub fn entity(&self, table: &str) -> QueryResult<EntityPath> {
        self.entity_as(table, table)
    }

    /// Handle for `table` under `alias`; needed to use a table twice.
    pub fn entity_as(&self, table: &str, alias: &str) -> QueryResult<EntityPath> {
        let table = self.schema.table(table)?;
        Ok(EntityPath::new(table.clone(), alias))
    }

    pub fn select<T>(&self, projection: Projection<T>) -> QueryBuilder<T> {
        QueryBuilder::new(self.schema.clone(), projection)
    }

    /// Every column of `entity`, read as a [`Record`], with `entity` as source.
    pub fn select_from(&self, entity: &EntityPath) -> QueryBuilder<Record> {
        self.select(Projection::record(entity)).from([entity])
    }

    pub fn update(&self, entity: &EntityPath) -> UpdateBuilder {
        UpdateBuilder::new(self.schema.clone(), entity)
    }

    pub fn delete(&self, entity: &EntityPath) -> DeleteBuilder {
        DeleteBuilder::new(self.schema.clone(), entity)
    }

    pub fn insert(&self, entity: &EntityPath) -> InsertBuilder {
        InsertBuilder::new(self.schema.clone(), entity)
    }
}
