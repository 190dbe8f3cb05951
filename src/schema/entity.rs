//! Entity handles: a table bound to a source alias.

use std::sync::Arc;

use super::{RelationshipDef, TableDef};
use crate::error::{QueryError, QueryResult};
use crate::sql::expr::{Column, Expr, ExprExt};
use crate::sql::predicate::Predicate;

/// A table as it appears in a query under an alias.
///
/// All column references are obtained through an entity, so a column always
/// exists on the table it claims to belong to.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityPath {
    table: Arc<TableDef>,
    alias: String,
}

impl EntityPath {
    pub fn new(table: Arc<TableDef>, alias: impl Into<String>) -> Self {
        Self {
            table,
            alias: alias.into(),
        }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn table_name(&self) -> &str {
        &self.table.name
    }

    pub fn table(&self) -> &TableDef {
        &self.table
    }

    /// Column `name` of this entity.
    pub fn col(&self, name: &str) -> QueryResult<Expr> {
        self.table
            .find_column(name)
            .map(|def| Expr::Column(Column::new(&self.alias, &self.table.name, def)))
            .ok_or_else(|| QueryError::UnknownColumn {
                table: self.table.name.clone(),
                column: name.to_string(),
            })
    }

    /// Every column, in declaration order.
    pub fn columns(&self) -> Vec<Expr> {
        self.table
            .columns
            .iter()
            .map(|def| Expr::Column(Column::new(&self.alias, &self.table.name, def)))
            .collect()
    }

    /// `alias.*`
    pub fn star(&self) -> Expr {
        Expr::Star {
            source: Some(self.alias.clone()),
        }
    }

    /// Relationship `name` declared on this entity's table.
    pub fn relation(&self, name: &str) -> QueryResult<RelationPath> {
        self.table
            .find_relationship(name)
            .map(|def| RelationPath {
                owner: self.clone(),
                def: def.clone(),
            })
            .ok_or_else(|| QueryError::UnknownRelationship {
                table: self.table.name.clone(),
                name: name.to_string(),
            })
    }
}

/// A relationship navigated from a specific source, e.g. `member.team`.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationPath {
    owner: EntityPath,
    def: RelationshipDef,
}

impl RelationPath {
    pub fn name(&self) -> &str {
        &self.def.name
    }

    /// Alias of the source the relationship is navigated from.
    pub fn owner_alias(&self) -> &str {
        self.owner.alias()
    }

    pub fn target_table(&self) -> &str {
        &self.def.to_table
    }

    /// Join condition `owner.from_column = target.to_column`.
    pub(crate) fn join_condition(&self, target: &EntityPath) -> QueryResult<Predicate> {
        if target.table_name() != self.def.to_table {
            return Err(QueryError::InvalidJoin(format!(
                "relationship {}.{} targets {}, not {}",
                self.def.from_table,
                self.def.name,
                self.def.to_table,
                target.table_name()
            )));
        }
        let from = self.owner.col(&self.def.from_column)?;
        let to = target.col(&self.def.to_column)?;
        Ok(from.eq(to))
    }
}
