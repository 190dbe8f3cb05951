//! Schema model: tables, columns and declared relationships.
//!
//! A [`Schema`] is the only source of column references. Entity handles
//! ([`EntityPath`]) are bound to a table definition and hand out typed column
//! expressions, so a query can only name columns the schema declares.
//!
//! Schemas are built in code with [`SchemaBuilder`] or loaded from TOML:
//!
//! ```toml
//! [[tables]]
//! name = "team"
//! primary_key = "id"
//! columns = [
//!   { name = "id", type = "int" },
//!   { name = "name", type = "text" },
//! ]
//!
//! [[relationships]]
//! name = "team"
//! from = "member.team_id"
//! to = "team.id"
//! inverse = "members"
//! ```

mod entity;

pub use entity::{EntityPath, RelationPath};

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{QueryError, QueryResult};
use crate::value::ValueType;

/// Error type for schema construction and loading.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Schema file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read schema file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse schema file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Duplicate table: {0}")]
    DuplicateTable(String),

    #[error("Duplicate column {column} on table {table}")]
    DuplicateColumn { table: String, column: String },

    #[error("Duplicate relationship {name} on table {table}")]
    DuplicateRelationship { table: String, name: String },

    #[error("Unknown type {type_name} for column {table}.{column}")]
    UnknownType {
        table: String,
        column: String,
        type_name: String,
    },

    #[error("Relationship {name} references unknown column {reference}")]
    UnknownReference { name: String, reference: String },

    #[error("Invalid column reference '{0}', expected table.column")]
    InvalidReference(String),

    #[error("Relationship {name} joins {from} ({from_type}) to {to} ({to_type})")]
    IncompatibleKeys {
        name: String,
        from: String,
        from_type: ValueType,
        to: String,
        to_type: ValueType,
    },
}

// =============================================================================
// Definitions
// =============================================================================

/// A column declared on a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub value_type: ValueType,
    pub nullable: bool,
}

/// A foreign-key relationship, oriented from the table that owns it.
///
/// Joining along a relationship produces `owner.from_column = target.to_column`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipDef {
    pub name: String,
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
}

/// A table and everything declared on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDef {
    pub name: String,
    pub primary_key: Option<String>,
    pub columns: Vec<ColumnDef>,
    pub relationships: Vec<RelationshipDef>,
}

impl TableDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: None,
            columns: Vec::new(),
            relationships: Vec::new(),
        }
    }

    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = Some(column.into());
        self
    }

    /// Add a NOT NULL column.
    pub fn column(mut self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.columns.push(ColumnDef {
            name: name.into(),
            value_type,
            nullable: false,
        });
        self
    }

    /// Add a nullable column.
    pub fn nullable_column(mut self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.columns.push(ColumnDef {
            name: name.into(),
            value_type,
            nullable: true,
        });
        self
    }

    pub fn find_column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn find_relationship(&self, name: &str) -> Option<&RelationshipDef> {
        self.relationships.iter().find(|r| r.name == name)
    }
}

// =============================================================================
// Schema
// =============================================================================

/// An immutable set of tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    tables: BTreeMap<String, Arc<TableDef>>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Look up a table by name.
    pub fn table(&self, name: &str) -> QueryResult<&Arc<TableDef>> {
        self.tables
            .get(name)
            .ok_or_else(|| QueryError::UnknownTable(name.to_string()))
    }

    /// Tables in name order.
    pub fn tables(&self) -> impl Iterator<Item = &Arc<TableDef>> {
        self.tables.values()
    }

    /// Parse a schema from TOML source.
    pub fn from_toml_str(source: &str) -> Result<Self, SchemaError> {
        let file: SchemaFile = toml::from_str(source)?;
        file.into_schema()
    }

    /// Load a schema from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SchemaError::FileNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

/// Pending relationship declaration, resolved at `build()`.
#[derive(Debug, Clone)]
struct PendingRelationship {
    name: String,
    from: String,
    to: String,
    inverse: Option<String>,
}

/// Builder for [`Schema`]. Validation happens in [`SchemaBuilder::build`].
#[derive(Debug, Clone, Default)]
#[must_use = "SchemaBuilder has no effect until build() is called"]
pub struct SchemaBuilder {
    tables: Vec<TableDef>,
    relationships: Vec<PendingRelationship>,
}

impl SchemaBuilder {
    pub fn table(mut self, table: TableDef) -> Self {
        self.tables.push(table);
        self
    }

    /// Declare a relationship `name` on the table of `from`.
    ///
    /// `from` and `to` are `table.column` references.
    pub fn relationship(
        mut self,
        name: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        self.relationships.push(PendingRelationship {
            name: name.into(),
            from: from.into(),
            to: to.into(),
            inverse: None,
        });
        self
    }

    /// Like [`relationship`](Self::relationship), also registering the
    /// reverse direction on the target table as `inverse`.
    pub fn relationship_with_inverse(
        mut self,
        name: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        inverse: impl Into<String>,
    ) -> Self {
        self.relationships.push(PendingRelationship {
            name: name.into(),
            from: from.into(),
            to: to.into(),
            inverse: Some(inverse.into()),
        });
        self
    }

    pub fn build(self) -> Result<Schema, SchemaError> {
        let mut tables: BTreeMap<String, TableDef> = BTreeMap::new();

        for table in self.tables {
            let mut seen = Vec::with_capacity(table.columns.len());
            for column in &table.columns {
                if seen.contains(&column.name.as_str()) {
                    return Err(SchemaError::DuplicateColumn {
                        table: table.name.clone(),
                        column: column.name.clone(),
                    });
                }
                seen.push(column.name.as_str());
            }
            if let Some(pk) = &table.primary_key {
                if table.find_column(pk).is_none() {
                    return Err(SchemaError::UnknownReference {
                        name: "primary_key".into(),
                        reference: format!("{}.{}", table.name, pk),
                    });
                }
            }
            if tables.contains_key(&table.name) {
                return Err(SchemaError::DuplicateTable(table.name));
            }
            tables.insert(table.name.clone(), table);
        }

        for rel in self.relationships {
            let (from_table, from_column) = split_reference(&rel.from)?;
            let (to_table, to_column) = split_reference(&rel.to)?;
            let from_type = column_type(&tables, &rel.name, &from_table, &from_column)?;
            let to_type = column_type(&tables, &rel.name, &to_table, &to_column)?;
            if !from_type.is_comparable(to_type) {
                return Err(SchemaError::IncompatibleKeys {
                    name: rel.name,
                    from: rel.from,
                    from_type,
                    to: rel.to,
                    to_type,
                });
            }

            let forward = RelationshipDef {
                name: rel.name,
                from_table: from_table.clone(),
                from_column: from_column.clone(),
                to_table: to_table.clone(),
                to_column: to_column.clone(),
            };
            add_relationship(&mut tables, forward)?;

            if let Some(inverse) = rel.inverse {
                let backward = RelationshipDef {
                    name: inverse,
                    from_table: to_table,
                    from_column: to_column,
                    to_table: from_table,
                    to_column: from_column,
                };
                add_relationship(&mut tables, backward)?;
            }
        }

        Ok(Schema {
            tables: tables
                .into_iter()
                .map(|(name, table)| (name, Arc::new(table)))
                .collect(),
        })
    }
}

fn split_reference(reference: &str) -> Result<(String, String), SchemaError> {
    match reference.split_once('.') {
        Some((table, column)) if !table.is_empty() && !column.is_empty() => {
            Ok((table.to_string(), column.to_string()))
        }
        _ => Err(SchemaError::InvalidReference(reference.to_string())),
    }
}

fn column_type(
    tables: &BTreeMap<String, TableDef>,
    relationship: &str,
    table: &str,
    column: &str,
) -> Result<ValueType, SchemaError> {
    tables
        .get(table)
        .and_then(|t| t.find_column(column))
        .map(|c| c.value_type)
        .ok_or_else(|| SchemaError::UnknownReference {
            name: relationship.to_string(),
            reference: format!("{}.{}", table, column),
        })
}

fn add_relationship(
    tables: &mut BTreeMap<String, TableDef>,
    rel: RelationshipDef,
) -> Result<(), SchemaError> {
    // Both ends were resolved by column_type, so the owner exists.
    let Some(owner) = tables.get_mut(&rel.from_table) else {
        return Err(SchemaError::UnknownReference {
            name: rel.name.clone(),
            reference: rel.from_table.clone(),
        });
    };
    if owner.find_relationship(&rel.name).is_some() || owner.find_column(&rel.name).is_some() {
        return Err(SchemaError::DuplicateRelationship {
            table: rel.from_table,
            name: rel.name,
        });
    }
    owner.relationships.push(rel);
    Ok(())
}

// =============================================================================
// TOML file format
// =============================================================================

#[derive(Debug, Deserialize)]
struct SchemaFile {
    #[serde(default)]
    tables: Vec<TableFile>,
    #[serde(default)]
    relationships: Vec<RelationshipFile>,
}

#[derive(Debug, Deserialize)]
struct TableFile {
    name: String,
    primary_key: Option<String>,
    #[serde(default)]
    columns: Vec<ColumnFile>,
}

#[derive(Debug, Deserialize)]
struct ColumnFile {
    name: String,
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default)]
    nullable: bool,
}

#[derive(Debug, Deserialize)]
struct RelationshipFile {
    name: String,
    from: String,
    to: String,
    inverse: Option<String>,
}

impl SchemaFile {
    fn into_schema(self) -> Result<Schema, SchemaError> {
        let mut builder = Schema::builder();

        for table in self.tables {
            let mut def = TableDef::new(&table.name);
            def.primary_key = table.primary_key;
            for column in table.columns {
                let value_type = ValueType::parse(&column.type_name).ok_or_else(|| {
                    SchemaError::UnknownType {
                        table: table.name.clone(),
                        column: column.name.clone(),
                        type_name: column.type_name.clone(),
                    }
                })?;
                def.columns.push(ColumnDef {
                    name: column.name,
                    value_type,
                    nullable: column.nullable,
                });
            }
            builder = builder.table(def);
        }

        for rel in self.relationships {
            builder = match rel.inverse {
                Some(inverse) => builder.relationship_with_inverse(rel.name, rel.from, rel.to, inverse),
                None => builder.relationship(rel.name, rel.from, rel.to),
            };
        }

        builder.build()
    }
}
