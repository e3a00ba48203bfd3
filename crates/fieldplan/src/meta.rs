//! Table metadata: the per-type descriptors the mapper walks.
//!
//! Descriptors are built once per model type (the derive caches them in a
//! `OnceLock`) and live for the rest of the process.

use crate::field::{RefBuilder, Target};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// A struct that maps to a table.
///
/// Usually derived with `#[derive(Model)]`; a hand-written impl needs a
/// `'static` [`TableDef`] and a reference type built from a [`RefBuilder`].
pub trait Model: Serialize + DeserializeOwned + Default + Send + Sync + 'static {
    /// Reference type holding one handle per column.
    type Ref: Target<Model = Self> + Send + Sync + 'static;

    fn table_def() -> &'static TableDef;

    fn build_ref(builder: &mut RefBuilder) -> Self::Ref;

    /// A fresh reference with its own field tokens.
    fn fields() -> Self::Ref {
        Self::build_ref(&mut RefBuilder::new())
    }
}

/// Table descriptor.
#[derive(Debug, Clone)]
pub struct TableDef {
    pub schema: Option<&'static str>,
    pub name: &'static str,
    pub columns: Vec<ColumnDef>,
    /// JSON rendering of the model's `Default`, used as the decode skeleton.
    pub default_value: fn() -> serde_json::Value,
}

impl TableDef {
    pub fn new(name: &'static str) -> Self {
        Self {
            schema: None,
            name,
            columns: Vec::new(),
            default_value: empty_object,
        }
    }

    pub fn schema(mut self, schema: &'static str) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    pub fn default_value(mut self, default_value: fn() -> serde_json::Value) -> Self {
        self.default_value = default_value;
        self
    }

    /// Look up a column by its database name.
    pub fn column_named(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|col| col.name == name)
    }

    pub fn primary_keys(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter().filter(|col| col.primary_key)
    }
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// Column descriptor.
#[derive(Debug, Clone)]
pub struct ColumnDef {
    /// Database column name (for relations, the relation's name).
    pub name: &'static str,
    /// Rust field name, which is also the serde key.
    pub field: &'static str,
    pub transient: bool,
    pub primary_key: bool,
    /// Columns elsewhere that hold this column's value as a foreign key.
    pub referenced_by: Vec<&'static str>,
    pub relation: Option<Relation>,
}

impl ColumnDef {
    pub fn new(name: &'static str, field: &'static str) -> Self {
        Self {
            name,
            field,
            transient: false,
            primary_key: false,
            referenced_by: Vec::new(),
            relation: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }

    pub fn referenced_by(mut self, column: &'static str) -> Self {
        self.referenced_by.push(column);
        self
    }

    /// Mark this column as a relation. Relations are never selected directly.
    pub fn relation(mut self, relation: Relation) -> Self {
        self.transient = true;
        self.relation = Some(relation);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// This row holds the foreign key (`Option<T>` or `T` field).
    BelongsTo,
    /// Related rows hold the foreign key (`Vec<T>` field).
    HasMany,
}

/// A relation from one table to another.
#[derive(Debug, Clone)]
pub struct Relation {
    pub kind: RelationKind,
    pub target: fn() -> &'static TableDef,
    /// Prefix for aliases of the related table's columns, e.g. `team_`.
    pub join_prefix: &'static str,
    /// `(related column, local column)` pairs that carry the same value.
    pub links: Vec<(&'static str, &'static str)>,
}

impl Relation {
    pub fn belongs_to(
        target: fn() -> &'static TableDef,
        join_prefix: &'static str,
        target_key: &'static str,
        foreign_key: &'static str,
    ) -> Self {
        Self {
            kind: RelationKind::BelongsTo,
            target,
            join_prefix,
            links: vec![(target_key, foreign_key)],
        }
    }

    pub fn has_many(
        target: fn() -> &'static TableDef,
        join_prefix: &'static str,
        foreign_key: &'static str,
        key: &'static str,
    ) -> Self {
        Self {
            kind: RelationKind::HasMany,
            target,
            join_prefix,
            links: vec![(foreign_key, key)],
        }
    }

    pub fn is_many(&self) -> bool {
        self.kind == RelationKind::HasMany
    }

    /// Whether `column` of the related table is one of the link columns.
    pub fn links_column(&self, column: &str) -> bool {
        self.links.iter().any(|(remote, _)| *remote == column)
    }
}
