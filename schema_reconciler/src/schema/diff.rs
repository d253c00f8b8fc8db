//! Schema difference calculator
//!
//! This module compares the declared schema with the live one and calculates
//! the changes needed to converge, grouped in the order they must be applied.

use serde::Serialize;

use crate::schema::types::{Column, DatabaseSchema, Index, Table};

/// Changes needed to converge the live schema to the declared one.
///
/// Buckets are applied in field order: table drops, table creates, column
/// drops, column adds, column modifies, index drops, index adds.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SchemaDiff {
    pub tables_to_drop: Vec<String>,
    pub tables_to_create: Vec<Table>,
    pub columns_to_drop: Vec<ColumnDrop>,
    pub columns_to_add: Vec<ColumnAddition>,
    pub columns_to_alter: Vec<ColumnChange>,
    pub indices_to_drop: Vec<IndexDrop>,
    pub indices_to_create: Vec<Index>,
}

/// A column present live but no longer declared
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnDrop {
    pub table: String,
    pub column: String,
}

/// A declared column missing from the live table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnAddition {
    pub table: String,
    pub column: Column,
    /// Column declared immediately before this one; `None` places it first
    pub after: Option<String>,
}

/// Represents a column change
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnChange {
    pub table: String,
    pub column_name: String,
    pub from: Column,
    pub to: Column,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexDrop {
    pub table: String,
    pub index: String,
}

impl SchemaDiff {
    /// Generate a schema diff from the live (`current`) to the declared (`target`) schema
    pub fn generate(current_schema: &DatabaseSchema, target_schema: &DatabaseSchema) -> Self {
        let mut diff = Self::default();

        // Tables to drop (live but not declared); their columns and indexes go with them
        diff.tables_to_drop = current_schema
            .tables
            .keys()
            .filter(|name| target_schema.table(name).is_none())
            .cloned()
            .collect();

        for target_table in target_schema.tables.values() {
            match current_schema.table(&target_table.name) {
                None => {
                    diff.tables_to_create.push(target_table.clone());
                    // CREATE TABLE only embeds the primary key
                    diff.indices_to_create
                        .extend(target_table.secondary_indexes().cloned());
                }
                Some(current_table) => {
                    diff.diff_columns(current_table, target_table);
                    diff.diff_indexes(current_table, target_table);
                }
            }
        }

        diff
    }

    fn diff_columns(&mut self, current: &Table, target: &Table) {
        if current.columns == target.columns {
            return;
        }

        for column in current.columns.values() {
            if target.column(&column.name).is_none() {
                self.columns_to_drop.push(ColumnDrop {
                    table: current.name.clone(),
                    column: column.name.clone(),
                });
            }
        }

        for column in target.columns.values() {
            match current.column(&column.name) {
                None => self.columns_to_add.push(ColumnAddition {
                    table: target.name.clone(),
                    column: column.clone(),
                    after: target.predecessor_of(&column.name).map(str::to_string),
                }),
                Some(existing) if existing != column => {
                    tracing::debug!(
                        table = %target.name,
                        column = %column.name,
                        from = ?existing,
                        to = ?column,
                        "column definition differs"
                    );
                    self.columns_to_alter.push(ColumnChange {
                        table: target.name.clone(),
                        column_name: column.name.clone(),
                        from: existing.clone(),
                        to: column.clone(),
                    });
                }
                Some(_) => {}
            }
        }
    }

    /// PRIMARY is settled at create time and never diffed afterwards
    fn diff_indexes(&mut self, current: &Table, target: &Table) {
        for index in target.secondary_indexes() {
            match current.indexes.get(&index.name) {
                None => self.indices_to_create.push(index.clone()),
                Some(existing) if !Self::same_index(existing, index) => {
                    self.indices_to_drop.push(IndexDrop {
                        table: current.name.clone(),
                        index: existing.name.clone(),
                    });
                    self.indices_to_create.push(index.clone());
                }
                Some(_) => {}
            }
        }

        for index in current.secondary_indexes() {
            if !target.indexes.contains_key(&index.name) {
                self.indices_to_drop.push(IndexDrop {
                    table: current.name.clone(),
                    index: index.name.clone(),
                });
            }
        }
    }

    fn same_index(current: &Index, target: &Index) -> bool {
        current.columns == target.columns
            && current.is_unique == target.is_unique
            && current.kind == target.kind
    }

    /// Check if the diff is empty (no changes needed)
    pub fn is_empty(&self) -> bool {
        self.tables_to_drop.is_empty()
            && self.tables_to_create.is_empty()
            && self.columns_to_drop.is_empty()
            && self.columns_to_add.is_empty()
            && self.columns_to_alter.is_empty()
            && self.indices_to_drop.is_empty()
            && self.indices_to_create.is_empty()
    }

    /// Total number of changes across all buckets
    pub fn len(&self) -> usize {
        self.tables_to_drop.len()
            + self.tables_to_create.len()
            + self.columns_to_drop.len()
            + self.columns_to_add.len()
            + self.columns_to_alter.len()
            + self.indices_to_drop.len()
            + self.indices_to_create.len()
    }
}
