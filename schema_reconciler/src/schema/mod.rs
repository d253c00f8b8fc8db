//! Schema module
//!
//! This module handles the declarative document, live introspection,
//! comparison and DDL generation.

pub mod analyzer;
pub mod diff;
pub mod document;
pub mod export;
pub mod generator;
pub mod types;

// Re-export key types
pub use analyzer::{Analyzer, Introspection, RowError, SchemaAnalyzer};
pub use diff::{ColumnAddition, ColumnChange, ColumnDrop, IndexDrop, SchemaDiff};
pub use document::SchemaDocument;
pub use export::export_schema;
pub use generator::generate_migration_sql;
pub use types::{
    Column, DatabaseSchema, Index, IndexKind, Partition, PartitionBound, PartitionStrategy, Table,
};
