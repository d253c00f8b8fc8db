//! Type definitions for database schema objects

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Reserved name of the primary key index
pub const PRIMARY_INDEX: &str = "PRIMARY";

/// Comment attached to every FULLTEXT index
pub const FULLTEXT_TOKENIZER_COMMENT: &str = r#"'tokenizer "TokenBigramSplitSymbolAlphaDigit"'"#;

/// Conventional display width for integer types that were declared without a size.
///
/// Returns `None` for types that carry no implicit width.
pub fn default_display_width(data_type: &str, unsigned: bool) -> Option<&'static str> {
    let width = match (data_type, unsigned) {
        ("int", false) => "11",
        ("int", true) => "10",
        ("bigint", _) => "20",
        ("tinyint", false) => "4",
        ("tinyint", true) => "3",
        ("smallint", false) => "6",
        ("smallint", true) => "5",
        ("mediumint", false) => "9",
        ("mediumint", true) => "8",
        _ => return None,
    };
    Some(width)
}

/// One side of a comparison: either the declared or the live schema
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSchema {
    pub tables: IndexMap<String, Table>,
}

impl DatabaseSchema {
    /// Create a new empty database schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table to the schema, keeping declaration order
    pub fn add_table(&mut self, table: Table) {
        self.tables.insert(table.name.clone(), table);
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Represents a database table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: IndexMap<String, Column>,
    pub indexes: IndexMap<String, Index>,
    pub partition: Option<Partition>,
    pub engine: Option<String>,
}

impl Table {
    /// Create a new table with the given name
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            columns: IndexMap::new(),
            indexes: IndexMap::new(),
            partition: None,
            engine: None,
        }
    }

    /// Add a column to the table. Returns the previous column of the same name, if any.
    pub fn add_column(&mut self, column: Column) -> Option<Column> {
        self.columns.insert(column.name.clone(), column)
    }

    /// Add an index to the table. Returns the previous index of the same name, if any.
    pub fn add_index(&mut self, index: Index) -> Option<Index> {
        self.indexes.insert(index.name.clone(), index)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    /// Name of the column declared immediately before `name`, if any
    pub fn predecessor_of(&self, name: &str) -> Option<&str> {
        let position = self.columns.get_index_of(name)?;
        if position == 0 {
            return None;
        }
        self.columns
            .get_index(position - 1)
            .map(|(name, _)| name.as_str())
    }

    pub fn auto_increment_column(&self) -> Option<&Column> {
        self.columns.values().find(|c| c.auto_increment)
    }

    /// Columns forming the primary key at create time.
    ///
    /// An auto-increment column is the sole key even when a PRIMARY index was declared.
    pub fn primary_key(&self) -> Vec<&str> {
        if let Some(column) = self.auto_increment_column() {
            return vec![column.name.as_str()];
        }
        self.indexes
            .get(PRIMARY_INDEX)
            .map(|idx| idx.columns.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn has_primary_key(&self) -> bool {
        !self.primary_key().is_empty()
    }

    /// Indexes other than PRIMARY, in declaration order
    pub fn secondary_indexes(&self) -> impl Iterator<Item = &Index> {
        self.indexes.values().filter(|idx| !idx.is_primary())
    }
}

/// Represents a database column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: String,
    pub size: String,
    pub unsigned: bool,
    pub nullable: bool,
    pub auto_increment: bool,
    /// `None` means no default; `Some("")` is an explicit empty default
    pub default: Option<String>,
}

impl Column {
    /// Create a new NOT NULL column with the given name and type
    pub fn new(name: &str, data_type: &str) -> Self {
        Self {
            name: name.to_string(),
            data_type: data_type.to_lowercase(),
            size: String::new(),
            unsigned: false,
            nullable: false,
            auto_increment: false,
            default: None,
        }
    }

    pub fn size(mut self, size: &str) -> Self {
        self.size = size.to_string();
        self
    }

    pub fn unsigned(mut self, unsigned: bool) -> Self {
        self.unsigned = unsigned;
        self
    }

    /// Set whether the column is nullable
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn auto_increment(mut self, auto_increment: bool) -> Self {
        self.auto_increment = auto_increment;
        self
    }

    /// Set a default value for the column
    pub fn default(mut self, default: &str) -> Self {
        self.default = Some(default.to_string());
        self
    }

    /// Fill an empty size with the conventional display width for the type.
    ///
    /// Both the declared and the live side go through this so that `int` and
    /// `int(11)` compare equal.
    pub fn normalized(mut self) -> Self {
        if self.size.is_empty() {
            if let Some(width) = default_display_width(&self.data_type, self.unsigned) {
                self.size = width.to_string();
            }
        }
        self
    }

    /// Whether `size` is just the implicit display width
    pub fn has_default_size(&self) -> bool {
        self.size.is_empty()
            || default_display_width(&self.data_type, self.unsigned) == Some(self.size.as_str())
    }
}

/// Index kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexKind {
    #[default]
    BTree,
    FullText,
}

/// Represents an index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    pub table: String,
    pub name: String,
    pub columns: Vec<String>,
    pub is_unique: bool,
    pub kind: IndexKind,
    pub comment: Option<String>,
}

impl Index {
    pub fn new(table: &str, name: &str, columns: Vec<String>) -> Self {
        Self {
            table: table.to_string(),
            name: name.to_string(),
            columns,
            is_unique: false,
            kind: IndexKind::BTree,
            comment: None,
        }
    }

    /// The PRIMARY index of a table
    pub fn primary(table: &str, columns: Vec<String>) -> Self {
        Self::new(table, PRIMARY_INDEX, columns).unique()
    }

    pub fn unique(mut self) -> Self {
        self.is_unique = true;
        self
    }

    /// Mark as FULLTEXT, attaching the tokenizer comment
    pub fn fulltext(mut self) -> Self {
        self.kind = IndexKind::FullText;
        self.comment = Some(FULLTEXT_TOKENIZER_COMMENT.to_string());
        self
    }

    pub fn is_primary(&self) -> bool {
        self.name == PRIMARY_INDEX
    }
}

/// Partitioning strategy. Only RANGE is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartitionStrategy {
    Range,
}

impl PartitionStrategy {
    pub fn keyword(&self) -> &'static str {
        match self {
            PartitionStrategy::Range => "RANGE",
        }
    }
}

/// Range partitioning synthesized from start/end ordinals and a bucket size
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub strategy: PartitionStrategy,
    pub key_column: String,
    pub base_name: String,
    pub start: u64,
    pub end: u64,
    pub each_row: u64,
}

/// Upper bound of one synthesized partition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionBound {
    LessThan(u64),
    MaxValue,
}

impl Partition {
    /// Partitions `{base}{i}` for i in `start..=end`; the last one is bounded by MAXVALUE
    pub fn partitions(&self) -> Vec<(String, PartitionBound)> {
        (self.start..=self.end)
            .map(|i| {
                let bound = if i == self.end {
                    PartitionBound::MaxValue
                } else {
                    PartitionBound::LessThan(i * self.each_row)
                };
                (format!("{}{}", self.base_name, i), bound)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_display_width_by_signedness() {
        assert_eq!(Column::new("a", "INT").normalized().size, "11");
        assert_eq!(Column::new("a", "int").unsigned(true).normalized().size, "10");
        assert_eq!(Column::new("a", "bigint").unsigned(true).normalized().size, "20");
        assert_eq!(Column::new("a", "tinyint").normalized().size, "4");
        assert_eq!(Column::new("a", "mediumint").unsigned(true).normalized().size, "8");
        assert_eq!(Column::new("a", "text").normalized().size, "");
        assert_eq!(Column::new("a", "int").size("5").normalized().size, "5");
    }

    #[test]
    fn auto_increment_wins_over_declared_primary() {
        let mut table = Table::new("users");
        table.add_column(Column::new("code", "varchar").size("8"));
        table.add_column(Column::new("id", "int").auto_increment(true).normalized());
        table.add_index(Index::primary("users", vec!["code".into()]));

        assert_eq!(table.primary_key(), vec!["id"]);
    }

    #[test]
    fn declared_primary_keeps_index_order() {
        let mut table = Table::new("t");
        table.add_column(Column::new("a", "int"));
        table.add_column(Column::new("b", "int"));
        table.add_index(Index::primary("t", vec!["b".into(), "a".into()]));

        assert_eq!(table.primary_key(), vec!["b", "a"]);
        assert_eq!(table.secondary_indexes().count(), 0);
    }

    #[test]
    fn predecessor_follows_declaration_order() {
        let mut table = Table::new("t");
        table.add_column(Column::new("a", "int"));
        table.add_column(Column::new("b", "int"));

        assert_eq!(table.predecessor_of("a"), None);
        assert_eq!(table.predecessor_of("b"), Some("a"));
        assert_eq!(table.predecessor_of("zzz"), None);
    }

    #[test]
    fn terminal_partition_is_maxvalue() {
        let partition = Partition {
            strategy: PartitionStrategy::Range,
            key_column: "id".into(),
            base_name: "p".into(),
            start: 1,
            end: 3,
            each_row: 10000,
        };

        assert_eq!(
            partition.partitions(),
            vec![
                ("p1".to_string(), PartitionBound::LessThan(10000)),
                ("p2".to_string(), PartitionBound::LessThan(20000)),
                ("p3".to_string(), PartitionBound::MaxValue),
            ]
        );
    }
}
