//! Declarative schema document
//!
//! The TOML document is decoded into the typed structs below and validated
//! once, producing a normalized [`DatabaseSchema`].

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::schema::types::{Column, DatabaseSchema, Index, Partition, PartitionStrategy, Table};

/// Types whose size must always be declared
const SIZE_REQUIRED_TYPES: &[&str] = &["char", "varchar"];

/// MySQL limit on partitions per table
const MAX_PARTITIONS: u64 = 8192;

/// A string field that may also be written as a bare integer
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Text(String),
    Integer(i64),
}

impl Scalar {
    pub fn into_string(self) -> String {
        match self {
            Scalar::Text(s) => s,
            Scalar::Integer(n) => n.to_string(),
        }
    }
}

/// The `[[tables]]` part of a declarative document
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchemaDocument {
    #[serde(default)]
    pub tables: Vec<TableDocument>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableDocument {
    pub name: Option<String>,
    pub columns: Option<Vec<ColumnDocument>>,
    #[serde(default)]
    pub primary: Vec<String>,
    #[serde(default)]
    pub index: Vec<String>,
    #[serde(default)]
    pub unique_index: Vec<String>,
    #[serde(default)]
    pub fulltext_index: Vec<String>,
    pub partition: Option<PartitionDocument>,
    pub engine: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnDocument {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub data_type: Option<String>,
    pub size: Option<Scalar>,
    #[serde(default)]
    pub unsigned: bool,
    #[serde(default)]
    pub null: bool,
    #[serde(default)]
    pub autoinc: bool,
    pub default: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartitionDocument {
    #[serde(rename = "type")]
    pub partition_type: String,
    pub key: String,
    pub basename: String,
    pub start: Scalar,
    pub end: Scalar,
    pub each: Scalar,
}

/// Name given to a declared secondary index: `idx_<table>_<a>_and_<b>`
pub fn index_name(table: &str, columns: &[String]) -> String {
    format!("idx_{}_{}", table, columns.join("_and_"))
}

/// Split a comma-joined column list, skipping empty declarations
fn split_columns(declaration: &str) -> Option<Vec<String>> {
    if declaration.trim().is_empty() {
        return None;
    }
    Some(
        declaration
            .split(',')
            .map(|c| c.trim().to_string())
            .collect(),
    )
}

impl SchemaDocument {
    /// Decode a document holding only `[[tables]]` entries
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Validate and normalize every table into a schema
    pub fn into_schema(self) -> Result<DatabaseSchema> {
        let mut schema = DatabaseSchema::new();
        for (position, table_doc) in self.tables.into_iter().enumerate() {
            let table = table_doc.into_table(position)?;
            if schema.table(&table.name).is_some() {
                return Err(Error::table(&table.name, "is declared more than once"));
            }
            schema.add_table(table);
        }
        Ok(schema)
    }
}

impl TableDocument {
    /// Build a validated table. `position` only feeds error messages.
    pub fn into_table(self, position: usize) -> Result<Table> {
        let name = self.name.ok_or_else(|| {
            Error::ValidationError(format!("tables[{}]: require table.name", position))
        })?;
        let columns = self
            .columns
            .filter(|columns| !columns.is_empty())
            .ok_or_else(|| Error::table(&name, "require table.columns"))?;

        let mut table = Table::new(&name);
        for (column_position, column_doc) in columns.into_iter().enumerate() {
            let column = column_doc.into_column(&name, column_position)?;
            if column.auto_increment && table.auto_increment_column().is_some() {
                return Err(Error::column(
                    &name,
                    &column.name,
                    "only one auto-increment column is allowed per table",
                ));
            }
            let column_name = column.name.clone();
            if table.add_column(column).is_some() {
                return Err(Error::column(&name, &column_name, "is declared more than once"));
            }
        }

        let mut primary_columns = Vec::new();
        for declaration in &self.primary {
            if let Some(columns) = split_columns(declaration) {
                primary_columns.extend(columns);
            }
        }
        if !primary_columns.is_empty() {
            add_index(&mut table, Index::primary(&name, primary_columns))?;
        }

        for declaration in &self.index {
            if let Some(columns) = split_columns(declaration) {
                let index = Index::new(&name, &index_name(&name, &columns), columns);
                add_index(&mut table, index)?;
            }
        }

        for declaration in &self.unique_index {
            if let Some(columns) = split_columns(declaration) {
                let index = Index::new(&name, &index_name(&name, &columns), columns).unique();
                check_unique_nullability(&table, &index)?;
                add_index(&mut table, index)?;
            }
        }

        for declaration in &self.fulltext_index {
            if let Some(columns) = split_columns(declaration) {
                let index = Index::new(&name, &index_name(&name, &columns), columns).fulltext();
                add_index(&mut table, index)?;
            }
        }

        if let Some(partition_doc) = self.partition {
            let partition = partition_doc.into_partition(&name)?;
            if table.column(&partition.key_column).is_none() {
                return Err(Error::column(
                    &name,
                    &partition.key_column,
                    "is used as partition key but not declared",
                ));
            }
            table.partition = Some(partition);
        }

        table.engine = self.engine.filter(|e| !e.is_empty());

        Ok(table)
    }
}

/// Register an index after checking that it references declared columns only
fn add_index(table: &mut Table, index: Index) -> Result<()> {
    for column in &index.columns {
        if table.column(column).is_none() {
            return Err(Error::column(
                &table.name,
                column,
                format!("is referenced by index {} but not declared", index.name),
            ));
        }
    }
    if table.indexes.contains_key(&index.name) {
        return Err(Error::table(
            &table.name,
            format!("index {} is declared more than once", index.name),
        ));
    }
    table.add_index(index);
    Ok(())
}

/// NOT NULL unique columns belong in the primary key unless the table already has one
fn check_unique_nullability(table: &Table, index: &Index) -> Result<()> {
    if table.has_primary_key() {
        return Ok(());
    }
    for column_name in &index.columns {
        if let Some(column) = table.column(column_name) {
            if !column.nullable {
                return Err(Error::column(
                    &table.name,
                    column_name,
                    "For those that are NOT NULL and UNIQUE, please specify primary",
                ));
            }
        }
    }
    Ok(())
}

impl ColumnDocument {
    fn into_column(self, table: &str, position: usize) -> Result<Column> {
        let name = self.name.ok_or_else(|| {
            Error::table(
                table,
                format!("columns[{}]: require table.column.name", position),
            )
        })?;
        let data_type = self
            .data_type
            .ok_or_else(|| Error::column(table, &name, "require table.column.type"))?
            .to_lowercase();

        let size = self.size.map(Scalar::into_string).unwrap_or_default();
        if size.is_empty() && SIZE_REQUIRED_TYPES.contains(&data_type.as_str()) {
            return Err(Error::column(
                table,
                &name,
                format!("column type {} require size", data_type),
            ));
        }

        let mut column = Column::new(&name, &data_type)
            .size(&size)
            .unsigned(self.unsigned)
            .nullable(self.null)
            .auto_increment(self.autoinc);
        column.default = self.default;

        Ok(column.normalized())
    }
}

impl PartitionDocument {
    fn into_partition(self, table: &str) -> Result<Partition> {
        let strategy = match self.partition_type.to_lowercase().as_str() {
            "range" => PartitionStrategy::Range,
            other => {
                return Err(Error::table(
                    table,
                    format!("partition type {} is not supported", other),
                ))
            }
        };

        let ordinal = |field: &str, value: Scalar| -> Result<u64> {
            let text = value.into_string();
            text.trim().parse::<u64>().map_err(|_| {
                Error::table(
                    table,
                    format!("partition.{} must be a non-negative integer, got {:?}", field, text),
                )
            })
        };
        let start = ordinal("start", self.start)?;
        let end = ordinal("end", self.end)?;
        let each_row = ordinal("each", self.each)?;

        if start > end {
            return Err(Error::table(
                table,
                format!("partition.start {} is greater than partition.end {}", start, end),
            ));
        }
        if each_row == 0 {
            return Err(Error::table(table, "partition.each must be greater than zero"));
        }
        if end - start >= MAX_PARTITIONS {
            return Err(Error::table(
                table,
                format!("partition declares more than {} partitions", MAX_PARTITIONS),
            ));
        }
        // The last bounded partition is `end - 1`; `end` itself is MAXVALUE
        if end.saturating_sub(1).checked_mul(each_row).is_none() {
            return Err(Error::table(
                table,
                format!("partition bound {} * {} overflows", end.saturating_sub(1), each_row),
            ));
        }

        Ok(Partition {
            strategy,
            key_column: self.key,
            base_name: self.basename,
            start,
            end,
            each_row,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::{IndexKind, PRIMARY_INDEX};

    fn load(text: &str) -> Result<DatabaseSchema> {
        SchemaDocument::from_toml_str(text)?.into_schema()
    }

    #[test]
    fn builds_normalized_tables() {
        let schema = load(
            r#"
            [[tables]]
            name = "users"
            columns = [
                {name = "id", type = "INT", unsigned = true, autoinc = true},
                {name = "email", type = "varchar", size = "255", null = true},
                {name = "note", type = "text", null = true, default = ""},
            ]
            primary = ["id"]
            unique_index = ["email"]
            "#,
        )
        .unwrap();

        let users = schema.table("users").unwrap();
        let id = users.column("id").unwrap();
        assert_eq!(id.data_type, "int");
        assert_eq!(id.size, "10");
        assert!(!id.nullable);
        assert_eq!(users.column("note").unwrap().default.as_deref(), Some(""));
        assert_eq!(users.column("email").unwrap().default, None);

        let unique = &users.indexes["idx_users_email"];
        assert!(unique.is_unique);
        assert_eq!(unique.kind, IndexKind::BTree);
        assert!(users.indexes.contains_key(PRIMARY_INDEX));
    }

    #[test]
    fn index_names_join_columns() {
        let schema = load(
            r#"
            [[tables]]
            name = "posts"
            columns = [{name = "a", type = "int"}, {name = "b", type = "int"}, {name = "body", type = "text"}]
            primary = ["a,b"]
            index = ["b,a", ""]
            fulltext_index = ["body"]
            "#,
        )
        .unwrap();

        let posts = schema.table("posts").unwrap();
        assert_eq!(posts.primary_key(), vec!["a", "b"]);
        assert_eq!(posts.indexes["idx_posts_b_and_a"].columns, vec!["b", "a"]);
        let fulltext = &posts.indexes["idx_posts_body"];
        assert_eq!(fulltext.kind, IndexKind::FullText);
        assert!(fulltext.comment.as_deref().unwrap().contains("TokenBigramSplitSymbolAlphaDigit"));
        assert_eq!(posts.indexes.len(), 3);
    }

    #[test]
    fn rejects_missing_keys() {
        let err = load("[[tables]]\ncolumns = []\n").unwrap_err();
        assert!(err.to_string().contains("require table.name"));

        let err = load("[[tables]]\nname = \"t\"\n").unwrap_err();
        assert!(err.to_string().contains("table: t require table.columns"));

        let err = load("[[tables]]\nname = \"t\"\ncolumns = []\n").unwrap_err();
        assert!(err.to_string().contains("table: t require table.columns"));

        let err = load("[[tables]]\nname = \"t\"\ncolumns = [{name = \"a\"}]\n").unwrap_err();
        assert!(err.to_string().contains("column: a require table.column.type"));
    }

    #[test]
    fn rejects_varchar_without_size() {
        let err = load("[[tables]]\nname = \"t\"\ncolumns = [{name = \"a\", type = \"VARCHAR\", null = true}]\n")
            .unwrap_err();
        assert!(err.to_string().contains("column type varchar require size"));
    }

    #[test]
    fn rejects_not_null_unique_without_primary() {
        let err = load(
            r#"
            [[tables]]
            name = "accounts"
            columns = [{name = "login", type = "varchar", size = "32"}]
            unique_index = ["login"]
            "#,
        )
        .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("table: accounts"));
        assert!(message.contains("column: login"));
    }

    #[test]
    fn accepts_not_null_unique_with_primary() {
        let schema = load(
            r#"
            [[tables]]
            name = "accounts"
            columns = [{name = "id", type = "bigint"}, {name = "login", type = "varchar", size = 32}]
            primary = ["id"]
            unique_index = ["login"]
            "#,
        )
        .unwrap();

        assert_eq!(schema.table("accounts").unwrap().column("login").unwrap().size, "32");
    }

    #[test]
    fn auto_increment_counts_as_primary_for_unique() {
        let schema = load(
            r#"
            [[tables]]
            name = "accounts"
            columns = [
                {name = "id", type = "int", unsigned = true, autoinc = true},
                {name = "login", type = "varchar", size = 32},
            ]
            unique_index = ["login"]
            "#,
        )
        .unwrap();

        let accounts = schema.table("accounts").unwrap();
        assert_eq!(accounts.primary_key(), vec!["id"]);
        assert!(accounts.indexes["idx_accounts_login"].is_unique);
    }

    #[test]
    fn rejects_unknown_index_column() {
        let err = load("[[tables]]\nname = \"t\"\ncolumns = [{name = \"a\", type = \"int\"}]\nindex = [\"b\"]\n")
            .unwrap_err();
        assert!(err.to_string().contains("column: b is referenced by index idx_t_b"));
    }

    #[test]
    fn parses_partition_ordinals() {
        let schema = load(
            r#"
            [[tables]]
            name = "logs"
            columns = [{name = "id", type = "bigint", autoinc = true}]
            partition = {type = "range", key = "id", basename = "p", start = "1", end = 3, each = "10000"}
            engine = "Mroonga"
            "#,
        )
        .unwrap();

        let logs = schema.table("logs").unwrap();
        let partition = logs.partition.as_ref().unwrap();
        assert_eq!((partition.start, partition.end, partition.each_row), (1, 3, 10000));
        assert_eq!(logs.engine.as_deref(), Some("Mroonga"));
    }

    #[test]
    fn rejects_overflowing_partition_bounds() {
        let err = load(
            r#"
            [[tables]]
            name = "logs"
            columns = [{name = "id", type = "bigint", unsigned = true}]
            partition = {type = "range", key = "id", basename = "p", start = 1, end = 4, each = 9223372036854775807}
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("table: logs partition bound 3 * 9223372036854775807 overflows"));

        // A single MAXVALUE partition has no bound to overflow
        let schema = load(
            r#"
            [[tables]]
            name = "logs"
            columns = [{name = "id", type = "bigint", unsigned = true}]
            partition = {type = "range", key = "id", basename = "p", start = 1, end = 1, each = 9223372036854775807}
            "#,
        )
        .unwrap();
        assert_eq!(schema.table("logs").unwrap().partition.as_ref().unwrap().partitions().len(), 1);
    }

    #[test]
    fn rejects_too_many_partitions() {
        let err = load(
            r#"
            [[tables]]
            name = "logs"
            columns = [{name = "id", type = "bigint"}]
            partition = {type = "range", key = "id", basename = "p", start = 1, end = 1000000000000, each = 1}
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("more than 8192 partitions"));

        let schema = load(
            r#"
            [[tables]]
            name = "logs"
            columns = [{name = "id", type = "bigint"}]
            partition = {type = "range", key = "id", basename = "p", start = 1, end = 8192, each = 1}
            "#,
        )
        .unwrap();
        assert_eq!(schema.table("logs").unwrap().partition.as_ref().unwrap().partitions().len(), 8192);
    }

    #[test]
    fn rejects_non_range_partition() {
        let err = load(
            r#"
            [[tables]]
            name = "logs"
            columns = [{name = "id", type = "int"}]
            partition = {type = "hash", key = "id", basename = "p", start = "1", end = "2", each = "1"}
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("partition type hash is not supported"));
    }

    #[test]
    fn rejects_duplicate_tables() {
        let err = load(
            "[[tables]]\nname = \"t\"\ncolumns = [{name = \"a\", type = \"int\"}]\n\
             [[tables]]\nname = \"t\"\ncolumns = [{name = \"a\", type = \"int\"}]\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("declared more than once"));
    }
}
