//! Database schema analyzer
//!
//! This module introspects a live MySQL schema into a [`DatabaseSchema`].

use async_trait::async_trait;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::mysql::MySqlRow;
use sqlx::Row;
use std::collections::HashMap;
use std::fmt;

use crate::db::connection::DatabaseConnection;
use crate::error::{Error, Result};
use crate::schema::types::{
    Column, DatabaseSchema, Index, Partition, PartitionStrategy, Table, PRIMARY_INDEX,
};

/// `type(size) rest`, e.g. `decimal(10,2) unsigned`
static SIZED_TYPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^(]+)\((.+)\)(.*)$").expect("valid column type regex"));

/// Partition layout the live side cannot express; the declared side always starts at 1
const PARTITION_START: u64 = 1;
const PARTITION_EACH_ROW: u64 = 10000;

/// Source of the live schema
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Analyze the named database schema
    async fn analyze_schema(&self, schema_name: &str) -> Result<Introspection>;
}

/// A metadata row that could not be decoded and was skipped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    pub query: &'static str,
    pub table: Option<String>,
    pub message: String,
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(table) => write!(f, "{} row for table {}: {}", self.query, table, self.message),
            None => write!(f, "{} row: {}", self.query, self.message),
        }
    }
}

/// Result of introspection: the schema plus every row that was skipped
#[derive(Debug, Clone, Default)]
pub struct Introspection {
    pub schema: DatabaseSchema,
    pub row_errors: Vec<RowError>,
}

impl Introspection {
    /// Lenient handling: keep the schema, drop the row errors
    pub fn into_lenient(self) -> DatabaseSchema {
        self.schema
    }

    /// Strict handling: the first skipped row fails the run
    pub fn into_strict(self) -> Result<DatabaseSchema> {
        match self.row_errors.into_iter().next() {
            Some(row_error) => Err(Error::SchemaAnalysisError(row_error.to_string())),
            None => Ok(self.schema),
        }
    }
}

/// Schema analyzer for MySQL introspection
pub struct SchemaAnalyzer {
    connection: DatabaseConnection,
}

impl SchemaAnalyzer {
    /// Create a new schema analyzer
    pub fn new(connection: DatabaseConnection) -> Self {
        Self { connection }
    }

    /// Analyze the current database schema
    pub async fn analyze(&self, schema_name: &str) -> Result<Introspection> {
        let mut row_errors = Vec::new();

        let tables = self.list_tables(schema_name, &mut row_errors).await?;
        let mut indexes = self.analyze_indexes(schema_name, &mut row_errors).await?;
        let mut partitions = self.analyze_partitions(schema_name, &mut row_errors).await?;
        let mut engines = self.analyze_engines(schema_name, &mut row_errors).await?;

        let mut schema = DatabaseSchema::new();
        for table_name in tables {
            let mut table = Table::new(&table_name);
            for column in self
                .analyze_columns(schema_name, &table_name, &mut row_errors)
                .await?
            {
                table.add_column(column);
            }
            table.indexes = indexes.remove(&table_name).unwrap_or_default();
            table.partition = partitions.remove(&table_name);
            table.engine = engines.remove(&table_name);
            schema.add_table(table);
        }

        for row_error in &row_errors {
            tracing::warn!(error = %row_error, "skipped metadata row");
        }
        tracing::info!(
            schema = schema_name,
            tables = schema.tables.len(),
            skipped_rows = row_errors.len(),
            "Analyzed live schema"
        );

        Ok(Introspection { schema, row_errors })
    }

    async fn fetch(&self, query: &'static str, sql: &str, binds: &[&str]) -> Result<Vec<MySqlRow>> {
        let mut statement = sqlx::query(sql);
        for value in binds {
            statement = statement.bind(*value);
        }
        statement
            .fetch_all(self.connection.pool())
            .await
            .map_err(|e| Error::SchemaAnalysisError(format!("{} query failed: {}", query, e)))
    }

    async fn list_tables(
        &self,
        schema_name: &str,
        row_errors: &mut Vec<RowError>,
    ) -> Result<Vec<String>> {
        let sql = r#"
            SELECT CAST(TABLE_NAME AS CHAR) AS table_name
            FROM information_schema.TABLES
            WHERE TABLE_SCHEMA = ? AND TABLE_TYPE = 'BASE TABLE'
            ORDER BY TABLE_NAME
        "#;

        let mut tables = Vec::new();
        for row in self.fetch("table listing", sql, &[schema_name]).await? {
            match row.try_get::<String, _>("table_name") {
                Ok(name) => tables.push(name),
                Err(e) => row_errors.push(RowError {
                    query: "table listing",
                    table: None,
                    message: e.to_string(),
                }),
            }
        }
        Ok(tables)
    }

    async fn analyze_columns(
        &self,
        schema_name: &str,
        table_name: &str,
        row_errors: &mut Vec<RowError>,
    ) -> Result<Vec<Column>> {
        let sql = r#"
            SELECT
                CAST(COLUMN_NAME AS CHAR) AS column_name,
                CAST(COLUMN_TYPE AS CHAR) AS column_type,
                CAST(IS_NULLABLE AS CHAR) AS is_nullable,
                CAST(COLUMN_DEFAULT AS CHAR) AS column_default,
                CAST(EXTRA AS CHAR) AS extra
            FROM information_schema.COLUMNS
            WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
            ORDER BY ORDINAL_POSITION
        "#;

        let mut columns = Vec::new();
        for row in self
            .fetch("column listing", sql, &[schema_name, table_name])
            .await?
        {
            let decoded = (|| -> std::result::Result<_, sqlx::Error> {
                Ok((
                    row.try_get::<String, _>("column_name")?,
                    row.try_get::<String, _>("column_type")?,
                    row.try_get::<String, _>("is_nullable")?,
                    row.try_get::<Option<String>, _>("column_default")?,
                    row.try_get::<String, _>("extra")?,
                ))
            })();
            let (name, column_type, is_nullable, default, extra) = match decoded {
                Ok(values) => values,
                Err(e) => {
                    row_errors.push(RowError {
                        query: "column listing",
                        table: Some(table_name.to_string()),
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            let (data_type, size, unsigned) = parse_column_type(table_name, &name, &column_type)?;
            let mut column = Column::new(&name, &data_type)
                .size(&size)
                .unsigned(unsigned)
                .nullable(is_nullable.eq_ignore_ascii_case("yes"))
                .auto_increment(extra.to_lowercase().contains("auto_increment"));
            column.default = default;
            columns.push(column.normalized());
        }
        Ok(columns)
    }

    /// Rows arrive ordered by index name then position, so columns append in key order
    async fn analyze_indexes(
        &self,
        schema_name: &str,
        row_errors: &mut Vec<RowError>,
    ) -> Result<HashMap<String, IndexMap<String, Index>>> {
        let sql = r#"
            SELECT
                CAST(TABLE_NAME AS CHAR) AS table_name,
                CAST(NON_UNIQUE AS SIGNED) AS non_unique,
                CAST(INDEX_TYPE AS CHAR) AS index_type,
                CAST(INDEX_NAME AS CHAR) AS index_name,
                CAST(COLUMN_NAME AS CHAR) AS column_name
            FROM information_schema.STATISTICS
            WHERE TABLE_SCHEMA = ?
            ORDER BY TABLE_NAME, INDEX_NAME, SEQ_IN_INDEX
        "#;

        let mut indexes: HashMap<String, IndexMap<String, Index>> = HashMap::new();
        for row in self.fetch("index listing", sql, &[schema_name]).await? {
            let decoded = (|| -> std::result::Result<_, sqlx::Error> {
                Ok((
                    row.try_get::<String, _>("table_name")?,
                    row.try_get::<i64, _>("non_unique")?,
                    row.try_get::<String, _>("index_type")?,
                    row.try_get::<String, _>("index_name")?,
                    row.try_get::<String, _>("column_name")?,
                ))
            })();
            let (table_name, non_unique, index_type, index_name, column_name) = match decoded {
                Ok(values) => values,
                Err(e) => {
                    row_errors.push(RowError {
                        query: "index listing",
                        table: None,
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            indexes
                .entry(table_name.clone())
                .or_default()
                .entry(index_name.clone())
                .or_insert_with(|| {
                    let index = if index_name == PRIMARY_INDEX {
                        Index::primary(&table_name, Vec::new())
                    } else {
                        Index::new(&table_name, &index_name, Vec::new())
                    };
                    let index = if non_unique == 0 { index.unique() } else { index };
                    if index_type.eq_ignore_ascii_case("fulltext") {
                        index.fulltext()
                    } else {
                        index
                    }
                })
                .columns
                .push(column_name);
        }
        Ok(indexes)
    }

    /// Only the last partition of each table is read; its ordinal is the end of the range
    async fn analyze_partitions(
        &self,
        schema_name: &str,
        row_errors: &mut Vec<RowError>,
    ) -> Result<HashMap<String, Partition>> {
        let sql = r#"
            SELECT
                CAST(p.TABLE_NAME AS CHAR) AS table_name,
                CAST(p.PARTITION_NAME AS CHAR) AS partition_name,
                CAST(p.PARTITION_ORDINAL_POSITION AS UNSIGNED) AS ordinal,
                CAST(p.PARTITION_METHOD AS CHAR) AS method,
                CAST(p.PARTITION_EXPRESSION AS CHAR) AS expression
            FROM information_schema.PARTITIONS p
            LEFT JOIN information_schema.PARTITIONS later
                ON later.TABLE_SCHEMA = p.TABLE_SCHEMA
                AND later.TABLE_NAME = p.TABLE_NAME
                AND p.PARTITION_ORDINAL_POSITION < later.PARTITION_ORDINAL_POSITION
            WHERE p.TABLE_SCHEMA = ?
                AND p.PARTITION_NAME IS NOT NULL
                AND later.PARTITION_ORDINAL_POSITION IS NULL
            ORDER BY p.TABLE_NAME
        "#;

        let mut partitions = HashMap::new();
        for row in self.fetch("partition listing", sql, &[schema_name]).await? {
            let decoded = (|| -> std::result::Result<_, sqlx::Error> {
                Ok((
                    row.try_get::<String, _>("table_name")?,
                    row.try_get::<String, _>("partition_name")?,
                    row.try_get::<u64, _>("ordinal")?,
                    row.try_get::<String, _>("method")?,
                    row.try_get::<String, _>("expression")?,
                ))
            })();
            let (table_name, partition_name, ordinal, method, expression) = match decoded {
                Ok(values) => values,
                Err(e) => {
                    row_errors.push(RowError {
                        query: "partition listing",
                        table: None,
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            if !method.eq_ignore_ascii_case("range") {
                row_errors.push(RowError {
                    query: "partition listing",
                    table: Some(table_name),
                    message: format!("partition method {} is not supported", method),
                });
                continue;
            }

            partitions.insert(
                table_name,
                Partition {
                    strategy: PartitionStrategy::Range,
                    key_column: expression.trim().trim_matches('`').to_string(),
                    base_name: partition_base_name(&partition_name, ordinal),
                    start: PARTITION_START,
                    end: ordinal,
                    each_row: PARTITION_EACH_ROW,
                },
            );
        }
        Ok(partitions)
    }

    /// Tables whose engine differs from the server default
    async fn analyze_engines(
        &self,
        schema_name: &str,
        row_errors: &mut Vec<RowError>,
    ) -> Result<HashMap<String, String>> {
        let sql = r#"
            SELECT
                CAST(TABLE_NAME AS CHAR) AS table_name,
                CAST(ENGINE AS CHAR) AS engine
            FROM information_schema.TABLES
            WHERE TABLE_SCHEMA = ?
                AND TABLE_TYPE = 'BASE TABLE'
                AND ENGINE IS NOT NULL
                AND ENGINE <> @@default_storage_engine
        "#;

        let mut engines = HashMap::new();
        for row in self.fetch("engine listing", sql, &[schema_name]).await? {
            match (
                row.try_get::<String, _>("table_name"),
                row.try_get::<String, _>("engine"),
            ) {
                (Ok(table), Ok(engine)) => {
                    engines.insert(table, engine);
                }
                (Err(e), _) | (_, Err(e)) => row_errors.push(RowError {
                    query: "engine listing",
                    table: None,
                    message: e.to_string(),
                }),
            }
        }
        Ok(engines)
    }
}

#[async_trait]
impl Analyzer for SchemaAnalyzer {
    async fn analyze_schema(&self, schema_name: &str) -> Result<Introspection> {
        self.analyze(schema_name).await
    }
}

/// Split a live column type such as `int(10) unsigned` into (type, size, unsigned)
pub fn parse_column_type(table: &str, column: &str, raw: &str) -> Result<(String, String, bool)> {
    let lower = raw.trim().to_lowercase();

    if lower.contains('(') {
        let captures = SIZED_TYPE.captures(&lower).ok_or_else(|| {
            Error::SchemaAnalysisError(format!(
                "table: {} column: {} type: {} is unknown format",
                table, column, raw
            ))
        })?;
        let data_type = captures[1].trim().to_string();
        let size = captures[2].to_string();
        let unsigned = captures[3].contains("unsigned");
        return Ok((data_type, size, unsigned));
    }

    let mut words = lower.split_whitespace();
    let data_type = words.next().ok_or_else(|| {
        Error::SchemaAnalysisError(format!(
            "table: {} column: {} has an empty type",
            table, column
        ))
    })?;
    let unsigned = words.any(|w| w == "unsigned");
    Ok((data_type.to_string(), String::new(), unsigned))
}

/// `p12` with ordinal 12 has base name `p`
pub fn partition_base_name(partition_name: &str, ordinal: u64) -> String {
    let suffix = ordinal.to_string();
    partition_name
        .strip_suffix(suffix.as_str())
        .unwrap_or(partition_name)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sized_types() {
        assert_eq!(
            parse_column_type("t", "c", "int(10) unsigned").unwrap(),
            ("int".to_string(), "10".to_string(), true)
        );
        assert_eq!(
            parse_column_type("t", "c", "DECIMAL(10,2)").unwrap(),
            ("decimal".to_string(), "10,2".to_string(), false)
        );
        assert_eq!(
            parse_column_type("t", "c", "enum('a','b')").unwrap(),
            ("enum".to_string(), "'a','b'".to_string(), false)
        );
    }

    #[test]
    fn parses_unsized_types() {
        assert_eq!(
            parse_column_type("t", "c", "bigint unsigned").unwrap(),
            ("bigint".to_string(), String::new(), true)
        );
        assert_eq!(
            parse_column_type("t", "c", "text").unwrap(),
            ("text".to_string(), String::new(), false)
        );
    }

    #[test]
    fn rejects_malformed_types() {
        let err = parse_column_type("users", "age", "int(").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("table: users column: age"));
        assert!(message.contains("unknown format"));
    }

    #[test]
    fn strips_ordinal_suffix_from_partition_name() {
        assert_eq!(partition_base_name("p3", 3), "p");
        assert_eq!(partition_base_name("part_12", 12), "part_");
        assert_eq!(partition_base_name("pmax", 3), "pmax");
    }

    #[test]
    fn strict_introspection_fails_on_skipped_rows() {
        let introspection = Introspection {
            schema: DatabaseSchema::new(),
            row_errors: vec![RowError {
                query: "index listing",
                table: Some("users".into()),
                message: "bad row".into(),
            }],
        };

        assert_eq!(introspection.clone().into_lenient(), DatabaseSchema::new());
        let err = introspection.into_strict().unwrap_err();
        assert!(err.to_string().contains("index listing row for table users: bad row"));
    }
}
