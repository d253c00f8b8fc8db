//! Migration generator
//!
//! This module renders a [`SchemaDiff`] as MySQL DDL statements.

use crate::schema::diff::{ColumnAddition, ColumnChange, ColumnDrop, IndexDrop, SchemaDiff};
use crate::schema::types::{
    Column, Index, IndexKind, Partition, PartitionBound, Table, FULLTEXT_TOKENIZER_COMMENT,
};

/// Generate migration SQL from a schema diff, in apply order
pub fn generate_migration_sql(diff: &SchemaDiff) -> Vec<String> {
    let mut migrations = Vec::with_capacity(diff.len());

    migrations.extend(diff.tables_to_drop.iter().map(|t| drop_table_sql(t)));
    migrations.extend(diff.tables_to_create.iter().map(create_table_sql));
    migrations.extend(diff.columns_to_drop.iter().map(drop_column_sql));
    migrations.extend(diff.columns_to_add.iter().map(add_column_sql));
    migrations.extend(diff.columns_to_alter.iter().map(modify_column_sql));
    migrations.extend(diff.indices_to_drop.iter().map(drop_index_sql));
    migrations.extend(diff.indices_to_create.iter().map(add_index_sql));

    migrations
}

/// Generate SQL to create a table with its primary key, engine and partitions
pub fn create_table_sql(table: &Table) -> String {
    let mut definitions: Vec<String> = table.columns.values().map(column_definition).collect();

    let primary_key = table.primary_key();
    if !primary_key.is_empty() {
        definitions.push(format!("PRIMARY KEY ({})", quote_columns(&primary_key)));
    }

    let mut sql = format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        table.name,
        definitions.join(", ")
    );

    if let Some(engine) = &table.engine {
        sql.push_str(&format!(" ENGINE={}", engine));
    }

    if let Some(partition) = &table.partition {
        sql.push(' ');
        sql.push_str(&partition_clause(partition));
    }

    sql
}

fn partition_clause(partition: &Partition) -> String {
    let partitions: Vec<String> = partition
        .partitions()
        .into_iter()
        .map(|(name, bound)| match bound {
            PartitionBound::LessThan(limit) => {
                format!("PARTITION {} VALUES LESS THAN ({})", name, limit)
            }
            PartitionBound::MaxValue => format!("PARTITION {} VALUES LESS THAN MAXVALUE", name),
        })
        .collect();

    format!(
        "PARTITION BY {} ({}) ({})",
        partition.strategy.keyword(),
        partition.key_column,
        partitions.join(", ")
    )
}

pub fn drop_table_sql(table_name: &str) -> String {
    format!("DROP TABLE {}", table_name)
}

pub fn add_column_sql(addition: &ColumnAddition) -> String {
    let position = match &addition.after {
        Some(previous) => format!("AFTER `{}`", previous),
        None => "FIRST".to_string(),
    };
    format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        addition.table,
        column_definition(&addition.column),
        position
    )
}

/// MODIFY keeps the column where it is
pub fn modify_column_sql(change: &ColumnChange) -> String {
    format!(
        "ALTER TABLE {} MODIFY COLUMN {}",
        change.table,
        column_definition(&change.to)
    )
}

pub fn drop_column_sql(drop: &ColumnDrop) -> String {
    format!("ALTER TABLE {} DROP COLUMN {}", drop.table, drop.column)
}

pub fn add_index_sql(index: &Index) -> String {
    let columns = quote_columns(&index.columns);
    match index.kind {
        IndexKind::FullText => format!(
            "ALTER TABLE {} ADD FULLTEXT KEY {} ({}) COMMENT {}",
            index.table,
            index.name,
            columns,
            index
                .comment
                .as_deref()
                .unwrap_or(FULLTEXT_TOKENIZER_COMMENT)
        ),
        IndexKind::BTree => {
            let unique = if index.is_unique { "UNIQUE " } else { "" };
            format!(
                "ALTER TABLE {} ADD {}INDEX {} ({})",
                index.table, unique, index.name, columns
            )
        }
    }
}

pub fn drop_index_sql(drop: &IndexDrop) -> String {
    format!("ALTER TABLE {} DROP INDEX {}", drop.table, drop.index)
}

/// `` `name` type(size) UNSIGNED NOT NULL DEFAULT ... AUTO_INCREMENT ``
pub fn column_definition(column: &Column) -> String {
    let mut parts = vec![format!("`{}`", column.name)];

    if column.size.is_empty() {
        parts.push(column.data_type.clone());
    } else {
        parts.push(format!("{}({})", column.data_type, column.size));
    }
    if column.unsigned {
        parts.push("UNSIGNED".to_string());
    }
    if !column.nullable {
        parts.push("NOT NULL".to_string());
    }
    if let Some(default) = &column.default {
        parts.push(format!("DEFAULT {}", default_literal(default)));
    }
    if column.auto_increment {
        parts.push("AUTO_INCREMENT".to_string());
    }

    parts.join(" ")
}

/// Values with parentheses are function calls such as `NOW()` and stay unquoted
fn default_literal(value: &str) -> String {
    if value.contains('(') && value.contains(')') {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', "''"))
    }
}

fn quote_columns<S: AsRef<str>>(columns: &[S]) -> String {
    columns
        .iter()
        .map(|c| format!("`{}`", c.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::{PartitionStrategy, PRIMARY_INDEX};

    fn id_column() -> Column {
        Column::new("id", "int").unsigned(true).auto_increment(true).normalized()
    }

    #[test]
    fn create_prefers_auto_increment_key() {
        let mut table = Table::new("users");
        table.add_column(id_column());
        table.add_column(Column::new("code", "char").size("4"));
        table.add_index(Index::primary("users", vec!["code".into()]));

        assert_eq!(
            create_table_sql(&table),
            "CREATE TABLE IF NOT EXISTS users (`id` int(10) UNSIGNED NOT NULL AUTO_INCREMENT, \
             `code` char(4) NOT NULL, PRIMARY KEY (`id`))"
        );
    }

    #[test]
    fn create_with_composite_key_engine_and_partition() {
        let mut table = Table::new("logs");
        table.add_column(Column::new("id", "bigint").normalized());
        table.add_column(Column::new("kind", "tinyint").unsigned(true).normalized());
        table.add_index(Index::primary("logs", vec!["id".into(), "kind".into()]));
        table.engine = Some("Mroonga".into());
        table.partition = Some(Partition {
            strategy: PartitionStrategy::Range,
            key_column: "id".into(),
            base_name: "p".into(),
            start: 1,
            end: 3,
            each_row: 10000,
        });

        assert_eq!(
            create_table_sql(&table),
            "CREATE TABLE IF NOT EXISTS logs (`id` bigint(20) NOT NULL, \
             `kind` tinyint(3) UNSIGNED NOT NULL, PRIMARY KEY (`id`,`kind`)) ENGINE=Mroonga \
             PARTITION BY RANGE (id) (PARTITION p1 VALUES LESS THAN (10000), \
             PARTITION p2 VALUES LESS THAN (20000), PARTITION p3 VALUES LESS THAN MAXVALUE)"
        );
        assert!(table.indexes.contains_key(PRIMARY_INDEX));
    }

    #[test]
    fn defaults_quote_unless_function_call() {
        let created = Column::new("created_at", "datetime").default("NOW()");
        assert_eq!(column_definition(&created), "`created_at` datetime NOT NULL DEFAULT NOW()");

        let empty = Column::new("memo", "varchar").size("10").default("");
        assert_eq!(column_definition(&empty), "`memo` varchar(10) NOT NULL DEFAULT ''");

        let quoted = Column::new("memo", "text").nullable(true).default("it's");
        assert_eq!(column_definition(&quoted), "`memo` text DEFAULT 'it''s'");
    }

    #[test]
    fn add_column_placement() {
        let first = ColumnAddition {
            table: "users".into(),
            column: Column::new("tenant", "int").normalized(),
            after: None,
        };
        assert_eq!(
            add_column_sql(&first),
            "ALTER TABLE users ADD COLUMN `tenant` int(11) NOT NULL FIRST"
        );

        let after = ColumnAddition {
            after: Some("b".into()),
            ..first
        };
        assert!(add_column_sql(&after).ends_with("AFTER `b`"));
    }

    #[test]
    fn index_statements() {
        let unique = Index::new("users", "idx_users_a_and_b", vec!["a".into(), "b".into()]).unique();
        assert_eq!(
            add_index_sql(&unique),
            "ALTER TABLE users ADD UNIQUE INDEX idx_users_a_and_b (`a`,`b`)"
        );

        let fulltext = Index::new("posts", "idx_posts_body", vec!["body".into()]).fulltext();
        assert_eq!(
            add_index_sql(&fulltext),
            "ALTER TABLE posts ADD FULLTEXT KEY idx_posts_body (`body`) \
             COMMENT 'tokenizer \"TokenBigramSplitSymbolAlphaDigit\"'"
        );

        let drop = IndexDrop { table: "users".into(), index: "idx_users_a_and_b".into() };
        assert_eq!(drop_index_sql(&drop), "ALTER TABLE users DROP INDEX idx_users_a_and_b");
    }

    #[test]
    fn statements_follow_bucket_order() {
        let mut created = Table::new("fresh");
        created.add_column(id_column());
        let diff = SchemaDiff {
            tables_to_drop: vec!["stale".into()],
            tables_to_create: vec![created],
            columns_to_drop: vec![ColumnDrop { table: "t".into(), column: "old".into() }],
            columns_to_add: vec![],
            columns_to_alter: vec![ColumnChange {
                table: "t".into(),
                column_name: "n".into(),
                from: Column::new("n", "int").normalized(),
                to: Column::new("n", "bigint").normalized(),
            }],
            indices_to_drop: vec![IndexDrop { table: "t".into(), index: "i".into() }],
            indices_to_create: vec![Index::new("t", "i", vec!["n".into()])],
        };

        assert_eq!(
            generate_migration_sql(&diff),
            vec![
                "DROP TABLE stale".to_string(),
                "CREATE TABLE IF NOT EXISTS fresh (`id` int(10) UNSIGNED NOT NULL AUTO_INCREMENT, PRIMARY KEY (`id`))".to_string(),
                "ALTER TABLE t DROP COLUMN old".to_string(),
                "ALTER TABLE t MODIFY COLUMN `n` bigint(20) NOT NULL".to_string(),
                "ALTER TABLE t DROP INDEX i".to_string(),
                "ALTER TABLE t ADD INDEX i (`n`)".to_string(),
            ]
        );
    }
}
