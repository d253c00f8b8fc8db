//! Schema exporter
//!
//! Renders a schema back into the declarative TOML document format. Loading
//! the output yields the same schema, modulo index names which the loader
//! derives from the column list.

use crate::schema::types::{Column, DatabaseSchema, IndexKind, Partition, Table};

/// Render every table as a `[[tables]]` block
pub fn export_schema(schema: &DatabaseSchema) -> String {
    schema
        .tables
        .values()
        .map(export_table)
        .collect::<Vec<_>>()
        .join("\n")
}

fn export_table(table: &Table) -> String {
    let mut lines = vec![
        "[[tables]]".to_string(),
        format!("name = {}", quote(&table.name)),
    ];

    if table.columns.is_empty() {
        lines.push("columns = []".to_string());
    } else {
        lines.push("columns = [".to_string());
        let columns: Vec<String> = table
            .columns
            .values()
            .map(|c| format!("    {}", export_column(c)))
            .collect();
        lines.push(columns.join(",\n"));
        lines.push("]".to_string());
    }

    let mut primary = Vec::new();
    let mut index = Vec::new();
    let mut unique_index = Vec::new();
    let mut fulltext_index = Vec::new();
    for idx in table.indexes.values() {
        let columns = idx.columns.join(",");
        if idx.is_primary() {
            primary.push(columns);
        } else if idx.kind == IndexKind::FullText {
            fulltext_index.push(columns);
        } else if idx.is_unique {
            unique_index.push(columns);
        } else {
            index.push(columns);
        }
    }
    for (key, values) in [
        ("primary", primary),
        ("index", index),
        ("unique_index", unique_index),
        ("fulltext_index", fulltext_index),
    ] {
        if !values.is_empty() {
            let quoted: Vec<String> = values.iter().map(|v| quote(v)).collect();
            lines.push(format!("{} = [{}]", key, quoted.join(", ")));
        }
    }

    if let Some(partition) = &table.partition {
        lines.push(format!("partition = {}", export_partition(partition)));
    }
    if let Some(engine) = &table.engine {
        lines.push(format!("engine = {}", quote(engine)));
    }

    let mut block = lines.join("\n");
    block.push('\n');
    block
}

fn export_column(column: &Column) -> String {
    let mut fields = vec![
        format!("name = {}", quote(&column.name)),
        format!("type = {}", quote(&column.data_type)),
    ];
    // Implicit display widths are noise; the loader fills them back in
    if !column.has_default_size() {
        fields.push(format!("size = {}", quote(&column.size)));
    }
    if column.unsigned {
        fields.push("unsigned = true".to_string());
    }
    fields.push(format!("null = {}", column.nullable));
    if column.auto_increment {
        fields.push("autoinc = true".to_string());
    }
    if let Some(default) = &column.default {
        fields.push(format!("default = {}", quote(default)));
    }
    format!("{{{}}}", fields.join(", "))
}

fn export_partition(partition: &Partition) -> String {
    format!(
        "{{type = {}, key = {}, basename = {}, start = \"{}\", end = \"{}\", each = \"{}\"}}",
        quote(&partition.strategy.keyword().to_lowercase()),
        quote(&partition.key_column),
        quote(&partition.base_name),
        partition.start,
        partition.end,
        partition.each_row
    )
}

/// TOML string literal with escaping handled by the toml crate
fn quote(value: &str) -> String {
    toml::Value::String(value.to_string()).to_string()
}
