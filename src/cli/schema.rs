//! `ese schema` — show a table's columns and indexes.

use std::io::Write;

use serde::Serialize;

use crate::cli::wprintln;
use crate::error::Result;
use crate::esedb::db::EseDB;

pub struct SchemaOptions {
    pub file: String,
    pub table: String,
    pub json: bool,
}

#[derive(Serialize)]
struct ColumnSummary {
    identifier: u32,
    name: String,
    coltyp: String,
    size: usize,
}

#[derive(Serialize)]
struct IndexSummary {
    name: String,
    unique: bool,
    primary: bool,
    columns: Vec<u32>,
}

#[derive(Serialize)]
struct TableSchema {
    name: String,
    root_page: u32,
    columns: Vec<ColumnSummary>,
    indexes: Vec<IndexSummary>,
}

pub fn execute(opts: &SchemaOptions, writer: &mut dyn Write) -> Result<()> {
    let db = EseDB::open(&opts.file)?;
    let table = db.table(&opts.table)?;

    let schema = TableSchema {
        name: table.name.clone(),
        root_page: table.root_page,
        columns: table
            .columns
            .iter()
            .map(|c| ColumnSummary {
                identifier: c.identifier,
                name: c.name.clone(),
                coltyp: format!("{:?}", c.coltyp),
                size: c.size,
            })
            .collect(),
        indexes: table
            .indexes
            .iter()
            .map(|i| IndexSummary {
                name: i.name.clone(),
                unique: i.is_unique(),
                primary: i.is_primary(),
                columns: i.column_ids.clone(),
            })
            .collect(),
    };

    if opts.json {
        let json = serde_json::to_string_pretty(&schema).map_err(|e| {
            crate::error::EseError::Malformed(format!("failed to serialize schema: {}", e))
        })?;
        wprintln!(writer, "{}", json)?;
    } else {
        wprintln!(writer, "Table: {} (root={})", schema.name, schema.root_page)?;
        wprintln!(writer, "Columns:")?;
        for c in &schema.columns {
            wprintln!(writer, "  {:<4} {:<24} {:<12} size={}", c.identifier, c.name, c.coltyp, c.size)?;
        }
        wprintln!(writer, "Indexes:")?;
        for i in &schema.indexes {
            wprintln!(
                writer,
                "  {:<24} unique={:<5} primary={:<5} columns={:?}",
                i.name, i.unique, i.primary, i.columns
            )?;
        }
    }

    Ok(())
}
