//! `ese tables` — list every table the catalog describes.

use std::io::Write;

use serde::Serialize;

use crate::cli::wprintln;
use crate::error::Result;
use crate::esedb::db::EseDB;

pub struct TablesOptions {
    pub file: String,
    pub json: bool,
}

#[derive(Serialize)]
struct TableSummary {
    name: String,
    root_page: u32,
    columns: usize,
    indexes: usize,
    has_long_values: bool,
}

pub fn execute(opts: &TablesOptions, writer: &mut dyn Write) -> Result<()> {
    let db = EseDB::open(&opts.file)?;

    let summaries: Vec<TableSummary> = db
        .tables()
        .iter()
        .map(|t| TableSummary {
            name: t.name.clone(),
            root_page: t.root_page,
            columns: t.columns.len(),
            indexes: t.indexes.len(),
            has_long_values: t.long_value_root.is_some(),
        })
        .collect();

    if opts.json {
        let json = serde_json::to_string_pretty(&summaries).map_err(|e| {
            crate::error::EseError::Malformed(format!("failed to serialize tables: {}", e))
        })?;
        wprintln!(writer, "{}", json)?;
    } else {
        for t in &summaries {
            wprintln!(
                writer,
                "{:<32} root={:<8} columns={:<4} indexes={:<4} long_values={}",
                t.name, t.root_page, t.columns, t.indexes, t.has_long_values
            )?;
        }
    }

    Ok(())
}
