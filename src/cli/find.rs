//! `ese find` — search a table for records matching a column value.
//!
//! Performs a linear scan over the table's own B+ tree rather than a
//! secondary-index search: decoding every record and comparing its display
//! form against `--value` is slower but never requires guessing which index
//! (if any) covers the requested column.

use std::io::Write;

use indicatif::ProgressBar;

use crate::cli::{record_value_to_json, wprintln};
use crate::error::Result;
use crate::esedb::db::EseDB;
use crate::esedb::RecordValue;

pub struct FindOptions {
    pub file: String,
    pub table: String,
    pub column: String,
    pub value: String,
    pub first: bool,
    pub pretty: bool,
}

pub fn execute(opts: &FindOptions, writer: &mut dyn Write) -> Result<()> {
    let db = EseDB::open(&opts.file)?;
    let table = db.table(&opts.table)?;
    // Validate the column exists before scanning so a typo fails fast.
    table.column(&opts.column)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_message(format!("searching {}", table.name));

    let mut matched = 0usize;
    for record in db.records(table)? {
        let record = record?;
        let value = record.get(&opts.column)?;

        if display_value(&value) == opts.value {
            let pairs = record.as_map()?;
            let mut map = serde_json::Map::new();
            for (name, v) in pairs {
                map.insert(name, record_value_to_json(&v));
            }
            let json = serde_json::Value::Object(map);
            let rendered = if opts.pretty {
                serde_json::to_string_pretty(&json)
            } else {
                serde_json::to_string(&json)
            }
            .map_err(|e| crate::error::EseError::Malformed(format!("failed to serialize record: {}", e)))?;

            wprintln!(writer, "{}", rendered)?;
            matched += 1;
            if opts.first {
                break;
            }
        }

        spinner.tick();
    }

    spinner.finish_and_clear();
    if matched == 0 {
        wprintln!(writer, "no matching records")?;
    }

    Ok(())
}

fn display_value(value: &RecordValue) -> String {
    match value {
        RecordValue::Null => String::new(),
        RecordValue::Bool(b) => b.to_string(),
        RecordValue::I64(n) => n.to_string(),
        RecordValue::U64(n) => n.to_string(),
        RecordValue::F32(f) => f.to_string(),
        RecordValue::F64(f) => f.to_string(),
        RecordValue::Text(s) => s.clone(),
        RecordValue::Bytes(b) => crate::util::hex::format_bytes(b),
        RecordValue::Guid(g) => g.clone(),
        RecordValue::List(items) => items.iter().map(display_value).collect::<Vec<_>>().join(","),
    }
}
