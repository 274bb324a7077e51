//! `ese dump` — dump a table's records as JSON.

use std::io::Write;

use indicatif::ProgressBar;
use serde_json::Value;

use crate::cli::{record_value_to_json, wprintln};
use crate::error::Result;
use crate::esedb::db::EseDB;

pub struct DumpOptions {
    pub file: String,
    pub table: String,
    pub limit: Option<usize>,
    pub pretty: bool,
    pub impacket_compat: bool,
}

pub fn execute(opts: &DumpOptions, writer: &mut dyn Write) -> Result<()> {
    let db = EseDB::open_with_compat(&opts.file, opts.impacket_compat)?;
    let table = db.table(&opts.table)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_message(format!("dumping {}", table.name));

    let mut count = 0usize;
    for record in db.records(table)? {
        if let Some(limit) = opts.limit {
            if count >= limit {
                break;
            }
        }

        let record = record?;
        let mut map = serde_json::Map::new();
        for (name, value) in record.as_map()? {
            map.insert(name, record_value_to_json(&value));
        }
        let json_value = Value::Object(map);

        let rendered = if opts.pretty {
            serde_json::to_string_pretty(&json_value)
        } else {
            serde_json::to_string(&json_value)
        }
        .map_err(|e| crate::error::EseError::Malformed(format!("failed to serialize record: {}", e)))?;

        wprintln!(writer, "{}", rendered)?;
        count += 1;
        spinner.tick();
    }

    spinner.finish_and_clear();
    Ok(())
}
