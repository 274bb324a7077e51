//! `ese info` — inspect the database header.

use std::io::Write;

use serde::Serialize;

use crate::cli::wprintln;
use crate::error::Result;
use crate::esedb::db::EseDB;

pub struct InfoOptions {
    pub file: String,
    pub json: bool,
}

#[derive(Serialize)]
struct HeaderInfo {
    magic: String,
    version: u32,
    page_size: u32,
    format_major: u32,
    format_minor: u32,
    small_page: bool,
    tables: usize,
}

pub fn execute(opts: &InfoOptions, writer: &mut dyn Write) -> Result<()> {
    let db = EseDB::open(&opts.file)?;
    let header = db.pager().header;

    let info = HeaderInfo {
        magic: format!("0x{:08x}", header.magic),
        version: header.version,
        page_size: header.page_size,
        format_major: header.format_major,
        format_minor: header.format_minor,
        small_page: db.pager().small_page(),
        tables: db.tables().len(),
    };

    if opts.json {
        let json = serde_json::to_string_pretty(&info).map_err(|e| {
            crate::error::EseError::Malformed(format!("failed to serialize header: {}", e))
        })?;
        wprintln!(writer, "{}", json)?;
    } else {
        wprintln!(writer, "magic:         {}", info.magic)?;
        wprintln!(writer, "version:       0x{:x}", info.version)?;
        wprintln!(writer, "page size:     {}", info.page_size)?;
        wprintln!(writer, "format major:  {}", info.format_major)?;
        wprintln!(writer, "format minor:  {}", info.format_minor)?;
        wprintln!(writer, "small page:    {}", info.small_page)?;
        wprintln!(writer, "tables:        {}", info.tables)?;
    }

    Ok(())
}
