//! `ese page` — hex dump of a raw page's bytes.

use std::io::Write;

use crate::cli::wprintln;
use crate::error::Result;
use crate::esedb::db::EseDB;
use crate::util::hex;

pub struct PageOptions {
    pub file: String,
    pub page: u32,
}

/// The two `DBFILEHDR` copies occupy physical pages 1 and 2; logical page
/// numbering starts after them.
const PHYSICAL_PAGE_SHIFT: u32 = 2;

pub fn execute(opts: &PageOptions, writer: &mut dyn Write) -> Result<()> {
    let db = EseDB::open(&opts.file)?;
    let raw = db.pager().read_page(opts.page + PHYSICAL_PAGE_SHIFT)?;

    wprintln!(
        writer,
        "Logical page {} ({} bytes)",
        opts.page,
        raw.len()
    )?;
    wprintln!(writer, "{}", hex::hex_dump(&raw, 0))?;

    Ok(())
}
