//! Top-level database handle: opens a pager, bootstraps the catalog, and
//! hands out [`Table`]s and their [`Record`]s.

use crate::error::Result;
use crate::esedb::catalog::Catalog;
use crate::esedb::pager::{BufSource, Pager, Source};
use crate::esedb::record::Record;
use crate::esedb::table::Table;
use crate::esedb::value::RecordValue;

#[cfg(feature = "cli")]
use crate::esedb::pager::MmapSource;
#[cfg(not(feature = "cli"))]
use crate::esedb::pager::FileSource;

/// A parsed ESE database: header, page cache, and catalog-derived table
/// metadata.
pub struct EseDB {
    pager: Pager,
    catalog: Catalog,
    /// When set, [`Record::get`] returns impacket's historical value
    /// shapes (hex-encoded binary/multi-value columns, compressed columns
    /// forced to `Null`) instead of this reader's normal decoding.
    pub impacket_compat: bool,
}

impl EseDB {
    fn from_pager(pager: Pager, impacket_compat: bool) -> Result<Self> {
        let catalog = Catalog::load(&pager)?;
        Ok(EseDB {
            pager,
            catalog,
            impacket_compat,
        })
    }

    /// Open a database file by path, reading it via `mmap` when the `cli`
    /// feature is enabled (the common case for the command-line tool) or a
    /// plain seek/read file source otherwise.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        Self::open_with_compat(path, false)
    }

    pub fn open_with_compat(path: impl AsRef<std::path::Path>, impacket_compat: bool) -> Result<Self> {
        #[cfg(feature = "cli")]
        let source: Box<dyn Source> = Box::new(MmapSource::open(path)?);
        #[cfg(not(feature = "cli"))]
        let source: Box<dyn Source> = Box::new(FileSource::open(path)?);

        let pager = Pager::new(source)?;
        Self::from_pager(pager, impacket_compat)
    }

    /// Open a database already held in memory, mainly for tests and
    /// embedding scenarios that have the file contents on hand already.
    pub fn from_bytes(buf: Vec<u8>) -> Result<Self> {
        Self::from_bytes_with_compat(buf, false)
    }

    pub fn from_bytes_with_compat(buf: Vec<u8>, impacket_compat: bool) -> Result<Self> {
        let pager = Pager::new(Box::new(BufSource::new(buf)))?;
        Self::from_pager(pager, impacket_compat)
    }

    pub fn page_size(&self) -> u32 {
        self.pager.page_size()
    }

    pub fn pager(&self) -> &Pager {
        &self.pager
    }

    /// Look up a table by name.
    pub fn table(&self, name: &str) -> Result<&Table> {
        self.catalog.table(name)
    }

    /// Every table the catalog describes, in catalog scan order.
    pub fn tables(&self) -> &[Table] {
        &self.catalog.tables
    }

    /// Iterate every record of `table`, honoring this handle's
    /// `impacket_compat` setting.
    pub fn records<'a>(&'a self, table: &'a Table) -> Result<impl Iterator<Item = Result<Record<'a>>> + 'a> {
        table.records(&self.pager, self.impacket_compat)
    }

    /// Find every record of `table` whose `equals` columns match, via the
    /// index that covers exactly those columns.
    pub fn find_all<'a>(
        &'a self,
        table: &'a Table,
        equals: &[(&str, &RecordValue)],
    ) -> Result<Vec<Record<'a>>> {
        table.find_all(&self.pager, self.impacket_compat, equals)
    }

    /// Find the first record of `table` whose `equals` columns match, if any.
    pub fn search<'a>(
        &'a self,
        table: &'a Table,
        equals: &[(&str, &RecordValue)],
    ) -> Result<Option<Record<'a>>> {
        table.search(&self.pager, self.impacket_compat, equals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::esedb::header::MAGIC;
    use byteorder::{ByteOrder, LittleEndian};

    #[test]
    fn opens_database_with_empty_catalog() {
        let page_size = 4096u32;
        let ps = page_size as usize;
        let mut header_page = vec![0u8; ps];
        LittleEndian::write_u32(&mut header_page[8..], MAGIC);
        LittleEndian::write_u32(&mut header_page[236..], page_size);
        LittleEndian::write_u32(&mut header_page[216..], 0x11);
        let shadow_page = header_page.clone();

        // Logical page 1 (pgno 1) doesn't matter here since the catalog's
        // root is pgno 4; for this smoke test we only need the catalog root
        // page itself to exist as an empty leaf/root page.
        let mut catalog_root = vec![0u8; ps];
        let flags = 0x0000_0002u32 | 0x0000_0001 | 0x0000_0800; // LEAF | ROOT | NEW_RECORD_FORMAT
        LittleEndian::write_u32(&mut catalog_root[36..], flags);
        LittleEndian::write_u16(&mut catalog_root[34..], 1); // one tag slot (empty key prefix), zero nodes

        let mut buf = header_page;
        buf.extend_from_slice(&shadow_page);
        buf.extend_from_slice(&vec![0u8; ps]); // pgno 1
        buf.extend_from_slice(&vec![0u8; ps]); // pgno 2
        buf.extend_from_slice(&vec![0u8; ps]); // pgno 3
        buf.extend_from_slice(&catalog_root); // pgno 4 (catalog root)

        let db = EseDB::from_bytes(buf).unwrap();
        assert_eq!(db.page_size(), 4096);
        assert!(db.tables().is_empty());
        assert!(db.table("Nope").is_err());
    }
}
