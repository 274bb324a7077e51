//! Table metadata and record iteration.

use crate::error::{EseError, Result};
use crate::esedb::btree::{self, Cursor};
use crate::esedb::column::Column;
use crate::esedb::index::{self, Index, KeySegment};
use crate::esedb::longvalue;
use crate::esedb::pager::Pager;
use crate::esedb::record::Record;
use crate::esedb::value::RecordValue;

/// A table's metadata: its columns, indexes, and the root pages needed to
/// walk its records and long values.
///
/// Unlike the reference reader's `Table`, this struct holds no reference
/// back to the database handle or pager — every method that needs page
/// access takes `&Pager` explicitly, so `EseDB` can own both a `Pager` and a
/// `Vec<Table>` without a self-referential struct.
#[derive(Debug, Clone)]
pub struct Table {
    pub name: String,
    pub root_page: u32,
    pub columns: Vec<Column>,
    pub indexes: Vec<Index>,
    /// Root page of this table's long-value tree, if it has one.
    pub long_value_root: Option<u32>,
    /// Raw `CallbackData` bytes from the catalog's Callback record, if any.
    pub callback_data: Option<Vec<u8>>,
    fixed_value_size: usize,
}

impl Table {
    pub(crate) fn new(name: String, root_page: u32) -> Self {
        Table {
            name,
            root_page,
            columns: Vec::new(),
            indexes: Vec::new(),
            long_value_root: None,
            callback_data: None,
            fixed_value_size: 0,
        }
    }

    /// Add a column, computing its fixed-value-region offset as a side
    /// effect (fixed columns must be added in catalog identifier order for
    /// this running total to be correct — which is how the catalog scan
    /// naturally presents them).
    pub(crate) fn add_column(&mut self, mut column: Column) {
        if column.is_fixed() {
            column.fixed_offset = Some(self.fixed_value_size);
            self.fixed_value_size += column.size;
        }
        self.columns.push(column);
    }

    pub(crate) fn add_index(&mut self, index: Index) {
        self.indexes.push(index);
    }

    pub fn column(&self, name: &str) -> Result<&Column> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| EseError::UnknownColumn(name.to_string()))
    }

    pub fn column_by_id(&self, identifier: u32) -> Option<&Column> {
        self.columns.iter().find(|c| c.identifier == identifier)
    }

    pub fn index(&self, name: &str) -> Result<&Index> {
        self.indexes
            .iter()
            .find(|i| i.name == name)
            .ok_or_else(|| EseError::UnknownIndex(name.to_string()))
    }

    /// Return the first index covering exactly `columns`, in order, if any.
    pub fn find_index(&self, columns: &[&str]) -> Option<&Index> {
        self.indexes.iter().find(|idx| {
            idx.column_ids.len() == columns.len()
                && idx
                    .column_ids
                    .iter()
                    .zip(columns)
                    .all(|(&id, &name)| self.column_by_id(id).map(|c| c.name.as_str()) == Some(name))
        })
    }

    /// The table's primary index, if it declares one (a primary index's
    /// leaves *are* the table's records; see [`crate::esedb::index`]).
    pub fn primary_index(&self) -> Option<&Index> {
        self.indexes.iter().find(|i| i.is_primary())
    }

    /// Encode `equals` against the index that covers exactly those columns
    /// (in the order given), normalizing each value with
    /// [`crate::esedb::index::encode_key`].
    fn encode_equals_key(&self, index: &Index, equals: &[(&str, &RecordValue)]) -> Result<Vec<u8>> {
        let mut key = Vec::new();
        for (name, value) in equals {
            let column = self.column(name)?;
            let segment = KeySegment {
                coltyp: column.coltyp,
                is_fixed: column.is_fixed(),
                codepage: column.codepage,
                value: Some(value),
            };
            key.extend(index::encode_key(&segment, index.var_seg_mac, index.lcmap_flags)?);
            if key.len() >= index.key_most {
                key.truncate(index.key_most);
                break;
            }
        }
        Ok(key)
    }

    /// Resolve a leaf node reached through an index search into a [`Record`]:
    /// directly, for a primary index; through a second lookup against the
    /// primary tree, for a secondary one (whose leaf data is the primary
    /// key, not a record).
    fn record_from_index_node<'a>(
        &'a self,
        pager: &'a Pager,
        index: &Index,
        node: &crate::esedb::page::Node,
        impacket_compat: bool,
    ) -> Result<Record<'a>> {
        if index.is_primary() {
            Record::new(self, pager, node.clone(), impacket_compat)
        } else {
            let primary = self
                .primary_index()
                .ok_or_else(|| EseError::UnknownIndex("<primary>".into()))?;
            let mut cursor = Cursor::new(pager, primary.root)?;
            let record_node = cursor.search(&node.data, true)?;
            Record::new(self, pager, record_node, impacket_compat)
        }
    }

    /// Find every record whose `equals` columns match the given values,
    /// using the index that covers exactly those columns.
    ///
    /// Positions on the first matching key, rewinds across equal-key
    /// predecessors (a non-unique index may have several entries sharing a
    /// key), then streams forward while the key still matches.
    pub fn find_all<'a>(
        &'a self,
        pager: &'a Pager,
        impacket_compat: bool,
        equals: &[(&str, &RecordValue)],
    ) -> Result<Vec<Record<'a>>> {
        let column_names: Vec<&str> = equals.iter().map(|(n, _)| *n).collect();
        let index = self
            .find_index(&column_names)
            .ok_or_else(|| EseError::UnknownIndex(column_names.join(", ")))?;

        let key = self.encode_equals_key(index, equals)?;

        let mut cursor = match index.search(pager, &key, false) {
            Ok((cursor, _)) => cursor,
            Err(EseError::KeyNotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        if cursor.node()?.key != key {
            return Ok(Vec::new());
        }

        while let Ok(prev) = cursor.prev() {
            if prev.key != key {
                cursor.next()?;
                break;
            }
        }

        let mut out = Vec::new();
        loop {
            let node = cursor.node()?;
            if node.key != key {
                break;
            }
            out.push(self.record_from_index_node(pager, index, &node, impacket_compat)?);
            match cursor.next() {
                Ok(_) => continue,
                Err(EseError::NoNeighbourPage(_)) => break,
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }

    /// Find the first record whose `equals` columns match, if any.
    pub fn search<'a>(
        &'a self,
        pager: &'a Pager,
        impacket_compat: bool,
        equals: &[(&str, &RecordValue)],
    ) -> Result<Option<Record<'a>>> {
        Ok(self.find_all(pager, impacket_compat, equals)?.into_iter().next())
    }

    /// Iterate every record in this table, in key order.
    ///
    /// `impacket_compat` mirrors the database handle's compatibility mode
    /// (see [`crate::esedb::db::EseDB`]); most callers go through
    /// `EseDB::table` rather than calling this directly, which threads the
    /// handle's own setting through automatically.
    pub fn records<'a>(
        &'a self,
        pager: &'a Pager,
        impacket_compat: bool,
    ) -> Result<impl Iterator<Item = Result<Record<'a>>> + 'a> {
        let nodes = btree::leaf_nodes(pager, self.root_page)?;
        Ok(nodes
            .into_iter()
            .map(move |node| Record::new(self, pager, node, impacket_compat)))
    }

    /// Resolve a separated ("long value") column's stored identifier into
    /// its reassembled bytes.
    pub fn get_long_value(&self, pager: &Pager, key: &[u8]) -> Result<Vec<u8>> {
        let root = self
            .long_value_root
            .ok_or_else(|| EseError::MissingLongValue(format!("table {} has no long-value tree", self.name)))?;
        longvalue::get_long_value(pager, root, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::esedb::header::MAGIC;
    use crate::esedb::index::{bit_index, encode_key, KeySegment};
    use crate::esedb::pager::BufSource;
    use crate::esedb::value::{Codepage, ColumnType};
    use byteorder::{ByteOrder, LittleEndian};

    fn fixed_column(id: u32, size: usize) -> Column {
        Column {
            identifier: id,
            name: format!("c{}", id),
            coltyp: ColumnType::Long,
            size,
            default: None,
            codepage: Codepage::Western,
            fixed_offset: None,
        }
    }

    #[test]
    fn fixed_columns_get_sequential_offsets() {
        let mut table = Table::new("T".into(), 1);
        table.add_column(fixed_column(1, 4));
        table.add_column(fixed_column(2, 8));
        assert_eq!(table.columns[0].fixed_offset, Some(0));
        assert_eq!(table.columns[1].fixed_offset, Some(4));
    }

    fn write_header(buf: &mut [u8], page_size: u32) {
        LittleEndian::write_u32(&mut buf[8..], MAGIC);
        LittleEndian::write_u32(&mut buf[236..], page_size);
        LittleEndian::write_u32(&mut buf[216..], 0x11);
    }

    fn build_leaf_page(page_size: usize, entries: &[(&[u8], &[u8])]) -> Vec<u8> {
        const PGHDR_LEN: usize = 40;
        let mut data = Vec::new();
        let mut tags = vec![(0u16, 0u16)];
        for (key, value) in entries {
            let mut node_buf = Vec::new();
            node_buf.extend_from_slice(&(key.len() as u16).to_le_bytes());
            node_buf.extend_from_slice(key);
            node_buf.extend_from_slice(value);
            let offset = data.len() as u16;
            let size = node_buf.len() as u16;
            data.extend_from_slice(&node_buf);
            tags.push((size, offset));
        }

        let mut buf = vec![0u8; page_size];
        let flags = 0x0000_0002u32 | 0x0000_0001 | 0x0000_0800; // LEAF | ROOT | NEW_RECORD_FORMAT
        LittleEndian::write_u32(&mut buf[24..], 1);
        LittleEndian::write_u16(&mut buf[32..], data.len() as u16);
        LittleEndian::write_u16(&mut buf[34..], tags.len() as u16);
        LittleEndian::write_u32(&mut buf[36..], flags);
        buf[PGHDR_LEN..PGHDR_LEN + data.len()].copy_from_slice(&data);

        let mut tag_bytes = Vec::new();
        for (cb, ib) in tags.iter().rev() {
            tag_bytes.extend_from_slice(&cb.to_le_bytes());
            tag_bytes.extend_from_slice(&ib.to_le_bytes());
        }
        let tag_start = buf.len() - tag_bytes.len();
        buf[tag_start..].copy_from_slice(&tag_bytes);
        buf
    }

    #[test]
    fn find_all_locates_record_via_primary_index() {
        let mut table = Table::new("T".into(), 1);
        table.add_column(fixed_column(1, 4));
        table.add_index(Index {
            name: "PK".into(),
            flags: bit_index::PRIMARY | bit_index::UNIQUE,
            root: 1,
            column_ids: vec![1],
            key_most: 255,
            var_seg_mac: 255,
            lcmap_flags: 0,
        });

        let value = RecordValue::I64(7);
        let key = encode_key(
            &KeySegment {
                coltyp: ColumnType::Long,
                is_fixed: true,
                codepage: Codepage::Western,
                value: Some(&value),
            },
            255,
            0,
        )
        .unwrap();

        // RECHDR: last_fixed=1, last_var=0, ibEndOfFixedData=9
        let mut record_data = vec![1u8, 0, 9, 0];
        record_data.extend_from_slice(&7i32.to_le_bytes());
        record_data.push(0); // null bitmap, not null

        let ps = 4096usize;
        let mut header_page = vec![0u8; ps];
        write_header(&mut header_page, ps as u32);
        let shadow_page = header_page.clone();
        let leaf = build_leaf_page(ps, &[(&key, &record_data)]);

        let mut buf = header_page;
        buf.extend_from_slice(&shadow_page);
        buf.extend_from_slice(&leaf);

        let pager = Pager::new(Box::new(BufSource::new(buf))).unwrap();
        let found = table
            .search(&pager, false, &[("c1", &value)])
            .unwrap()
            .expect("record should be found");
        assert_eq!(found.get("c1").unwrap(), RecordValue::I64(7));

        let missing = RecordValue::I64(99);
        assert!(table
            .search(&pager, false, &[("c1", &missing)])
            .unwrap()
            .is_none());
    }

    #[test]
    fn column_lookup_by_name() {
        let mut table = Table::new("T".into(), 1);
        table.add_column(fixed_column(1, 4));
        assert!(table.column("c1").is_ok());
        assert!(table.column("missing").is_err());
    }
}
