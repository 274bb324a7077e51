//! End-to-end test: build a tiny synthetic ESE database entirely in-memory
//! (header, shadow header, catalog tree, one user table) and walk it through
//! the public `EseDB` API, without requiring a real Windows artifact fixture.

use byteorder::{ByteOrder, LittleEndian};

use esedb::esedb::db::EseDB;
use esedb::esedb::value::RecordValue;

const PAGE_SIZE: u32 = 4096;
const MAGIC: u32 = 0x89ABCDEF;
const PGHDR_LEN: usize = 40;

fn header_page() -> Vec<u8> {
    let mut buf = vec![0u8; PAGE_SIZE as usize];
    LittleEndian::write_u32(&mut buf[8..], MAGIC);
    LittleEndian::write_u32(&mut buf[236..], PAGE_SIZE);
    LittleEndian::write_u32(&mut buf[216..], 0x11); // format major >= 9
    buf
}

/// Build a single leaf page (ROOT, no siblings) out of `(key, data)` pairs,
/// already in ascending key order.
fn build_leaf_page(entries: &[(Vec<u8>, Vec<u8>)]) -> Vec<u8> {
    let ps = PAGE_SIZE as usize;
    let mut data = Vec::new();
    let mut tags = vec![(0u16, 0u16)]; // tag 0: empty key prefix

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

    let mut buf = vec![0u8; ps];
    let flags = 0x0000_0002u32 | 0x0000_0001; // LEAF | ROOT
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

/// A catalog `Table` record: fixed columns 1 (ObjidTable) - 4 (ColtypOrPgnoFDP)
/// present, variable column 128 (Name) present.
fn catalog_table_record(name: &str, root_page: u32) -> Vec<u8> {
    let mut data = vec![4u8, 128, 0, 0]; // last_fixed=4, last_var=128, ibEndOfFixedData filled below
    data.extend_from_slice(&0i32.to_le_bytes()); // ObjidTable
    data.extend_from_slice(&1i16.to_le_bytes()); // Type = Table
    data.extend_from_slice(&1i32.to_le_bytes()); // Id
    data.extend_from_slice(&(root_page as i32).to_le_bytes()); // ColtypOrPgnoFDP = root page
    data.push(0); // fixed-null bitmap: nothing null
    let ib_end_of_fixed = data.len() as u16;
    LittleEndian::write_u16(&mut data[2..4], ib_end_of_fixed);

    let name_bytes = name.as_bytes();
    data.extend_from_slice(&(name_bytes.len() as u16).to_le_bytes());
    data.extend_from_slice(name_bytes);
    data
}

/// A catalog `Column` record: fixed columns 1 (ObjidTable) - 5 (SpaceUsage)
/// present, variable column 128 (Name) present.
fn catalog_column_record(identifier: u32, name: &str, coltyp: u32, size: u32) -> Vec<u8> {
    let mut data = vec![5u8, 128, 0, 0]; // last_fixed=5, last_var=128
    data.extend_from_slice(&0i32.to_le_bytes()); // ObjidTable
    data.extend_from_slice(&2i16.to_le_bytes()); // Type = Column
    data.extend_from_slice(&(identifier as i32).to_le_bytes()); // Id = column identifier
    data.extend_from_slice(&(coltyp as i32).to_le_bytes()); // ColtypOrPgnoFDP = JET_coltyp
    data.extend_from_slice(&(size as i32).to_le_bytes()); // SpaceUsage = declared size
    data.push(0); // fixed-null bitmap
    let ib_end_of_fixed = data.len() as u16;
    LittleEndian::write_u16(&mut data[2..4], ib_end_of_fixed);

    let name_bytes = name.as_bytes();
    data.extend_from_slice(&(name_bytes.len() as u16).to_le_bytes());
    data.extend_from_slice(name_bytes);
    data
}

/// A table record with a single fixed `Long` column at identifier 1.
fn long_column_record(value: i32) -> Vec<u8> {
    let mut data = vec![1u8, 0, 9, 0];
    data.extend_from_slice(&value.to_le_bytes());
    data.push(0);
    data
}

#[test]
fn opens_database_and_decodes_bootstrapped_table() {
    let header = header_page();
    let shadow = header.clone();

    let catalog_entries = vec![
        (vec![0u8, 0, 0, 1], catalog_table_record("Basic", 10)),
        (vec![0u8, 0, 0, 2], catalog_column_record(1, "Id", 4 /* Long */, 4)),
    ];
    let catalog_root = build_leaf_page(&catalog_entries);

    let data_entries = vec![(vec![0u8, 0, 0, 1], long_column_record(42))];
    let data_root = build_leaf_page(&data_entries);

    // Physical layout: [header, shadow, logical1..3 (unused), logical4 =
    // catalog root, logical5..9 (unused), logical10 = data table root].
    let mut buf = header;
    buf.extend_from_slice(&shadow);
    for _ in 0..3 {
        buf.extend_from_slice(&vec![0u8; PAGE_SIZE as usize]);
    }
    buf.extend_from_slice(&catalog_root); // logical 4
    for _ in 0..5 {
        buf.extend_from_slice(&vec![0u8; PAGE_SIZE as usize]);
    }
    buf.extend_from_slice(&data_root); // logical 10

    let db = EseDB::from_bytes(buf).expect("database should open");
    assert_eq!(db.page_size(), PAGE_SIZE);

    let tables: Vec<&str> = db.tables().iter().map(|t| t.name.as_str()).collect();
    assert_eq!(tables, vec!["Basic"]);

    let table = db.table("Basic").unwrap();
    assert_eq!(table.columns.len(), 1);
    assert_eq!(table.column("Id").unwrap().identifier, 1);

    let records: Vec<_> = db.records(table).unwrap().collect::<Result<_, _>>().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].get("Id").unwrap(), RecordValue::I64(42));
}
