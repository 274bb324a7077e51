//! Catalog bootstrap: the hard-coded schema of `MSysObjects` itself, used to
//! linearly scan the catalog tree and reconstruct every other table's
//! metadata.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{EseError, Result};
use crate::esedb::column::Column;
use crate::esedb::index::Index;
use crate::esedb::pager::Pager;
use crate::esedb::record::Record;
use crate::esedb::table::Table;
use crate::esedb::value::{Codepage, ColumnType, RecordValue};

/// Logical page of the catalog's own root — fixed by the ESE format, not
/// discovered at runtime.
pub const CATALOG_ROOT_PAGE: u32 = 4;

/// `SYSOBJ` record-type discriminants, stored in the catalog's `Type` column.
mod sysobj {
    pub const TABLE: i64 = 1;
    pub const COLUMN: i64 = 2;
    pub const INDEX: i64 = 3;
    pub const LONG_VALUE: i64 = 4;
    pub const CALLBACK: i64 = 5;
}

/// The catalog table's own schema, identical across every ESE database
/// regardless of what application-level tables it goes on to describe.
fn catalog_columns() -> Vec<Column> {
    let fixed = |id, name: &str, coltyp: ColumnType| Column {
        identifier: id,
        name: name.to_string(),
        size: coltyp.fixed_size().unwrap_or(0),
        coltyp,
        default: None,
        codepage: Codepage::Western,
        fixed_offset: None,
    };
    let variable = |id, name: &str, coltyp: ColumnType| Column {
        identifier: id,
        name: name.to_string(),
        size: 0,
        coltyp,
        default: None,
        codepage: Codepage::Ascii,
        fixed_offset: None,
    };

    vec![
        fixed(1, "ObjidTable", ColumnType::Long),
        fixed(2, "Type", ColumnType::Short),
        fixed(3, "Id", ColumnType::Long),
        fixed(4, "ColtypOrPgnoFDP", ColumnType::Long),
        fixed(5, "SpaceUsage", ColumnType::Long),
        fixed(6, "Flags", ColumnType::Long),
        fixed(7, "PagesOrLocale", ColumnType::Long),
        fixed(8, "RootFlag", ColumnType::Bit),
        fixed(9, "RecordOffset", ColumnType::Short),
        fixed(10, "LCMapFlags", ColumnType::Long),
        fixed(11, "KeyMost", ColumnType::UnsignedShort),
        fixed(12, "LVChunkMax", ColumnType::Long),
        variable(128, "Name", ColumnType::Text),
        variable(129, "Stats", ColumnType::Binary),
        variable(130, "TemplateTable", ColumnType::Text),
        variable(131, "DefaultValue", ColumnType::Binary),
        variable(132, "KeyFldIDs", ColumnType::Binary),
        variable(133, "VarSegMac", ColumnType::Binary),
        variable(134, "ConditionalColumns", ColumnType::Binary),
        variable(135, "TupleLimits", ColumnType::Binary),
        variable(136, "Version", ColumnType::Binary),
        variable(137, "SortID", ColumnType::Binary),
        variable(256, "CallbackData", ColumnType::LongBinary),
        variable(257, "CallbackDependencies", ColumnType::LongBinary),
        variable(258, "SeparateLV", ColumnType::LongBinary),
        variable(259, "SpaceHints", ColumnType::LongBinary),
        variable(260, "SpaceDeferredLVHints", ColumnType::LongBinary),
        variable(261, "LocaleName", ColumnType::LongBinary),
    ]
}

/// All tables described by a database's catalog, bootstrapped by scanning
/// the catalog tree (rooted at a fixed logical page) with the hard-coded
/// catalog schema above.
pub struct Catalog {
    pub tables: Vec<Table>,
}

impl Catalog {
    pub fn load(pager: &Pager) -> Result<Self> {
        let mut catalog_table = Table::new("MSysObjects".to_string(), CATALOG_ROOT_PAGE);
        for column in catalog_columns() {
            catalog_table.add_column(column);
        }

        let mut tables: Vec<Table> = Vec::new();
        let mut current: Option<usize> = None;

        for record in catalog_table.records(pager, false)? {
            let record = record?;

            let rtype = match record.get("Type")? {
                RecordValue::I64(v) => v,
                RecordValue::U64(v) => v as i64,
                _ => continue,
            };

            match rtype {
                sysobj::TABLE => {
                    let name = text_value(&record, "Name")?;
                    let root = int_value(&record, "ColtypOrPgnoFDP")?;
                    tables.push(Table::new(name, root as u32));
                    current = Some(tables.len() - 1);
                }
                sysobj::COLUMN => {
                    let idx = current.ok_or_else(|| {
                        EseError::Malformed("catalog Column record before any Table record".into())
                    })?;
                    let id = int_value(&record, "Id")? as u32;
                    let name = text_value(&record, "Name")?;
                    let coltyp = ColumnType::from_u32(int_value(&record, "ColtypOrPgnoFDP")? as u32)?;
                    let size = match record.get("SpaceUsage")? {
                        RecordValue::I64(v) if v > 0 => v as usize,
                        RecordValue::U64(v) if v > 0 => v as usize,
                        _ => coltyp.fixed_size().unwrap_or(0),
                    };
                    let default = match record.get("DefaultValue")? {
                        RecordValue::Bytes(b) if !b.is_empty() => Some(b),
                        _ => None,
                    };
                    let codepage = if coltyp.is_text() {
                        Codepage::from_u32(int_value(&record, "PagesOrLocale")? as u32)
                    } else {
                        Codepage::Western
                    };

                    tables[idx].add_column(Column {
                        identifier: id,
                        name,
                        coltyp,
                        size,
                        default,
                        codepage,
                        fixed_offset: None,
                    });
                }
                sysobj::INDEX => {
                    let idx = current.ok_or_else(|| {
                        EseError::Malformed("catalog Index record before any Table record".into())
                    })?;
                    let name = text_value(&record, "Name")?;
                    let flags = int_value(&record, "Flags")? as u32;
                    let lcmap_flags = int_value(&record, "LCMapFlags")? as u32;
                    let root = int_value(&record, "ColtypOrPgnoFDP")? as u32;
                    let key_most = match record.get("KeyMost")? {
                        RecordValue::U64(v) if v > 0 => v as usize,
                        RecordValue::I64(v) if v > 0 => v as usize,
                        _ => crate::esedb::index::JET_CB_KEY_MOST_OLD,
                    };
                    let key_fld_ids = match record.get("KeyFldIDs")? {
                        RecordValue::Bytes(b) => b,
                        _ => Vec::new(),
                    };
                    let var_seg_mac = match record.get("VarSegMac")? {
                        RecordValue::Bytes(b) if b.len() >= 4 => LittleEndian::read_u32(&b[..4]) as usize,
                        _ => key_most,
                    };
                    let column_ids = parse_key_fld_ids(&key_fld_ids);

                    tables[idx].add_index(Index {
                        name,
                        flags,
                        root,
                        column_ids,
                        key_most,
                        var_seg_mac,
                        lcmap_flags,
                    });
                }
                sysobj::LONG_VALUE => {
                    let idx = current.ok_or_else(|| {
                        EseError::Malformed("catalog LongValue record before any Table record".into())
                    })?;
                    let root = int_value(&record, "ColtypOrPgnoFDP")? as u32;
                    tables[idx].long_value_root = Some(root);
                }
                sysobj::CALLBACK => {
                    let idx = current.ok_or_else(|| {
                        EseError::Malformed("catalog Callback record before any Table record".into())
                    })?;
                    if let RecordValue::Bytes(b) = record.get("CallbackData")? {
                        tables[idx].callback_data = Some(b);
                    }
                }
                _ => {}
            }
        }

        Ok(Catalog { tables })
    }

    pub fn table(&self, name: &str) -> Result<&Table> {
        self.tables
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| EseError::UnknownTable(name.to_string()))
    }
}

fn text_value(record: &Record, column: &str) -> Result<String> {
    match record.get(column)? {
        RecordValue::Text(s) => Ok(s),
        other => Err(EseError::Malformed(format!(
            "expected text in catalog column {}, got {:?}",
            column, other
        ))),
    }
}

fn int_value(record: &Record, column: &str) -> Result<i64> {
    match record.get(column)? {
        RecordValue::I64(v) => Ok(v),
        RecordValue::U64(v) => Ok(v as i64),
        RecordValue::Null => Ok(0),
        other => Err(EseError::Malformed(format!(
            "expected integer in catalog column {}, got {:?}",
            column, other
        ))),
    }
}

/// `KeyFldIDs` is an array of `(category: u16, column_id: u16)` pairs; only
/// the column identifier half matters for key construction.
fn parse_key_fld_ids(data: &[u8]) -> Vec<u32> {
    if data.len() % 4 != 0 {
        return Vec::new();
    }
    data.chunks_exact(4)
        .map(|chunk| LittleEndian::read_u16(&chunk[2..4]) as u32)
        .collect()
}
