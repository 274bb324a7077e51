//! Typed column values and the `JET_coltyp` decode table.

use byteorder::{ByteOrder, LittleEndian};
use serde::Serialize;

use crate::error::{EseError, Result};

/// `JET_coltyp` values, as stored in the catalog's `ColtypOrPgnoFDP` column
/// for non-table records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u32)]
pub enum ColumnType {
    Nil = 0,
    Bit = 1,
    UnsignedByte = 2,
    Short = 3,
    Long = 4,
    Currency = 5,
    IeeeSingle = 6,
    IeeeDouble = 7,
    DateTime = 8,
    Binary = 9,
    Text = 10,
    LongBinary = 11,
    LongText = 12,
    Slv = 13,
    UnsignedLong = 14,
    LongLong = 15,
    Guid = 16,
    UnsignedShort = 17,
    Max = 18,
}

impl ColumnType {
    pub fn from_u32(value: u32) -> Result<Self> {
        use ColumnType::*;
        Ok(match value {
            0 => Nil,
            1 => Bit,
            2 => UnsignedByte,
            3 => Short,
            4 => Long,
            5 => Currency,
            6 => IeeeSingle,
            7 => IeeeDouble,
            8 => DateTime,
            9 => Binary,
            10 => Text,
            11 => LongBinary,
            12 => LongText,
            13 => Slv,
            14 => UnsignedLong,
            15 => LongLong,
            16 => Guid,
            17 => UnsignedShort,
            18 => Max,
            other => {
                return Err(EseError::Malformed(format!(
                    "unknown JET_coltyp value: {}",
                    other
                )))
            }
        })
    }

    /// Fixed on-disk size in bytes, or `None` for a variable-length type.
    pub fn fixed_size(self) -> Option<usize> {
        use ColumnType::*;
        match self {
            Bit | UnsignedByte => Some(1),
            Short | UnsignedShort => Some(2),
            Long | IeeeSingle | UnsignedLong => Some(4),
            Currency | IeeeDouble | DateTime | LongLong => Some(8),
            Guid => Some(16),
            Binary | Text | LongBinary | LongText | Slv | Nil | Max => None,
        }
    }

    pub fn is_long_value(self) -> bool {
        matches!(self, ColumnType::LongBinary | ColumnType::LongText)
    }

    pub fn is_text(self) -> bool {
        matches!(self, ColumnType::Text | ColumnType::LongText)
    }

    pub fn is_binary(self) -> bool {
        matches!(self, ColumnType::Binary | ColumnType::LongBinary)
    }
}

/// Text codepages recognized by the `PagesOrLocale` catalog column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codepage {
    Unicode,
    Western,
    Ascii,
}

impl Codepage {
    pub fn from_u32(value: u32) -> Self {
        match value {
            1200 => Codepage::Unicode,
            20127 => Codepage::Ascii,
            _ => Codepage::Western,
        }
    }
}

/// A decoded column value.
///
/// `PartialOrd` is derived so [`crate::esedb::record::Record`] can order
/// records by their full column-value tuple; it has no on-disk meaning
/// (comparing a `Text` to a `Bytes` falls out of the derive's variant-index
/// tie-break, not a collation rule).
#[derive(Debug, Clone, PartialEq, PartialOrd, Serialize)]
#[serde(untagged)]
pub enum RecordValue {
    Null,
    Bool(bool),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Text(String),
    Bytes(Vec<u8>),
    Guid(String),
    List(Vec<RecordValue>),
}

/// Decode a single fixed/variable-length value (not a tagged multi-value
/// wrapper, which is handled one layer up in [`crate::esedb::record`]).
pub fn decode_value(coltyp: ColumnType, data: &[u8], codepage: Codepage) -> Result<RecordValue> {
    use ColumnType::*;
    Ok(match coltyp {
        Nil | Max => RecordValue::Null,
        Bit => RecordValue::Bool(data.first().copied().unwrap_or(0) == 0xFF),
        UnsignedByte => RecordValue::U64(data.first().copied().unwrap_or(0) as u64),
        Short => RecordValue::I64(require_len(data, 2, "Short")?.into()),
        UnsignedShort => {
            RecordValue::U64(LittleEndian::read_u16(require_bytes(data, 2, "UnsignedShort")?) as u64)
        }
        Long => RecordValue::I64(LittleEndian::read_i32(require_bytes(data, 4, "Long")?) as i64),
        UnsignedLong => {
            RecordValue::U64(LittleEndian::read_u32(require_bytes(data, 4, "UnsignedLong")?) as u64)
        }
        Currency | LongLong => {
            RecordValue::I64(LittleEndian::read_i64(require_bytes(data, 8, "Currency/LongLong")?))
        }
        IeeeSingle => RecordValue::F32(LittleEndian::read_f32(require_bytes(data, 4, "IEEESingle")?)),
        IeeeDouble => RecordValue::F64(LittleEndian::read_f64(require_bytes(data, 8, "IEEEDouble")?)),
        // Kept as the raw signed 64-bit quantity: callers decide whether to
        // interpret it as an OLE Automation date or a Windows FILETIME.
        DateTime => RecordValue::I64(LittleEndian::read_i64(require_bytes(data, 8, "DateTime")?)),
        Binary | LongBinary | Slv => RecordValue::Bytes(data.to_vec()),
        Text | LongText => RecordValue::Text(decode_text(data, codepage)),
        Guid => RecordValue::Guid(decode_guid(require_bytes(data, 16, "GUID")?)),
    })
}

fn require_len(data: &[u8], len: usize, what: &str) -> Result<i16> {
    let bytes = require_bytes(data, len, what)?;
    Ok(LittleEndian::read_i16(bytes))
}

fn require_bytes<'a>(data: &'a [u8], len: usize, what: &str) -> Result<&'a [u8]> {
    if data.len() < len {
        return Err(EseError::Malformed(format!(
            "{} value needs {} bytes, got {}",
            what,
            len,
            data.len()
        )));
    }
    Ok(&data[..len])
}

/// Decode a GUID from its on-disk `bytes_le` layout into canonical
/// hyphenated textual form.
pub fn decode_guid(data: &[u8]) -> String {
    let d1 = LittleEndian::read_u32(&data[0..4]);
    let d2 = LittleEndian::read_u16(&data[4..6]);
    let d3 = LittleEndian::read_u16(&data[6..8]);
    format!(
        "{:08x}-{:04x}-{:04x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        d1, d2, d3, data[8], data[9], data[10], data[11], data[12], data[13], data[14], data[15]
    )
}

/// Decode text bytes per the column's codepage, trimming trailing NUL
/// padding the way fixed/variable ESE text columns carry it.
pub fn decode_text(data: &[u8], codepage: Codepage) -> String {
    let s = match codepage {
        Codepage::Unicode => decode_utf16le(data),
        Codepage::Western => decode_cp1252(data),
        Codepage::Ascii => decode_cp1252(data),
    };
    s.trim_end_matches('\0').to_string()
}

fn decode_utf16le(data: &[u8]) -> String {
    // An odd trailing byte is padding, not a partial code unit.
    let usable = data.len() - (data.len() % 2);
    let units: Vec<u16> = data[..usable]
        .chunks_exact(2)
        .map(|c| LittleEndian::read_u16(c))
        .collect();
    String::from_utf16_lossy(&units)
}

/// Windows-1252 is identical to Latin-1 except for the C1 control range
/// (0x80-0x9F), which carries printable characters instead.
pub(crate) const CP1252_HIGH: [char; 32] = [
    '\u{20AC}', '\u{0081}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{008D}', '\u{017D}', '\u{008F}',
    '\u{0090}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\u{009D}', '\u{017E}', '\u{0178}',
];

/// Re-encode a single character into its Windows-1252 byte, if it has one.
/// Used when normalizing decoded text back into an index key.
pub(crate) fn cp1252_encode_char(ch: char) -> Option<u8> {
    let code = ch as u32;
    if code < 0x80 || (0xA0..=0xFF).contains(&code) {
        return Some(code as u8);
    }
    CP1252_HIGH
        .iter()
        .position(|&c| c == ch)
        .map(|idx| 0x80 + idx as u8)
}

fn decode_cp1252(data: &[u8]) -> String {
    data.iter()
        .map(|&b| {
            if (0x80..0xA0).contains(&b) {
                CP1252_HIGH[(b - 0x80) as usize]
            } else {
                b as char
            }
        })
        .collect()
}
