//! Primary and shadow database header parsing (`DBFILEHDR`).
//!
//! Mirrors the subset of the on-disk `DBFILEHDR` structure the core cares
//! about: the magic constant, page size, and format-revision pair. Fields
//! not consulted by the reader (backup info, log signatures, dbtime, ...)
//! are intentionally not modeled.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{EseError, Result};

/// `ulMagic` value every valid ESE database header must carry.
pub const MAGIC: u32 = 0x89ABCDEF;

const MAGIC_OFFSET: usize = 8;
const VERSION_OFFSET: usize = 12;
const PAGE_SIZE_OFFSET: usize = 236;
const FORMAT_MAJOR_OFFSET: usize = 216;
const FORMAT_MINOR_OFFSET: usize = 616;

const HEADER_MIN_LEN: usize = PAGE_SIZE_OFFSET + 4;

/// Candidate shadow-header offsets, scanned in ascending order.
const SHADOW_OFFSET_MIN_SHIFT: u32 = 11; // 0x800
const SHADOW_OFFSET_MAX_SHIFT: u32 = 15; // 0x8000

/// The fixed-layout fields of `DBFILEHDR` relevant to the reader.
#[derive(Debug, Clone, Copy)]
pub struct DbHeader {
    pub magic: u32,
    pub version: u32,
    pub page_size: u32,
    pub format_major: u32,
    pub format_minor: u32,
}

impl DbHeader {
    /// Parse a `DBFILEHDR` out of the first physical page, then locate and
    /// validate the required shadow header copy.
    ///
    /// Page size is not yet known at this point, so the caller must supply
    /// the raw bytes of (at least) the first 4 KiB of the file.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_MIN_LEN {
            return Err(EseError::InvalidDatabase(format!(
                "header buffer too small: {} bytes",
                buf.len()
            )));
        }

        let magic = LittleEndian::read_u32(&buf[MAGIC_OFFSET..]);
        if magic != MAGIC {
            return Err(EseError::InvalidDatabase(format!(
                "bad magic: 0x{:08x}",
                magic
            )));
        }

        let version = LittleEndian::read_u32(&buf[VERSION_OFFSET..]);
        let page_size_raw = LittleEndian::read_u32(&buf[PAGE_SIZE_OFFSET..]);
        let page_size = if page_size_raw == 0 {
            4096
        } else {
            page_size_raw
        };

        if !matches!(page_size, 4096 | 8192 | 16384 | 32768) {
            return Err(EseError::InvalidDatabase(format!(
                "unsupported page size: {}",
                page_size
            )));
        }

        let format_major = LittleEndian::read_u32(&buf[FORMAT_MAJOR_OFFSET..]);
        let format_minor = if buf.len() >= FORMAT_MINOR_OFFSET + 4 {
            LittleEndian::read_u32(&buf[FORMAT_MINOR_OFFSET..])
        } else {
            0
        };

        if format_major < 9 {
            return Err(EseError::InvalidDatabase(format!(
                "unsupported format revision: {}",
                format_major
            )));
        }

        Ok(DbHeader {
            magic,
            version,
            page_size,
            format_major,
            format_minor,
        })
    }

    /// Verify that a shadow header copy exists somewhere in `file_len` bytes
    /// by asking `read_at` for each candidate power-of-two offset.
    ///
    /// `read_at` should return `None` for an offset entirely past the end of
    /// the source. Returns `Ok(())` as soon as one candidate parses with a
    /// matching magic constant.
    pub fn verify_shadow<F>(mut read_at: F) -> Result<()>
    where
        F: FnMut(u64, usize) -> Option<Vec<u8>>,
    {
        for shift in SHADOW_OFFSET_MIN_SHIFT..=SHADOW_OFFSET_MAX_SHIFT {
            let offset = 1u64 << shift;
            if let Some(buf) = read_at(offset, HEADER_MIN_LEN) {
                if buf.len() >= MAGIC_OFFSET + 4 && LittleEndian::read_u32(&buf[MAGIC_OFFSET..]) == MAGIC
                {
                    return Ok(());
                }
            }
        }

        Err(EseError::InvalidDatabase(
            "no valid shadow header found".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_header(page_size: u32, format_major: u32) -> Vec<u8> {
        let mut buf = vec![0u8; HEADER_MIN_LEN.max(FORMAT_MINOR_OFFSET + 4)];
        LittleEndian::write_u32(&mut buf[MAGIC_OFFSET..], MAGIC);
        LittleEndian::write_u32(&mut buf[VERSION_OFFSET..], 0x620);
        LittleEndian::write_u32(&mut buf[PAGE_SIZE_OFFSET..], page_size);
        LittleEndian::write_u32(&mut buf[FORMAT_MAJOR_OFFSET..], format_major);
        buf
    }

    #[test]
    fn parses_valid_header() {
        let buf = make_header(4096, 0x11);
        let header = DbHeader::parse(&buf).unwrap();
        assert_eq!(header.magic, MAGIC);
        assert_eq!(header.page_size, 4096);
        assert_eq!(header.format_major, 0x11);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut buf = make_header(4096, 0x11);
        buf[MAGIC_OFFSET] ^= 0xFF;
        assert!(DbHeader::parse(&buf).is_err());
    }

    #[test]
    fn rejects_old_format() {
        let buf = make_header(4096, 5);
        assert!(matches!(
            DbHeader::parse(&buf),
            Err(EseError::InvalidDatabase(_))
        ));
    }

    #[test]
    fn rejects_bad_page_size() {
        let buf = make_header(12345, 0x11);
        assert!(DbHeader::parse(&buf).is_err());
    }

    #[test]
    fn shadow_header_found_at_first_candidate() {
        let shadow = make_header(4096, 0x11);
        let result = DbHeader::verify_shadow(|offset, len| {
            if offset == 0x800 {
                Some(shadow[..len.min(shadow.len())].to_vec())
            } else {
                None
            }
        });
        assert!(result.is_ok());
    }

    #[test]
    fn shadow_header_missing() {
        let result = DbHeader::verify_shadow(|_, _| None);
        assert!(result.is_err());
    }
}
