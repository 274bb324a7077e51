//! Column-value compression schemes.
//!
//! The identifier byte at the front of a compressed value selects the
//! scheme: 7-bit ASCII/Unicode packing for short strings, or plain
//! (Huffman-less) LZXPRESS for everything else. XPRESS9/XPRESS10 are
//! rejected rather than decoded, matching spec.md's stated non-goal.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{EseError, Result};

const COMPRESS_7BIT_ASCII: u8 = 1;
const COMPRESS_7BIT_UNICODE: u8 = 2;
const COMPRESS_XPRESS: u8 = 3;
const COMPRESS_XPRESS9: u8 = 5;
const COMPRESS_XPRESS10: u8 = 6;

/// Decompress a column value. `buf` includes the leading identifier byte
/// (and, for XPRESS, the two-byte decompressed-size field that follows it).
pub fn decompress(buf: &[u8]) -> Result<Vec<u8>> {
    if buf.is_empty() {
        return Ok(Vec::new());
    }

    let identifier = buf[0] >> 3;
    match identifier {
        COMPRESS_7BIT_ASCII => Ok(decompress_sevenbit(&buf[1..], false)),
        COMPRESS_7BIT_UNICODE => Ok(decompress_sevenbit(&buf[1..], true)),
        COMPRESS_XPRESS => {
            if buf.len() < 3 {
                return Err(EseError::Malformed(
                    "XPRESS payload missing size header".into(),
                ));
            }
            decompress_lzxpress(&buf[3..])
        }
        COMPRESS_XPRESS9 => Err(EseError::UnsupportedCompression("XPRESS9".into())),
        COMPRESS_XPRESS10 => Err(EseError::UnsupportedCompression("XPRESS10".into())),
        _ => Ok(buf.to_vec()),
    }
}

/// Unpack a stream of 7-bit values into bytes (`wide = true` widens each
/// value to a little-endian UTF-16 code unit, for `COMPRESS_7BITUNICODE`).
fn decompress_sevenbit(data: &[u8], wide: bool) -> Vec<u8> {
    let mut bit_buffer: u32 = 0;
    let mut bit_count: u32 = 0;
    let mut values = Vec::new();

    for &byte in data {
        bit_buffer |= (byte as u32) << bit_count;
        bit_count += 8;
        while bit_count >= 7 {
            values.push((bit_buffer & 0x7F) as u8);
            bit_buffer >>= 7;
            bit_count -= 7;
        }
    }

    if wide {
        let mut out = Vec::with_capacity(values.len() * 2);
        for v in values {
            out.push(v);
            out.push(0);
        }
        out
    } else {
        values
    }
}

/// Plain (non-Huffman) LZXPRESS decompression, per the MS-XCA "Plain LZ77"
/// algorithm: a 32-bit flag word precedes every 32 tokens, each token bit
/// selecting a literal byte or a length/offset back-reference. Match
/// lengths escalate through nested escape values (7, then a nibble, then a
/// byte, then a u16) to keep short matches cheap to encode.
fn decompress_lzxpress(data: &[u8]) -> Result<Vec<u8>> {
    let mut output: Vec<u8> = Vec::new();
    let mut pos = 0usize;
    let mut flags: u32 = 0;
    let mut flag_count: u32 = 0;
    let mut last_length_half_byte: Option<usize> = None;

    while pos < data.len() {
        if flag_count == 0 {
            if pos + 4 > data.len() {
                break;
            }
            flags = LittleEndian::read_u32(&data[pos..pos + 4]);
            pos += 4;
            flag_count = 32;
        }
        flag_count -= 1;

        if (flags & (1 << flag_count)) == 0 {
            if pos >= data.len() {
                break;
            }
            output.push(data[pos]);
            pos += 1;
            continue;
        }

        let (mut match_length, match_offset);
        if pos == data.len().saturating_sub(1) {
            match_length = (data[pos] & 0x0F) as u32;
            match_offset = 1usize;
            pos += 1;
        } else {
            if pos + 2 > data.len() {
                return Err(EseError::Malformed("truncated LZXPRESS match token".into()));
            }
            let match_bytes = LittleEndian::read_u16(&data[pos..pos + 2]) as u32;
            pos += 2;
            match_length = match_bytes % 8;
            match_offset = (match_bytes / 8 + 1) as usize;
        }

        if match_length == 7 {
            match last_length_half_byte {
                None => {
                    if pos >= data.len() {
                        return Err(EseError::Malformed("truncated LZXPRESS length nibble".into()));
                    }
                    match_length = (data[pos] % 16) as u32;
                    last_length_half_byte = Some(pos);
                    pos += 1;
                }
                Some(idx) => {
                    match_length = (data[idx] / 16) as u32;
                    last_length_half_byte = None;
                }
            }

            if match_length == 15 {
                if pos >= data.len() {
                    return Err(EseError::Malformed("truncated LZXPRESS length byte".into()));
                }
                match_length = data[pos] as u32;
                pos += 1;
                if match_length == 255 {
                    if pos + 2 > data.len() {
                        return Err(EseError::Malformed("truncated LZXPRESS length u16".into()));
                    }
                    match_length = LittleEndian::read_u16(&data[pos..pos + 2]) as u32;
                    pos += 2;
                    match_length = match_length.saturating_sub(15 + 7);
                }
                match_length += 15;
            }
            match_length += 7;
        }
        match_length += 3;

        if match_offset == 0 || match_offset > output.len() {
            return Err(EseError::Malformed(
                "LZXPRESS back-reference points before start of output".into(),
            ));
        }
        for _ in 0..match_length {
            let byte = output[output.len() - match_offset];
            output.push(byte);
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sevenbit_ascii_roundtrip() {
        // Packed form of the 7-bit values 0x68 ('h'), 0x69 ('i').
        let packed = [0xE8, 0x34];
        assert_eq!(decompress_sevenbit(&packed, false), b"hi");
    }

    #[test]
    fn sevenbit_unicode_widens_each_value() {
        let packed = [0xE8, 0x34];
        assert_eq!(decompress_sevenbit(&packed, true), vec![0x68, 0, 0x69, 0]);
    }

    #[test]
    fn lzxpress_literal_only_stream_passes_through() {
        let mut data = vec![0u8; 4]; // flags word: all literals
        data.extend_from_slice(b"abc");
        let out = decompress_lzxpress(&data).unwrap();
        assert_eq!(out, b"abc");
    }

    #[test]
    fn lzxpress9_is_rejected() {
        let buf = [(COMPRESS_XPRESS9 << 3)];
        assert!(matches!(
            decompress(&buf),
            Err(EseError::UnsupportedCompression(_))
        ));
    }

    #[test]
    fn uncompressed_identifier_passes_through_untouched() {
        let buf = [0x01, 0x02, 0x03];
        assert_eq!(decompress(&buf).unwrap(), vec![0x01, 0x02, 0x03]);
    }

    #[test]
    fn dispatches_sevenbit_scheme_by_identifier() {
        let mut buf = vec![COMPRESS_7BIT_ASCII << 3];
        buf.extend_from_slice(&[0xE8, 0x34]);
        assert_eq!(decompress(&buf).unwrap(), b"hi");
    }
}
