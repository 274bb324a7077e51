//! Out-of-line ("long value") blob reassembly.
//!
//! Long values live in a table's own long-value B+ tree, keyed by a
//! byte-reversed value identifier followed by a big-endian chunk offset (the
//! reversal spreads sequential identifiers across the tree instead of
//! piling them into its rightmost edge). The header node at the exact
//! (reversed) key carries the total decompressed size; every sibling node
//! sharing that key prefix is one chunk, walked in ascending offset order.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::{EseError, Result};
use crate::esedb::btree::Cursor;
use crate::esedb::compression;
use crate::esedb::pager::Pager;

/// Reassemble the long value identified by `key` (the raw long-value-id
/// bytes as stored in a record's `Separated` column slot) from the
/// long-value tree rooted at `lv_root`.
pub fn get_long_value(pager: &Pager, lv_root: u32, key: &[u8]) -> Result<Vec<u8>> {
    let mut rkey = key.to_vec();
    rkey.reverse();

    let mut cursor = Cursor::new(pager, lv_root)?;
    let header = cursor.search(&rkey, true)?;
    if header.data.len() < 8 {
        return Err(EseError::Malformed(
            "long-value header node shorter than 8 bytes".into(),
        ));
    }
    let total_size = LittleEndian::read_u32(&header.data[4..8]) as usize;

    let mut chunks: Vec<(Vec<u8>, u32)> = Vec::new();
    loop {
        match cursor.next() {
            Ok(node) => {
                if !node.key.starts_with(&rkey) {
                    break;
                }
                if node.key.len() < 4 {
                    return Err(EseError::Malformed(
                        "long-value chunk key shorter than 4 bytes".into(),
                    ));
                }
                let offset = BigEndian::read_u32(&node.key[node.key.len() - 4..]);
                chunks.push((node.data.clone(), offset));
            }
            Err(EseError::NoNeighbourPage(_)) => break,
            Err(e) => return Err(e),
        }
    }

    let mut result = Vec::with_capacity(total_size);
    for (i, (chunk, offset)) in chunks.iter().enumerate() {
        let next_offset = chunks
            .get(i + 1)
            .map(|(_, o)| *o)
            .unwrap_or(total_size as u32);
        let expected_len = next_offset.saturating_sub(*offset) as usize;

        if chunk.len() != expected_len {
            result.extend_from_slice(&compression::decompress(chunk)?);
        } else {
            result.extend_from_slice(chunk);
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::esedb::header::MAGIC;
    use crate::esedb::pager::BufSource;
    use byteorder::{ByteOrder, LittleEndian as LE};

    fn write_header(buf: &mut [u8], page_size: u32) {
        LE::write_u32(&mut buf[8..], MAGIC);
        LE::write_u32(&mut buf[236..], page_size);
        LE::write_u32(&mut buf[216..], 0x11);
    }

    fn build_lv_page(page_size: usize, entries: &[(&[u8], &[u8])]) -> Vec<u8> {
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
        let flags = 0x0000_0002u32 | 0x0000_0001 | 0x0000_0080; // LEAF | ROOT | LONG_VALUE
        LE::write_u32(&mut buf[24..], 1);
        LE::write_u16(&mut buf[32..], data.len() as u16);
        LE::write_u16(&mut buf[34..], tags.len() as u16);
        LE::write_u32(&mut buf[36..], flags);
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
    fn reassembles_two_uncompressed_chunks() {
        let id: u32 = 7;
        let mut rkey = id.to_be_bytes().to_vec();
        rkey.reverse();

        let mut header_data = vec![0u8; 4];
        header_data.extend_from_slice(&16u32.to_le_bytes()); // total size = 16

        let mut chunk0_key = rkey.clone();
        chunk0_key.extend_from_slice(&0u32.to_be_bytes());
        let chunk0_data = vec![b'A'; 8];

        let mut chunk1_key = rkey.clone();
        chunk1_key.extend_from_slice(&8u32.to_be_bytes());
        let chunk1_data = vec![b'B'; 8];

        let ps = 4096usize;
        let mut header_page = vec![0u8; ps];
        write_header(&mut header_page, ps as u32);
        let shadow_page = header_page.clone();

        let leaf = build_lv_page(
            ps,
            &[
                (&rkey, &header_data),
                (&chunk0_key, &chunk0_data),
                (&chunk1_key, &chunk1_data),
            ],
        );

        let mut buf = header_page;
        buf.extend_from_slice(&shadow_page);
        buf.extend_from_slice(&leaf);

        let pager = Pager::new(Box::new(BufSource::new(buf))).unwrap();
        let result = get_long_value(&pager, 1, &id.to_be_bytes()).unwrap();
        assert_eq!(result, [vec![b'A'; 8], vec![b'B'; 8]].concat());
    }
}
