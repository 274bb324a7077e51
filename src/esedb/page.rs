//! Page, tag, and node decoding.
//!
//! A [`Page`] is parsed eagerly out of a page-sized byte buffer: header
//! fields, flags, sibling links, and the tag array bounds are all computed
//! up front. Individual [`Node`]s (tag *i+1* reinterpreted as a B+ tree
//! entry) are parsed lazily and memoized.

use std::cell::RefCell;
use std::collections::HashMap;

use bitflags::bitflags;
use byteorder::{ByteOrder, LittleEndian};

use crate::error::{EseError, Result};

const PGHDR_LEN: usize = 40;
const PGHDR2_LEN: usize = 40;

bitflags! {
    /// `fFlags` on a page header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PageFlags: u32 {
        const ROOT = 0x0000_0001;
        const LEAF = 0x0000_0002;
        const PARENT_OF_LEAF = 0x0000_0004;
        const EMPTY = 0x0000_0008;
        const REPAIR = 0x0000_0010;
        const SPACE_TREE = 0x0000_0020;
        const INDEX = 0x0000_0040;
        const LONG_VALUE = 0x0000_0080;
        const NON_UNIQUE_KEYS = 0x0000_0400;
        const NEW_RECORD_FORMAT = 0x0000_0800;
        const NEW_CHECKSUM_FORMAT = 0x0000_2000;
        const SCRUBBED = 0x0000_4000;
    }
}

bitflags! {
    /// Tag flags (`TAG_FLAG`), stored either in the tag slot itself (small
    /// pages) or in the node's own data (large pages).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TagFlags: u16 {
        const VERSION = 0x01;
        const DELETED = 0x02;
        const COMPRESSED = 0x04;
    }
}

/// A parsed page header and tag/node view over its backing bytes.
pub struct Page {
    pub num: u32,
    buf: Vec<u8>,
    pub small_page: bool,
    pub flags: PageFlags,
    pub previous_page: u32,
    pub next_page: u32,
    pub object_id: u32,
    data_start: usize,
    data_end: usize,
    pub tag_count: u32,
    pub node_count: u32,
    node_cache: RefCell<HashMap<u32, Node>>,
}

impl Page {
    /// Parse a page out of a page-sized buffer.
    ///
    /// `small_page` must reflect the database-wide page size (≤ 8192 bytes
    /// means small-page mode); it governs both this page's header layout
    /// and its tag/flag bit masks.
    pub fn parse(num: u32, buf: Vec<u8>, small_page: bool) -> Result<Self> {
        if buf.len() < PGHDR_LEN {
            return Err(EseError::Malformed(format!(
                "page {} shorter than header",
                num
            )));
        }

        let previous_page = LittleEndian::read_u32(&buf[16..]);
        let next_page = LittleEndian::read_u32(&buf[20..]);
        let object_id = LittleEndian::read_u32(&buf[24..]);
        let ib_mic_free = LittleEndian::read_u16(&buf[32..]) as usize;
        let itag_mic_free = LittleEndian::read_u16(&buf[34..]) as u32;
        let flags = PageFlags::from_bits_truncate(LittleEndian::read_u32(&buf[36..]));

        let data_start = if small_page {
            PGHDR_LEN
        } else {
            PGHDR_LEN + PGHDR2_LEN
        };

        if buf.len() < data_start {
            return Err(EseError::Malformed(format!(
                "page {} shorter than large-page header",
                num
            )));
        }

        let data_end = data_start + ib_mic_free;
        if data_end > buf.len() {
            return Err(EseError::Malformed(format!(
                "page {} data region exceeds page bounds",
                num
            )));
        }

        Ok(Page {
            num,
            buf,
            small_page,
            flags,
            previous_page,
            next_page,
            object_id,
            data_start,
            data_end,
            tag_count: itag_mic_free,
            node_count: itag_mic_free.saturating_sub(1),
            node_cache: RefCell::new(HashMap::new()),
        })
    }

    pub fn is_root(&self) -> bool {
        self.flags.contains(PageFlags::ROOT)
    }

    pub fn is_leaf(&self) -> bool {
        self.flags.contains(PageFlags::LEAF)
    }

    pub fn is_branch(&self) -> bool {
        !self.is_leaf()
    }

    pub fn is_parent_of_leaf(&self) -> bool {
        self.flags.contains(PageFlags::PARENT_OF_LEAF)
    }

    pub fn is_empty(&self) -> bool {
        self.flags.contains(PageFlags::EMPTY)
    }

    pub fn is_space_tree(&self) -> bool {
        self.flags.contains(PageFlags::SPACE_TREE)
    }

    pub fn is_index(&self) -> bool {
        self.flags.contains(PageFlags::INDEX)
    }

    pub fn is_long_value(&self) -> bool {
        self.flags.contains(PageFlags::LONG_VALUE)
    }

    fn data(&self) -> &[u8] {
        &self.buf[self.data_start..self.data_end]
    }

    fn tag_mask(&self) -> u16 {
        if self.small_page {
            0x1FFF
        } else {
            0x7FFF
        }
    }

    /// Retrieve the raw `(offset, size, flags)` triple for tag `num`.
    pub fn tag(&self, num: u32) -> Result<Tag> {
        if num >= self.tag_count {
            return Err(EseError::IndexOutOfRange(format!(
                "tag {} exceeds boundaries: 0-{}",
                num,
                self.tag_count.saturating_sub(1)
            )));
        }

        let slot_offset = self
            .buf
            .len()
            .checked_sub(4 * (num as usize + 1))
            .ok_or_else(|| EseError::Malformed("page too small for tag array".into()))?;
        let slot = &self.buf[slot_offset..slot_offset + 4];

        let cb = LittleEndian::read_u16(&slot[0..2]);
        let ib = LittleEndian::read_u16(&slot[2..4]);
        let mask = self.tag_mask();

        let size = (cb & mask) as usize;
        let offset = (ib & mask) as usize;

        let data = self.data();
        let end = (offset + size).min(data.len());
        let start = offset.min(end);
        let tag_data = data[start..end].to_vec();

        let flags = if self.small_page {
            TagFlags::from_bits_truncate(ib >> 13)
        } else if tag_data.len() >= 2 {
            TagFlags::from_bits_truncate((tag_data[1] >> 5) as u16)
        } else {
            TagFlags::empty()
        };

        Ok(Tag {
            num,
            offset,
            size,
            data: tag_data,
            flags,
        })
    }

    /// The common key prefix shared by every entry on this page (tag 0),
    /// or empty on a root page (root pages carry no shared prefix).
    pub fn key_prefix(&self) -> Result<Vec<u8>> {
        if self.is_root() || self.tag_count == 0 {
            return Ok(Vec::new());
        }
        Ok(self.tag(0)?.data)
    }

    /// Retrieve node `num` (zero-indexed; node *i* is tag *i+1*), parsing
    /// and caching it on first access.
    pub fn node(&self, num: u32) -> Result<Node> {
        if num >= self.node_count {
            return Err(EseError::IndexOutOfRange(format!(
                "node {} exceeds boundaries: 0-{}",
                num,
                self.node_count.saturating_sub(1)
            )));
        }

        if let Some(node) = self.node_cache.borrow().get(&num) {
            return Ok(node.clone());
        }

        let tag = self.tag(num + 1)?;
        let prefix = self.key_prefix()?;
        let new_record_format = self.flags.contains(PageFlags::NEW_RECORD_FORMAT);
        let node = Node::parse(num, tag, &prefix, self.is_branch(), new_record_format)?;
        self.node_cache.borrow_mut().insert(num, node.clone());
        Ok(node)
    }

    pub fn tags(&self) -> impl Iterator<Item = u32> {
        1..self.tag_count
    }

    pub fn nodes(&self) -> impl Iterator<Item = u32> {
        0..self.node_count
    }
}

/// A `(offset, size, flags)` slot in the tag array, with its data sliced
/// out of the page's data region.
#[derive(Debug, Clone)]
pub struct Tag {
    pub num: u32,
    pub offset: usize,
    pub size: usize,
    pub data: Vec<u8>,
    pub flags: TagFlags,
}

/// A B+ tree entry: either a branch node pointing at a child page, or a
/// leaf node carrying record/long-value bytes.
#[derive(Debug, Clone)]
pub struct Node {
    pub num: u32,
    pub key: Vec<u8>,
    pub data: Vec<u8>,
    /// Child logical page number; only meaningful on branch pages.
    pub child: Option<u32>,
    /// Whether the originating page carries `fPageNewRecordFormat` — tagged
    /// fields in the old format aren't supported.
    pub new_record_format: bool,
}

impl Node {
    fn parse(
        num: u32,
        tag: Tag,
        page_prefix: &[u8],
        is_branch: bool,
        new_record_format: bool,
    ) -> Result<Self> {
        let buf = &tag.data;
        let mut offset = 0usize;

        let mut key_prefix = Vec::new();
        if buf.len() >= offset + 2 && tag.flags.contains(TagFlags::COMPRESSED) {
            let prefix_len = (LittleEndian::read_u16(&buf[offset..offset + 2]) & 0x1FFF) as usize;
            offset += 2;
            key_prefix = page_prefix
                .get(..prefix_len.min(page_prefix.len()))
                .unwrap_or(page_prefix)
                .to_vec();
            if key_prefix.len() < prefix_len {
                key_prefix.resize(prefix_len, 0);
            }
        }

        let mut key_suffix = Vec::new();
        if buf.len() >= offset + 2 {
            let suffix_len = (LittleEndian::read_u16(&buf[offset..offset + 2]) & 0x1FFF) as usize;
            offset += 2;
            let end = (offset + suffix_len).min(buf.len());
            key_suffix = buf[offset.min(end)..end].to_vec();
            offset = end;
        }

        let mut key = key_prefix;
        key.extend_from_slice(&key_suffix);

        let data = buf[offset.min(buf.len())..].to_vec();

        let child = if is_branch {
            if data.len() < 4 {
                return Err(EseError::Malformed(format!(
                    "branch node {} missing child page number",
                    num
                )));
            }
            Some(LittleEndian::read_u32(&data[..4]))
        } else {
            None
        };

        Ok(Node {
            num,
            key,
            data,
            child,
            new_record_format,
        })
    }
}
