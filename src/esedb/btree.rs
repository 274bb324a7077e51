//! Stateful B+ tree cursor: node lookup, exact/inexact search, and
//! sibling-page stepping.

use std::cmp::Ordering;
use std::rc::Rc;

use crate::error::{EseError, Result};
use crate::esedb::page::{Node, Page};
use crate::esedb::pager::Pager;

/// A position within a table's (or index's) B+ tree, rooted at a fixed
/// logical page.
pub struct Cursor<'a> {
    pager: &'a Pager,
    root: u32,
    page: Rc<Page>,
    index: u32,
}

impl<'a> Cursor<'a> {
    pub fn new(pager: &'a Pager, root: u32) -> Result<Self> {
        let page = pager.page(root)?;
        Ok(Cursor {
            pager,
            root,
            page,
            index: 0,
        })
    }

    /// Return to the first node of the root page.
    pub fn reset(&mut self) -> Result<()> {
        self.page = self.pager.page(self.root)?;
        self.index = 0;
        Ok(())
    }

    /// The node the cursor currently sits on.
    pub fn node(&self) -> Result<Node> {
        self.page.node(self.index)
    }

    /// Advance to the next node, crossing into the next sibling leaf page
    /// when the current page is exhausted.
    pub fn next(&mut self) -> Result<Node> {
        if self.index + 1 < self.page.node_count {
            self.index += 1;
        } else {
            self.step_to_next_page()?;
            self.index = 0;
        }
        self.node()
    }

    fn step_to_next_page(&mut self) -> Result<()> {
        let next = self.page.next_page;
        if next == 0 {
            return Err(EseError::NoNeighbourPage(
                "no next page after current leaf".into(),
            ));
        }
        self.page = self.pager.page(next)?;
        Ok(())
    }

    /// Step back to the previous node, crossing into the previous sibling
    /// leaf page when the current page is exhausted.
    pub fn prev(&mut self) -> Result<Node> {
        if self.index > 0 {
            self.index -= 1;
        } else {
            self.step_to_prev_page()?;
            self.index = self.page.node_count.saturating_sub(1);
        }
        self.node()
    }

    fn step_to_prev_page(&mut self) -> Result<()> {
        let prev = self.page.previous_page;
        if prev == 0 {
            return Err(EseError::NoNeighbourPage(
                "no previous page before current leaf".into(),
            ));
        }
        self.page = self.pager.page(prev)?;
        Ok(())
    }

    /// Descend from the root to the leaf node matching `key`.
    ///
    /// When `exact` is true, a leaf whose key does not equal `key` exactly
    /// is reported as [`EseError::KeyNotFound`]; otherwise the closest node
    /// reached by descent is returned (the standard "insertion point"
    /// behavior used by range scans).
    pub fn search(&mut self, key: &[u8], exact: bool) -> Result<Node> {
        let mut page = self.pager.page(self.root)?;
        loop {
            let (idx, node) = find_node(&page, key)?;
            if page.is_branch() {
                let child = node.child.ok_or_else(|| {
                    EseError::Malformed("branch node missing child page number".into())
                })?;
                page = self.pager.page(child)?;
            } else {
                self.page = page;
                self.index = idx;
                if exact && node.key != key {
                    return Err(EseError::KeyNotFound(format!("{:02x?}", key)));
                }
                return Ok(node);
            }
        }
    }
}

/// Collect every leaf node reachable from `root`, in key order.
///
/// Descends branch pages recursively. As a defense against dirty databases
/// where a branch's child pointers don't cover every leaf, it also follows
/// one extra `next_page` hop past the last leaf the descent reached —
/// enough to pick up a leaf the branch lost track of without risking an
/// infinite loop chasing a cyclic sibling chain.
pub fn leaf_nodes(pager: &Pager, root: u32) -> Result<Vec<Node>> {
    let mut out = Vec::new();
    let mut tail_next = 0u32;
    walk_branch(pager, root, &mut out, &mut tail_next)?;
    if tail_next != 0 {
        let page = pager.page(tail_next)?;
        for i in page.nodes() {
            out.push(page.node(i)?);
        }
    }
    Ok(out)
}

fn walk_branch(pager: &Pager, pgno: u32, out: &mut Vec<Node>, tail_next: &mut u32) -> Result<()> {
    let page = pager.page(pgno)?;
    if page.is_leaf() {
        for i in page.nodes() {
            out.push(page.node(i)?);
        }
        *tail_next = page.next_page;
        return Ok(());
    }
    for i in page.nodes() {
        let node = page.node(i)?;
        let child = node
            .child
            .ok_or_else(|| EseError::Malformed("branch node missing child page number".into()))?;
        walk_branch(pager, child, out, tail_next)?;
    }
    Ok(())
}

/// Binary search `page` for the node that should be followed to reach
/// `key`. On a branch page, an exact key match clamps to the node one past
/// the match (non-inclusive upper bound, matching the reference reader's
/// `CmpTagfld2`-style descent) so the right subtree is always chosen for
/// duplicate-prefixed keys. On a leaf page, an exact match returns the
/// matching node directly; falling off either end of the search returns the
/// node at the final `first` bound so inexact searches land on the correct
/// insertion point.
fn find_node(page: &Page, key: &[u8]) -> Result<(u32, Node)> {
    if page.node_count == 0 {
        return Err(EseError::Malformed("empty page during search".into()));
    }

    let mut first: i64 = 0;
    let mut last: i64 = page.node_count as i64 - 1;

    while first <= last {
        let idx = (first + last) / 2;
        let node = page.node(idx as u32)?;
        match key.cmp(node.key.as_slice()) {
            Ordering::Less => last = idx - 1,
            Ordering::Equal => {
                if page.is_branch() {
                    let clamped = ((idx + 1) as u32).min(page.node_count - 1);
                    return Ok((clamped, page.node(clamped)?));
                }
                return Ok((idx as u32, node));
            }
            Ordering::Greater => first = idx + 1,
        }
    }

    // A query greater than every key on the page lands `first` one past the
    // last node; clamp so the cursor still reports the greatest node whose
    // key is <= the query (or, on a branch page, descends the last subtree).
    let idx = (first.max(0) as u32).min(page.node_count - 1);
    Ok((idx, page.node(idx)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::esedb::header::MAGIC;
    use crate::esedb::pager::BufSource;
    use byteorder::{ByteOrder, LittleEndian};

    fn write_header(buf: &mut [u8], page_size: u32) {
        LittleEndian::write_u32(&mut buf[8..], MAGIC);
        LittleEndian::write_u32(&mut buf[236..], page_size);
        LittleEndian::write_u32(&mut buf[216..], 0x11);
    }

    /// Build a small-page leaf page with the given sorted `(key, data)`
    /// entries and sibling links.
    fn build_leaf_page(
        page_size: usize,
        entries: &[(&[u8], &[u8])],
        prev: u32,
        next: u32,
        root: bool,
    ) -> Vec<u8> {
        const PGHDR_LEN: usize = 40;
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

        let mut buf = vec![0u8; page_size];
        let mut flags = 0x0000_0002u32; // LEAF
        if root {
            flags |= 0x0000_0001; // ROOT
        }
        LittleEndian::write_u32(&mut buf[16..], prev);
        LittleEndian::write_u32(&mut buf[20..], next);
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

    fn build_single_leaf_db(page_size: u32, entries: &[(&[u8], &[u8])]) -> Vec<u8> {
        let ps = page_size as usize;
        let mut header_page = vec![0u8; ps];
        write_header(&mut header_page, page_size);
        let shadow_page = header_page.clone();
        let leaf = build_leaf_page(ps, entries, 0, 0, true);

        let mut buf = header_page;
        buf.extend_from_slice(&shadow_page);
        buf.extend_from_slice(&leaf);
        buf
    }

    #[test]
    fn exact_search_finds_matching_key() {
        let buf = build_single_leaf_db(4096, &[(b"a", b"1"), (b"b", b"2"), (b"c", b"3")]);
        let pager = Pager::new(Box::new(BufSource::new(buf))).unwrap();
        let mut cursor = Cursor::new(&pager, 1).unwrap();
        let node = cursor.search(b"b", true).unwrap();
        assert_eq!(node.key, b"b");
        assert_eq!(node.data, b"2");
    }

    #[test]
    fn exact_search_missing_key_errors() {
        let buf = build_single_leaf_db(4096, &[(b"a", b"1"), (b"c", b"3")]);
        let pager = Pager::new(Box::new(BufSource::new(buf))).unwrap();
        let mut cursor = Cursor::new(&pager, 1).unwrap();
        assert!(matches!(
            cursor.search(b"b", true),
            Err(EseError::KeyNotFound(_))
        ));
    }

    #[test]
    fn next_and_prev_walk_within_page() {
        let buf = build_single_leaf_db(4096, &[(b"a", b"1"), (b"b", b"2"), (b"c", b"3")]);
        let pager = Pager::new(Box::new(BufSource::new(buf))).unwrap();
        let mut cursor = Cursor::new(&pager, 1).unwrap();
        cursor.search(b"a", true).unwrap();
        assert_eq!(cursor.next().unwrap().key, b"b");
        assert_eq!(cursor.next().unwrap().key, b"c");
        assert!(cursor.next().is_err());
        assert_eq!(cursor.prev().unwrap().key, b"b");
    }

    #[test]
    fn inexact_search_past_last_key_lands_on_last_node() {
        let buf = build_single_leaf_db(4096, &[(b"a", b"1"), (b"b", b"2"), (b"c", b"3")]);
        let pager = Pager::new(Box::new(BufSource::new(buf))).unwrap();
        let mut cursor = Cursor::new(&pager, 1).unwrap();
        let node = cursor.search(b"z", false).unwrap();
        assert_eq!(node.key, b"c");
    }

    #[test]
    fn stepping_past_last_page_errors() {
        let buf = build_single_leaf_db(4096, &[(b"a", b"1")]);
        let pager = Pager::new(Box::new(BufSource::new(buf))).unwrap();
        let mut cursor = Cursor::new(&pager, 1).unwrap();
        cursor.reset().unwrap();
        assert!(matches!(
            cursor.next(),
            Err(EseError::NoNeighbourPage(_))
        ));
        assert!(matches!(
            cursor.prev(),
            Err(EseError::NoNeighbourPage(_))
        ));
    }
}
