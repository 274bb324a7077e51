//! Page-granular access to the backing source, with shadow-header
//! discovery and a small recency-evicted page cache.
//!
//! Logical page numbers (`pgno`) are 1-based, as stored in tag/branch data
//! and catalog constants. The physical byte offset of logical page `n` is
//! `(n + 1) * page_size` — the first two physical pages are the primary and
//! shadow `DBFILEHDR` copies and sit outside the logical numbering.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::rc::Rc;

use crate::error::{EseError, Result};
use crate::esedb::header::DbHeader;
use crate::esedb::page::Page;

/// Bound on the number of parsed pages kept resident at once.
const PAGE_CACHE_CAPACITY: usize = 4096;

/// A byte-addressable backing store for a database file.
pub trait Source {
    fn read_at(&self, offset: u64, len: usize) -> Option<Vec<u8>>;
    fn len(&self) -> u64;
}

/// `std::fs::File`-backed source, read via seek + read_exact.
pub struct FileSource {
    file: RefCell<File>,
    len: u64,
}

impl FileSource {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let file = File::open(path).map_err(|e| EseError::Io(e.to_string()))?;
        let len = file
            .metadata()
            .map_err(|e| EseError::Io(e.to_string()))?
            .len();
        Ok(FileSource {
            file: RefCell::new(file),
            len,
        })
    }
}

impl Source for FileSource {
    fn read_at(&self, offset: u64, len: usize) -> Option<Vec<u8>> {
        if offset >= self.len {
            return None;
        }
        let mut file = self.file.borrow_mut();
        file.seek(SeekFrom::Start(offset)).ok()?;
        let mut buf = vec![0u8; len];
        let read = file.read(&mut buf).ok()?;
        if read == 0 {
            return None;
        }
        buf.truncate(read);
        Some(buf)
    }

    fn len(&self) -> u64 {
        self.len
    }
}

/// `memmap2`-backed source, for random-access reads over large files
/// without per-read syscalls. Only available with the `cli` feature, which
/// is the only consumer that needs it.
#[cfg(feature = "cli")]
pub struct MmapSource {
    mmap: memmap2::Mmap,
}

#[cfg(feature = "cli")]
impl MmapSource {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let file = File::open(path).map_err(|e| EseError::Io(e.to_string()))?;
        let mmap = unsafe { memmap2::Mmap::map(&file) }.map_err(|e| EseError::Io(e.to_string()))?;
        Ok(MmapSource { mmap })
    }
}

#[cfg(feature = "cli")]
impl Source for MmapSource {
    fn read_at(&self, offset: u64, len: usize) -> Option<Vec<u8>> {
        let offset = offset as usize;
        if offset >= self.mmap.len() {
            return None;
        }
        let end = (offset + len).min(self.mmap.len());
        Some(self.mmap[offset..end].to_vec())
    }

    fn len(&self) -> u64 {
        self.mmap.len() as u64
    }
}

/// In-memory source, mainly for tests and synthetic databases.
pub struct BufSource {
    buf: Vec<u8>,
}

impl BufSource {
    pub fn new(buf: Vec<u8>) -> Self {
        BufSource { buf }
    }
}

impl Source for BufSource {
    fn read_at(&self, offset: u64, len: usize) -> Option<Vec<u8>> {
        let offset = offset as usize;
        if offset >= self.buf.len() {
            return None;
        }
        let end = (offset + len).min(self.buf.len());
        Some(self.buf[offset..end].to_vec())
    }

    fn len(&self) -> u64 {
        self.buf.len() as u64
    }
}

/// Hands out parsed, cached [`Page`]s by logical page number.
pub struct Pager {
    source: Box<dyn Source>,
    pub header: DbHeader,
    small_page: bool,
    cache: RefCell<HashMap<u32, Rc<Page>>>,
    lru: RefCell<VecDeque<u32>>,
}

impl Pager {
    pub fn new(source: Box<dyn Source>) -> Result<Self> {
        let header_buf = source
            .read_at(0, 4096)
            .ok_or_else(|| EseError::InvalidDatabase("source too small for header".into()))?;
        let header = DbHeader::parse(&header_buf)?;

        DbHeader::verify_shadow(|offset, len| source.read_at(offset, len))?;

        let small_page = header.page_size <= 8192;

        Ok(Pager {
            source,
            header,
            small_page,
            cache: RefCell::new(HashMap::new()),
            lru: RefCell::new(VecDeque::new()),
        })
    }

    pub fn page_size(&self) -> u32 {
        self.header.page_size
    }

    /// Whether this database uses small-page tag/offset masks (page size
    /// <= 8192 bytes), which governs tagged-field header layout in records.
    pub fn small_page(&self) -> bool {
        self.small_page
    }

    /// Read the raw bytes of physical page `num` (1-based).
    pub fn read_page(&self, num: u32) -> Result<Vec<u8>> {
        if num < 1 {
            return Err(EseError::PageOutOfRange(format!(
                "physical page {} is below 1",
                num
            )));
        }
        let offset = (num as u64 - 1) * self.header.page_size as u64;
        let buf = self
            .source
            .read_at(offset, self.header.page_size as usize)
            .ok_or_else(|| {
                EseError::PageOutOfRange(format!("physical page {} past end of source", num))
            })?;
        if buf.len() < self.header.page_size as usize {
            return Err(EseError::PageOutOfRange(format!(
                "physical page {} truncated",
                num
            )));
        }
        Ok(buf)
    }

    /// Fetch logical page `num` (1-based `pgno`), parsing and caching it.
    pub fn page(&self, num: u32) -> Result<Rc<Page>> {
        if let Some(page) = self.cache.borrow().get(&num) {
            self.touch(num);
            return Ok(page.clone());
        }

        let buf = self.read_page(num + 2)?;
        let page = Rc::new(Page::parse(num, buf, self.small_page)?);

        self.cache.borrow_mut().insert(num, page.clone());
        self.touch(num);
        self.evict_if_needed();

        Ok(page)
    }

    fn touch(&self, num: u32) {
        let mut lru = self.lru.borrow_mut();
        lru.retain(|&n| n != num);
        lru.push_back(num);
    }

    fn evict_if_needed(&self) {
        let mut lru = self.lru.borrow_mut();
        let mut cache = self.cache.borrow_mut();
        while lru.len() > PAGE_CACHE_CAPACITY {
            if let Some(oldest) = lru.pop_front() {
                cache.remove(&oldest);
            } else {
                break;
            }
        }
    }

    /// Iterate logical pages starting at 1 until the source is exhausted.
    pub fn pages(&self) -> PagesIter<'_> {
        PagesIter { pager: self, next: 1 }
    }
}

pub struct PagesIter<'a> {
    pager: &'a Pager,
    next: u32,
}

impl<'a> Iterator for PagesIter<'a> {
    type Item = Rc<Page>;

    fn next(&mut self) -> Option<Self::Item> {
        let page = self.pager.page(self.next).ok()?;
        self.next += 1;
        Some(page)
    }
}
