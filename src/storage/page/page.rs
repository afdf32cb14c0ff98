//! Page - the fundamental 4KB unit of storage.
//!
//! A [`Page`] is a raw 4KB byte array that serves as the unit of I/O
//! between disk and memory. Pages are stored in frames within the
//! buffer pool.
//!
//! The same bytes are read as one of four layouts depending on where the
//! page sits in the file; the accessors for each layout live in sibling
//! modules (`header`, `free`, `node`). All integers use the native byte
//! order of the running process.

use crate::common::config::PAGE_SIZE;
use crate::common::PageId;

/// A page of data (4KB, 4KB-aligned).
///
/// This is the fundamental unit of I/O between disk and memory.
/// The buffer pool manages these in frames.
///
/// # Clone Implementation
/// `Page` does NOT implement `Clone` in production code (copying 4KB is
/// expensive and should be explicit). A `#[cfg(test)]` Clone is provided
/// for tests.
///
/// # Example
/// ```
/// use bptdb::storage::page::Page;
///
/// let mut page = Page::new();
/// page.as_mut_slice()[0] = 0xFF;
/// assert_eq!(page.as_slice()[0], 0xFF);
/// ```
#[repr(align(4096))]
pub struct Page {
    data: [u8; PAGE_SIZE],
}

impl Page {
    /// Create a new zeroed page.
    #[inline]
    pub fn new() -> Self {
        Self {
            data: [0u8; PAGE_SIZE],
        }
    }

    /// Get immutable slice of page data.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Get mutable slice of page data.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Zero out the entire page.
    pub fn reset(&mut self) {
        self.data.fill(0);
    }

    // ========================================================================
    // Raw field access (native byte order)
    // ========================================================================

    #[inline]
    pub(crate) fn read_u64(&self, at: usize) -> u64 {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.data[at..at + 8]);
        u64::from_ne_bytes(buf)
    }

    #[inline]
    pub(crate) fn write_u64(&mut self, at: usize, value: u64) {
        self.data[at..at + 8].copy_from_slice(&value.to_ne_bytes());
    }

    #[inline]
    pub(crate) fn read_i64(&self, at: usize) -> i64 {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.data[at..at + 8]);
        i64::from_ne_bytes(buf)
    }

    #[inline]
    pub(crate) fn write_i64(&mut self, at: usize, value: i64) {
        self.data[at..at + 8].copy_from_slice(&value.to_ne_bytes());
    }

    #[inline]
    pub(crate) fn read_u32(&self, at: usize) -> u32 {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&self.data[at..at + 4]);
        u32::from_ne_bytes(buf)
    }

    #[inline]
    pub(crate) fn write_u32(&mut self, at: usize, value: u32) {
        self.data[at..at + 4].copy_from_slice(&value.to_ne_bytes());
    }

    /// Read a page link stored as a byte offset.
    #[inline]
    pub(crate) fn read_link(&self, at: usize) -> Option<PageId> {
        PageId::from_offset(self.read_u64(at))
    }

    /// Store a page link as a byte offset (0 for `None`).
    #[inline]
    pub(crate) fn write_link(&mut self, at: usize, page: Option<PageId>) {
        self.write_u64(at, PageId::to_link(page));
    }

    #[inline]
    pub(crate) fn zero_range(&mut self, at: usize, len: usize) {
        self.data[at..at + len].fill(0);
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

// Clone only available in tests - forces explicit copying in production
#[cfg(test)]
impl Clone for Page {
    fn clone(&self) -> Self {
        let mut new_page = Page::new();
        new_page.data.copy_from_slice(&self.data);
        new_page
    }
}
