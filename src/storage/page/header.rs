//! Header page layout (page 0 of every table file).
//!
//! ```text
//! Offset  Size  Field
//! 0       8     free page offset (0 = free list empty)
//! 8       8     root page offset (0 = empty tree)
//! 16      8     number of pages in the file, header included
//! 24      8     number of columns, key included
//! 32..    -     reserved, zero
//! ```

use super::Page;
use crate::common::PageId;

const FREE_PAGE_OFFSET: usize = 0;
const ROOT_PAGE_OFFSET: usize = 8;
const NUM_PAGES_OFFSET: usize = 16;
const NUM_COLUMNS_OFFSET: usize = 24;

impl Page {
    /// Build the header of a brand new table file.
    pub fn init_header(&mut self, num_columns: usize) {
        self.reset();
        self.set_num_pages(1);
        self.set_num_columns(num_columns);
    }

    /// Head of the free-page list.
    #[inline]
    pub fn free_page(&self) -> Option<PageId> {
        self.read_link(FREE_PAGE_OFFSET)
    }

    #[inline]
    pub fn set_free_page(&mut self, page: Option<PageId>) {
        self.write_link(FREE_PAGE_OFFSET, page);
    }

    /// Root of the B+ tree, `None` for an empty table.
    #[inline]
    pub fn root(&self) -> Option<PageId> {
        self.read_link(ROOT_PAGE_OFFSET)
    }

    #[inline]
    pub fn set_root(&mut self, page: Option<PageId>) {
        self.write_link(ROOT_PAGE_OFFSET, page);
    }

    /// Number of pages in the file, header included.
    #[inline]
    pub fn num_pages(&self) -> u64 {
        self.read_u64(NUM_PAGES_OFFSET)
    }

    #[inline]
    pub fn set_num_pages(&mut self, num_pages: u64) {
        self.write_u64(NUM_PAGES_OFFSET, num_pages);
    }

    /// Column count of every record in the table, key included.
    #[inline]
    pub fn num_columns(&self) -> usize {
        self.read_u64(NUM_COLUMNS_OFFSET) as usize
    }

    #[inline]
    pub fn set_num_columns(&mut self, num_columns: usize) {
        self.write_u64(NUM_COLUMNS_OFFSET, num_columns as u64);
    }
}
