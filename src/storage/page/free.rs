//! Free page layout: a single link to the next free page at offset 0,
//! the rest of the page zeroed.

use super::Page;
use crate::common::PageId;

const NEXT_FREE_OFFSET: usize = 0;

impl Page {
    /// Turn this page into a free-list entry pointing at `next`.
    pub fn init_free(&mut self, next: Option<PageId>) {
        self.reset();
        self.set_next_free_page(next);
    }

    #[inline]
    pub fn next_free_page(&self) -> Option<PageId> {
        self.read_link(NEXT_FREE_OFFSET)
    }

    #[inline]
    pub fn set_next_free_page(&mut self, next: Option<PageId>) {
        self.write_link(NEXT_FREE_OFFSET, next);
    }
}
