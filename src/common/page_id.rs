//! Page identifier types.

use std::fmt;

use super::config::PAGE_SIZE;
use super::TableId;

/// Identifies a page within one table file by its page number.
///
/// On disk, pages refer to each other by *byte offset* (`page_number ×
/// PAGE_SIZE`), and offset 0 doubles as "no page" because page 0 is always
/// the header. In memory the two notions are kept apart: a link is an
/// `Option<PageId>`, and only the page codec converts between the two forms.
///
/// # Example
/// ```
/// use bptdb::PageId;
///
/// let page_id = PageId::new(3);
/// assert_eq!(page_id.offset(), 3 * 4096);
/// assert_eq!(PageId::from_offset(3 * 4096), Some(page_id));
/// assert_eq!(PageId::from_offset(0), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub u64);

impl PageId {
    /// The header page of every table.
    pub const HEADER: PageId = PageId(0);

    /// Create a new PageId.
    #[inline]
    pub fn new(id: u64) -> Self {
        PageId(id)
    }

    /// Byte offset of this page within its file.
    #[inline]
    pub fn offset(&self) -> u64 {
        self.0 * PAGE_SIZE as u64
    }

    /// Decode an on-disk link. Offset 0 means "no page".
    #[inline]
    pub fn from_offset(offset: u64) -> Option<PageId> {
        if offset == 0 {
            None
        } else {
            Some(PageId(offset / PAGE_SIZE as u64))
        }
    }

    /// Encode an optional link as an on-disk offset.
    #[inline]
    pub fn to_link(page: Option<PageId>) -> u64 {
        page.map_or(0, |p| p.offset())
    }

    /// Whether this is the header page.
    #[inline]
    pub fn is_header(&self) -> bool {
        *self == Self::HEADER
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Page({})", self.0)
    }
}

/// Identity of a cached page: which table, which page.
///
/// A buffer frame caches at most one `PageKey`, and a `PageKey` is cached by
/// at most one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageKey {
    pub table: TableId,
    pub page: PageId,
}

impl PageKey {
    #[inline]
    pub fn new(table: TableId, page: PageId) -> Self {
        Self { table, page }
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.table, self.page)
    }
}
