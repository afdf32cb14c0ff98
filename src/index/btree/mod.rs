//! Disk-resident B+ tree index.
//!
//! One tree lives in each table file. Nodes are pages addressed by
//! [`PageId`]; parent, child and sibling links are stored on the pages
//! themselves, and every access goes through the [`BufferPoolManager`].
//!
//! # Structure
//! - Leaves hold up to 31 records in key order and are chained left to right
//!   through their right-sibling links.
//! - Internal nodes hold up to 248 separator keys and one more child than
//!   keys. Child `i + 1` covers keys `>= key(i)`.
//! - Every leaf sits at the same depth.
//!
//! # Deletion policy
//! Nodes are never rebalanced or merged on underflow. A node is only removed
//! from the tree once it is completely empty, so pages may sit well below
//! half occupancy.
//!
//! # Locking
//! A `BPlusTree` assumes the caller serializes writers on the table (see
//! [`Database`](crate::Database)). Internally it never holds two guards on
//! the same page and never holds a page guard while allocating, so it needs
//! at most three frames pinned at once.

mod delete;
mod insert;
mod scan;
mod search;
mod verify;

pub use verify::TreeStats;

use crate::buffer::{BufferPoolManager, PageReadGuard, PageWriteGuard};
use crate::common::{PageId, Result, TableId};

/// Split point for an overfull node of `length` entries.
///
/// The lower half gets the extra entry when `length` is odd.
#[inline]
pub(crate) fn cut(length: usize) -> usize {
    if length % 2 == 0 {
        length / 2
    } else {
        length / 2 + 1
    }
}

/// Handle on the B+ tree stored in one open table.
///
/// The handle is cheap to build and holds no pages; it can be created per
/// operation.
///
/// # Example
/// ```no_run
/// use bptdb::{BPlusTree, BufferPoolManager, DiskManager};
///
/// let bpm = BufferPoolManager::new(64, DiskManager::new())?;
/// let table = bpm.open_table("scores.db", 3)?;
/// let tree = BPlusTree::new(&bpm, table)?;
///
/// tree.insert(42, &[7, 9])?;
/// assert_eq!(tree.find(42)?, Some(vec![7, 9]));
/// # Ok::<(), bptdb::Error>(())
/// ```
pub struct BPlusTree<'a> {
    bpm: &'a BufferPoolManager,
    table: TableId,
    /// Value columns per record (the table's column count minus the key).
    num_values: usize,
}

impl<'a> BPlusTree<'a> {
    /// Attach to the tree of an open table.
    ///
    /// # Errors
    /// Returns `Error::InvalidTableId` if the table is not open.
    pub fn new(bpm: &'a BufferPoolManager, table: TableId) -> Result<Self> {
        let num_columns = bpm.num_columns(table)?;
        Ok(Self {
            bpm,
            table,
            num_values: num_columns - 1,
        })
    }

    pub fn table(&self) -> TableId {
        self.table
    }

    /// Number of value columns every record carries.
    pub fn num_values(&self) -> usize {
        self.num_values
    }

    /// Current root page, `None` when the tree is empty.
    pub fn root(&self) -> Result<Option<PageId>> {
        Ok(self.read(PageId::HEADER)?.root())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.root()?.is_none())
    }

    fn set_root(&self, root: Option<PageId>) -> Result<()> {
        self.write(PageId::HEADER)?.set_root(root);
        Ok(())
    }

    #[inline]
    fn read(&self, page_id: PageId) -> Result<PageReadGuard<'a>> {
        self.bpm.fetch_page_read(self.table, page_id)
    }

    #[inline]
    fn write(&self, page_id: PageId) -> Result<PageWriteGuard<'a>> {
        self.bpm.fetch_page_write(self.table, page_id)
    }
}
