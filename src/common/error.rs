//! Error types for bptdb.

use std::path::PathBuf;

use thiserror::Error;

use super::{PageId, PageKey, TableId};

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in bptdb.
///
/// Configuration mistakes (bad table id, too many tables, bad pool size),
/// logical outcomes (duplicate key), resource exhaustion (no evictable frame)
/// and I/O failures all surface here. None of them abort the process.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from seek, read, write or sync on a table file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested page lies beyond the end of the table file.
    #[error("{0} not found")]
    PageNotFound(PageKey),

    /// Buffer pool has no free frames and cannot evict any pages.
    ///
    /// This happens when all frames are pinned.
    #[error("No free frames available in buffer pool")]
    NoFreeFrames,

    /// The buffer pool is too small for the tree algorithms.
    #[error("Invalid buffer pool size {0}")]
    InvalidPoolSize(usize),

    /// A page could not be dropped from the pool because it is in use.
    #[error("{0} is pinned")]
    PagePinned(PageKey),

    /// The table id is out of range or refers to a closed slot.
    #[error("Invalid table id {0}")]
    InvalidTableId(TableId),

    /// Every table slot is occupied.
    #[error("Too many open tables (limit {0})")]
    TooManyTables(usize),

    /// The same file is already open under another table id.
    #[error("Table file {} is already open as {table}", path.display())]
    TableAlreadyOpen { path: PathBuf, table: TableId },

    /// Column count outside `MIN_COLUMNS..=MAX_COLUMNS`.
    #[error("Invalid column count {0}")]
    InvalidColumnCount(usize),

    /// A record was given the wrong number of value columns.
    #[error("Expected {expected} values, got {actual}")]
    ColumnCountMismatch { expected: usize, actual: usize },

    /// Insert of a key that is already present.
    #[error("Key {0} already exists")]
    KeyExists(i64),

    /// Entry index outside the bounds of the page layout.
    #[error("Invalid entry index {0}")]
    InvalidIndex(usize),

    /// A leaf-only accessor was used on an internal page.
    #[error("Page is not a leaf")]
    NotALeaf,

    /// An internal-only accessor was used on a leaf page.
    #[error("Page is not an internal node")]
    NotInternal,

    /// The tree structure on disk is inconsistent.
    #[error("Corrupted {page}: {reason}")]
    Corrupted { page: PageId, reason: String },
}

impl Error {
    pub(crate) fn corrupted(page: PageId, reason: impl Into<String>) -> Self {
        Error::Corrupted {
            page,
            reason: reason.into(),
        }
    }
}
