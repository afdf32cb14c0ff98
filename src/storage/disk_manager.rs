//! Disk Manager - low-level file I/O for table files.
//!
//! The [`DiskManager`] handles all direct file operations:
//! - Opening and closing table files
//! - Reading and writing pages
//! - Allocating and releasing pages through the on-disk free list

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::common::config::{FREE_PAGE_BATCH, MAX_COLUMNS, MAX_TABLES, MIN_COLUMNS, PAGE_SIZE};
use crate::common::{Error, PageId, PageKey, Result, TableId};
use crate::storage::page::Page;

/// One open table file.
struct TableFile {
    file: File,
    path: PathBuf,
    num_columns: usize,
    /// Number of whole pages currently in the file.
    page_count: u64,
}

/// Manages disk I/O for up to [`MAX_TABLES`] table files.
///
/// # File Layout
/// Each table is stored as a single file with pages laid out sequentially:
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┬─────────┐
/// │ Header  │ Page 1  │ Page 2  │  ...    │ Page N  │
/// │ (4KB)   │ (4KB)   │ (4KB)   │         │ (4KB)   │
/// └─────────┴─────────┴─────────┴─────────┴─────────┘
/// Offset:  0      4096     8192    ...    N×4096
/// ```
///
/// Page N is located at file offset `N × PAGE_SIZE`. Page 0 is the header;
/// unused pages are chained into a free list rooted in the header.
///
/// # Thread Safety
/// `DiskManager` is **single-threaded**. The `BufferPoolManager` is responsible
/// for serializing access to the disk manager.
///
/// # Durability
/// Every write is followed by `fsync()`. There is no write-ahead log, so a
/// crash in the middle of a multi-page update can leave a tree inconsistent.
pub struct DiskManager {
    tables: Vec<Option<TableFile>>,
}

impl DiskManager {
    /// Create a disk manager with no open tables.
    pub fn new() -> Self {
        Self {
            tables: (0..MAX_TABLES).map(|_| None).collect(),
        }
    }

    /// Open a table file, creating it if it does not exist.
    ///
    /// A new file gets a header page with `num_pages = 1` and the given
    /// column count. An existing file keeps the column count stored in its
    /// header.
    ///
    /// # Errors
    /// - `Error::InvalidColumnCount` if `num_columns` is outside `2..=16`
    /// - `Error::TableAlreadyOpen` if the file is already open
    /// - `Error::TooManyTables` if every table slot is in use
    pub fn open<P: AsRef<Path>>(&mut self, path: P, num_columns: usize) -> Result<TableId> {
        if !(MIN_COLUMNS..=MAX_COLUMNS).contains(&num_columns) {
            return Err(Error::InvalidColumnCount(num_columns));
        }

        // Only an existing file can already be open.
        if let Ok(existing) = path.as_ref().canonicalize() {
            if let Some(table) = self.table_for_path(&existing) {
                return Err(Error::TableAlreadyOpen { path: existing, table });
            }
        }
        // Find a free slot before touching the filesystem.
        let slot = self
            .tables
            .iter()
            .position(Option::is_none)
            .ok_or(Error::TooManyTables(MAX_TABLES))?;
        let table = TableId::from_slot(slot);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.as_ref())?;
        let path = path.as_ref().canonicalize()?;

        let mut entry = TableFile {
            page_count: file.metadata()?.len() / PAGE_SIZE as u64,
            file,
            path,
            num_columns,
        };

        if entry.page_count == 0 {
            let mut header = Page::new();
            header.init_header(num_columns);
            write_at(&mut entry.file, PageId::HEADER, &header)?;
            entry.file.sync_all()?;
            entry.page_count = 1;
        } else {
            let mut header = Page::new();
            read_at(&mut entry.file, PageId::HEADER, &mut header)?;
            let stored = header.num_columns();
            if !(MIN_COLUMNS..=MAX_COLUMNS).contains(&stored) {
                return Err(Error::corrupted(
                    PageId::HEADER,
                    format!("header stores {} columns", stored),
                ));
            }
            if stored != num_columns {
                warn!(
                    path = %entry.path.display(),
                    requested = num_columns,
                    stored,
                    "column count differs from table header, using stored value"
                );
            }
            entry.num_columns = stored;
        }

        info!(%table, path = %entry.path.display(), pages = entry.page_count, "opened table");
        self.tables[slot] = Some(entry);
        Ok(table)
    }

    /// Close a table, releasing its slot for reuse.
    pub fn close(&mut self, table: TableId) -> Result<()> {
        let slot = table.slot().ok_or(Error::InvalidTableId(table))?;
        let entry = self.tables[slot]
            .take()
            .ok_or(Error::InvalidTableId(table))?;
        entry.file.sync_all()?;
        info!(%table, path = %entry.path.display(), "closed table");
        Ok(())
    }

    /// Whether `table` refers to an open table.
    pub fn is_open(&self, table: TableId) -> bool {
        self.entry(table).is_ok()
    }

    /// Ids of every open table.
    pub fn open_tables(&self) -> Vec<TableId> {
        self.tables
            .iter()
            .enumerate()
            .filter(|(_, t)| t.is_some())
            .map(|(slot, _)| TableId::from_slot(slot))
            .collect()
    }

    /// Column count of a table, key included.
    pub fn num_columns(&self, table: TableId) -> Result<usize> {
        Ok(self.entry(table)?.num_columns)
    }

    /// Number of pages currently in the table file.
    pub fn page_count(&self, table: TableId) -> Result<u64> {
        Ok(self.entry(table)?.page_count)
    }

    /// Read a page from disk into `page`.
    ///
    /// # Errors
    /// Returns `Error::PageNotFound` if the page lies beyond the end of the
    /// file.
    pub fn read_page(&mut self, table: TableId, page_id: PageId, page: &mut Page) -> Result<()> {
        let entry = self.entry_mut(table)?;
        if page_id.0 >= entry.page_count {
            return Err(Error::PageNotFound(PageKey::new(table, page_id)));
        }
        read_at(&mut entry.file, page_id, page)
    }

    /// Write a page to disk.
    ///
    /// Writing past the end of the file extends it.
    ///
    /// # Durability
    /// This method calls `fsync()` after writing to ensure the data is
    /// persisted to disk.
    pub fn write_page(&mut self, table: TableId, page_id: PageId, page: &Page) -> Result<()> {
        let entry = self.entry_mut(table)?;
        write_at(&mut entry.file, page_id, page)?;
        entry.file.sync_all()?;
        entry.page_count = entry.page_count.max(page_id.0 + 1);
        Ok(())
    }

    /// Allocate a page, reading and writing the header on disk.
    ///
    /// Use this only when the header is not cached elsewhere; the buffer
    /// pool goes through [`alloc_from`](Self::alloc_from) with its own copy.
    pub fn alloc_page(&mut self, table: TableId) -> Result<PageId> {
        let mut header = Page::new();
        self.read_page(table, PageId::HEADER, &mut header)?;
        let page_id = self.alloc_from(table, &mut header)?;
        self.write_page(table, PageId::HEADER, &header)?;
        Ok(page_id)
    }

    /// Return a page to the free list, reading and writing the header on
    /// disk.
    pub fn free_page(&mut self, table: TableId, page_id: PageId) -> Result<()> {
        let mut header = Page::new();
        self.read_page(table, PageId::HEADER, &mut header)?;
        self.free_into(table, &mut header, page_id)?;
        self.write_page(table, PageId::HEADER, &header)
    }

    /// Pop the head of the free list described by `header`.
    ///
    /// If the list is empty, [`FREE_PAGE_BATCH`] pages are appended to the
    /// file and chained into a fresh list first. The caller owns `header`
    /// and is responsible for persisting it.
    pub(crate) fn alloc_from(&mut self, table: TableId, header: &mut Page) -> Result<PageId> {
        if header.free_page().is_none() {
            self.extend_free_list(table, header)?;
        }
        let page_id = header
            .free_page()
            .ok_or_else(|| Error::corrupted(PageId::HEADER, "free list empty after extension"))?;

        let mut free = Page::new();
        self.read_page(table, page_id, &mut free)?;
        header.set_free_page(free.next_free_page());
        Ok(page_id)
    }

    /// Clear `page_id` on disk and push it onto the free list in `header`.
    pub(crate) fn free_into(&mut self, table: TableId, header: &mut Page, page_id: PageId) -> Result<()> {
        if page_id.is_header() || page_id.0 >= header.num_pages() {
            return Err(Error::corrupted(page_id, "page cannot be freed"));
        }
        let mut free = Page::new();
        free.init_free(header.free_page());
        self.write_page(table, page_id, &free)?;
        header.set_free_page(Some(page_id));
        debug!(%table, page = %page_id, "freed page");
        Ok(())
    }

    fn extend_free_list(&mut self, table: TableId, header: &mut Page) -> Result<()> {
        let first = header.num_pages();
        let last = first + FREE_PAGE_BATCH - 1;
        let entry = self.entry_mut(table)?;

        let mut free = Page::new();
        for n in first..=last {
            let next = if n == last { None } else { Some(PageId::new(n + 1)) };
            free.init_free(next);
            write_at(&mut entry.file, PageId::new(n), &free)?;
        }
        entry.file.sync_all()?;
        entry.page_count = entry.page_count.max(last + 1);

        header.set_free_page(Some(PageId::new(first)));
        header.set_num_pages(last + 1);
        debug!(%table, first, count = FREE_PAGE_BATCH, "extended free list");
        Ok(())
    }

    fn table_for_path(&self, path: &Path) -> Option<TableId> {
        self.tables.iter().enumerate().find_map(|(slot, t)| match t {
            Some(t) if t.path == path => Some(TableId::from_slot(slot)),
            _ => None,
        })
    }

    fn entry(&self, table: TableId) -> Result<&TableFile> {
        table
            .slot()
            .and_then(|slot| self.tables[slot].as_ref())
            .ok_or(Error::InvalidTableId(table))
    }

    fn entry_mut(&mut self, table: TableId) -> Result<&mut TableFile> {
        table
            .slot()
            .and_then(|slot| self.tables[slot].as_mut())
            .ok_or(Error::InvalidTableId(table))
    }
}

impl Default for DiskManager {
    fn default() -> Self {
        Self::new()
    }
}

fn read_at(file: &mut File, page_id: PageId, page: &mut Page) -> Result<()> {
    file.seek(SeekFrom::Start(page_id.offset()))?;
    file.read_exact(page.as_mut_slice())?;
    Ok(())
}

fn write_at(file: &mut File, page_id: PageId, page: &Page) -> Result<()> {
    file.seek(SeekFrom::Start(page_id.offset()))?;
    file.write_all(page.as_slice())?;
    Ok(())
}
