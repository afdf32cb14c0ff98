//! Table API - the entry point for applications.
//!
//! A [`Database`] owns one buffer pool shared by up to ten open tables. Each
//! table is a single file holding one B+ tree keyed by `i64`, with a fixed
//! number of `i64` value columns per record.
//!
//! Every table slot has its own `RwLock`: lookups and scans share it, while
//! inserts, erases and closing take it exclusively. Operations on different
//! tables never wait on each other except inside the buffer pool.

use std::path::Path;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::buffer::{BufferPoolManager, StatsSnapshot};
use crate::common::config::MAX_TABLES;
use crate::common::{Error, Result, TableId};
use crate::index::{BPlusTree, TreeStats};
use crate::storage::DiskManager;

/// An embedded multi-table key-value store.
///
/// # Example
/// ```no_run
/// use bptdb::Database;
///
/// let db = Database::init(64)?;
/// let users = db.open_table("users.db", 3)?;
///
/// db.insert(users, 1, &[30, 170])?;
/// assert_eq!(db.find(users, 1)?, Some(vec![30, 170]));
///
/// db.erase(users, 1)?;
/// assert_eq!(db.find(users, 1)?, None);
///
/// db.shutdown()?;
/// # Ok::<(), bptdb::Error>(())
/// ```
pub struct Database {
    bpm: BufferPoolManager,
    table_locks: Vec<RwLock<()>>,
}

impl Database {
    /// Create a database with a buffer pool of `pool_size` pages.
    ///
    /// # Errors
    /// Returns `Error::InvalidPoolSize` if the pool is too small for the
    /// tree algorithms.
    pub fn init(pool_size: usize) -> Result<Self> {
        let bpm = BufferPoolManager::new(pool_size, DiskManager::new())?;
        info!(pool_size, "initialized database");
        Ok(Self {
            bpm,
            table_locks: (0..MAX_TABLES).map(|_| RwLock::new(())).collect(),
        })
    }

    /// Open a table file, creating it if absent.
    ///
    /// `num_columns` counts the key column, so a table of `n` columns stores
    /// `n - 1` values per record. An existing file keeps the column count it
    /// was created with.
    ///
    /// # Errors
    /// - `Error::InvalidColumnCount` if `num_columns` is outside `2..=16`
    /// - `Error::TableAlreadyOpen` if the file is already open
    /// - `Error::TooManyTables` if ten tables are already open
    pub fn open_table<P: AsRef<Path>>(&self, path: P, num_columns: usize) -> Result<TableId> {
        self.bpm.open_table(path, num_columns)
    }

    /// Flush a table and release its id.
    pub fn close_table(&self, table: TableId) -> Result<()> {
        let _lock = self.table_lock(table)?.write();
        self.bpm.close_table(table)
    }

    /// Insert a record.
    ///
    /// # Errors
    /// - `Error::KeyExists` if `key` is already present
    /// - `Error::ColumnCountMismatch` if `values` does not have one entry per
    ///   value column
    pub fn insert(&self, table: TableId, key: i64, values: &[i64]) -> Result<()> {
        let _lock = self.table_lock(table)?.write();
        self.tree(table)?.insert(key, values)
    }

    /// Look up the values stored under `key`.
    pub fn find(&self, table: TableId, key: i64) -> Result<Option<Vec<i64>>> {
        let _lock = self.table_lock(table)?.read();
        self.tree(table)?.find(key)
    }

    /// Remove the record stored under `key`. Absent keys are ignored.
    pub fn erase(&self, table: TableId, key: i64) -> Result<()> {
        let _lock = self.table_lock(table)?.write();
        self.tree(table)?.delete(key)?;
        Ok(())
    }

    /// Records with keys in `start..=end` (bounds in either order), sorted by
    /// key.
    pub fn find_range(&self, table: TableId, start: i64, end: i64) -> Result<Vec<(i64, Vec<i64>)>> {
        let _lock = self.table_lock(table)?.read();
        self.tree(table)?.find_range(start, end)
    }

    /// Check the table's tree and free list for structural damage.
    pub fn verify(&self, table: TableId) -> Result<TreeStats> {
        let _lock = self.table_lock(table)?.read();
        self.tree(table)?.verify()
    }

    /// Keys of every node, level by level.
    pub fn levels(&self, table: TableId) -> Result<Vec<Vec<Vec<i64>>>> {
        let _lock = self.table_lock(table)?.read();
        self.tree(table)?.levels()
    }

    /// Value columns per record of a table.
    pub fn num_values(&self, table: TableId) -> Result<usize> {
        Ok(self.bpm.num_columns(table)? - 1)
    }

    /// Write every dirty page of every table to disk.
    pub fn flush(&self) -> Result<()> {
        self.bpm.flush_all_pages()
    }

    /// Buffer pool counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.bpm.stats().snapshot()
    }

    /// The shared buffer pool.
    pub fn buffer_pool(&self) -> &BufferPoolManager {
        &self.bpm
    }

    /// Flush and close every open table.
    pub fn shutdown(self) -> Result<()> {
        for table in self.bpm.open_tables() {
            self.close_table(table)?;
        }
        info!(stats = %self.stats(), "database shut down");
        Ok(())
    }

    fn table_lock(&self, table: TableId) -> Result<&RwLock<()>> {
        table
            .slot()
            .map(|slot| &self.table_locks[slot])
            .ok_or(Error::InvalidTableId(table))
    }

    fn tree(&self, table: TableId) -> Result<BPlusTree<'_>> {
        BPlusTree::new(&self.bpm, table)
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if let Err(err) = self.bpm.flush_all_pages() {
            warn!(error = %err, "failed to flush buffer pool on drop");
        }
    }
}
