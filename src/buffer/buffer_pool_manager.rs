//! Buffer Pool Manager - the core page caching layer.
//!
//! The [`BufferPoolManager`] provides:
//! - Page caching between table files and memory
//! - Pin-based reference counting through RAII guards
//! - LRU eviction with write-back of dirty pages
//! - Page allocation and release through each table's free list

use std::collections::HashMap;
use std::path::Path;

use parking_lot::Mutex;
use tracing::trace;

use crate::buffer::replacer::LruReplacer;
use crate::buffer::{BufferPoolStats, Frame, PageReadGuard, PageWriteGuard};
use crate::common::config::MIN_POOL_SIZE;
use crate::common::{Error, FrameId, PageId, PageKey, Result, TableId};
use crate::storage::DiskManager;

/// Frame table shared by every thread: which frame caches which page, and
/// in what order frames were last used.
struct PoolState {
    page_table: HashMap<PageKey, FrameId>,
    replacer: LruReplacer,
}

/// Manages a pool of buffer frames for caching table pages.
///
/// # Architecture
/// ```text
/// ┌─────────────────────────────────────────────────────────────┐
/// │                    BufferPoolManager                        │
/// │  ┌──────────────────────────┐  ┌─────────────────────────┐  │
/// │  │ state: Mutex<PoolState>  │  │   frames: Vec<Frame>    │  │
/// │  │  page_table PageKey→Fid  │─▶│ [F0] [F1] [F2] ...      │  │
/// │  │  replacer   LruReplacer  │  └─────────────────────────┘  │
/// │  └──────────────────────────┘  ┌─────────────────────────┐  │
/// │                                │ disk_manager: Mutex     │  │
/// │                                └─────────────────────────┘  │
/// └─────────────────────────────────────────────────────────────┘
/// ```
///
/// # Thread Safety
/// - `state`: one `Mutex` serializes lookup, victim selection and LRU
///   relinking
/// - `frames`: fixed size; each frame carries its own page lock and atomics
/// - `disk_manager`: `Mutex`, always the last lock taken
/// - `stats`: atomic counters
///
/// A frame is only ever repurposed while its pin count is zero and the
/// state lock is held, so pinning a page under the state lock is enough to
/// keep it resident.
///
/// # Usage
/// ```ignore
/// let bpm = BufferPoolManager::new(64, DiskManager::new())?;
/// let table = bpm.open_table("users.db", 3)?;
///
/// let page_id = bpm.alloc_page(table)?;
/// {
///     let mut guard = bpm.fetch_page_write(table, page_id)?;
///     guard.init_leaf(None);
/// } // guard drops: frame marked dirty, unpinned
/// ```
pub struct BufferPoolManager {
    frames: Vec<Frame>,
    state: Mutex<PoolState>,
    disk_manager: Mutex<DiskManager>,
    stats: BufferPoolStats,
    pool_size: usize,
}

impl BufferPoolManager {
    /// Create a new buffer pool manager.
    ///
    /// # Errors
    /// Returns `Error::InvalidPoolSize` if `pool_size` is below
    /// [`MIN_POOL_SIZE`].
    pub fn new(pool_size: usize, disk_manager: DiskManager) -> Result<Self> {
        if pool_size < MIN_POOL_SIZE {
            return Err(Error::InvalidPoolSize(pool_size));
        }

        Ok(Self {
            frames: (0..pool_size).map(|_| Frame::new()).collect(),
            state: Mutex::new(PoolState {
                page_table: HashMap::with_capacity(pool_size),
                replacer: LruReplacer::new(pool_size),
            }),
            disk_manager: Mutex::new(disk_manager),
            stats: BufferPoolStats::new(),
            pool_size,
        })
    }

    // ========================================================================
    // Public API: Tables
    // ========================================================================

    /// Open (or create) a table file. See [`DiskManager::open`].
    pub fn open_table<P: AsRef<Path>>(&self, path: P, num_columns: usize) -> Result<TableId> {
        self.disk_manager.lock().open(path, num_columns)
    }

    /// Write back every dirty page of `table`, drop its pages from the pool
    /// and close the file.
    ///
    /// # Errors
    /// Returns `Error::PagePinned` if a page of the table is still checked
    /// out; the table stays open in that case.
    pub fn close_table(&self, table: TableId) -> Result<()> {
        if !self.disk_manager.lock().is_open(table) {
            return Err(Error::InvalidTableId(table));
        }
        self.flush_table(table)?;

        {
            let mut state = self.state.lock();
            let resident: Vec<(PageKey, FrameId)> = state
                .page_table
                .iter()
                .filter(|(key, _)| key.table == table)
                .map(|(&key, &fid)| (key, fid))
                .collect();

            if let Some((key, _)) = resident
                .iter()
                .find(|(_, fid)| self.frames[fid.index()].is_pinned())
            {
                return Err(Error::PagePinned(*key));
            }
            for (key, fid) in resident {
                state.page_table.remove(&key);
                self.frames[fid.index()].discard();
                state.replacer.demote(fid);
            }
        }

        self.disk_manager.lock().close(table)
    }

    /// Ids of every open table.
    pub fn open_tables(&self) -> Vec<TableId> {
        self.disk_manager.lock().open_tables()
    }

    /// Column count of a table, key included.
    pub fn num_columns(&self, table: TableId) -> Result<usize> {
        self.disk_manager.lock().num_columns(table)
    }

    // ========================================================================
    // Public API: Fetch pages
    // ========================================================================

    /// Fetch a page for reading (shared access).
    ///
    /// If the page is already in the buffer pool, returns immediately.
    /// Otherwise, loads the page from disk (possibly evicting another page).
    ///
    /// # Errors
    /// - `Error::PageNotFound` if the page doesn't exist on disk
    /// - `Error::NoFreeFrames` if all frames are pinned
    pub fn fetch_page_read(&self, table: TableId, page_id: PageId) -> Result<PageReadGuard<'_>> {
        let key = PageKey::new(table, page_id);
        let frame_id = self.fetch_page_internal(key)?;
        let lock = self.frames[frame_id.index()].page();

        Ok(PageReadGuard::new(self, frame_id, key, lock))
    }

    /// Fetch a page for writing (exclusive access).
    ///
    /// Same as `fetch_page_read`, but returns an exclusive guard.
    /// The frame is marked dirty when the guard drops.
    ///
    /// # Errors
    /// - `Error::PageNotFound` if the page doesn't exist on disk
    /// - `Error::NoFreeFrames` if all frames are pinned
    pub fn fetch_page_write(&self, table: TableId, page_id: PageId) -> Result<PageWriteGuard<'_>> {
        let key = PageKey::new(table, page_id);
        let frame_id = self.fetch_page_internal(key)?;
        let lock = self.frames[frame_id.index()].page_mut();

        Ok(PageWriteGuard::new(self, frame_id, key, lock))
    }

    // ========================================================================
    // Public API: Allocate and free pages
    // ========================================================================

    /// Take a page off the table's free list, growing the file when the list
    /// is empty.
    ///
    /// The header page is updated through the pool. The returned page still
    /// holds free-list bytes; callers format it before use.
    pub fn alloc_page(&self, table: TableId) -> Result<PageId> {
        let mut header = self.fetch_page_write(table, PageId::HEADER)?;
        let page_id = self.disk_manager.lock().alloc_from(table, &mut header)?;
        trace!(%table, page = %page_id, "allocated page");
        Ok(page_id)
    }

    /// Drop a page from the pool and push it onto the table's free list.
    ///
    /// # Errors
    /// Returns `Error::PagePinned` if the page is checked out.
    pub fn free_page(&self, table: TableId, page_id: PageId) -> Result<()> {
        self.discard_page(PageKey::new(table, page_id))?;
        let mut header = self.fetch_page_write(table, PageId::HEADER)?;
        self.disk_manager
            .lock()
            .free_into(table, &mut header, page_id)
    }

    // ========================================================================
    // Public API: Flush pages
    // ========================================================================

    /// Flush a specific page to disk if it's resident and dirty.
    pub fn flush_page(&self, table: TableId, page_id: PageId) -> Result<()> {
        let key = PageKey::new(table, page_id);
        let pinned = self.pin_resident(|k| k == key);
        self.flush_pinned(pinned)
    }

    /// Flush every dirty page belonging to `table`.
    pub fn flush_table(&self, table: TableId) -> Result<()> {
        let pinned = self.pin_resident(|k| k.table == table);
        self.flush_pinned(pinned)
    }

    /// Flush all dirty pages to disk.
    pub fn flush_all_pages(&self) -> Result<()> {
        let pinned = self.pin_resident(|_| true);
        self.flush_pinned(pinned)
    }

    // ========================================================================
    // Public API: Stats and info
    // ========================================================================

    /// Get buffer pool statistics.
    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    /// Get the pool size.
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Number of pages currently cached.
    pub fn resident_count(&self) -> usize {
        self.state.lock().page_table.len()
    }

    /// Pin count of a cached page, or `None` if it is not resident.
    pub fn pin_count(&self, table: TableId, page_id: PageId) -> Option<u32> {
        let state = self.state.lock();
        state
            .page_table
            .get(&PageKey::new(table, page_id))
            .map(|fid| self.frames[fid.index()].pin_count())
    }

    /// Whether a cached page has unwritten changes.
    pub fn is_dirty(&self, table: TableId, page_id: PageId) -> Option<bool> {
        let state = self.state.lock();
        state
            .page_table
            .get(&PageKey::new(table, page_id))
            .map(|fid| self.frames[fid.index()].is_dirty())
    }

    // ========================================================================
    // Internal: Called by PageGuard on drop
    // ========================================================================

    /// Return a frame to the pool. Called by PageReadGuard/PageWriteGuard
    /// on drop, after the page lock has been released.
    pub(crate) fn unpin_page_internal(&self, frame_id: FrameId, is_dirty: bool) {
        let frame = &self.frames[frame_id.index()];
        if is_dirty {
            frame.mark_dirty();
        }

        let mut state = self.state.lock();
        state.replacer.record_access(frame_id);
        frame.unpin();
    }

    // ========================================================================
    // Internal: Core fetch logic
    // ========================================================================

    /// Pin the frame caching `key`, loading it first if necessary.
    fn fetch_page_internal(&self, key: PageKey) -> Result<FrameId> {
        let mut state = self.state.lock();

        if let Some(&frame_id) = state.page_table.get(&key) {
            self.frames[frame_id.index()].pin();
            self.stats.record_hit();
            return Ok(frame_id);
        }

        self.stats.record_miss();

        let frames = &self.frames;
        let frame_id = state
            .replacer
            .victim(|fid| frames[fid.index()].is_reusable())
            .ok_or(Error::NoFreeFrames)?;
        let frame = &self.frames[frame_id.index()];

        if let Some(old) = frame.key() {
            if frame.is_dirty() {
                self.write_back(frame, old)?;
            }
            state.page_table.remove(&old);
            frame.discard();
            self.stats.record_eviction();
            trace!(frame = %frame_id, evicted = %old, loading = %key, "evicted page");
        }

        {
            let mut page = frame.page_mut();
            self.disk_manager
                .lock()
                .read_page(key.table, key.page, &mut page)?;
        }
        self.stats.record_read();

        frame.set_key(Some(key));
        frame.pin();
        state.page_table.insert(key, frame_id);

        Ok(frame_id)
    }

    /// Write a dirty frame to disk.
    ///
    /// The dirty flag is cleared under the page read lock before the write,
    /// so a concurrent writer that marks the frame dirty afterwards is never
    /// lost.
    fn write_back(&self, frame: &Frame, key: PageKey) -> Result<()> {
        let page = frame.page();
        frame.clear_dirty();
        let written = self
            .disk_manager
            .lock()
            .write_page(key.table, key.page, &page);
        if written.is_err() {
            frame.mark_dirty();
        }
        written?;
        self.stats.record_write();
        trace!(page = %key, "wrote back page");
        Ok(())
    }

    /// Pin every resident page whose key matches `filter`.
    fn pin_resident<F>(&self, filter: F) -> Vec<(FrameId, PageKey)>
    where
        F: Fn(PageKey) -> bool,
    {
        let state = self.state.lock();
        state
            .page_table
            .iter()
            .filter(|(&key, _)| filter(key))
            .map(|(&key, &fid)| {
                self.frames[fid.index()].pin();
                (fid, key)
            })
            .collect()
    }

    /// Write back the dirty frames among `pinned`, then unpin all of them.
    ///
    /// Unpinning here does not touch recency order. Every frame is unpinned
    /// even if a write fails; the first error is returned.
    fn flush_pinned(&self, pinned: Vec<(FrameId, PageKey)>) -> Result<()> {
        let mut result = Ok(());
        for (fid, key) in pinned {
            let frame = &self.frames[fid.index()];
            if result.is_ok() && frame.is_dirty() {
                result = self.write_back(frame, key);
            }
            frame.unpin();
        }
        result
    }

    /// Forget a cached page without writing it back.
    fn discard_page(&self, key: PageKey) -> Result<()> {
        let mut state = self.state.lock();
        let Some(&frame_id) = state.page_table.get(&key) else {
            return Ok(());
        };
        let frame = &self.frames[frame_id.index()];
        if frame.is_pinned() {
            return Err(Error::PagePinned(key));
        }
        state.page_table.remove(&key);
        frame.discard();
        state.replacer.demote(frame_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    /// Helper to create a BPM with one freshly created table.
    fn create_test_bpm(pool_size: usize) -> (BufferPoolManager, TableId, TempDir) {
        let dir = tempdir().unwrap();
        let bpm = BufferPoolManager::new(pool_size, DiskManager::new()).unwrap();
        let table = bpm.open_table(dir.path().join("test.db"), 2).unwrap();
        (bpm, table, dir)
    }

    /// Allocate a page and stamp its first byte.
    fn new_page(bpm: &BufferPoolManager, table: TableId, tag: u8) -> PageId {
        let page_id = bpm.alloc_page(table).unwrap();
        let mut guard = bpm.fetch_page_write(table, page_id).unwrap();
        guard.reset();
        guard.as_mut_slice()[100] = tag;
        page_id
    }

    #[test]
    fn test_pool_size_validation() {
        assert!(matches!(
            BufferPoolManager::new(MIN_POOL_SIZE - 1, DiskManager::new()),
            Err(Error::InvalidPoolSize(3))
        ));
        assert!(BufferPoolManager::new(MIN_POOL_SIZE, DiskManager::new()).is_ok());
    }

    #[test]
    fn test_fetch_page_read_and_write() {
        let (bpm, table, _dir) = create_test_bpm(8);
        let page_id = new_page(&bpm, table, 0xAB);

        {
            let guard = bpm.fetch_page_read(table, page_id).unwrap();
            assert_eq!(guard.as_slice()[100], 0xAB);
            assert_eq!(guard.page_id(), page_id);
            assert_eq!(guard.table(), table);
        }
        {
            let mut guard = bpm.fetch_page_write(table, page_id).unwrap();
            guard.as_mut_slice()[100] = 0xCD;
        }
        let guard = bpm.fetch_page_read(table, page_id).unwrap();
        assert_eq!(guard.as_slice()[100], 0xCD);
    }

    #[test]
    fn test_cache_hit() {
        let (bpm, table, _dir) = create_test_bpm(8);
        let page_id = new_page(&bpm, table, 1);
        bpm.stats().reset();

        drop(bpm.fetch_page_read(table, page_id).unwrap());
        drop(bpm.fetch_page_read(table, page_id).unwrap());

        let snapshot = bpm.stats().snapshot();
        assert_eq!(snapshot.cache_hits, 2);
        assert_eq!(snapshot.cache_misses, 0);
    }

    #[test]
    fn test_pin_count_tracking() {
        let (bpm, table, _dir) = create_test_bpm(8);
        let page_id = new_page(&bpm, table, 1);
        assert_eq!(bpm.pin_count(table, page_id), Some(0));

        let g1 = bpm.fetch_page_read(table, page_id).unwrap();
        let g2 = bpm.fetch_page_read(table, page_id).unwrap();
        assert_eq!(bpm.pin_count(table, page_id), Some(2));
        drop(g1);
        drop(g2);
        assert_eq!(bpm.pin_count(table, page_id), Some(0));
    }

    #[test]
    fn test_dirty_page_written_on_eviction() {
        let (bpm, table, _dir) = create_test_bpm(MIN_POOL_SIZE);

        let pages: Vec<PageId> = (0..8).map(|i| new_page(&bpm, table, i as u8)).collect();
        assert!(bpm.stats().snapshot().evictions > 0);

        for (i, &page_id) in pages.iter().enumerate() {
            let guard = bpm.fetch_page_read(table, page_id).unwrap();
            assert_eq!(guard.as_slice()[100], i as u8);
        }
    }

    #[test]
    fn test_lru_victim_is_least_recently_used() {
        let (bpm, table, _dir) = create_test_bpm(MIN_POOL_SIZE);
        // header plus three pages fill the pool
        let a = new_page(&bpm, table, 1);
        let b = new_page(&bpm, table, 2);
        let c = new_page(&bpm, table, 3);

        // touch a so b becomes the oldest data page
        drop(bpm.fetch_page_read(table, a).unwrap());
        drop(bpm.fetch_page_read(table, PageId::HEADER).unwrap());
        drop(bpm.fetch_page_read(table, c).unwrap());

        let d = bpm.alloc_page(table).unwrap();
        drop(bpm.fetch_page_read(table, d).unwrap());

        assert_eq!(bpm.pin_count(table, b), None);
        assert!(bpm.pin_count(table, a).is_some());
    }

    #[test]
    fn test_no_free_frames() {
        let (bpm, table, _dir) = create_test_bpm(MIN_POOL_SIZE);
        let pages: Vec<PageId> = (0..MIN_POOL_SIZE).map(|i| new_page(&bpm, table, i as u8)).collect();

        let guards: Vec<_> = pages
            .iter()
            .map(|&p| bpm.fetch_page_read(table, p).unwrap())
            .collect();
        assert!(matches!(
            bpm.fetch_page_read(table, PageId::HEADER),
            Err(Error::NoFreeFrames)
        ));
        drop(guards);
        assert!(bpm.fetch_page_read(table, PageId::HEADER).is_ok());
    }

    #[test]
    fn test_page_not_found() {
        let (bpm, table, _dir) = create_test_bpm(8);
        assert!(matches!(
            bpm.fetch_page_read(table, PageId::new(999)),
            Err(Error::PageNotFound(_))
        ));
        // the failed load leaves nothing behind
        assert_eq!(bpm.pin_count(table, PageId::new(999)), None);
    }

    #[test]
    fn test_flush_page_clears_dirty() {
        let (bpm, table, _dir) = create_test_bpm(8);
        let page_id = new_page(&bpm, table, 0xFF);
        assert_eq!(bpm.is_dirty(table, page_id), Some(true));

        bpm.flush_page(table, page_id).unwrap();
        assert_eq!(bpm.is_dirty(table, page_id), Some(false));
        assert_eq!(bpm.pin_count(table, page_id), Some(0));
    }

    #[test]
    fn test_flush_all_pages() {
        let (bpm, table, _dir) = create_test_bpm(8);
        for i in 0..5 {
            new_page(&bpm, table, i);
        }
        bpm.stats().reset();

        bpm.flush_all_pages().unwrap();
        // five data pages plus the header
        assert_eq!(bpm.stats().snapshot().pages_written, 6);
    }

    #[test]
    fn test_free_page_discards_frame() {
        let (bpm, table, _dir) = create_test_bpm(8);
        let page_id = new_page(&bpm, table, 7);

        bpm.free_page(table, page_id).unwrap();
        assert_eq!(bpm.pin_count(table, page_id), None);

        let header = bpm.fetch_page_read(table, PageId::HEADER).unwrap();
        assert_eq!(header.free_page(), Some(page_id));
        drop(header);

        // next allocation reuses it
        assert_eq!(bpm.alloc_page(table).unwrap(), page_id);
    }

    #[test]
    fn test_free_pinned_page_fails() {
        let (bpm, table, _dir) = create_test_bpm(8);
        let page_id = new_page(&bpm, table, 7);

        let _guard = bpm.fetch_page_read(table, page_id).unwrap();
        assert!(matches!(
            bpm.free_page(table, page_id),
            Err(Error::PagePinned(_))
        ));
    }

    #[test]
    fn test_close_table_drops_frames() {
        let (bpm, table, dir) = create_test_bpm(8);
        let page_id = new_page(&bpm, table, 0x42);

        bpm.close_table(table).unwrap();
        assert_eq!(bpm.resident_count(), 0);
        assert!(matches!(
            bpm.fetch_page_read(table, page_id),
            Err(Error::InvalidTableId(_))
        ));

        let table = bpm.open_table(dir.path().join("test.db"), 2).unwrap();
        let guard = bpm.fetch_page_read(table, page_id).unwrap();
        assert_eq!(guard.as_slice()[100], 0x42);
    }

    #[test]
    fn test_close_table_with_pinned_page_fails() {
        let (bpm, table, _dir) = create_test_bpm(8);
        let page_id = new_page(&bpm, table, 1);

        let guard = bpm.fetch_page_read(table, page_id).unwrap();
        assert!(matches!(bpm.close_table(table), Err(Error::PagePinned(_))));
        drop(guard);
        bpm.close_table(table).unwrap();
    }

    #[test]
    fn test_concurrent_reads() {
        use std::sync::Arc;
        use std::thread;

        let (bpm, table, _dir) = create_test_bpm(8);
        let page_id = new_page(&bpm, table, 0x42);
        let bpm = Arc::new(bpm);

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let bpm = Arc::clone(&bpm);
                thread::spawn(move || {
                    for _ in 0..50 {
                        let guard = bpm.fetch_page_read(table, page_id).unwrap();
                        assert_eq!(guard.as_slice()[100], 0x42);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(bpm.pin_count(table, page_id), Some(0));
    }
}
