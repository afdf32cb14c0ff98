//! RAII guards for page access.
//!
//! These guards provide safe access to pages in the buffer pool:
//! - [`PageReadGuard`] - Shared read access (multiple allowed)
//! - [`PageWriteGuard`] - Exclusive write access (marks the frame dirty)
//!
//! Dropping a guard releases the page lock first and only then returns the
//! frame to the pool, so a thread waiting on the pool never waits on a page
//! lock held by a thread that is itself waiting on the pool.

use std::ops::{Deref, DerefMut};

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use super::buffer_pool_manager::BufferPoolManager;
use crate::common::{FrameId, PageId, PageKey, TableId};
use crate::storage::page::Page;

/// Guard for read-only page access.
///
/// Multiple `PageReadGuard`s can exist for the same page simultaneously.
/// The page is automatically unpinned when the guard is dropped.
///
/// # Example
/// ```ignore
/// let guard = bpm.fetch_page_read(table, page_id)?;
/// let root = guard.root();  // Deref to &Page
/// // guard drops here, page unpinned
/// ```
pub struct PageReadGuard<'a> {
    bpm: &'a BufferPoolManager,
    frame_id: FrameId,
    key: PageKey,
    /// Always `Some` until drop.
    lock: Option<RwLockReadGuard<'a, Page>>,
}

impl<'a> PageReadGuard<'a> {
    pub(crate) fn new(
        bpm: &'a BufferPoolManager,
        frame_id: FrameId,
        key: PageKey,
        lock: RwLockReadGuard<'a, Page>,
    ) -> Self {
        Self {
            bpm,
            frame_id,
            key,
            lock: Some(lock),
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.key.page
    }

    #[inline]
    pub fn table(&self) -> TableId {
        self.key.table
    }

    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }
}

impl Deref for PageReadGuard<'_> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        match &self.lock {
            Some(lock) => lock,
            None => unreachable!("page guard used after release"),
        }
    }
}

impl Drop for PageReadGuard<'_> {
    fn drop(&mut self) {
        drop(self.lock.take());
        self.bpm.unpin_page_internal(self.frame_id, false);
    }
}

/// Guard for exclusive write access to a page.
///
/// Only one `PageWriteGuard` can exist for a page at a time.
/// The frame is marked dirty and unpinned when the guard is dropped.
///
/// # Example
/// ```ignore
/// let mut guard = bpm.fetch_page_write(table, PageId::HEADER)?;
/// guard.set_root(Some(new_root));  // DerefMut to &mut Page
/// // guard drops here, frame marked dirty and unpinned
/// ```
pub struct PageWriteGuard<'a> {
    bpm: &'a BufferPoolManager,
    frame_id: FrameId,
    key: PageKey,
    /// Always `Some` until drop.
    lock: Option<RwLockWriteGuard<'a, Page>>,
}

impl<'a> PageWriteGuard<'a> {
    pub(crate) fn new(
        bpm: &'a BufferPoolManager,
        frame_id: FrameId,
        key: PageKey,
        lock: RwLockWriteGuard<'a, Page>,
    ) -> Self {
        Self {
            bpm,
            frame_id,
            key,
            lock: Some(lock),
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.key.page
    }

    #[inline]
    pub fn table(&self) -> TableId {
        self.key.table
    }

    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }
}

impl Deref for PageWriteGuard<'_> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        match &self.lock {
            Some(lock) => lock,
            None => unreachable!("page guard used after release"),
        }
    }
}

impl DerefMut for PageWriteGuard<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Page {
        match &mut self.lock {
            Some(lock) => lock,
            None => unreachable!("page guard used after release"),
        }
    }
}

impl Drop for PageWriteGuard<'_> {
    fn drop(&mut self) {
        drop(self.lock.take());
        self.bpm.unpin_page_internal(self.frame_id, true);
    }
}
