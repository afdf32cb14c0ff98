//! Frame - a slot in the buffer pool.
//!
//! A [`Frame`] holds a [`Page`] plus the bookkeeping the pool needs:
//! - Which `(table, page)` is cached (if any)
//! - Pin count for reference counting
//! - Dirty flag for write-back tracking
//!
//! Recency order is not stored here; it lives in the pool's LRU ring,
//! indexed by [`FrameId`](crate::FrameId).

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::PageKey;
use crate::storage::page::Page;

/// A frame in the buffer pool.
///
/// # Thread Safety
/// - `page`: `RwLock`, taken by page guards for the lifetime of a checkout
/// - `key`: `Mutex`, only changed while the pool's frame-table lock is held
/// - `pin_count`: `AtomicU32`
/// - `is_dirty`: `AtomicBool`
pub struct Frame {
    page: RwLock<Page>,
    key: Mutex<Option<PageKey>>,
    pin_count: AtomicU32,
    is_dirty: AtomicBool,
}

impl Frame {
    /// Create a new empty frame.
    pub fn new() -> Self {
        Self {
            page: RwLock::new(Page::new()),
            key: Mutex::new(None),
            pin_count: AtomicU32::new(0),
            is_dirty: AtomicBool::new(false),
        }
    }

    // ========================================================================
    // Page access
    // ========================================================================

    /// Acquire read lock on the page.
    #[inline]
    pub fn page(&self) -> RwLockReadGuard<'_, Page> {
        self.page.read()
    }

    /// Acquire write lock on the page.
    #[inline]
    pub fn page_mut(&self) -> RwLockWriteGuard<'_, Page> {
        self.page.write()
    }

    // ========================================================================
    // Identity
    // ========================================================================

    /// The cached page, or `None` if the frame is empty.
    #[inline]
    pub fn key(&self) -> Option<PageKey> {
        *self.key.lock()
    }

    #[inline]
    pub fn set_key(&self, key: Option<PageKey>) {
        *self.key.lock() = key;
    }

    // ========================================================================
    // Pinning
    // ========================================================================

    /// Increment the pin count. Returns the new pin count.
    #[inline]
    pub fn pin(&self) -> u32 {
        self.pin_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Decrement the pin count. Returns the new pin count.
    ///
    /// # Panics
    /// Panics if pin count is already 0.
    #[inline]
    pub fn unpin(&self) -> u32 {
        let old = self.pin_count.fetch_sub(1, Ordering::AcqRel);
        assert!(old > 0, "pin count underflow");
        old - 1
    }

    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pin_count() > 0
    }

    // ========================================================================
    // Dirty flag
    // ========================================================================

    #[inline]
    pub fn mark_dirty(&self) {
        self.is_dirty.store(true, Ordering::Release);
    }

    #[inline]
    pub fn clear_dirty(&self) {
        self.is_dirty.store(false, Ordering::Release);
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.is_dirty.load(Ordering::Acquire)
    }

    // ========================================================================
    // State queries
    // ========================================================================

    /// Check if the frame caches nothing.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.key().is_none()
    }

    /// A frame can be reused when nobody holds it, whether or not it caches
    /// a page.
    #[inline]
    pub fn is_reusable(&self) -> bool {
        !self.is_pinned()
    }

    /// Forget the cached page without writing it back.
    pub(crate) fn discard(&self) {
        self.set_key(None);
        self.clear_dirty();
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{PageId, TableId};

    fn key(table: u32, page: u64) -> PageKey {
        PageKey::new(TableId::new(table), PageId::new(page))
    }

    #[test]
    fn test_frame_new() {
        let frame = Frame::new();
        assert!(frame.is_empty());
        assert!(frame.is_reusable());
        assert!(!frame.is_dirty());
        assert_eq!(frame.pin_count(), 0);
    }

    #[test]
    fn test_frame_pin_unpin() {
        let frame = Frame::new();
        assert_eq!(frame.pin(), 1);
        assert_eq!(frame.pin(), 2);
        assert!(!frame.is_reusable());

        assert_eq!(frame.unpin(), 1);
        assert_eq!(frame.unpin(), 0);
        assert!(frame.is_reusable());
    }

    #[test]
    #[should_panic(expected = "pin count underflow")]
    fn test_frame_unpin_underflow() {
        let frame = Frame::new();
        frame.unpin();
    }

    #[test]
    fn test_frame_identity_and_discard() {
        let frame = Frame::new();
        frame.set_key(Some(key(2, 9)));
        frame.mark_dirty();
        assert_eq!(frame.key(), Some(key(2, 9)));

        frame.discard();
        assert!(frame.is_empty());
        assert!(!frame.is_dirty());
    }

    #[test]
    fn test_frame_page_access() {
        let frame = Frame::new();
        frame.page_mut().as_mut_slice()[0] = 0xAB;
        assert_eq!(frame.page().as_slice()[0], 0xAB);
    }

    #[test]
    fn test_frame_concurrent_pin() {
        use std::sync::Arc;
        use std::thread;

        let frame = Arc::new(Frame::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let frame = Arc::clone(&frame);
                thread::spawn(move || {
                    for _ in 0..100 {
                        frame.pin();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(frame.pin_count(), 800);
    }
}
