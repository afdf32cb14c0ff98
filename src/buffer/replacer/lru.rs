//! LRU (Least Recently Used) replacement policy.
//!
//! Frames are kept in a circular doubly-linked ring whose head is the most
//! recently used frame. Victims are searched from the tail towards the head;
//! the first frame the pool reports as reusable wins. Pinned frames stay in
//! the ring and are simply skipped.

use crate::common::FrameId;

/// Recency ring over a fixed set of frames.
///
/// Links are stored as frame indices, so the ring never allocates after
/// construction and every operation except victim search is O(1).
///
/// # Example
/// ```
/// use bptdb::buffer::replacer::LruReplacer;
/// use bptdb::FrameId;
///
/// let mut lru = LruReplacer::new(3);
/// lru.record_access(FrameId::new(2));
/// lru.record_access(FrameId::new(0));
/// // Frame 1 is now the least recently used.
/// assert_eq!(lru.victim(|_| true), Some(FrameId::new(1)));
/// ```
pub struct LruReplacer {
    prev: Vec<usize>,
    next: Vec<usize>,
    /// Most recently used frame. The tail is `prev[head]`.
    head: usize,
}

impl LruReplacer {
    /// Build a ring over `capacity` frames, frame 0 at the head.
    ///
    /// # Panics
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "replacer capacity must be > 0");
        Self {
            prev: (0..capacity).map(|i| (i + capacity - 1) % capacity).collect(),
            next: (0..capacity).map(|i| (i + 1) % capacity).collect(),
            head: 0,
        }
    }

    /// Number of frames in the ring.
    pub fn len(&self) -> usize {
        self.next.len()
    }

    pub fn is_empty(&self) -> bool {
        self.next.is_empty()
    }

    /// Mark a frame as most recently used.
    pub fn record_access(&mut self, frame_id: FrameId) {
        let f = frame_id.index();
        if f == self.head {
            return;
        }
        self.unlink(f);
        self.link_before(f, self.head);
        self.head = f;
    }

    /// Mark a frame as least recently used, making it the first victim
    /// candidate.
    pub fn demote(&mut self, frame_id: FrameId) {
        let f = frame_id.index();
        if f == self.tail() {
            return;
        }
        if f == self.head {
            // rotating the ring turns the head into the tail
            self.head = self.next[f];
            return;
        }
        self.unlink(f);
        self.link_before(f, self.head);
    }

    /// First frame, scanning from least to most recently used, for which
    /// `reusable` returns true.
    pub fn victim<F>(&self, mut reusable: F) -> Option<FrameId>
    where
        F: FnMut(FrameId) -> bool,
    {
        self.iter_lru().find(|&f| reusable(f))
    }

    /// Frames from least to most recently used.
    pub fn iter_lru(&self) -> impl Iterator<Item = FrameId> + '_ {
        let mut cursor = self.tail();
        let mut remaining = self.len();
        std::iter::from_fn(move || {
            if remaining == 0 {
                return None;
            }
            let current = cursor;
            cursor = self.prev[cursor];
            remaining -= 1;
            Some(FrameId::new(current))
        })
    }

    #[inline]
    fn tail(&self) -> usize {
        self.prev[self.head]
    }

    fn unlink(&mut self, f: usize) {
        let (p, n) = (self.prev[f], self.next[f]);
        self.next[p] = n;
        self.prev[n] = p;
    }

    fn link_before(&mut self, f: usize, at: usize) {
        let p = self.prev[at];
        self.next[p] = f;
        self.prev[f] = p;
        self.next[f] = at;
        self.prev[at] = f;
    }
}
