//! B+ tree node layout, shared by internal and leaf pages.
//!
//! ```text
//! Offset  Size  Field
//! 0       8     parent page offset (0 = root)
//! 8       4     is_leaf (1 = leaf, 0 = internal)
//! 12      4     number of keys
//! 16      104   reserved, zero
//! 120     8     internal: leftmost child offset
//!               leaf:     right sibling offset (0 = rightmost leaf)
//! 128     3968  entries
//! ```
//!
//! Internal entries are 16-byte `(key, child)` pairs, up to 248 of them; the
//! child stored in slot `i` is the subtree for keys `>= key(i)`. Leaf entries
//! are 128-byte records, up to 31 of them. Entries `0..num_keys` are live and
//! kept in ascending key order; everything past them is zero.

use super::{Page, Record};
use crate::common::config::{KEY_SIZE, MAX_INTERNAL_KEYS, MAX_LEAF_RECORDS, RECORD_SIZE, VALUE_SIZE};
use crate::common::{Error, PageId, Result};

const PARENT_OFFSET: usize = 0;
const IS_LEAF_OFFSET: usize = 8;
const NUM_KEYS_OFFSET: usize = 12;
const LINK_OFFSET: usize = 120;
const ENTRIES_OFFSET: usize = 128;

const INTERNAL_ENTRY_SIZE: usize = 16;

#[inline]
fn internal_key_at(i: usize) -> usize {
    ENTRIES_OFFSET + i * INTERNAL_ENTRY_SIZE
}

#[inline]
fn child_at(i: usize) -> usize {
    if i == 0 {
        LINK_OFFSET
    } else {
        ENTRIES_OFFSET + (i - 1) * INTERNAL_ENTRY_SIZE + KEY_SIZE
    }
}

#[inline]
fn record_at(i: usize) -> usize {
    ENTRIES_OFFSET + i * RECORD_SIZE
}

impl Page {
    // ========================================================================
    // Common header
    // ========================================================================

    /// Format this page as an empty leaf.
    pub fn init_leaf(&mut self, parent: Option<PageId>) {
        self.reset();
        self.set_parent(parent);
        self.write_u32(IS_LEAF_OFFSET, 1);
    }

    /// Format this page as an empty internal node.
    pub fn init_internal(&mut self, parent: Option<PageId>) {
        self.reset();
        self.set_parent(parent);
        self.write_u32(IS_LEAF_OFFSET, 0);
    }

    #[inline]
    pub fn parent(&self) -> Option<PageId> {
        self.read_link(PARENT_OFFSET)
    }

    #[inline]
    pub fn set_parent(&mut self, parent: Option<PageId>) {
        self.write_link(PARENT_OFFSET, parent);
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.read_u32(IS_LEAF_OFFSET) != 0
    }

    #[inline]
    pub fn num_keys(&self) -> usize {
        self.read_u32(NUM_KEYS_OFFSET) as usize
    }

    #[inline]
    pub fn set_num_keys(&mut self, num_keys: usize) {
        self.write_u32(NUM_KEYS_OFFSET, num_keys as u32);
    }

    fn ensure_leaf(&self) -> Result<()> {
        if self.is_leaf() {
            Ok(())
        } else {
            Err(Error::NotALeaf)
        }
    }

    fn ensure_internal(&self) -> Result<()> {
        if self.is_leaf() {
            Err(Error::NotInternal)
        } else {
            Ok(())
        }
    }

    /// Number of entry slots this node can hold.
    #[inline]
    pub fn capacity(&self) -> usize {
        if self.is_leaf() {
            MAX_LEAF_RECORDS
        } else {
            MAX_INTERNAL_KEYS
        }
    }

    /// Key in slot `i`: a record key for leaves, a separator for internal
    /// nodes. `None` if `i` is past the node's capacity.
    pub fn key(&self, i: usize) -> Option<i64> {
        if i >= self.capacity() {
            return None;
        }
        if self.is_leaf() {
            Some(self.read_i64(record_at(i)))
        } else {
            Some(self.read_i64(internal_key_at(i)))
        }
    }

    /// Overwrite the key in slot `i`.
    ///
    /// # Errors
    /// Returns `Error::InvalidIndex` if `i` is past the node's capacity.
    pub fn set_key(&mut self, i: usize, key: i64) -> Result<()> {
        if i >= self.capacity() {
            return Err(Error::InvalidIndex(i));
        }
        if self.is_leaf() {
            self.write_i64(record_at(i), key);
        } else {
            self.write_i64(internal_key_at(i), key);
        }
        Ok(())
    }

    /// Exact-match lookup over the live keys.
    pub fn search(&self, key: i64) -> Option<usize> {
        let n = self.num_keys();
        let (mut lo, mut hi) = (0usize, n);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let probe = self.key(mid)?;
            if probe == key {
                return Some(mid);
            } else if probe < key {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        None
    }

    /// Largest slot whose key is `<= key`, or `None` if every live key is
    /// greater.
    pub fn range_search(&self, key: i64) -> Option<usize> {
        let n = self.num_keys();
        let (mut lo, mut hi) = (0usize, n);
        // first index with key(idx) > key
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match self.key(mid) {
                Some(probe) if probe <= key => lo = mid + 1,
                _ => hi = mid,
            }
        }
        lo.checked_sub(1)
    }

    // ========================================================================
    // Internal nodes
    // ========================================================================

    /// Child pointer `i` (`0..=num_keys` are live). Always `None` on a leaf.
    pub fn child(&self, i: usize) -> Option<PageId> {
        if i > MAX_INTERNAL_KEYS || self.is_leaf() {
            return None;
        }
        self.read_link(child_at(i))
    }

    pub fn set_child(&mut self, i: usize, child: Option<PageId>) -> Result<()> {
        self.ensure_internal()?;
        if i > MAX_INTERNAL_KEYS {
            return Err(Error::InvalidIndex(i));
        }
        self.write_link(child_at(i), child);
        Ok(())
    }

    /// Position of `child` among the live children.
    pub fn child_index(&self, child: PageId) -> Option<usize> {
        (0..=self.num_keys()).find(|&i| self.child(i) == Some(child))
    }

    /// Insert separator `key` at slot `i` with `right` as the child after it.
    ///
    /// # Errors
    /// - `Error::NotInternal` on a leaf
    /// - `Error::InvalidIndex` if the node is full or `i` is past the live
    ///   keys
    pub fn insert_separator(&mut self, i: usize, key: i64, right: PageId) -> Result<()> {
        self.ensure_internal()?;
        let n = self.num_keys();
        if n >= MAX_INTERNAL_KEYS || i > n {
            return Err(Error::InvalidIndex(i));
        }
        let start = internal_key_at(i);
        let end = internal_key_at(n);
        self.as_mut_slice()
            .copy_within(start..end, start + INTERNAL_ENTRY_SIZE);
        self.write_i64(internal_key_at(i), key);
        self.write_link(child_at(i + 1), Some(right));
        self.set_num_keys(n + 1);
        Ok(())
    }

    /// Remove child `i` together with the separator that bounds it.
    ///
    /// For `i > 0` that is the key just left of the child. For the leftmost
    /// child the first key goes, and child 1 becomes the new leftmost child.
    pub fn remove_child(&mut self, i: usize) -> Result<()> {
        self.ensure_internal()?;
        let n = self.num_keys();
        if n == 0 || i > n {
            return Err(Error::InvalidIndex(i));
        }
        let slot = if i == 0 {
            let second = self.read_link(child_at(1));
            self.write_link(child_at(0), second);
            0
        } else {
            i - 1
        };
        let start = internal_key_at(slot + 1);
        let end = internal_key_at(n);
        self.as_mut_slice()
            .copy_within(start..end, internal_key_at(slot));
        self.zero_range(internal_key_at(n - 1), INTERNAL_ENTRY_SIZE);
        self.set_num_keys(n - 1);
        Ok(())
    }

    // ========================================================================
    // Leaf nodes
    // ========================================================================

    /// Next leaf in key order. Always `None` on an internal node.
    #[inline]
    pub fn right_sibling(&self) -> Option<PageId> {
        if self.is_leaf() {
            self.read_link(LINK_OFFSET)
        } else {
            None
        }
    }

    pub fn set_right_sibling(&mut self, sibling: Option<PageId>) -> Result<()> {
        self.ensure_leaf()?;
        self.write_link(LINK_OFFSET, sibling);
        Ok(())
    }

    /// Record in slot `i`, or `None` past the leaf capacity or on an
    /// internal node.
    pub fn record(&self, i: usize) -> Option<Record> {
        if i >= MAX_LEAF_RECORDS || !self.is_leaf() {
            return None;
        }
        let at = record_at(i);
        let mut payload = [0u8; VALUE_SIZE];
        payload.copy_from_slice(&self.as_slice()[at + KEY_SIZE..at + RECORD_SIZE]);
        Some(Record::with_payload(self.read_i64(at), &payload))
    }

    pub fn set_record(&mut self, i: usize, record: &Record) -> Result<()> {
        self.ensure_leaf()?;
        if i >= MAX_LEAF_RECORDS {
            return Err(Error::InvalidIndex(i));
        }
        let at = record_at(i);
        self.write_i64(at, record.key);
        self.as_mut_slice()[at + KEY_SIZE..at + RECORD_SIZE].copy_from_slice(&record.payload());
        Ok(())
    }

    /// Zero slot `i`.
    pub fn clear_record(&mut self, i: usize) -> Result<()> {
        self.ensure_leaf()?;
        if i >= MAX_LEAF_RECORDS {
            return Err(Error::InvalidIndex(i));
        }
        self.zero_range(record_at(i), RECORD_SIZE);
        Ok(())
    }

    /// Insert `record` at slot `i`, shifting later records right.
    pub fn insert_record(&mut self, i: usize, record: &Record) -> Result<()> {
        self.ensure_leaf()?;
        let n = self.num_keys();
        if n >= MAX_LEAF_RECORDS || i > n {
            return Err(Error::InvalidIndex(i));
        }
        let start = record_at(i);
        let end = record_at(n);
        self.as_mut_slice().copy_within(start..end, start + RECORD_SIZE);
        self.set_record(i, record)?;
        self.set_num_keys(n + 1);
        Ok(())
    }

    /// Remove the record in slot `i`, compacting the ones after it.
    pub fn remove_record(&mut self, i: usize) -> Result<Record> {
        self.ensure_leaf()?;
        let n = self.num_keys();
        let removed = match self.record(i) {
            Some(record) if i < n => record,
            _ => return Err(Error::InvalidIndex(i)),
        };
        let start = record_at(i + 1);
        let end = record_at(n);
        self.as_mut_slice().copy_within(start..end, record_at(i));
        self.clear_record(n - 1)?;
        self.set_num_keys(n - 1);
        Ok(removed)
    }

    /// Live records in key order.
    pub fn records(&self) -> impl Iterator<Item = Record> + '_ {
        (0..self.num_keys()).filter_map(move |i| self.record(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf_with(keys: &[i64]) -> Page {
        let mut page = Page::new();
        page.init_leaf(None);
        for (i, &k) in keys.iter().enumerate() {
            page.insert_record(i, &Record::new(k, &[k * 10]).unwrap())
                .unwrap();
        }
        page
    }

    #[test]
    fn test_node_header_positions() {
        let mut page = Page::new();
        page.init_leaf(Some(PageId::new(3)));
        page.set_num_keys(2);
        page.set_right_sibling(Some(PageId::new(5))).unwrap();

        let bytes = page.as_slice();
        assert_eq!(&bytes[0..8], &(3u64 * 4096).to_ne_bytes());
        assert_eq!(&bytes[8..12], &1u32.to_ne_bytes());
        assert_eq!(&bytes[12..16], &2u32.to_ne_bytes());
        assert!(bytes[16..120].iter().all(|&b| b == 0));
        assert_eq!(&bytes[120..128], &(5u64 * 4096).to_ne_bytes());
    }

    #[test]
    fn test_leaf_record_slots() {
        let page = leaf_with(&[10, 20]);
        let bytes = page.as_slice();
        assert_eq!(&bytes[128..136], &10i64.to_ne_bytes());
        assert_eq!(&bytes[136..144], &100i64.to_ne_bytes());
        assert_eq!(&bytes[256..264], &20i64.to_ne_bytes());
        assert_eq!(page.key(1), Some(20));
        assert_eq!(page.key(MAX_LEAF_RECORDS), None);
    }

    #[test]
    fn test_internal_entry_slots() {
        let mut page = Page::new();
        page.init_internal(None);
        page.set_child(0, Some(PageId::new(1))).unwrap();
        page.insert_separator(0, 50, PageId::new(2)).unwrap();

        let bytes = page.as_slice();
        assert_eq!(&bytes[120..128], &4096u64.to_ne_bytes());
        assert_eq!(&bytes[128..136], &50i64.to_ne_bytes());
        assert_eq!(&bytes[136..144], &(2u64 * 4096).to_ne_bytes());
        assert_eq!(page.child(1), Some(PageId::new(2)));
        assert_eq!(page.child_index(PageId::new(2)), Some(1));
    }

    #[test]
    fn test_search_and_range_search() {
        let page = leaf_with(&[10, 20, 30]);
        assert_eq!(page.search(20), Some(1));
        assert_eq!(page.search(25), None);

        assert_eq!(page.range_search(5), None);
        assert_eq!(page.range_search(10), Some(0));
        assert_eq!(page.range_search(25), Some(1));
        assert_eq!(page.range_search(99), Some(2));
    }

    #[test]
    fn test_insert_and_remove_records_keep_order() {
        let mut page = leaf_with(&[10, 30]);
        page.insert_record(1, &Record::new(20, &[200]).unwrap())
            .unwrap();
        let keys: Vec<i64> = page.records().map(|r| r.key).collect();
        assert_eq!(keys, vec![10, 20, 30]);

        let removed = page.remove_record(0).unwrap();
        assert_eq!(removed.key, 10);
        let keys: Vec<i64> = page.records().map(|r| r.key).collect();
        assert_eq!(keys, vec![20, 30]);
        // vacated slot is zeroed
        assert!(page.as_slice()[record_at(2)..record_at(3)]
            .iter()
            .all(|&b| b == 0));
    }

    #[test]
    fn test_leaf_full() {
        let keys: Vec<i64> = (0..MAX_LEAF_RECORDS as i64).collect();
        let mut page = leaf_with(&keys);
        let extra = Record::new(100, &[]).unwrap();
        assert!(matches!(
            page.insert_record(MAX_LEAF_RECORDS, &extra),
            Err(Error::InvalidIndex(_))
        ));
    }

    #[test]
    fn test_remove_child() {
        let mut page = Page::new();
        page.init_internal(None);
        page.set_child(0, Some(PageId::new(1))).unwrap();
        page.insert_separator(0, 10, PageId::new(2)).unwrap();
        page.insert_separator(1, 20, PageId::new(3)).unwrap();

        // Middle child drops the key to its left.
        page.remove_child(1).unwrap();
        assert_eq!(page.num_keys(), 1);
        assert_eq!(page.key(0), Some(20));
        assert_eq!(page.child(0), Some(PageId::new(1)));
        assert_eq!(page.child(1), Some(PageId::new(3)));
        assert_eq!(page.child(2), None);

        // Leftmost child drops the first key.
        page.remove_child(0).unwrap();
        assert_eq!(page.num_keys(), 0);
        assert_eq!(page.child(0), Some(PageId::new(3)));
        assert!(page.as_slice()[128..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_layout_mismatch_rejected() {
        let mut leaf = leaf_with(&[10]);
        assert!(matches!(leaf.set_child(0, Some(PageId::new(1))), Err(Error::NotInternal)));
        assert!(matches!(leaf.insert_separator(0, 5, PageId::new(2)), Err(Error::NotInternal)));
        assert!(matches!(leaf.remove_child(0), Err(Error::NotInternal)));
        assert_eq!(leaf.child(0), None);
        // the leaf is untouched
        assert_eq!(leaf.records().map(|r| r.key).collect::<Vec<_>>(), vec![10]);

        let mut internal = Page::new();
        internal.init_internal(None);
        internal.set_child(0, Some(PageId::new(1))).unwrap();
        let record = Record::new(1, &[1]).unwrap();
        assert!(matches!(internal.insert_record(0, &record), Err(Error::NotALeaf)));
        assert!(matches!(internal.set_record(0, &record), Err(Error::NotALeaf)));
        assert!(matches!(internal.remove_record(0), Err(Error::NotALeaf)));
        assert!(matches!(internal.clear_record(0), Err(Error::NotALeaf)));
        assert!(matches!(internal.set_right_sibling(None), Err(Error::NotALeaf)));
        assert_eq!(internal.record(0), None);
        assert_eq!(internal.right_sibling(), None);
        assert_eq!(internal.child(0), Some(PageId::new(1)));
    }
}
