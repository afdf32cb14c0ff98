//! Insertion with leaf and internal splits.

use tracing::debug;

use super::{cut, BPlusTree};
use crate::common::config::{INTERNAL_ORDER, LEAF_ORDER, MAX_INTERNAL_KEYS, MAX_LEAF_RECORDS};
use crate::common::{Error, PageId, Result};
use crate::storage::page::{Page, Record};

impl BPlusTree<'_> {
    /// Insert a record built from `key` and exactly `num_values` columns.
    ///
    /// # Errors
    /// - `Error::ColumnCountMismatch` if `values` has the wrong length
    /// - `Error::KeyExists` if `key` is already present
    pub fn insert(&self, key: i64, values: &[i64]) -> Result<()> {
        if values.len() != self.num_values {
            return Err(Error::ColumnCountMismatch {
                expected: self.num_values,
                actual: values.len(),
            });
        }
        self.insert_record(Record::new(key, values)?)
    }

    /// Insert a prepared record.
    ///
    /// # Errors
    /// Returns `Error::KeyExists` if the key is already present; the tree is
    /// left untouched.
    pub fn insert_record(&self, record: Record) -> Result<()> {
        let Some(leaf) = self.find_leaf(record.key)? else {
            return self.start_new_tree(&record);
        };

        let full = {
            let page = self.read(leaf)?;
            if page.search(record.key).is_some() {
                return Err(Error::KeyExists(record.key));
            }
            page.num_keys() >= MAX_LEAF_RECORDS
        };

        if full {
            self.insert_into_leaf_after_splitting(leaf, &record)
        } else {
            self.insert_into_leaf(leaf, &record)
        }
    }

    fn start_new_tree(&self, record: &Record) -> Result<()> {
        let root = self.make_leaf(None)?;
        self.write(root)?.insert_record(0, record)?;
        self.set_root(Some(root))?;
        debug!(table = %self.table, root = %root, "started new tree");
        Ok(())
    }

    /// Allocate and format an empty leaf. No guard may be held by the
    /// caller, since allocation updates the header page.
    fn make_leaf(&self, parent: Option<PageId>) -> Result<PageId> {
        let page_id = self.bpm.alloc_page(self.table)?;
        self.write(page_id)?.init_leaf(parent);
        Ok(page_id)
    }

    fn make_internal(&self, parent: Option<PageId>) -> Result<PageId> {
        let page_id = self.bpm.alloc_page(self.table)?;
        self.write(page_id)?.init_internal(parent);
        Ok(page_id)
    }

    fn insert_into_leaf(&self, leaf: PageId, record: &Record) -> Result<()> {
        let mut page = self.write(leaf)?;
        let slot = insertion_point(&page, record.key);
        page.insert_record(slot, record)
    }

    /// Split a full leaf around `record` and push the new leaf's first key
    /// into the parent.
    fn insert_into_leaf_after_splitting(&self, leaf: PageId, record: &Record) -> Result<()> {
        let new_leaf = self.make_leaf(None)?;

        let separator = {
            let mut old = self.write(leaf)?;
            let mut new = self.write(new_leaf)?;

            let mut temp: Vec<Record> = old.records().collect();
            temp.insert(insertion_point(&old, record.key), *record);
            debug_assert_eq!(temp.len(), LEAF_ORDER);

            let split = cut(LEAF_ORDER - 1);
            let parent = old.parent();
            let right = old.right_sibling();

            old.init_leaf(parent);
            for (i, rec) in temp[..split].iter().enumerate() {
                old.set_record(i, rec)?;
            }
            old.set_num_keys(split);

            new.init_leaf(parent);
            for (i, rec) in temp[split..].iter().enumerate() {
                new.set_record(i, rec)?;
            }
            new.set_num_keys(temp.len() - split);

            new.set_right_sibling(right)?;
            old.set_right_sibling(Some(new_leaf))?;

            temp[split].key
        };

        debug!(table = %self.table, left = %leaf, right = %new_leaf, separator, "split leaf");
        self.insert_into_parent(leaf, separator, new_leaf)
    }

    /// Hook `right` into the tree next to `left`, splitting ancestors as
    /// long as they overflow.
    fn insert_into_parent(&self, mut left: PageId, mut key: i64, mut right: PageId) -> Result<()> {
        loop {
            let parent = self.read(left)?.parent();
            let Some(parent) = parent else {
                return self.insert_into_new_root(left, key, right);
            };

            let (left_index, full) = {
                let page = self.read(parent)?;
                (get_left_index(&page, parent, left)?, page.num_keys() >= MAX_INTERNAL_KEYS)
            };

            if !full {
                return self.insert_into_node(parent, left_index, key, right);
            }

            let (separator, new_node) =
                self.insert_into_node_after_splitting(parent, left_index, key, right)?;
            left = parent;
            key = separator;
            right = new_node;
        }
    }

    fn insert_into_node(&self, node: PageId, left_index: usize, key: i64, right: PageId) -> Result<()> {
        self.write(node)?.insert_separator(left_index, key, right)
    }

    /// Split a full internal node while inserting `(key, right)` after child
    /// `left_index`. Returns the separator to push up and the new right node.
    fn insert_into_node_after_splitting(
        &self,
        node: PageId,
        left_index: usize,
        key: i64,
        right: PageId,
    ) -> Result<(i64, PageId)> {
        let new_node = self.make_internal(None)?;

        let (separator, moved) = {
            let mut old = self.write(node)?;
            let n = old.num_keys();

            let mut keys = (0..n)
                .map(|i| old.key(i))
                .collect::<Option<Vec<i64>>>()
                .ok_or_else(|| Error::corrupted(node, "key index out of range"))?;
            let mut children: Vec<Option<PageId>> = (0..=n).map(|i| old.child(i)).collect();
            keys.insert(left_index, key);
            children.insert(left_index + 1, Some(right));

            let split = cut(INTERNAL_ORDER);
            let parent = old.parent();

            old.init_internal(parent);
            for (i, &k) in keys[..split - 1].iter().enumerate() {
                old.set_key(i, k)?;
            }
            for (i, &c) in children[..split].iter().enumerate() {
                old.set_child(i, c)?;
            }
            old.set_num_keys(split - 1);

            let mut new = self.write(new_node)?;
            new.init_internal(parent);
            for (i, &k) in keys[split..].iter().enumerate() {
                new.set_key(i, k)?;
            }
            for (i, &c) in children[split..].iter().enumerate() {
                new.set_child(i, c)?;
            }
            new.set_num_keys(keys.len() - split);

            (keys[split - 1], children[split..].to_vec())
        };

        for child in moved.into_iter().flatten() {
            self.write(child)?.set_parent(Some(new_node));
        }

        debug!(table = %self.table, left = %node, right = %new_node, separator, "split internal node");
        Ok((separator, new_node))
    }

    fn insert_into_new_root(&self, left: PageId, key: i64, right: PageId) -> Result<()> {
        let root = self.make_internal(None)?;
        {
            let mut page = self.write(root)?;
            page.set_child(0, Some(left))?;
            page.insert_separator(0, key, right)?;
        }
        self.write(left)?.set_parent(Some(root));
        self.write(right)?.set_parent(Some(root));
        self.set_root(Some(root))?;

        debug!(table = %self.table, root = %root, separator = key, "grew new root");
        Ok(())
    }
}

/// Slot at which `key` keeps a node's keys ordered.
fn insertion_point(page: &Page, key: i64) -> usize {
    page.range_search(key).map_or(0, |i| i + 1)
}

/// Position of `left` among `parent`'s children.
fn get_left_index(parent: &Page, parent_id: PageId, left: PageId) -> Result<usize> {
    parent
        .child_index(left)
        .ok_or_else(|| Error::corrupted(parent_id, format!("{} is not a child", left)))
}

#[cfg(test)]
mod tests {
    use super::super::test_util::setup;
    use super::*;

    #[test]
    fn test_first_insert_creates_leaf_root() {
        let (bpm, table, _dir) = setup(8);
        let tree = BPlusTree::new(&bpm, table).unwrap();
        tree.insert(5, &[50]).unwrap();

        let root = tree.root().unwrap().unwrap();
        let page = bpm.fetch_page_read(table, root).unwrap();
        assert!(page.is_leaf());
        assert_eq!(page.num_keys(), 1);
        assert_eq!(page.parent(), None);
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let (bpm, table, _dir) = setup(8);
        let tree = BPlusTree::new(&bpm, table).unwrap();
        tree.insert(5, &[50]).unwrap();

        assert!(matches!(tree.insert(5, &[51]), Err(Error::KeyExists(5))));
        assert_eq!(tree.find(5).unwrap(), Some(vec![50]));
    }

    #[test]
    fn test_wrong_value_count() {
        let (bpm, table, _dir) = setup(8);
        let tree = BPlusTree::new(&bpm, table).unwrap();
        assert!(matches!(
            tree.insert(1, &[1, 2]),
            Err(Error::ColumnCountMismatch { expected: 1, actual: 2 })
        ));
    }

    #[test]
    fn test_leaf_split_shape() {
        let (bpm, table, _dir) = setup(8);
        let tree = BPlusTree::new(&bpm, table).unwrap();
        for key in 1..=32 {
            tree.insert(key, &[key * 10]).unwrap();
        }

        let root = tree.root().unwrap().unwrap();
        let (left, right) = {
            let page = bpm.fetch_page_read(table, root).unwrap();
            assert!(!page.is_leaf());
            assert_eq!(page.num_keys(), 1);
            assert_eq!(page.key(0), Some(17));
            (page.child(0).unwrap(), page.child(1).unwrap())
        };

        let left_page = bpm.fetch_page_read(table, left).unwrap();
        assert_eq!(left_page.num_keys(), 16);
        assert_eq!(left_page.right_sibling(), Some(right));
        assert_eq!(left_page.parent(), Some(root));
        drop(left_page);

        let right_page = bpm.fetch_page_read(table, right).unwrap();
        assert_eq!(right_page.num_keys(), 16);
        assert_eq!(right_page.key(0), Some(17));
        assert_eq!(right_page.right_sibling(), None);
        // unused slots stay zeroed
        assert!(right_page.as_slice()[128 + 16 * 128..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_descending_inserts() {
        let (bpm, table, _dir) = setup(8);
        let tree = BPlusTree::new(&bpm, table).unwrap();
        for key in (0..500).rev() {
            tree.insert(key, &[-key]).unwrap();
        }
        for key in 0..500 {
            assert_eq!(tree.find(key).unwrap(), Some(vec![-key]));
        }
    }

    #[test]
    fn test_internal_split() {
        let (bpm, table, _dir) = setup(16);
        let tree = BPlusTree::new(&bpm, table).unwrap();
        // Sequential inserts leave 16-record leaves behind; 250 of them
        // overflow a single internal root.
        let count = 16 * 260;
        for key in 0..count {
            tree.insert(key, &[key]).unwrap();
        }

        let stats = tree.verify().unwrap();
        assert_eq!(stats.height, 3);
        assert_eq!(stats.records, count as u64);

        let root = tree.root().unwrap().unwrap();
        {
            let page = bpm.fetch_page_read(table, root).unwrap();
            assert_eq!(page.num_keys(), 1);
        }
        for key in [0, 1999, count - 1] {
            assert_eq!(tree.find(key).unwrap(), Some(vec![key]));
        }
    }
}
