//! Deletion with delayed merging.
//!
//! Removing a record only compacts its leaf. A node leaves the tree once it
//! has no entries left: its pointer and bounding separator are removed from
//! the parent, its page goes back to the free list, and a parent that has
//! lost its last child is removed the same way. The root shrinks whenever it
//! is an internal node left with a single child.

use tracing::debug;

use super::BPlusTree;
use crate::common::{Error, PageId, Result};
use crate::storage::page::Page;

impl BPlusTree<'_> {
    /// Remove the record with `key`.
    ///
    /// Returns `false`, without touching any page, if the key is absent.
    pub fn delete(&self, key: i64) -> Result<bool> {
        let Some(leaf) = self.find_leaf(key)? else {
            return Ok(false);
        };
        let present = self.read(leaf)?.search(key).is_some();
        if !present {
            return Ok(false);
        }
        self.delete_entry(leaf, key)?;
        Ok(true)
    }

    fn delete_entry(&self, leaf: PageId, key: i64) -> Result<()> {
        let (remaining, parent) = {
            let mut page = self.write(leaf)?;
            remove_entry_from_node(&mut page, leaf, key)?;
            (page.num_keys(), page.parent())
        };

        if parent.is_none() {
            self.adjust_root()
        } else if remaining == 0 {
            self.coalesce_nodes(leaf)
        } else {
            Ok(())
        }
    }

    /// Shrink the root while it has run out of keys.
    ///
    /// An empty leaf root empties the tree. An internal root without keys is
    /// replaced by its only child, or empties the tree if it has none. A
    /// promoted child may itself be an internal node without keys, so this
    /// repeats until the root is a leaf or holds a key.
    fn adjust_root(&self) -> Result<()> {
        loop {
            let Some(root) = self.root()? else {
                return Ok(());
            };

            let (num_keys, is_leaf, only_child) = {
                let page = self.read(root)?;
                (page.num_keys(), page.is_leaf(), page.child(0))
            };
            if num_keys > 0 {
                return Ok(());
            }

            let new_root = if is_leaf { None } else { only_child };
            if let Some(child) = new_root {
                self.write(child)?.set_parent(None);
            }
            self.set_root(new_root)?;
            self.bpm.free_page(self.table, root)?;

            match new_root {
                Some(child) => {
                    debug!(table = %self.table, old = %root, new = %child, "promoted child to root")
                }
                None => {
                    debug!(table = %self.table, old = %root, "tree is now empty");
                    return Ok(());
                }
            }
        }
    }

    /// Unlink an empty node from its parent and release its page, walking up
    /// while parents are left without children.
    fn coalesce_nodes(&self, node: PageId) -> Result<()> {
        let mut node = node;

        loop {
            let (parent, is_leaf, right) = {
                let page = self.read(node)?;
                (page.parent(), page.is_leaf(), page.right_sibling())
            };
            let Some(parent) = parent else {
                return self.adjust_root();
            };

            if is_leaf {
                if let Some(neighbor) = self.get_neighbor(node)? {
                    self.write(neighbor)?.set_right_sibling(right)?;
                }
            }

            let keys_before = {
                let mut page = self.write(parent)?;
                let index = page
                    .child_index(node)
                    .ok_or_else(|| Error::corrupted(parent, format!("{} is not a child", node)))?;
                let keys_before = page.num_keys();
                if keys_before == 0 {
                    page.set_child(0, None)?;
                } else {
                    page.remove_child(index)?;
                }
                keys_before
            };

            self.bpm.free_page(self.table, node)?;
            debug!(table = %self.table, node = %node, parent = %parent, "removed empty node");

            if keys_before == 0 {
                // the parent lost its last child
                node = parent;
                continue;
            }

            let parent_is_root = self.read(parent)?.parent().is_none();
            return if parent_is_root { self.adjust_root() } else { Ok(()) };
        }
    }

    /// Leaf immediately to the left of `node` in key order, found through
    /// the tree rather than the sibling chain.
    fn get_neighbor(&self, node: PageId) -> Result<Option<PageId>> {
        let mut current = node;

        let left_subtree = loop {
            let parent = self.read(current)?.parent();
            let Some(parent) = parent else {
                return Ok(None);
            };
            let page = self.read(parent)?;
            let index = page
                .child_index(current)
                .ok_or_else(|| Error::corrupted(parent, format!("{} is not a child", current)))?;
            if index > 0 {
                break page
                    .child(index - 1)
                    .ok_or_else(|| Error::corrupted(parent, "missing child pointer"))?;
            }
            current = parent;
        };

        // rightmost leaf of the left subtree
        let mut current = left_subtree;
        loop {
            let page = self.read(current)?;
            if page.is_leaf() {
                return Ok(Some(current));
            }
            current = page
                .child(page.num_keys())
                .ok_or_else(|| Error::corrupted(current, "missing child pointer"))?;
        }
    }
}

/// Remove `key` from a leaf, compacting the remaining records.
fn remove_entry_from_node(page: &mut Page, page_id: PageId, key: i64) -> Result<()> {
    let index = page
        .search(key)
        .ok_or_else(|| Error::corrupted(page_id, format!("key {} vanished from leaf", key)))?;
    page.remove_record(index)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::test_util::setup;
    use super::super::TreeStats;
    use super::*;

    #[test]
    fn test_delete_missing_key() {
        let (bpm, table, _dir) = setup(8);
        let tree = BPlusTree::new(&bpm, table).unwrap();
        assert!(!tree.delete(1).unwrap());

        tree.insert(1, &[1]).unwrap();
        assert!(!tree.delete(2).unwrap());
        assert_eq!(tree.find(1).unwrap(), Some(vec![1]));
    }

    #[test]
    fn test_delete_last_record_empties_tree() {
        let (bpm, table, _dir) = setup(8);
        let tree = BPlusTree::new(&bpm, table).unwrap();
        tree.insert(1, &[1]).unwrap();
        let root = tree.root().unwrap().unwrap();

        assert!(tree.delete(1).unwrap());
        assert!(tree.is_empty().unwrap());

        let header = bpm.fetch_page_read(table, PageId::HEADER).unwrap();
        assert_eq!(header.free_page(), Some(root));
    }

    #[test]
    fn test_delayed_merge_keeps_sparse_leaves() {
        let (bpm, table, _dir) = setup(8);
        let tree = BPlusTree::new(&bpm, table).unwrap();
        for key in 1..=32 {
            tree.insert(key, &[key]).unwrap();
        }
        // leave a single record in the left leaf
        for key in 2..=16 {
            assert!(tree.delete(key).unwrap());
        }
        let stats = tree.verify().unwrap();
        assert_eq!(stats.leaves, 2);
        assert_eq!(stats.records, 17);
    }

    #[test]
    fn test_emptied_leaf_is_unlinked() {
        let (bpm, table, _dir) = setup(8);
        let tree = BPlusTree::new(&bpm, table).unwrap();
        for key in 1..=48 {
            tree.insert(key, &[key]).unwrap();
        }
        // three leaves: 1..=16, 17..=32, 33..=48; empty the middle one
        for key in 17..=32 {
            assert!(tree.delete(key).unwrap());
        }

        let stats = tree.verify().unwrap();
        assert_eq!(stats.leaves, 2);
        assert_eq!(stats.records, 32);
        let keys: Vec<i64> = tree.find_range(0, 100).unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, (1..=16).chain(33..=48).collect::<Vec<_>>());
    }

    #[test]
    fn test_root_collapses_to_leaf() {
        let (bpm, table, _dir) = setup(8);
        let tree = BPlusTree::new(&bpm, table).unwrap();
        for key in 1..=32 {
            tree.insert(key, &[key]).unwrap();
        }
        for key in 1..=16 {
            tree.delete(key).unwrap();
        }

        let root = tree.root().unwrap().unwrap();
        let page = bpm.fetch_page_read(table, root).unwrap();
        assert!(page.is_leaf());
        assert_eq!(page.parent(), None);
        assert_eq!(page.num_keys(), 16);
        drop(page);

        let stats = tree.verify().unwrap();
        assert_eq!(stats.height, 1);
    }

    #[test]
    fn test_root_collapses_through_keyless_internal_node() {
        let (bpm, table, _dir) = setup(16);
        let tree = BPlusTree::new(&bpm, table).unwrap();
        let count = 16 * 260;
        for key in 0..count {
            tree.insert(key, &[key]).unwrap();
        }
        assert_eq!(tree.verify().unwrap().height, 3);

        // Everything but the first record: the left spine ends up as a
        // chain of internal nodes without keys above a single leaf.
        for key in 1..count {
            assert!(tree.delete(key).unwrap());
        }

        assert_eq!(tree.find(0).unwrap(), Some(vec![0]));
        assert_eq!(tree.levels().unwrap(), vec![vec![vec![0]]]);
        let stats = tree.verify().unwrap();
        assert_eq!(stats.height, 1);
        assert_eq!(stats.leaves, 1);
        assert_eq!(stats.internals, 0);
        assert_eq!(stats.records, 1);

        let root = tree.root().unwrap().unwrap();
        let page = bpm.fetch_page_read(table, root).unwrap();
        assert!(page.is_leaf());
        assert_eq!(page.parent(), None);
    }

    #[test]
    fn test_shuffled_delete_from_deep_tree() {
        let (bpm, table, _dir) = setup(16);
        let tree = BPlusTree::new(&bpm, table).unwrap();
        let count: i64 = 16 * 260;
        for key in 0..count {
            tree.insert(key, &[key]).unwrap();
        }
        assert_eq!(tree.verify().unwrap().height, 3);

        // 1237 is coprime with 4160, so this visits every key once.
        let order: Vec<i64> = (0..count).map(|i| (i * 1237 + 11) % count).collect();
        for (n, &key) in order.iter().enumerate() {
            assert!(tree.delete(key).unwrap());
            if n % 400 == 0 {
                let stats = tree.verify().unwrap();
                assert_eq!(stats.records, (count as usize - n - 1) as u64);
            }
        }

        assert!(tree.is_empty().unwrap());
        let stats = tree.verify().unwrap();
        assert_eq!(stats, TreeStats { free_pages: stats.free_pages, ..TreeStats::default() });
    }
}
