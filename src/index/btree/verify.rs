//! Structural checks and level dumps.

use std::collections::HashSet;

use super::BPlusTree;
use crate::common::{Error, PageId, Result};

/// Shape of a tree as measured by [`BPlusTree::verify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TreeStats {
    /// Number of levels; 0 for an empty tree, 1 for a single leaf.
    pub height: usize,
    pub leaves: usize,
    pub internals: usize,
    pub records: u64,
    /// Pages on the table's free list.
    pub free_pages: u64,
}

/// A node still to be checked, with the key range its parent allows.
struct Pending {
    page: PageId,
    parent: Option<PageId>,
    /// Inclusive.
    lower: Option<i64>,
    /// Exclusive.
    upper: Option<i64>,
}

impl BPlusTree<'_> {
    /// Walk the whole tree and the free list, checking every structural
    /// invariant.
    ///
    /// Checked: key order inside nodes and against parent separators, parent
    /// links, one more child than keys in internal nodes, equal leaf depth,
    /// a sibling chain that visits every leaf in order, and that every page
    /// but the header is either in the tree or on the free list, never both.
    ///
    /// # Errors
    /// Returns `Error::Corrupted` naming the first offending page.
    pub fn verify(&self) -> Result<TreeStats> {
        let mut stats = TreeStats::default();
        let num_pages = self.read(PageId::HEADER)?.num_pages();
        let mut reachable = HashSet::new();
        let mut leaf_order = Vec::new();

        if let Some(root) = self.root()? {
            let mut level = vec![Pending {
                page: root,
                parent: None,
                lower: None,
                upper: None,
            }];

            while !level.is_empty() {
                stats.height += 1;
                let mut next = Vec::new();
                let mut saw_leaf = false;

                for item in level {
                    let id = item.page;
                    if id.is_header() || id.0 >= num_pages {
                        return Err(Error::corrupted(id, "link points outside the file"));
                    }
                    if !reachable.insert(id) {
                        return Err(Error::corrupted(id, "page reached twice"));
                    }

                    let page = self.read(id)?;
                    if page.parent() != item.parent {
                        return Err(Error::corrupted(
                            id,
                            format!("parent is {:?}, expected {:?}", page.parent(), item.parent),
                        ));
                    }

                    let n = page.num_keys();
                    if n > page.capacity() {
                        return Err(Error::corrupted(id, format!("{} keys exceed capacity", n)));
                    }
                    let keys = (0..n)
                        .map(|i| page.key(i))
                        .collect::<Option<Vec<i64>>>()
                        .ok_or_else(|| Error::corrupted(id, "key index out of range"))?;

                    if keys.windows(2).any(|w| w[0] >= w[1]) {
                        return Err(Error::corrupted(id, "keys out of order"));
                    }
                    let below = |k: &i64| item.lower.is_some_and(|lo| *k < lo);
                    let above = |k: &i64| item.upper.is_some_and(|hi| *k >= hi);
                    if keys.iter().any(|k| below(k) || above(k)) {
                        return Err(Error::corrupted(id, "key outside the range of its parent"));
                    }

                    if page.is_leaf() {
                        if n == 0 {
                            return Err(Error::corrupted(id, "empty leaf left in tree"));
                        }
                        saw_leaf = true;
                        stats.leaves += 1;
                        stats.records += n as u64;
                        leaf_order.push(id);
                        continue;
                    }

                    if item.parent.is_none() && n == 0 {
                        return Err(Error::corrupted(id, "internal root without keys"));
                    }
                    stats.internals += 1;
                    for j in 0..=n {
                        let child = page
                            .child(j)
                            .ok_or_else(|| Error::corrupted(id, format!("missing child {}", j)))?;
                        next.push(Pending {
                            page: child,
                            parent: Some(id),
                            lower: if j == 0 { item.lower } else { Some(keys[j - 1]) },
                            upper: if j == n { item.upper } else { Some(keys[j]) },
                        });
                    }
                    if page.child(n + 1).is_some() {
                        return Err(Error::corrupted(id, "child past the last key"));
                    }
                }

                if saw_leaf && !next.is_empty() {
                    return Err(Error::corrupted(root, "leaves at different depths"));
                }
                level = next;
            }

            let mut chain = Vec::with_capacity(leaf_order.len());
            let mut current = leaf_order.first().copied();
            while let Some(leaf) = current {
                if chain.len() == leaf_order.len() {
                    return Err(Error::corrupted(leaf, "sibling chain longer than leaf level"));
                }
                chain.push(leaf);
                current = self.read(leaf)?.right_sibling();
            }
            if chain != leaf_order {
                return Err(Error::corrupted(root, "sibling chain does not match leaf order"));
            }
        }

        let mut free = HashSet::new();
        let mut current = self.read(PageId::HEADER)?.free_page();
        while let Some(page_id) = current {
            if page_id.is_header() || page_id.0 >= num_pages {
                return Err(Error::corrupted(page_id, "free list points outside the file"));
            }
            if reachable.contains(&page_id) {
                return Err(Error::corrupted(page_id, "page is both in the tree and free"));
            }
            if !free.insert(page_id) {
                return Err(Error::corrupted(page_id, "free list loops"));
            }
            current = self.read(page_id)?.next_free_page();
        }
        stats.free_pages = free.len() as u64;

        let accounted = reachable.len() as u64 + stats.free_pages + 1;
        if accounted != num_pages {
            return Err(Error::corrupted(
                PageId::HEADER,
                format!("{} pages accounted for out of {}", accounted, num_pages),
            ));
        }

        Ok(stats)
    }

    /// Keys of every node, grouped by level from the root down, nodes left to
    /// right.
    pub fn levels(&self) -> Result<Vec<Vec<Vec<i64>>>> {
        let mut levels = Vec::new();
        let Some(root) = self.root()? else {
            return Ok(levels);
        };

        let mut level = vec![root];
        while !level.is_empty() {
            let mut next = Vec::new();
            let mut nodes = Vec::with_capacity(level.len());
            for id in level {
                let page = self.read(id)?;
                let n = page.num_keys();
                nodes.push((0..n).filter_map(|i| page.key(i)).collect());
                if !page.is_leaf() {
                    next.extend((0..=n).filter_map(|j| page.child(j)));
                }
            }
            levels.push(nodes);
            level = next;
        }
        Ok(levels)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_util::setup;
    use super::*;

    #[test]
    fn test_verify_empty_tree() {
        let (bpm, table, _dir) = setup(8);
        let tree = BPlusTree::new(&bpm, table).unwrap();
        assert_eq!(tree.verify().unwrap(), TreeStats::default());
        assert!(tree.levels().unwrap().is_empty());
    }

    #[test]
    fn test_levels_after_split() {
        let (bpm, table, _dir) = setup(8);
        let tree = BPlusTree::new(&bpm, table).unwrap();
        for key in 1..=32 {
            tree.insert(key, &[key]).unwrap();
        }

        let levels = tree.levels().unwrap();
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0], vec![vec![17]]);
        assert_eq!(levels[1][0], (1..=16).collect::<Vec<_>>());
        assert_eq!(levels[1][1], (17..=32).collect::<Vec<_>>());

        let stats = tree.verify().unwrap();
        assert_eq!(stats.height, 2);
        assert_eq!(stats.leaves, 2);
        assert_eq!(stats.internals, 1);
        assert_eq!(stats.records, 32);
        // one batch of ten pages, three in use
        assert_eq!(stats.free_pages, 7);
    }

    #[test]
    fn test_verify_detects_broken_order() {
        let (bpm, table, _dir) = setup(8);
        let tree = BPlusTree::new(&bpm, table).unwrap();
        for key in 1..=3 {
            tree.insert(key, &[key]).unwrap();
        }
        let root = tree.root().unwrap().unwrap();
        bpm.fetch_page_write(table, root).unwrap().set_key(0, 10).unwrap();

        assert!(matches!(tree.verify(), Err(Error::Corrupted { .. })));
    }

    #[test]
    fn test_verify_detects_leaked_page() {
        let (bpm, table, _dir) = setup(8);
        let tree = BPlusTree::new(&bpm, table).unwrap();
        tree.insert(1, &[1]).unwrap();
        bpm.alloc_page(table).unwrap();

        assert!(matches!(tree.verify(), Err(Error::Corrupted { .. })));
    }
}
