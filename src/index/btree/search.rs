//! Point lookups.

use super::BPlusTree;
use crate::common::{Error, PageId, Result};
use crate::storage::page::Record;

impl BPlusTree<'_> {
    /// Leaf whose key range covers `key`, or `None` for an empty tree.
    ///
    /// Internal nodes route with a boundary search: the largest separator
    /// `<= key` selects the child to its right, and a key below every
    /// separator goes to the leftmost child.
    pub fn find_leaf(&self, key: i64) -> Result<Option<PageId>> {
        let Some(mut current) = self.root()? else {
            return Ok(None);
        };

        loop {
            let page = self.read(current)?;
            if page.is_leaf() {
                return Ok(Some(current));
            }
            let next = match page.range_search(key) {
                None => page.child(0),
                Some(i) => page.child(i + 1),
            };
            current = next.ok_or_else(|| Error::corrupted(current, "missing child pointer"))?;
        }
    }

    /// Exact-match lookup of a record.
    pub fn find_record(&self, key: i64) -> Result<Option<Record>> {
        let Some(leaf) = self.find_leaf(key)? else {
            return Ok(None);
        };
        let page = self.read(leaf)?;
        Ok(page.search(key).and_then(|i| page.record(i)))
    }

    /// Value columns of the record with `key`.
    pub fn find(&self, key: i64) -> Result<Option<Vec<i64>>> {
        Ok(self
            .find_record(key)?
            .map(|record| record.values(self.num_values).to_vec()))
    }
}
