//! Range scans over the leaf chain.

use super::BPlusTree;
use crate::common::{Error, PageId, Result};

impl BPlusTree<'_> {
    /// All records with `start <= key <= end`, in key order.
    ///
    /// The bounds are swapped if `start > end`.
    pub fn find_range(&self, start: i64, end: i64) -> Result<Vec<(i64, Vec<i64>)>> {
        let (lo, hi) = if start <= end { (start, end) } else { (end, start) };
        let mut out = Vec::new();

        let mut current = self.find_leaf(lo)?;
        while let Some(leaf) = current {
            let page = self.read(leaf)?;
            for record in page.records() {
                if record.key > hi {
                    return Ok(out);
                }
                if record.key >= lo {
                    out.push((record.key, record.values(self.num_values).to_vec()));
                }
            }
            current = page.right_sibling();
        }
        Ok(out)
    }

    /// First leaf of the sibling chain.
    pub fn leftmost_leaf(&self) -> Result<Option<PageId>> {
        let Some(mut current) = self.root()? else {
            return Ok(None);
        };
        loop {
            let page = self.read(current)?;
            if page.is_leaf() {
                return Ok(Some(current));
            }
            current = page
                .child(0)
                .ok_or_else(|| Error::corrupted(current, "missing child pointer"))?;
        }
    }
}
