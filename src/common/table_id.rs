//! Table identifier type.

use std::fmt;

use super::config::MAX_TABLES;

/// Identifies an open table.
///
/// Table ids are small positive integers handed out by the disk manager,
/// `1..=MAX_TABLES`, and reused once a table is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(pub u32);

impl TableId {
    /// Create a new TableId.
    #[inline]
    pub fn new(id: u32) -> Self {
        TableId(id)
    }

    /// Build the id that owns slot `index` of a table array.
    #[inline]
    pub(crate) fn from_slot(index: usize) -> Self {
        TableId(index as u32 + 1)
    }

    /// Slot index in a `MAX_TABLES`-sized array, or `None` if out of range.
    #[inline]
    pub(crate) fn slot(&self) -> Option<usize> {
        let id = self.0 as usize;
        if (1..=MAX_TABLES).contains(&id) {
            Some(id - 1)
        } else {
            None
        }
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Table({})", self.0)
    }
}
