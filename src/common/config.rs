//! Configuration constants for bptdb.
//!
//! Every on-disk layout decision lives here so that the page codec, the disk
//! manager and the tree algorithms agree on the same numbers.

/// Size of a page in bytes (4KB).
///
/// The page is the unit of I/O: every read and write moves exactly one page,
/// and every on-disk address is a multiple of this value.
///
/// # Memory Layout
/// With 4KB pages and 64-bit offsets the addressable file size is far beyond
/// anything a single table reaches in practice.
pub const PAGE_SIZE: usize = 4096;

/// Fan-out of a leaf page. A leaf holds at most `LEAF_ORDER - 1` records.
pub const LEAF_ORDER: usize = 32;

/// Fan-out of an internal page. An internal page has at most
/// `INTERNAL_ORDER` children and `INTERNAL_ORDER - 1` keys.
pub const INTERNAL_ORDER: usize = 249;

/// Maximum number of records in a leaf page (31).
pub const MAX_LEAF_RECORDS: usize = LEAF_ORDER - 1;

/// Maximum number of separator keys in an internal page (248).
pub const MAX_INTERNAL_KEYS: usize = INTERNAL_ORDER - 1;

/// Maximum number of columns in a record, key column included.
pub const MAX_COLUMNS: usize = 16;

/// Minimum number of columns in a record: the key and one value.
pub const MIN_COLUMNS: usize = 2;

/// Maximum number of value columns stored next to the key.
pub const MAX_VALUES: usize = MAX_COLUMNS - 1;

/// Size of a record key in bytes.
pub const KEY_SIZE: usize = 8;

/// Size of a record payload in bytes (15 columns of 8 bytes).
pub const VALUE_SIZE: usize = 120;

/// Size of one leaf record slot.
pub const RECORD_SIZE: usize = KEY_SIZE + VALUE_SIZE;

/// Maximum number of tables open at the same time in one process.
pub const MAX_TABLES: usize = 10;

/// Number of pages appended to a table file whenever its free list runs dry.
pub const FREE_PAGE_BATCH: u64 = 10;

/// Smallest buffer pool the tree algorithms can work with.
///
/// A split pins at most three pages at once and allocation pins the header,
/// so four frames always leave room for one more checkout.
pub const MIN_POOL_SIZE: usize = 4;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_is_power_of_two() {
        assert!(PAGE_SIZE.is_power_of_two());
        assert_eq!(PAGE_SIZE, 4096);
    }

    #[test]
    fn test_node_layouts_fill_a_page() {
        // 128-byte node header followed by the entry array.
        assert_eq!(128 + MAX_LEAF_RECORDS * RECORD_SIZE, PAGE_SIZE);
        assert_eq!(128 + MAX_INTERNAL_KEYS * 16, PAGE_SIZE);
    }

    #[test]
    fn test_payload_holds_all_value_columns() {
        assert_eq!(MAX_VALUES * 8, VALUE_SIZE);
        assert_eq!(RECORD_SIZE, 128);
    }
}
