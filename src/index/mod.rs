//! Index structures.
//!
//! - [`btree`] - Disk-resident B+ tree, one per table file

pub mod btree;

pub use btree::{BPlusTree, TreeStats};
