//! bptdb - an embedded, disk-resident B+ tree storage engine.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            bptdb                                │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                Table API (database.rs)                   │   │
//! │  │   open_table / insert / find / erase / close_table       │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Index Layer (index/btree/)                  │   │
//! │  │   search · insert + split · delete + delayed merge       │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                Buffer Pool (buffer/)                     │   │
//! │  │   BufferPoolManager + Frame + LRU ring + page guards     │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │               Storage Layer (storage/)                   │   │
//! │  │   DiskManager (table files, free list) + page codec      │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, TableId, FrameId, Error, config)
//! - [`storage`] - Table files and page layouts
//! - [`buffer`] - Buffer pool management and eviction
//! - [`index`] - The B+ tree
//! - [`database`] - The multi-table façade
//!
//! # Quick Start
//! ```no_run
//! use bptdb::Database;
//!
//! let db = Database::init(64).unwrap();
//! let table = db.open_table("my_table.db", 2).unwrap();
//!
//! db.insert(table, 7, &[49]).unwrap();
//! let rows = db.find_range(table, 0, 10).unwrap();
//! assert_eq!(rows, vec![(7, vec![49])]);
//! ```

pub mod buffer;
pub mod common;
pub mod database;
pub mod index;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::PAGE_SIZE;
pub use common::{Error, FrameId, PageId, PageKey, Result, TableId};

pub use buffer::{BufferPoolManager, BufferPoolStats, Frame, StatsSnapshot};
pub use database::Database;
pub use index::{BPlusTree, TreeStats};
pub use storage::page::{Page, Record};
pub use storage::DiskManager;
