//! Storage layer - disk I/O and page formats.
//!
//! This module handles persistent storage:
//! - [`DiskManager`] - Table files, page I/O and the free-page list
//! - [`page`] - The page codec: header, free and node layouts, records

mod disk_manager;
pub mod page;

pub use disk_manager::DiskManager;
