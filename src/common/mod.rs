//! Common types and utilities shared across bptdb.
//!
//! This module contains fundamental primitives used throughout the codebase:
//! - Configuration constants
//! - Error types
//! - Identifiers (PageId, PageKey, TableId, FrameId)

pub mod config;
pub mod error;
mod frame_id;
mod page_id;
mod table_id;

pub use error::{Error, Result};
pub use frame_id::FrameId;
pub use page_id::{PageId, PageKey};
pub use table_id::TableId;
