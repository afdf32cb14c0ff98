//! Page types and layout.
//!
//! This module contains:
//! - [`Page`] - The raw 4KB data container
//! - [`Record`] - A leaf entry (key plus 15 value columns)
//!
//! A table file is an array of pages. Page 0 is the header; every other page
//! is either a free-list entry or a B+ tree node. The layout accessors for
//! each kind are implemented directly on [`Page`].

mod free;
mod header;
mod node;
#[allow(clippy::module_inception)]
mod page;
mod record;

pub use page::Page;
pub use record::Record;
