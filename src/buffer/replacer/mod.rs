//! Eviction policy implementations (replacers).
//!
//! - [`LruReplacer`] - recency ring scanned from the least recently used end

mod lru;

pub use lru::LruReplacer;
