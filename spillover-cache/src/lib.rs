pub mod cache;
pub mod config;
pub mod core;

// Re-export commonly used types
pub use crate::cache::{FileStore, SpilloverCache};
pub use crate::config::SpilloverConfig;
pub use crate::core::{CacheConfig, CacheError, CacheStats, Entry, Result, Tier};
