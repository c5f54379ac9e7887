//! Cache Module
//!
//! - Spillover: memory-first cache that moves to disk past its capacity
//! - File store: one framed file per entry in a fixed directory

pub mod codec;
pub mod file_store;
pub mod key;
pub mod spillover;

pub use file_store::FileStore;
pub use spillover::SpilloverCache;
