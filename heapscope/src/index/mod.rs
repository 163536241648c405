//! Shared address indexes
//!
//! The two lookup structures every capture and annotation path leans on:
//! - Module ranges, registered once per image load
//! - Live chunks, updated on every committed heap operation

pub mod chunks;
pub mod modules;

// Re-export common types
pub use chunks::ChunkRegistry;
pub use modules::{ModuleIndex, ModuleRecord};
