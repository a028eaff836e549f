//! Eviction action execution (spec §4.4).
//!
//! The four actions selected by a region's attributes. Eviction is not a
//! versioned write — these methods bypass the conflict-resolution
//! algorithm entirely and mutate the segment directly, the same way the
//! source's `LRUAction` subclasses act on a raw `MapEntryImpl*`.

pub use crate::attributes::LruEvictionAction;
