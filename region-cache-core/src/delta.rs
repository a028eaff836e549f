//! # Delta Application
//!
//! Spec §4.2.2: a `put` may carry a delta instead of a full value. The
//! engine never knows how to decode a delta payload itself — that lives in
//! the serialization layer outside this crate — so this trait is the seam
//! a caller's delta-aware value type implements.

/// Applies an opaque delta to an existing value in place.
///
/// Implementors return `Err(())` when the delta does not apply cleanly
/// (e.g. a sequence-number mismatch baked into the delta encoding); the
/// caller turns that into `RegionError::InvalidDelta` and falls back to a
/// full-object fetch.
pub trait Delta<V> {
    fn apply(&self, target: &mut V) -> Result<(), ()>;
}
