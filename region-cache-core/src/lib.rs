//! # region-cache-core
//!
//! The client-side region entry engine: a sharded concurrent entries map
//! with per-shard locking and version stamps, a pluggable `MapEntry`
//! composing optional LRU/expiration/version state onto a key/value cell,
//! an expiry task manager multiplexing large numbers of timers onto a
//! shared event loop, and the version-stamp conflict algorithm that decides
//! whether a local write is applied or rejected.
//!
//! Everything outside this engine — the wire protocol, connection pooling,
//! serialization, query execution, and transaction coordination — is
//! modeled as an external collaborator behind the traits in
//! [`region::remote`] and [`region::callbacks`].

pub mod attributes;
pub mod delta;
pub mod entry;
pub mod eviction_controller;
pub mod expiry;
pub mod lru;
pub mod map;
pub mod primes;
pub mod region;
pub mod segment;
pub mod storage;
pub mod tracker;
pub mod value;
pub mod version;

pub use attributes::{
    ExpirationAction, ExpirationPolicy, LruEvictionAction, RegionAttributes,
    RegionAttributesBuilder, RegionAttributesMutator,
};
pub use delta::Delta;
pub use entry::{EntryFactory, EntryState};
pub use eviction_controller::{EvictableRegion, EvictionController};
pub use expiry::{
    EntryExpiryTask, ExpiryTask, ExpiryTaskManager, PdxUnreadDataExpiryTask, RegionExpiryTask,
    TombstoneExpiryTask,
};
pub use lru::LruEntriesMap;
pub use map::ConcurrentEntriesMap;
pub use region::LocalRegion;
pub use segment::{MapSegment, PutOutcome, TombstoneEntry, TombstoneList};
pub use storage::EntryStorage;
pub use tracker::Tracker;
pub use value::StoredValue;
pub use version::{process_version_tag, ConflictOutcome, MemberListForVersionStamp, VersionStamp, VersionTag};
