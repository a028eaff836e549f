//! # External Collaborator Interfaces
//!
//! Spec §6: the wire protocol, pool/connection management, endpoint
//! failover, and serialization are external collaborators. This module
//! defines only the interfaces the orchestrator calls through — every
//! remote operation is modeled as a single opaque call that may succeed,
//! fail, or return a version tag.

use std::hash::Hash;
use std::time::Duration;

use region_cache_common::{RegionResult, RemoteStatus};

use crate::version::VersionTag;

/// Which region operation a `RemoteOp` call represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOpKind {
    Create,
    Put,
    Invalidate,
    Destroy,
    Remove,
}

/// Outcome of a successful `RemoteOp` call.
#[derive(Debug, Clone)]
pub struct RemoteOpOutcome<V> {
    pub return_value: Option<V>,
    pub version_tag: Option<VersionTag>,
}

/// A single opaque call to the distributed servers. The core engine never
/// inspects how this is implemented — only the three outcomes spec §6
/// describes: success with an optional value/tag, a remote status, or a
/// bounded timeout.
pub trait RemoteOp<K, V>: Send + Sync {
    /// Issues one region operation against the servers.
    ///
    /// `timeout` is caller-supplied and must already be validated against
    /// the engine's min/max bound (spec §5) before this is called.
    fn execute(
        &self,
        kind: RemoteOpKind,
        key: &K,
        value: Option<&V>,
        timeout: Duration,
    ) -> Result<RemoteOpOutcome<V>, RemoteStatus>;

    /// Fetches the full object for a key, used on invalid-delta recovery.
    fn get_full_object(&self, key: &K) -> Result<(V, VersionTag), RemoteStatus>;
}

/// Opaque, engine-owned handle identifying where an overflowed value lives
/// on disk. The engine never interprets its contents — only passes it back
/// to the same `PersistenceManager` that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PersistenceInfo(pub u64);

/// Opaque configuration blob handed to `PersistenceManager::init`.
#[derive(Debug, Clone, Default)]
pub struct PersistenceProperties(pub Vec<(String, String)>);

/// LRU overflow-to-disk collaborator (spec §6).
pub trait PersistenceManager<K, V>: Send + Sync {
    fn init(&self, properties: &PersistenceProperties) -> RegionResult<()>;
    fn read(&self, key: &K, info: PersistenceInfo) -> RegionResult<V>;
    fn write(&self, key: &K, value: &V) -> RegionResult<PersistenceInfo>;
    fn destroy(&self, key: &K, info: PersistenceInfo) -> RegionResult<()>;
    fn close(&self) -> RegionResult<()>;
}

/// Consumed only to stamp remote operations with a routing key; not core
/// conflict-resolution logic (spec §6).
pub trait PartitionResolver<K>: Send + Sync {
    fn routing_object(&self, key: &K) -> u64;
}

/// A member descriptor need only be hashable and totally ordered — the
/// engine never interprets its fields beyond `hash` and `cmp` (spec §6).
pub trait MemberDescriptor: Hash + Eq + Ord + Clone + Send + Sync + std::fmt::Debug {}

impl<T> MemberDescriptor for T where T: Hash + Eq + Ord + Clone + Send + Sync + std::fmt::Debug {}
