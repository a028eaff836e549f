//! Minimal stand-ins for the external collaborators in [`super::remote`],
//! used by this crate's own scenario tests so `LocalRegion` can be exercised
//! without a real wire protocol or disk (spec §6: "a test double NoopRemoteOp
//! / InMemoryPersistenceManager are provided ... for use by the
//! orchestrator's own test suite").

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use region_cache_common::{RegionResult, RemoteStatus};

use crate::version::VersionTag;

use super::remote::{
    PersistenceInfo, PersistenceManager, PersistenceProperties, RemoteOp, RemoteOpKind,
    RemoteOpOutcome,
};

/// A `RemoteOp` that never leaves the process: every call is a no-op
/// success with no version tag, so `LocalRegion` behaves as if every
/// mutation applied locally-only. Useful for exercising the orchestrator's
/// pipeline (writer/listener dispatch, tracker bracketing) in isolation from
/// any real server.
#[derive(Debug, Default)]
pub struct NoopRemoteOp;

impl<K, V> RemoteOp<K, V> for NoopRemoteOp {
    fn execute(
        &self,
        _kind: RemoteOpKind,
        _key: &K,
        _value: Option<&V>,
        _timeout: Duration,
    ) -> Result<RemoteOpOutcome<V>, RemoteStatus> {
        Ok(RemoteOpOutcome {
            return_value: None,
            version_tag: None,
        })
    }

    fn get_full_object(&self, _key: &K) -> Result<(V, VersionTag), RemoteStatus> {
        Err(RemoteStatus::Other("no full object available".to_string()))
    }
}

/// A `RemoteOp` whose every call fails with a fixed status, for exercising
/// error-propagation paths (writer veto is independent of this — this is
/// purely for the remote-failure branches of spec §7).
pub struct FailingRemoteOp(pub RemoteStatus);

impl<K, V> RemoteOp<K, V> for FailingRemoteOp {
    fn execute(
        &self,
        _kind: RemoteOpKind,
        _key: &K,
        _value: Option<&V>,
        _timeout: Duration,
    ) -> Result<RemoteOpOutcome<V>, RemoteStatus> {
        Err(self.0.clone())
    }

    fn get_full_object(&self, _key: &K) -> Result<(V, VersionTag), RemoteStatus> {
        Err(self.0.clone())
    }
}

/// In-memory stand-in for LRU overflow-to-disk, backed by a `HashMap` behind
/// a mutex instead of a real file or block device.
pub struct InMemoryPersistenceManager<K, V> {
    store: Mutex<HashMap<u64, V>>,
    next_handle: AtomicU64,
    inits: AtomicU32,
    _marker: std::marker::PhantomData<K>,
}

impl<K, V> Default for InMemoryPersistenceManager<K, V> {
    fn default() -> Self {
        InMemoryPersistenceManager {
            store: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
            inits: AtomicU32::new(0),
            _marker: std::marker::PhantomData,
        }
    }
}

impl<K, V> InMemoryPersistenceManager<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> usize {
        self.store.lock().unwrap().len()
    }

    pub fn init_count(&self) -> u32 {
        self.inits.load(Ordering::Relaxed)
    }
}

impl<K, V> PersistenceManager<K, V> for InMemoryPersistenceManager<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    fn init(&self, _properties: &PersistenceProperties) -> RegionResult<()> {
        self.inits.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn read(&self, _key: &K, info: PersistenceInfo) -> RegionResult<V> {
        self.store
            .lock()
            .unwrap()
            .get(&info.0)
            .cloned()
            .ok_or_else(|| region_cache_common::RegionError::state("no value at persistence handle"))
    }

    fn write(&self, _key: &K, value: &V) -> RegionResult<PersistenceInfo> {
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
        self.store.lock().unwrap().insert(handle, value.clone());
        Ok(PersistenceInfo(handle))
    }

    fn destroy(&self, _key: &K, info: PersistenceInfo) -> RegionResult<()> {
        self.store.lock().unwrap().remove(&info.0);
        Ok(())
    }

    fn close(&self) -> RegionResult<()> {
        self.store.lock().unwrap().clear();
        Ok(())
    }
}
