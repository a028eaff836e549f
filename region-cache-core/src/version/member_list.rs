//! # Member List Interning
//!
//! `VersionStamp` stores a 16-bit member id instead of a full member
//! descriptor to keep entries small. This table is the process-wide
//! interning authority: ids are assigned monotonically on first sight and
//! never reused, which is also what makes raw id comparison a valid,
//! deterministic tiebreak in the conflict algorithm (spec §4.5 step 6).

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::region::remote::MemberDescriptor;

struct MemberListInner<M> {
    by_member: HashMap<M, u16>,
    by_id: Vec<M>,
}

/// Interns [`MemberDescriptor`]s to stable 16-bit ids.
///
/// Reads (version-tag processing, comparing ids) take the shared side of
/// the lock and proceed in parallel; only registering a brand-new member
/// takes the exclusive side, and only briefly (spec §5).
pub struct MemberListForVersionStamp<M> {
    inner: RwLock<MemberListInner<M>>,
}

impl<M: MemberDescriptor> Default for MemberListForVersionStamp<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: MemberDescriptor> MemberListForVersionStamp<M> {
    pub fn new() -> Self {
        MemberListForVersionStamp {
            inner: RwLock::new(MemberListInner {
                by_member: HashMap::new(),
                by_id: Vec::new(),
            }),
        }
    }

    /// Interns `member`, returning its stable id. Idempotent: repeated adds
    /// of the same logical member return the same id even under concurrent
    /// calls racing to register it for the first time.
    pub fn add(&self, member: M) -> u16 {
        if let Some(&id) = self.inner.read().by_member.get(&member) {
            return id;
        }

        let mut inner = self.inner.write();
        if let Some(&id) = inner.by_member.get(&member) {
            return id;
        }

        let id = (inner.by_id.len() + 1) as u16;
        inner.by_id.push(member.clone());
        inner.by_member.insert(member, id);
        id
    }

    /// Resolves an id back to its member descriptor, if known.
    pub fn get(&self, id: u16) -> Option<M> {
        if id == 0 {
            return None;
        }
        self.inner.read().by_id.get((id - 1) as usize).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_add_returns_same_id() {
        let list: MemberListForVersionStamp<u32> = MemberListForVersionStamp::new();
        let a = list.add(42);
        let b = list.add(42);
        assert_eq!(a, b);
    }

    #[test]
    fn ids_assigned_monotonically() {
        let list: MemberListForVersionStamp<u32> = MemberListForVersionStamp::new();
        let a = list.add(1);
        let b = list.add(2);
        let c = list.add(3);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn get_resolves_back_to_member() {
        let list: MemberListForVersionStamp<u32> = MemberListForVersionStamp::new();
        let id = list.add(99);
        assert_eq!(list.get(id), Some(99));
        assert_eq!(list.get(0), None);
    }
}
