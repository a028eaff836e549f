//! # Version Stamps and Conflict Resolution
//!
//! The compact stored form (`VersionStamp`) and inbound/outbound wire form
//! (`VersionTag`) of a `(memberId, entryVersion, regionVersion)` tuple, plus
//! the conflict algorithm that orders concurrent writes to the same key
//! (spec §4.5).

/// Inbound/outbound version descriptor. Produced by the `RemoteOp`
/// collaborator or a notification; consumed by `process_version_tag`.
///
/// Bit widths in spec §3 (24-bit entry-version, 48-bit region-version,
/// 16-bit member id in the *stored* `VersionStamp`) describe the wire-compact
/// packing; this port keeps full-width integers throughout, since spec §9
/// explicitly leaves bit-packing as a free implementation choice ("the
/// bit-packing is free to differ").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VersionTag {
    pub entry_version: u32,
    pub region_version: u64,
    /// Already-interned id of the member that produced this tag.
    pub member_id: u16,
    /// Already-interned id of the member whose stamp this tag must chain
    /// from, when `delta_check` is requested.
    pub previous_member_id: u16,
    pub timestamp: u64,
    pub flags: u8,
}

impl VersionTag {
    pub fn is_zero(&self) -> bool {
        self.entry_version == 0 && self.region_version == 0
    }
}

/// The compact, stored form of a version tag, held on every `MapEntry` when
/// concurrency-checks are enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VersionStamp {
    pub entry_version: u32,
    pub region_version: u64,
    pub member_id: u16,
}

impl VersionStamp {
    pub fn is_zero(&self) -> bool {
        self.entry_version == 0 && self.region_version == 0
    }

    fn from_tag(tag: &VersionTag) -> VersionStamp {
        VersionStamp {
            entry_version: tag.entry_version,
            region_version: tag.region_version,
            member_id: tag.member_id,
        }
    }
}

/// Result of running the conflict algorithm against an incoming tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictOutcome {
    /// The tag wins; caller should install the returned stamp and apply the
    /// mutation.
    Accept(VersionStamp),
    /// A higher-versioned write already applied; the mutation must not be
    /// applied and the stamp/value must not change.
    Reject,
    /// `delta_check` was requested and the tag does not chain from the
    /// current stamp.
    InvalidDelta,
}

/// Normalizes a 32-bit entry-version pair against wraparound: if the two
/// values differ by more than `0x10000` when compared naively, the smaller
/// raw value is assumed to have wrapped and is biased by `2^32` before
/// comparison (spec §4.5 step 2).
fn normalize_wraparound(stamp_ev: u32, tag_ev: u32) -> (u64, u64) {
    let diff = (tag_ev as i64 - stamp_ev as i64).unsigned_abs();
    if diff > 0x10000 {
        if stamp_ev < tag_ev {
            (stamp_ev as u64 + (1u64 << 32), tag_ev as u64)
        } else {
            (stamp_ev as u64, tag_ev as u64 + (1u64 << 32))
        }
    } else {
        (stamp_ev as u64, tag_ev as u64)
    }
}

/// Runs the conflict-resolution algorithm of spec §4.5 against `stamp` and
/// an incoming `tag`. Must be called under the owning segment's lock, before
/// any in-memory mutation.
pub fn process_version_tag(
    stamp: VersionStamp,
    tag: &VersionTag,
    delta_check: bool,
) -> ConflictOutcome {
    // Step 1: no prior history on either side.
    if stamp.is_zero() && tag.is_zero() {
        return ConflictOutcome::Accept(VersionStamp::from_tag(tag));
    }

    // Step 2: wraparound-safe comparison basis for the remaining steps.
    let (stamp_ev, tag_ev) = normalize_wraparound(stamp.entry_version, tag.entry_version);

    // Step 3: delta chaining requirement.
    if delta_check
        && (tag.entry_version != stamp.entry_version.wrapping_add(1)
            || tag.previous_member_id != stamp.member_id)
    {
        return ConflictOutcome::InvalidDelta;
    }

    // Step 4: no prior version, or tag strictly newer.
    if stamp.entry_version == 0 || stamp_ev < tag_ev {
        return ConflictOutcome::Accept(VersionStamp::from_tag(tag));
    }

    // Step 5: stamp strictly newer than the incoming tag.
    if stamp_ev > tag_ev {
        return ConflictOutcome::Reject;
    }

    // Step 6: equal entry-version — tiebreak on the interned member id's
    // deterministic (monotonic, never-reused) ordering.
    if stamp.member_id < tag.member_id {
        ConflictOutcome::Accept(VersionStamp::from_tag(tag))
    } else if stamp.member_id > tag.member_id {
        ConflictOutcome::Reject
    } else {
        // Equal version, equal member: local echo of our own write.
        ConflictOutcome::Accept(VersionStamp::from_tag(tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(entry_version: u32, region_version: u64, member_id: u16) -> VersionTag {
        VersionTag {
            entry_version,
            region_version,
            member_id,
            previous_member_id: 0,
            timestamp: 0,
            flags: 0,
        }
    }

    #[test]
    fn both_zero_accepts() {
        let stamp = VersionStamp::default();
        let outcome = process_version_tag(stamp, &tag(0, 0, 0), false);
        assert_eq!(outcome, ConflictOutcome::Accept(VersionStamp::default()));
    }

    #[test]
    fn scenario_b_version_conflict_is_rejected() {
        // Stamp: (entryVer=3, regionVer=5, memberId=7). Incoming: (2, 4, 7).
        let stamp = VersionStamp {
            entry_version: 3,
            region_version: 5,
            member_id: 7,
        };
        let outcome = process_version_tag(stamp, &tag(2, 4, 7), false);
        assert_eq!(outcome, ConflictOutcome::Reject);
    }

    #[test]
    fn newer_entry_version_is_accepted() {
        let stamp = VersionStamp {
            entry_version: 3,
            region_version: 5,
            member_id: 7,
        };
        let outcome = process_version_tag(stamp, &tag(4, 6, 7), false);
        assert_eq!(
            outcome,
            ConflictOutcome::Accept(VersionStamp {
                entry_version: 4,
                region_version: 6,
                member_id: 7,
            })
        );
    }

    #[test]
    fn equal_version_smaller_member_id_wins() {
        let stamp = VersionStamp {
            entry_version: 5,
            region_version: 1,
            member_id: 10,
        };
        // Incoming tag from a lower member id should be accepted.
        let outcome = process_version_tag(stamp, &tag(5, 1, 3), false);
        assert_eq!(
            outcome,
            ConflictOutcome::Accept(VersionStamp {
                entry_version: 5,
                region_version: 1,
                member_id: 3,
            })
        );
    }

    #[test]
    fn equal_version_larger_member_id_rejected() {
        let stamp = VersionStamp {
            entry_version: 5,
            region_version: 1,
            member_id: 3,
        };
        let outcome = process_version_tag(stamp, &tag(5, 1, 10), false);
        assert_eq!(outcome, ConflictOutcome::Reject);
    }

    #[test]
    fn self_echo_is_accepted() {
        let stamp = VersionStamp {
            entry_version: 5,
            region_version: 1,
            member_id: 3,
        };
        let outcome = process_version_tag(stamp, &tag(5, 1, 3), false);
        assert_eq!(outcome, ConflictOutcome::Accept(stamp));
    }

    #[test]
    fn scenario_c_delta_not_plus_one_is_invalid() {
        let stamp = VersionStamp {
            entry_version: 10,
            region_version: 1,
            member_id: 1,
        };
        // Incoming delta tag entryVer=10 (not stamp + 1).
        let outcome = process_version_tag(stamp, &tag(10, 1, 1), true);
        assert_eq!(outcome, ConflictOutcome::InvalidDelta);
    }

    #[test]
    fn delta_chain_accepted_when_plus_one_and_member_matches() {
        let stamp = VersionStamp {
            entry_version: 10,
            region_version: 1,
            member_id: 1,
        };
        let mut next = tag(11, 1, 1);
        next.previous_member_id = 1;
        let outcome = process_version_tag(stamp, &next, true);
        assert_eq!(
            outcome,
            ConflictOutcome::Accept(VersionStamp {
                entry_version: 11,
                region_version: 1,
                member_id: 1,
            })
        );
    }

    #[test]
    fn wraparound_low_value_treated_as_newer() {
        let stamp = VersionStamp {
            entry_version: 0xFFFF_FFF0,
            region_version: 1,
            member_id: 1,
        };
        // tag wrapped around past u32::MAX back to 5.
        let outcome = process_version_tag(stamp, &tag(5, 2, 1), false);
        assert_eq!(
            outcome,
            ConflictOutcome::Accept(VersionStamp {
                entry_version: 5,
                region_version: 2,
                member_id: 1,
            })
        );
    }
}
