//! # Event Flags
//!
//! Bitfield describing why an entry operation is happening, so the
//! orchestrator's writer/listener dispatch and conflict handling can tell a
//! normal API call apart from a notification replay, an eviction, or a
//! region close.

/// Disjunction of event origins for a single entry operation.
///
/// Stored as a plain `u16` bitfield rather than pulling in a `bitflags`
/// dependency — the flag set is small and fixed, and the engine only ever
/// needs membership tests and unions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventFlags(pub u16);

impl EventFlags {
    pub const NORMAL: u16 = 0b0000_0000_0001;
    pub const LOCAL: u16 = 0b0000_0000_0010;
    pub const NOTIFICATION: u16 = 0b0000_0000_0100;
    pub const NOTIFICATION_UPDATE: u16 = 0b0000_0000_1000;
    pub const EVICTION: u16 = 0b0000_0001_0000;
    pub const EXPIRATION: u16 = 0b0000_0010_0000;
    pub const CACHE_CLOSE: u16 = 0b0000_0100_0000;
    pub const NO_CACHE_WRITER: u16 = 0b0000_1000_0000;

    /// An empty flag set.
    #[inline]
    pub const fn none() -> Self {
        EventFlags(0)
    }

    /// Flags for a plain, user-initiated API call.
    #[inline]
    pub const fn normal() -> Self {
        EventFlags(Self::NORMAL)
    }

    #[inline]
    pub const fn contains(&self, flag: u16) -> bool {
        (self.0 & flag) != 0
    }

    #[inline]
    pub fn set(&mut self, flag: u16) {
        self.0 |= flag;
    }

    #[inline]
    pub fn clear(&mut self, flag: u16) {
        self.0 &= !flag;
    }

    #[inline]
    pub const fn union(self, other: EventFlags) -> EventFlags {
        EventFlags(self.0 | other.0)
    }

    /// True when the event is a local-only mutation that must not trigger a
    /// remote call (spec §4.9 pipeline rule ii).
    #[inline]
    pub const fn is_local_only(&self) -> bool {
        self.contains(Self::LOCAL) || self.contains(Self::NOTIFICATION)
    }

    /// True when writer vetoes must not be honored for this event (cache
    /// close, notification replay, eviction, expiration — spec §7).
    #[inline]
    pub const fn writer_veto_exempt(&self) -> bool {
        self.contains(Self::CACHE_CLOSE)
            || self.contains(Self::NOTIFICATION)
            || self.contains(Self::NOTIFICATION_UPDATE)
            || self.contains(Self::EVICTION)
            || self.contains(Self::EXPIRATION)
            || self.contains(Self::NO_CACHE_WRITER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_is_not_veto_exempt() {
        assert!(!EventFlags::normal().writer_veto_exempt());
    }

    #[test]
    fn eviction_is_veto_exempt() {
        let flags = EventFlags(EventFlags::EVICTION);
        assert!(flags.writer_veto_exempt());
    }

    #[test]
    fn union_combines_bits() {
        let flags = EventFlags(EventFlags::NORMAL).union(EventFlags(EventFlags::EXPIRATION));
        assert!(flags.contains(EventFlags::NORMAL));
        assert!(flags.contains(EventFlags::EXPIRATION));
    }
}
