//! # Stored Value
//!
//! A `MapEntry`'s value cell holds either a real, opaque payload or one of
//! the engine-reserved sentinel tokens (spec §3). Modeling the sentinels as
//! enum variants instead of out-of-band flags means every read site has to
//! explicitly decide what each sentinel means for it — the compiler will not
//! let a plain `Value` accidentally leak past a `Tombstone` check.

/// The value cell of a `MapEntry`.
#[derive(Debug, Clone)]
pub enum StoredValue<V> {
    /// A real, caller-supplied payload.
    Value(V),
    /// The entry was invalidated; readers must treat it as absent but it
    /// still orders future writes via its version stamp.
    Invalid,
    /// The entry is about to be removed from its segment on the next write
    /// under lock.
    Destroyed,
    /// The real value was written to disk by LRU overflow; reachable via
    /// the entry's persistence-info handle.
    Overflowed,
    /// A destroy placeholder kept so out-of-order re-creates are ordered
    /// against it. Logically absent to readers.
    Tombstone,
}

impl<V> StoredValue<V> {
    /// True for anything a caller-facing `get` should report as "not found".
    #[inline]
    pub fn is_absent_to_readers(&self) -> bool {
        matches!(
            self,
            StoredValue::Invalid | StoredValue::Destroyed | StoredValue::Tombstone
        )
    }

    #[inline]
    pub fn is_tombstone(&self) -> bool {
        matches!(self, StoredValue::Tombstone)
    }

    #[inline]
    pub fn is_destroyed(&self) -> bool {
        matches!(self, StoredValue::Destroyed)
    }

    #[inline]
    pub fn is_overflowed(&self) -> bool {
        matches!(self, StoredValue::Overflowed)
    }

    #[inline]
    pub fn is_plain(&self) -> bool {
        matches!(self, StoredValue::Value(_))
    }

    #[inline]
    pub fn as_plain(&self) -> Option<&V> {
        match self {
            StoredValue::Value(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    pub fn into_plain(self) -> Option<V> {
        match self {
            StoredValue::Value(v) => Some(v),
            _ => None,
        }
    }
}
