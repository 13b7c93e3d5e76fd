//! Flag sets for keys and lookups

bitflags::bitflags! {
    /// State carried by every key.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct KeyFlags: u8 {
        /// Name may no longer change.
        const RO_NAME = 0b0000_0001;
        /// Value may no longer change.
        const RO_VALUE = 0b0000_0010;
        /// Metadata may no longer change.
        const RO_META = 0b0000_0100;
        /// Key was modified since the last sync.
        const SYNC = 0b0000_1000;
    }
}

bitflags::bitflags! {
    /// Facets of a key that can be locked with [`Key::lock`](crate::Key::lock).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LockFlags: u8 {
        const NAME = 0b0001;
        const VALUE = 0b0010;
        const META = 0b0100;
    }
}

bitflags::bitflags! {
    /// Options for [`KeySet::lookup`](crate::KeySet::lookup).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LookupOptions: u8 {
        /// Remove the found key from the set and hand it to the caller.
        const POP = 0b0001;
        /// Match the first key whose name starts with the given name.
        const PREFIX = 0b0010;
    }
}

impl Default for KeyFlags {
    fn default() -> Self {
        Self::empty()
    }
}

impl Default for LookupOptions {
    fn default() -> Self {
        Self::empty()
    }
}

impl LockFlags {
    /// The read-only key flag guarding this facet set.
    pub(crate) fn as_key_flags(self) -> KeyFlags {
        let mut flags = KeyFlags::empty();
        if self.contains(LockFlags::NAME) {
            flags |= KeyFlags::RO_NAME;
        }
        if self.contains(LockFlags::VALUE) {
            flags |= KeyFlags::RO_VALUE;
        }
        if self.contains(LockFlags::META) {
            flags |= KeyFlags::RO_META;
        }
        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_maps_to_read_only_flags() {
        assert_eq!(LockFlags::NAME.as_key_flags(), KeyFlags::RO_NAME);
        assert_eq!(
            (LockFlags::VALUE | LockFlags::META).as_key_flags(),
            KeyFlags::RO_VALUE | KeyFlags::RO_META
        );
        assert_eq!(LockFlags::empty().as_key_flags(), KeyFlags::empty());
    }
}
