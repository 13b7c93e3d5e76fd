//! KeySet: ordered, name-unique collection of keys with an internal cursor
//!
//! Keys are kept in hierarchical name order (see
//! [`cmp_names`](crate::core::name::cmp_names)), so a key always sorts
//! directly before everything below it. Storage is a compact array: every
//! removal closes the gap it leaves.
//!
//! ## Cursor
//!
//! The cursor is state of the set, not of a traversal. Nested loops over
//! the same set through [`KeySet::next`] clobber each other; save and
//! restore it with [`KeySet::cursor`] / [`KeySet::set_cursor`], or use
//! [`KeySet::iter`], which never touches the cursor.
//!
//! ```
//! use keyset_rs::{keyset, Key, KeySet};
//!
//! let mut ks = keyset![
//!     Key::new("user/app/b").unwrap(),
//!     Key::new("user/app").unwrap(),
//!     Key::new("user/app/a").unwrap(),
//! ];
//!
//! ks.rewind();
//! let mut names = Vec::new();
//! while let Some(key) = ks.next() {
//!     names.push(key.name());
//! }
//! assert_eq!(names, ["user/app", "user/app/a", "user/app/b"]);
//! ```

use crate::core::flags::{LockFlags, LookupOptions};
use crate::core::key::Key;
use crate::core::name;
use crate::error::{KdbError, Result};
use std::fmt;
use tracing::{debug, trace};

/// Cursor position; `-1` means rewound (before the first key)
pub type Cursor = isize;

/// Allocation below which the array is never shrunk
pub const MIN_ALLOC: usize = 16;

/// Ordered set of keys
#[derive(Clone)]
pub struct KeySet {
    keys: Vec<Key>,
    cursor: Option<usize>,
}

impl Default for KeySet {
    fn default() -> Self {
        Self::new()
    }
}

impl KeySet {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Empty set with room for `capacity` keys
    pub fn with_capacity(capacity: usize) -> Self {
        KeySet {
            keys: Vec::with_capacity(capacity),
            cursor: None,
        }
    }

    /// Build a set from keys; later keys replace earlier ones of the same name
    pub fn from_keys(keys: impl IntoIterator<Item = Key>) -> Self {
        let mut ks = KeySet::new();
        ks.extend(keys);
        ks.rewind();
        ks
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Number of keys the set can hold before reallocating
    pub fn capacity(&self) -> usize {
        self.keys.capacity()
    }

    /// Position of `target`, or where it would be inserted
    fn search(&self, target: &str) -> std::result::Result<usize, usize> {
        self.keys
            .binary_search_by(|key| key.with_name(|name| name::cmp_names(name, target)))
    }

    fn shrink_if_sparse(&mut self) {
        let capacity = self.keys.capacity();
        if capacity > MIN_ALLOC && self.keys.len() < capacity / 4 {
            self.keys.shrink_to((capacity / 2).max(MIN_ALLOC));
            trace!(
                "Shrunk keyset allocation from {} to {}",
                capacity,
                self.keys.capacity()
            );
        }
    }

    // ------------------------------------------------------------------
    // Insertion and removal
    // ------------------------------------------------------------------

    /// Insert a key, replacing a stored key of the same name
    ///
    /// The set shares ownership of the key and locks its name, so a
    /// stored key cannot be renamed out of order. The cursor moves to the
    /// inserted key. Returns the new size.
    pub fn append_key(&mut self, key: Key) -> usize {
        key.lock(LockFlags::NAME);
        let target = key.name();

        match self.search(&target) {
            Ok(pos) => {
                if !self.keys[pos].ptr_eq(&key) {
                    debug!("Replacing key {}", target);
                    self.keys[pos] = key;
                }
                self.cursor = Some(pos);
            }
            Err(pos) => {
                trace!("Inserting key {} at {}", target, pos);
                self.keys.insert(pos, key);
                self.cursor = Some(pos);
            }
        }

        self.keys.len()
    }

    /// Insert every key of `other`; returns the new size
    pub fn append(&mut self, other: &KeySet) -> usize {
        for key in other.iter() {
            self.append_key(key.clone());
        }
        self.keys.len()
    }

    /// Remove and return the last key; rewinds the cursor
    pub fn pop(&mut self) -> Option<Key> {
        let key = self.keys.pop()?;
        self.rewind();
        self.shrink_if_sparse();
        trace!("Popped key {}", key);
        Some(key)
    }

    /// Remove and return the key at `position`
    ///
    /// Later keys shift down one slot, keeping their relative order. The
    /// cursor is rewound; save it with [`KeySet::cursor`] beforehand to
    /// continue a traversal. Returns `None` for a negative or out of bounds
    /// position, leaving the set untouched.
    ///
    /// ```
    /// use keyset_rs::{keyset, Key};
    ///
    /// let mut ks = keyset![
    ///     Key::new("user/a").unwrap(),
    ///     Key::new("user/b").unwrap(),
    ///     Key::new("user/c").unwrap(),
    /// ];
    /// assert_eq!(ks.pop_at(1).unwrap().name(), "user/b");
    /// assert!(ks.pop_at(5).is_none());
    /// assert_eq!(ks.len(), 2);
    /// ```
    pub fn pop_at(&mut self, position: Cursor) -> Option<Key> {
        if position < 0 {
            return None;
        }
        let c = position as usize;
        if c >= self.keys.len() {
            return None;
        }

        // move the popped slot to the end, then a plain pop takes it
        if c != self.keys.len() - 1 {
            self.keys[c..].rotate_left(1);
        }

        self.rewind();
        self.pop()
    }

    /// Remove `point` and every key below it, returning them as a new set
    ///
    /// A cursor inside the cut range moves to the key before it.
    pub fn cut(&mut self, point: &Key) -> KeySet {
        let root = point.name();
        let start = match self.search(&root) {
            Ok(pos) | Err(pos) => pos,
        };
        let end = start
            + self.keys[start..]
                .iter()
                .take_while(|key| {
                    key.with_name(|n| n == root.as_str() || name::is_below(&root, n))
                })
                .count();

        let removed = end - start;
        let cut: Vec<Key> = self.keys.drain(start..end).collect();

        self.cursor = match self.cursor {
            Some(c) if c >= end => Some(c - removed),
            Some(c) if c >= start => start.checked_sub(1),
            other => other,
        };
        self.shrink_if_sparse();

        debug!("Cut {} keys below {}", removed, root);
        KeySet {
            keys: cut,
            cursor: None,
        }
    }

    /// Release every key
    pub fn clear(&mut self) {
        self.keys.clear();
        self.rewind();
        self.shrink_if_sparse();
    }

    // ------------------------------------------------------------------
    // Cursor
    // ------------------------------------------------------------------

    /// Reset the cursor to before the first key
    pub fn rewind(&mut self) {
        self.cursor = None;
    }

    /// Advance the cursor and return the key under it
    ///
    /// Past the last key the cursor is rewound and `None` is returned.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<Key> {
        let next = self.cursor.map_or(0, |c| c + 1);
        if next >= self.keys.len() {
            self.rewind();
            return None;
        }
        self.cursor = Some(next);
        Some(self.keys[next].clone())
    }

    /// Move the cursor back and return the key under it
    ///
    /// Returns `None` for an empty set. At or before the first key the
    /// cursor is rewound and `None` is returned.
    pub fn prev(&mut self) -> Option<Key> {
        if self.keys.is_empty() {
            return None;
        }
        match self.cursor {
            Some(c) if c > 0 => {
                self.cursor = Some(c - 1);
                Some(self.keys[c - 1].clone())
            }
            _ => {
                self.rewind();
                None
            }
        }
    }

    /// Key under the cursor
    pub fn current(&self) -> Option<Key> {
        self.cursor.and_then(|c| self.keys.get(c)).cloned()
    }

    /// First key; the cursor does not move
    pub fn head(&self) -> Option<Key> {
        self.keys.first().cloned()
    }

    /// Last key; the cursor does not move
    pub fn tail(&self) -> Option<Key> {
        self.keys.last().cloned()
    }

    /// Current cursor, `-1` when rewound
    pub fn cursor(&self) -> Cursor {
        self.cursor.map_or(-1, |c| c as Cursor)
    }

    /// Move the cursor to `cursor`
    ///
    /// Returns `false` and rewinds for a negative or out of bounds position.
    pub fn set_cursor(&mut self, cursor: Cursor) -> bool {
        if cursor < 0 || cursor as usize >= self.keys.len() {
            self.rewind();
            return false;
        }
        self.cursor = Some(cursor as usize);
        true
    }

    /// Key at `position` without moving the cursor
    pub fn at(&self, position: Cursor) -> Option<Key> {
        if position < 0 {
            return None;
        }
        self.keys.get(position as usize).cloned()
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    /// Look up a key by the name of `key`
    pub fn lookup(&mut self, key: &Key, options: LookupOptions) -> Option<Key> {
        let target = key.name();
        self.lookup_by_name(&target, options)
    }

    /// Look up a key by name
    ///
    /// Exact name match by default; with [`LookupOptions::PREFIX`] the first
    /// key whose name starts with `target` matches. The cursor moves to the
    /// found key, except with [`LookupOptions::POP`], which removes the key
    /// and rewinds like [`KeySet::pop_at`].
    pub fn lookup_by_name(&mut self, target: &str, options: LookupOptions) -> Option<Key> {
        let found = if options.contains(LookupOptions::PREFIX) {
            self.prefix_position(target)
        } else {
            self.search(target).ok()
        }?;

        if options.contains(LookupOptions::POP) {
            debug!("Popping {} via lookup", target);
            return self.pop_at(found as Cursor);
        }

        self.cursor = Some(found);
        Some(self.keys[found].clone())
    }

    fn prefix_position(&self, prefix: &str) -> Option<usize> {
        // cascading names sort below "", so an empty prefix scans from the start
        let start = if prefix.is_empty() {
            0
        } else {
            match self.search(prefix) {
                Ok(pos) | Err(pos) => pos,
            }
        };
        self.keys[start..]
            .iter()
            .position(|key| key.with_name(|n| n.starts_with(prefix)))
            .map(|offset| start + offset)
    }

    /// Exact lookup that leaves the cursor alone
    pub fn get(&self, target: &str) -> Option<Key> {
        self.search(target).ok().map(|pos| self.keys[pos].clone())
    }

    pub fn contains(&self, target: &str) -> bool {
        self.search(target).is_ok()
    }

    // ------------------------------------------------------------------
    // Copies and snapshots
    // ------------------------------------------------------------------

    /// New set sharing the same keys (the keys are not copied)
    pub fn dup(&self) -> KeySet {
        self.clone()
    }

    /// New set holding a duplicate of every key
    pub fn deep_dup(&self) -> KeySet {
        let keys: Vec<Key> = self.keys.iter().map(Key::duplicate).collect();
        for key in &keys {
            key.lock(LockFlags::NAME);
        }
        KeySet {
            keys,
            cursor: self.cursor,
        }
    }

    /// Iterate in order without touching the cursor
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            inner: self.keys.iter(),
        }
    }

    /// Snapshot of the key handles in order
    ///
    /// The keys are shared, not copied: mutating one is visible through the
    /// set as well.
    pub fn to_array(&self) -> Vec<Key> {
        self.keys.clone()
    }

    /// Fill `buffer` with the keys in order, returning how many were written
    ///
    /// Slots past the set size are cleared. The cursor is saved and
    /// restored around the traversal.
    ///
    /// # Errors
    ///
    /// `BufferTooSmall` if `buffer` has fewer slots than the set has keys.
    pub fn copy_to(&mut self, buffer: &mut [Option<Key>]) -> Result<usize> {
        if buffer.len() < self.keys.len() {
            return Err(KdbError::BufferTooSmall {
                needed: self.keys.len(),
                available: buffer.len(),
            });
        }
        buffer.iter_mut().for_each(|slot| *slot = None);

        let saved = self.cursor();
        self.rewind();
        let mut idx = 0;
        while let Some(key) = self.next() {
            buffer[idx] = Some(key);
            idx += 1;
        }
        self.set_cursor(saved);

        Ok(idx)
    }
}

impl fmt::Debug for KeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySet")
            .field("keys", &self.keys.iter().map(Key::name).collect::<Vec<_>>())
            .field("cursor", &self.cursor())
            .finish()
    }
}

impl Extend<Key> for KeySet {
    fn extend<I: IntoIterator<Item = Key>>(&mut self, iter: I) {
        for key in iter {
            self.append_key(key);
        }
    }
}

impl FromIterator<Key> for KeySet {
    fn from_iter<I: IntoIterator<Item = Key>>(iter: I) -> Self {
        KeySet::from_keys(iter)
    }
}

/// Cursor-independent iterator over a [`KeySet`]
#[derive(Clone)]
pub struct Iter<'a> {
    inner: std::slice::Iter<'a, Key>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Key;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl DoubleEndedIterator for Iter<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back()
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl<'a> IntoIterator for &'a KeySet {
    type Item = &'a Key;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl IntoIterator for KeySet {
    type Item = Key;
    type IntoIter = std::vec::IntoIter<Key>;

    fn into_iter(self) -> Self::IntoIter {
        self.keys.into_iter()
    }
}
