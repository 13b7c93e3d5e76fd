//! Keys: named, valued, metadata-bearing configuration entries
//!
//! A [`Key`] is a reference-counted handle. Cloning it shares the same
//! entry, so a key held by several [`KeySet`]s sees every mutation made
//! through any of them. Callers serialise concurrent mutation themselves;
//! the lock flags only guard against accidental edits.
//!
//! Metadata keys are created fully locked, which lets a duplicated key
//! share them while still owning an independent metadata set.

use crate::core::flags::{KeyFlags, LockFlags, LookupOptions};
use crate::core::keyset::KeySet;
use crate::core::name::{self, Namespace};
use crate::error::{KdbError, Result};
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use tracing::{trace, warn};

/// Metadata marking a value as binary
pub const META_BINARY: &str = "binary";

#[derive(Debug)]
struct KeyData {
    name: String,
    value: Vec<u8>,
    meta: Option<KeySet>,
    flags: KeyFlags,
}

fn check_unlocked(data: &KeyData, facet: LockFlags) -> Result<()> {
    if data.flags.intersects(facet.as_key_flags()) {
        warn!("Refusing to modify {:?} of locked key {}", facet, data.name);
        return Err(KdbError::LockViolation {
            name: data.name.clone(),
            facet,
        });
    }
    Ok(())
}

/// Shared handle to a configuration entry
#[derive(Clone)]
pub struct Key {
    inner: Arc<RwLock<KeyData>>,
}

impl Key {
    fn from_data(name: String, value: Vec<u8>, flags: KeyFlags) -> Self {
        Key {
            inner: Arc::new(RwLock::new(KeyData {
                name,
                value,
                meta: None,
                flags,
            })),
        }
    }

    /// Create a key with an empty value
    ///
    /// # Errors
    ///
    /// Returns `InvalidName` if the name is not a valid key name.
    ///
    /// # Examples
    ///
    /// ```
    /// use keyset_rs::Key;
    ///
    /// let key = Key::new("user//app/setting/").unwrap();
    /// assert_eq!(key.name(), "user/app/setting");
    /// assert!(Key::new("app/setting").is_err());
    /// ```
    pub fn new(name: &str) -> Result<Self> {
        let name = name::canonical_key_name(name)?;
        Ok(Self::from_data(name, Vec::new(), KeyFlags::SYNC))
    }

    /// Start building a key with value, metadata and locks
    pub fn builder(name: &str) -> KeyBuilder {
        KeyBuilder::new(name)
    }

    /// Create a locked metadata key
    pub(crate) fn new_meta(name: &str, value: &str) -> Result<Self> {
        let name = name::canonical_meta_name(name)?;
        Ok(Self::from_data(
            name,
            value.as_bytes().to_vec(),
            KeyFlags::RO_NAME | KeyFlags::RO_VALUE | KeyFlags::RO_META,
        ))
    }

    // ------------------------------------------------------------------
    // Name
    // ------------------------------------------------------------------

    /// Canonical name
    pub fn name(&self) -> String {
        self.inner.read().name.clone()
    }

    /// Borrow the name without copying it
    pub(crate) fn with_name<R>(&self, f: impl FnOnce(&str) -> R) -> R {
        f(&self.inner.read().name)
    }

    /// Name length including a terminating byte
    pub fn name_size(&self) -> usize {
        self.inner.read().name.len() + 1
    }

    /// Last segment of the name
    pub fn base_name(&self) -> String {
        name::base_name_of(&self.inner.read().name).to_string()
    }

    pub fn namespace(&self) -> Namespace {
        name::namespace_of(&self.inner.read().name)
    }

    /// Replace the name
    ///
    /// Returns the new name size. Fails with `LockViolation` if the name is
    /// locked and with `InvalidName` if `new_name` is malformed; the key is
    /// unchanged in both cases.
    pub fn set_name(&self, new_name: &str) -> Result<usize> {
        let mut data = self.inner.write();
        check_unlocked(&data, LockFlags::NAME)?;
        data.name = name::canonical_key_name(new_name)?;
        data.flags |= KeyFlags::SYNC;
        Ok(data.name.len() + 1)
    }

    /// Append relative segments to the name (`..` and `.` are resolved)
    pub fn add_name(&self, suffix: &str) -> Result<usize> {
        let mut data = self.inner.write();
        check_unlocked(&data, LockFlags::NAME)?;
        let joined = format!("{}/{}", data.name, suffix);
        data.name = name::canonical_key_name(&joined)?;
        data.flags |= KeyFlags::SYNC;
        Ok(data.name.len() + 1)
    }

    /// Append one literal segment to the name
    pub fn add_base_name(&self, base: &str) -> Result<usize> {
        name::check_base_name(base)?;
        let mut data = self.inner.write();
        check_unlocked(&data, LockFlags::NAME)?;
        if !data.name.ends_with(name::SEPARATOR) {
            data.name.push(name::SEPARATOR);
        }
        data.name.push_str(base);
        data.flags |= KeyFlags::SYNC;
        Ok(data.name.len() + 1)
    }

    // ------------------------------------------------------------------
    // Value
    // ------------------------------------------------------------------

    /// Copy of the value bytes
    pub fn value(&self) -> Vec<u8> {
        self.inner.read().value.clone()
    }

    /// Value as a string, `None` for binary or non UTF-8 values
    pub fn string(&self) -> Option<String> {
        if self.is_binary() {
            return None;
        }
        String::from_utf8(self.value()).ok()
    }

    pub fn value_size(&self) -> usize {
        self.inner.read().value.len()
    }

    pub fn is_binary(&self) -> bool {
        self.meta(META_BINARY).is_some()
    }

    pub fn is_string(&self) -> bool {
        !self.is_binary()
    }

    /// Replace the value bytes, keeping the binary/string marker
    ///
    /// Returns the new value size, or `LockViolation` if the value is
    /// locked (the value is left untouched).
    pub fn set_value(&self, value: impl Into<Vec<u8>>) -> Result<usize> {
        let mut data = self.inner.write();
        check_unlocked(&data, LockFlags::VALUE)?;
        data.value = value.into();
        data.flags |= KeyFlags::SYNC;
        Ok(data.value.len())
    }

    /// Set a binary value and mark the key as binary
    pub fn set_binary(&self, value: impl Into<Vec<u8>>) -> Result<usize> {
        let size = self.set_value(value)?;
        self.put_meta(META_BINARY, "")?;
        Ok(size)
    }

    /// Set a string value and clear the binary marker
    pub fn set_string(&self, value: &str) -> Result<usize> {
        let size = self.set_value(value.as_bytes())?;
        self.drop_meta(META_BINARY);
        Ok(size)
    }

    /// Render a formatted string into the value
    ///
    /// Clears the binary marker and marks the key dirty. If a `Display`
    /// implementation fails, returns `FormatFailure` and leaves the key
    /// unmodified.
    ///
    /// # Examples
    ///
    /// ```
    /// use keyset_rs::Key;
    ///
    /// let key = Key::new("user/app/port").unwrap();
    /// key.set_string_fmt(format_args!("{}:{}", "localhost", 8080)).unwrap();
    /// assert_eq!(key.string().unwrap(), "localhost:8080");
    /// ```
    pub fn set_string_fmt(&self, args: fmt::Arguments<'_>) -> Result<usize> {
        {
            let data = self.inner.read();
            check_unlocked(&data, LockFlags::VALUE)?;
        }

        let mut rendered = String::new();
        fmt::write(&mut rendered, args).map_err(|_| KdbError::FormatFailure)?;

        let size = self.set_value(rendered.into_bytes())?;
        self.drop_meta(META_BINARY);
        Ok(size)
    }

    // ------------------------------------------------------------------
    // Metadata
    // ------------------------------------------------------------------

    /// Metadata key with the given name
    pub fn meta(&self, meta_name: &str) -> Option<Key> {
        let meta_name = name::canonical_meta_name(meta_name).ok()?;
        let data = self.inner.read();
        data.meta.as_ref()?.get(&meta_name)
    }

    /// Metadata value as a string
    pub fn meta_string(&self, meta_name: &str) -> Option<String> {
        self.meta(meta_name)
            .map(|meta| String::from_utf8_lossy(&meta.value()).into_owned())
    }

    /// Set a metadata entry, replacing an existing one
    pub fn set_meta(&self, meta_name: &str, value: &str) -> Result<()> {
        {
            let data = self.inner.read();
            check_unlocked(&data, LockFlags::META)?;
        }
        self.put_meta(meta_name, value)
    }

    /// Remove a metadata entry
    pub fn remove_meta(&self, meta_name: &str) -> Result<Option<Key>> {
        {
            let data = self.inner.read();
            check_unlocked(&data, LockFlags::META)?;
        }
        Ok(self.drop_meta(meta_name))
    }

    /// Share the metadata entry `meta_name` of `source`
    ///
    /// If `source` has no such entry it is removed from this key as well.
    pub fn copy_meta(&self, source: &Key, meta_name: &str) -> Result<()> {
        let shared = source.meta(meta_name);
        let mut data = self.inner.write();
        check_unlocked(&data, LockFlags::META)?;
        match shared {
            Some(meta) => {
                data.meta
                    .get_or_insert_with(KeySet::new)
                    .append_key(meta);
            }
            None => {
                drop(data);
                self.drop_meta(meta_name);
                return Ok(());
            }
        }
        data.flags |= KeyFlags::SYNC;
        Ok(())
    }

    /// Share every metadata entry of `source`
    pub fn copy_all_meta(&self, source: &Key) -> Result<()> {
        let shared = source.meta_set();
        let mut data = self.inner.write();
        check_unlocked(&data, LockFlags::META)?;
        if let Some(shared) = shared {
            data.meta.get_or_insert_with(KeySet::new).append(&shared);
            data.flags |= KeyFlags::SYNC;
        }
        Ok(())
    }

    /// Names of all metadata entries in order
    pub fn meta_names(&self) -> Vec<String> {
        let data = self.inner.read();
        data.meta
            .as_ref()
            .map(|set| set.iter().map(|meta| meta.name()).collect())
            .unwrap_or_default()
    }

    /// Metadata as an independent set
    ///
    /// Returns `None` if the key carries no metadata. The returned set
    /// belongs to the caller: adding or removing entries never affects
    /// this key.
    pub fn meta_set(&self) -> Option<KeySet> {
        let data = self.inner.read();
        match data.meta.as_ref() {
            Some(set) if !set.is_empty() => Some(set.dup()),
            _ => None,
        }
    }

    fn put_meta(&self, meta_name: &str, value: &str) -> Result<()> {
        let meta = Key::new_meta(meta_name, value)?;
        let mut data = self.inner.write();
        data.meta.get_or_insert_with(KeySet::new).append_key(meta);
        data.flags |= KeyFlags::SYNC;
        Ok(())
    }

    fn drop_meta(&self, meta_name: &str) -> Option<Key> {
        let meta_name = name::canonical_meta_name(meta_name).ok()?;
        let mut data = self.inner.write();
        let removed = data
            .meta
            .as_mut()?
            .lookup_by_name(&meta_name, LookupOptions::POP);
        if data.meta.as_ref().is_some_and(KeySet::is_empty) {
            data.meta = None;
        }
        if removed.is_some() {
            data.flags |= KeyFlags::SYNC;
        }
        removed
    }

    // ------------------------------------------------------------------
    // Flags and locking
    // ------------------------------------------------------------------

    pub fn flags(&self) -> KeyFlags {
        self.inner.read().flags
    }

    /// Whether the key was modified since the last [`Key::clear_sync`]
    pub fn needs_sync(&self) -> bool {
        self.inner.read().flags.contains(KeyFlags::SYNC)
    }

    pub fn clear_sync(&self) {
        self.inner.write().flags.remove(KeyFlags::SYNC);
    }

    /// Whether every facet in `what` is locked; `false` for an empty `what`
    pub fn is_locked(&self, what: LockFlags) -> bool {
        !what.is_empty() && self.inner.read().flags.contains(what.as_key_flags())
    }

    /// Permanently lock parts of the key
    ///
    /// Returns the facets that were newly locked; locking an already locked
    /// facet reports nothing for it. The only way back to an editable key is
    /// [`Key::duplicate`].
    ///
    /// # Examples
    ///
    /// ```
    /// use keyset_rs::{Key, LockFlags};
    ///
    /// let key = Key::new("user/app").unwrap();
    /// assert_eq!(key.lock(LockFlags::VALUE), LockFlags::VALUE);
    /// assert_eq!(key.lock(LockFlags::VALUE | LockFlags::NAME), LockFlags::NAME);
    /// assert!(key.set_string("new").is_err());
    /// ```
    pub fn lock(&self, what: LockFlags) -> LockFlags {
        let mut data = self.inner.write();
        let mut newly = LockFlags::empty();
        for facet in what.iter() {
            let ro = facet.as_key_flags();
            if !data.flags.contains(ro) {
                data.flags |= ro;
                newly |= facet;
            }
        }
        if !newly.is_empty() {
            trace!("Locked {:?} of {}", newly, data.name);
        }
        newly
    }

    // ------------------------------------------------------------------
    // Ownership and comparison
    // ------------------------------------------------------------------

    /// Independent, unlocked copy of name, value and metadata
    pub fn duplicate(&self) -> Key {
        let data = self.inner.read();
        let dup = Key::from_data(data.name.clone(), data.value.clone(), KeyFlags::SYNC);
        dup.inner.write().meta = data.meta.as_ref().map(KeySet::dup);
        dup
    }

    /// Number of live handles to this key
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Whether both handles refer to the same key
    pub fn ptr_eq(&self, other: &Key) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Hierarchical order of the two names
    pub fn cmp_name(&self, other: &Key) -> Ordering {
        if self.ptr_eq(other) {
            return Ordering::Equal;
        }
        let a = self.inner.read();
        let b = other.inner.read();
        name::cmp_names(&a.name, &b.name)
    }

    /// Whether this key lies anywhere below `parent`
    pub fn is_below(&self, parent: &Key) -> bool {
        if self.ptr_eq(parent) {
            return false;
        }
        name::is_below(&parent.inner.read().name, &self.inner.read().name)
    }

    /// Whether this key lies exactly one level below `parent`
    pub fn is_directly_below(&self, parent: &Key) -> bool {
        if self.ptr_eq(parent) {
            return false;
        }
        name::is_directly_below(&parent.inner.read().name, &self.inner.read().name)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.inner.read();
        f.debug_struct("Key")
            .field("name", &data.name)
            .field("value", &String::from_utf8_lossy(&data.value))
            .field("flags", &data.flags)
            .finish()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.read().name)
    }
}

/// Builder for keys with value, metadata and locks
///
/// ```
/// use keyset_rs::{Key, LockFlags};
///
/// let key = Key::builder("user/net/gateway")
///     .string("192.168.1.1")
///     .meta("check/ipaddr", "ipv4")
///     .lock(LockFlags::NAME)
///     .build()
///     .unwrap();
///
/// assert_eq!(key.meta_string("check/ipaddr").unwrap(), "ipv4");
/// assert!(key.is_locked(LockFlags::NAME));
/// ```
#[derive(Debug, Default)]
pub struct KeyBuilder {
    name: String,
    value: Vec<u8>,
    binary: bool,
    meta: Vec<(String, String)>,
    lock: Option<LockFlags>,
}

impl KeyBuilder {
    pub fn new(name: &str) -> Self {
        KeyBuilder {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn string(mut self, value: &str) -> Self {
        self.value = value.as_bytes().to_vec();
        self.binary = false;
        self
    }

    pub fn binary(mut self, value: impl Into<Vec<u8>>) -> Self {
        self.value = value.into();
        self.binary = true;
        self
    }

    pub fn meta(mut self, meta_name: &str, value: &str) -> Self {
        self.meta.push((meta_name.to_string(), value.to_string()));
        self
    }

    pub fn lock(mut self, what: LockFlags) -> Self {
        self.lock = Some(self.lock.unwrap_or(LockFlags::empty()) | what);
        self
    }

    /// Build the key; fails with `InvalidName` on a malformed key or
    /// metadata name
    pub fn build(self) -> Result<Key> {
        let key = Key::new(&self.name)?;
        key.set_value(self.value)?;
        if self.binary {
            key.put_meta(META_BINARY, "")?;
        }
        for (meta_name, value) in &self.meta {
            key.put_meta(meta_name, value)?;
        }
        if let Some(what) = self.lock {
            key.lock(what);
        }
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_read_back() {
        let key = Key::builder("user/app/setting")
            .string("hello")
            .build()
            .unwrap();
        assert_eq!(key.name(), "user/app/setting");
        assert_eq!(key.string().unwrap(), "hello");
        assert_eq!(key.value_size(), 5);
        assert_eq!(key.name_size(), "user/app/setting".len() + 1);
        assert_eq!(key.base_name(), "setting");
        assert_eq!(key.namespace(), Namespace::User);
        assert!(key.needs_sync());
    }

    #[test]
    fn test_invalid_name() {
        assert!(matches!(Key::new(""), Err(KdbError::InvalidName(_))));
        assert!(matches!(
            Key::builder("bogus/x").build(),
            Err(KdbError::InvalidName(_))
        ));
    }

    #[test]
    fn test_value_lock() {
        let key = Key::builder("user/a").string("before").build().unwrap();
        assert_eq!(key.lock(LockFlags::VALUE), LockFlags::VALUE);
        assert!(matches!(
            key.set_string("after"),
            Err(KdbError::LockViolation { .. })
        ));
        assert!(key.set_binary(vec![1, 2]).is_err());
        assert!(key.set_string_fmt(format_args!("{}", 3)).is_err());
        assert_eq!(key.string().unwrap(), "before");
    }

    #[test]
    fn test_lock_idempotent() {
        let key = Key::new("user/a").unwrap();
        let all = LockFlags::NAME | LockFlags::VALUE | LockFlags::META;
        assert_eq!(key.lock(all), all);
        assert_eq!(key.lock(all), LockFlags::empty());
        assert_eq!(key.lock(LockFlags::NAME), LockFlags::empty());
    }

    #[test]
    fn test_is_locked_needs_every_facet() {
        let key = Key::new("user/a").unwrap();
        assert!(!key.is_locked(LockFlags::empty()));

        key.lock(LockFlags::VALUE);
        assert!(key.is_locked(LockFlags::VALUE));
        assert!(!key.is_locked(LockFlags::VALUE | LockFlags::NAME));
        assert!(!key.is_locked(LockFlags::empty()));

        key.lock(LockFlags::all());
        assert!(key.is_locked(LockFlags::all()));
        assert!(!key.is_locked(LockFlags::empty()));
    }

    #[test]
    fn test_name_and_meta_lock() {
        let key = Key::new("user/a").unwrap();
        key.lock(LockFlags::NAME | LockFlags::META);
        assert!(key.set_name("user/b").is_err());
        assert!(key.add_name("c").is_err());
        assert!(key.set_meta("comment", "x").is_err());
        assert_eq!(key.name(), "user/a");
        assert!(key.meta("comment").is_none());
    }

    #[test]
    fn test_add_name() {
        let key = Key::new("user/a").unwrap();
        key.add_name("/b/c").unwrap();
        assert_eq!(key.name(), "user/a/b/c");
        key.add_name("../d").unwrap();
        assert_eq!(key.name(), "user/a/b/d");
        key.add_base_name("e").unwrap();
        assert_eq!(key.name(), "user/a/b/d/e");
        assert!(key.add_base_name("x/y").is_err());
    }

    #[test]
    fn test_duplicate_is_independent_and_unlocked() {
        let key = Key::builder("user/a")
            .string("v")
            .meta("comment", "c")
            .lock(LockFlags::NAME | LockFlags::VALUE | LockFlags::META)
            .build()
            .unwrap();

        let dup = key.duplicate();
        assert!(!dup.ptr_eq(&key));
        assert!(!dup.is_locked(LockFlags::VALUE));

        dup.set_string("changed").unwrap();
        dup.set_name("user/b").unwrap();
        dup.set_meta("comment", "other").unwrap();
        dup.set_meta("extra", "1").unwrap();

        assert_eq!(key.name(), "user/a");
        assert_eq!(key.string().unwrap(), "v");
        assert_eq!(key.meta_string("comment").unwrap(), "c");
        assert!(key.meta("extra").is_none());
    }

    #[test]
    fn test_formatted_value_clears_binary() {
        let key = Key::builder("user/a").binary(vec![0, 1]).build().unwrap();
        assert!(key.is_binary());
        let size = key
            .set_string_fmt(format_args!("{}-{}", "x", 42))
            .unwrap();
        assert_eq!(size, 4);
        assert!(!key.is_binary());
        assert_eq!(key.string().unwrap(), "x-42");
    }

    #[test]
    fn test_formatted_value_failure_keeps_key() {
        struct Broken;
        impl fmt::Display for Broken {
            fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
                Err(fmt::Error)
            }
        }

        let key = Key::builder("user/a").binary(vec![7]).build().unwrap();
        let result = key.set_string_fmt(format_args!("{}", Broken));
        assert!(matches!(result, Err(KdbError::FormatFailure)));
        assert_eq!(key.value(), vec![7]);
        assert!(key.is_binary());
    }

    #[test]
    fn test_meta_set_is_a_copy() {
        let key = Key::new("user/a").unwrap();
        assert!(key.meta_set().is_none());

        key.set_meta("check/ipaddr", "ipv4").unwrap();
        key.set_meta("comment", "hi").unwrap();

        let mut meta = key.meta_set().unwrap();
        assert_eq!(meta.len(), 2);
        meta.pop();
        meta.pop();
        assert!(meta.is_empty());
        assert_eq!(key.meta_names(), vec!["check/ipaddr", "comment"]);
    }

    #[test]
    fn test_remove_last_meta_drops_set() {
        let key = Key::new("user/a").unwrap();
        key.set_meta("comment", "x").unwrap();
        assert!(key.remove_meta("comment").unwrap().is_some());
        assert!(key.meta_set().is_none());
    }

    #[test]
    fn test_copy_meta() {
        let source = Key::builder("user/s").meta("check/ipaddr", "").build().unwrap();
        let dest = Key::builder("user/d").meta("comment", "x").build().unwrap();

        dest.copy_meta(&source, "check/ipaddr").unwrap();
        assert!(dest.meta("check/ipaddr").unwrap().ptr_eq(&source.meta("check/ipaddr").unwrap()));

        dest.copy_meta(&source, "comment").unwrap();
        assert!(dest.meta("comment").is_none());

        let all = Key::new("user/all").unwrap();
        all.copy_all_meta(&dest).unwrap();
        assert_eq!(all.meta_names(), vec!["check/ipaddr"]);
    }

    #[test]
    fn test_ref_count_tracks_handles() {
        let key = Key::new("user/a").unwrap();
        assert_eq!(key.ref_count(), 1);
        let other = key.clone();
        assert_eq!(key.ref_count(), 2);
        other.set_string("shared").unwrap();
        assert_eq!(key.string().unwrap(), "shared");
        drop(other);
        assert_eq!(key.ref_count(), 1);
    }

    #[test]
    fn test_hierarchy() {
        let parent = Key::new("user/a").unwrap();
        let child = Key::new("user/a/b").unwrap();
        let grandchild = Key::new("user/a/b/c").unwrap();
        assert!(child.is_below(&parent));
        assert!(child.is_directly_below(&parent));
        assert!(grandchild.is_below(&parent));
        assert!(!grandchild.is_directly_below(&parent));
        assert_eq!(parent.cmp_name(&child), Ordering::Less);
    }

    #[test]
    fn test_clear_sync() {
        let key = Key::new("user/a").unwrap();
        key.clear_sync();
        assert!(!key.needs_sync());
        key.set_string("x").unwrap();
        assert!(key.needs_sync());
    }
}
