//! Extension operations built only from [`Key`] and [`KeySet`] primitives
//!
//! These keep the nullable calling convention of the store's extension
//! API: an absent key or set is reported as `NullArgument` (or `None`)
//! without side effects.

use crate::core::flags::{LockFlags, LookupOptions};
use crate::core::key::Key;
use crate::core::keyset::{Cursor, KeySet};
use crate::core::name;
use crate::error::{KdbError, Result};
use std::fmt;
use tracing::{debug, warn};

/// Render a formatted string into the value of `key`
///
/// See [`Key::set_string_fmt`].
pub fn key_set_string_f(key: Option<&Key>, args: fmt::Arguments<'_>) -> Result<usize> {
    key.ok_or(KdbError::NullArgument("key"))?
        .set_string_fmt(args)
}

/// Fill `buffer` with the keys of `ks` in order
///
/// The keys are shared, not copied. The cursor of `ks` is preserved.
///
/// # Errors
///
/// `NullArgument` if `ks` or `buffer` is absent, `BufferTooSmall` if the
/// buffer cannot hold every key.
pub fn ks_to_array(ks: Option<&mut KeySet>, buffer: Option<&mut [Option<Key>]>) -> Result<usize> {
    let ks = ks.ok_or(KdbError::NullArgument("keyset"))?;
    let buffer = buffer.ok_or(KdbError::NullArgument("buffer"))?;
    ks.copy_to(buffer)
}

/// Permanently lock facets of `key`; see [`Key::lock`]
pub fn key_lock(key: Option<&Key>, what: LockFlags) -> Result<LockFlags> {
    Ok(key.ok_or(KdbError::NullArgument("key"))?.lock(what))
}

/// Metadata of `key` as an independent set; see [`Key::meta_set`]
pub fn key_meta_key_set(key: Option<&Key>) -> Option<KeySet> {
    key?.meta_set()
}

/// Step the cursor of `ks` back; see [`KeySet::prev`]
pub fn ks_prev(ks: Option<&mut KeySet>) -> Option<Key> {
    ks?.prev()
}

/// Pop the key at `position`; see [`KeySet::pop_at`]
pub fn ks_pop_at_cursor(ks: Option<&mut KeySet>, position: Cursor) -> Option<Key> {
    ks?.pop_at(position)
}

/// Cut the first key's name off every other key and prepend `name`
///
/// The first key in iteration order is the root: it is removed and
/// released. Every remaining key is duplicated, renamed to `name` followed
/// by the part of its old name beyond the root's length, and stored in the
/// returned set. `config` is left empty.
///
/// An empty `config` or a malformed `name` yields an empty set; for a
/// malformed `name` `config` is left untouched.
///
/// # Examples
///
/// ```
/// use keyset_rs::{keyset, rename_keys, Key};
///
/// let mut config = keyset![
///     Key::new("system/elektra/mountpoints/app/config").unwrap(),
///     Key::new("system/elektra/mountpoints/app/config/path").unwrap(),
///     Key::new("system/elektra/mountpoints/app/config/mode/fast").unwrap(),
/// ];
///
/// let renamed = rename_keys(&mut config, "user");
/// let names: Vec<String> = renamed.iter().map(Key::name).collect();
/// assert_eq!(names, ["user/mode/fast", "user/path"]);
/// assert!(config.is_empty());
/// ```
pub fn rename_keys(config: &mut KeySet, name: &str) -> KeySet {
    if let Err(err) = name::canonical_key_name(name) {
        warn!("Not renaming keys: {}", err);
        return KeySet::new();
    }

    config.rewind();
    let root = config.next();
    let root_size = root.as_ref().map(Key::name_size);

    if let Some(root) = root {
        config.lookup(&root, LookupOptions::POP);
    }

    let mut renamed = KeySet::with_capacity(config.len());
    let Some(root_size) = root_size else {
        return renamed;
    };
    let root_len = root_size - 1;

    while let Some(cur) = config.pop() {
        let Some(suffix) = cur.with_name(|n| n.get(root_len..).map(str::to_string)) else {
            warn!("Dropping {}: name does not split at the root length", cur);
            continue;
        };

        let dup = cur.duplicate();
        if let Err(err) = dup.set_name(name).and_then(|_| dup.add_name(&suffix)) {
            warn!("Dropping {}: {}", cur, err);
            continue;
        }
        renamed.append_key(dup);
    }

    debug!("Renamed {} keys below {}", renamed.len(), name);
    renamed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> Key {
        Key::new(name).unwrap()
    }

    #[test]
    fn test_null_arguments() {
        let mut empty: [Option<Key>; 0] = [];
        assert!(matches!(
            ks_to_array(None, Some(&mut empty[..])),
            Err(KdbError::NullArgument("keyset"))
        ));
        let mut ks = KeySet::new();
        assert!(matches!(
            ks_to_array(Some(&mut ks), None),
            Err(KdbError::NullArgument("buffer"))
        ));
        assert!(matches!(
            key_lock(None, LockFlags::NAME),
            Err(KdbError::NullArgument("key"))
        ));
        assert!(key_set_string_f(None, format_args!("x")).is_err());
        assert!(key_meta_key_set(None).is_none());
        assert!(ks_prev(None).is_none());
        assert!(ks_pop_at_cursor(None, 0).is_none());
    }

    #[test]
    fn test_ks_to_array() {
        let mut ks = KeySet::from_keys(["user/a", "user/b"].map(key));
        ks.set_cursor(0);
        let mut buffer = vec![None, None, Some(key("user/stale"))];
        assert_eq!(ks_to_array(Some(&mut ks), Some(&mut buffer[..])).unwrap(), 2);
        assert!(buffer[2].is_none());
        assert_eq!(ks.next().unwrap().name(), "user/b");
    }

    #[test]
    fn test_key_lock_reports_new_bits() {
        let k = key("user/a");
        assert_eq!(key_lock(Some(&k), LockFlags::VALUE).unwrap(), LockFlags::VALUE);
        assert_eq!(key_lock(Some(&k), LockFlags::VALUE).unwrap(), LockFlags::empty());
    }

    #[test]
    fn test_rename_keys() {
        let mut config = KeySet::from_keys(
            [
                "system/mount/config",
                "system/mount/config/a",
                "system/mount/config/b/c",
            ]
            .map(key),
        );
        let renamed = rename_keys(&mut config, "user/plugin");
        let names: Vec<String> = renamed.iter().map(Key::name).collect();
        assert_eq!(names, ["user/plugin/a", "user/plugin/b/c"]);
        assert!(config.is_empty());
    }

    #[test]
    fn test_rename_keeps_values_and_metadata() {
        let mut config = KeySet::new();
        config.append_key(key("user/root"));
        config.append_key(
            Key::builder("user/root/ip")
                .string("10.0.0.1")
                .meta("check/ipaddr", "ipv4")
                .build()
                .unwrap(),
        );
        let renamed = rename_keys(&mut config, "/cascading");
        let ip = renamed.get("/cascading/ip").unwrap();
        assert_eq!(ip.string().unwrap(), "10.0.0.1");
        assert_eq!(ip.meta_string("check/ipaddr").unwrap(), "ipv4");
    }

    #[test]
    fn test_rename_empty_set() {
        let mut config = KeySet::new();
        assert!(rename_keys(&mut config, "user").is_empty());
    }

    #[test]
    fn test_rename_invalid_prefix_leaves_input() {
        let mut config = KeySet::from_keys(["user/a", "user/a/b"].map(key));
        assert!(rename_keys(&mut config, "nowhere").is_empty());
        assert_eq!(config.len(), 2);
    }

    #[test]
    fn test_rename_only_root() {
        let mut config = KeySet::from_keys([key("user/a")]);
        assert!(rename_keys(&mut config, "user/b").is_empty());
        assert!(config.is_empty());
    }
}
