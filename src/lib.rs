//! # keyset-rs - Hierarchical Configuration Key Sets
//!
//! `keyset-rs` stores configuration as named, typed, metadata-bearing
//! [`Key`]s collected in ordered [`KeySet`]s:
//!
//! - **Hierarchical names** (`user/app/setting`) kept in tree order
//! - **Shared keys**: one key can live in many sets at once
//! - **Cursor iteration** forwards and backwards, plus a cursor-free iterator
//! - **Locks** on name, value and metadata of individual keys
//! - **Validation** through `check/<kind>` metadata on commit
//!
//! ## Quick Start
//!
//! ```rust
//! use keyset_rs::{keyset, Key, KeySet, LookupOptions, Result};
//!
//! # fn main() -> Result<()> {
//! let mut ks = keyset![
//!     Key::builder("user/app/port").string("8080").build()?,
//!     Key::builder("user/app/host").string("localhost").build()?,
//! ];
//!
//! // Lookup moves the cursor to the found key
//! let port = ks.lookup_by_name("user/app/port", LookupOptions::empty()).unwrap();
//! assert_eq!(port.string().unwrap(), "8080");
//!
//! // Walk backwards from there
//! assert_eq!(ks.prev().unwrap().name(), "user/app/host");
//! assert!(ks.prev().is_none());
//! # Ok(())
//! # }
//! ```
//!
//! ## Renaming a subtree
//!
//! ```rust
//! use keyset_rs::{keyset, rename_keys, Key, Result};
//!
//! # fn main() -> Result<()> {
//! let mut mounted = keyset![
//!     Key::new("system/mountpoints/app/config")?,
//!     Key::builder("system/mountpoints/app/config/mode").string("fast").build()?,
//! ];
//!
//! let config = rename_keys(&mut mounted, "user");
//! assert_eq!(config.head().unwrap().name(), "user/mode");
//! # Ok(())
//! # }
//! ```
//!
//! ## Validation
//!
//! ```rust
//! use keyset_rs::{keyset, CommitStatus, Key, Result, StoreConfig, ValidatorRegistry};
//!
//! # fn main() -> Result<()> {
//! let mut registry = ValidatorRegistry::from_config(&StoreConfig::default())?;
//! let parent = Key::new("user/net")?;
//! let ks = keyset![Key::builder("user/net/gateway")
//!     .string("192.168.1.1")
//!     .meta("check/ipaddr", "ipv4")
//!     .build()?];
//!
//! assert_eq!(registry.commit(&ks, &parent), CommitStatus::Success);
//! # Ok(())
//! # }
//! ```

pub mod core;

#[allow(unused_imports)]
pub(crate) use self::core::{config, error, flags, key, keyset, name, plugin, proposal};

pub use crate::core::{
    config::StoreConfig,
    error::{KdbError, Result},
    flags::{KeyFlags, LockFlags, LookupOptions},
    key::{Key, KeyBuilder, META_BINARY},
    keyset::{Cursor, Iter, KeySet},
    name::Namespace,
    plugin::{
        CommitStatus, IpAddrValidator, IpVersion, Validator, ValidatorRegistry, Verdict,
        CHECK_PREFIX,
    },
    proposal::{
        key_lock, key_meta_key_set, key_set_string_f, ks_pop_at_cursor, ks_prev, ks_to_array,
        rename_keys,
    },
};

/// Build a [`KeySet`] from a list of keys
///
/// Later keys replace earlier ones with the same name. The cursor of the
/// resulting set is rewound.
///
/// ```
/// use keyset_rs::{keyset, Key};
///
/// let ks = keyset![Key::new("user/a").unwrap(), Key::new("user/b").unwrap()];
/// assert_eq!(ks.len(), 2);
/// assert_eq!(ks.cursor(), -1);
/// ```
#[macro_export]
macro_rules! keyset {
    () => {
        $crate::KeySet::new()
    };
    ($($key:expr),+ $(,)?) => {{
        let mut ks = $crate::KeySet::new();
        $( ks.append_key($key); )+
        ks.rewind();
        ks
    }};
}
