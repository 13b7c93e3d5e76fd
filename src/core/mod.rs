//! Core data structures of the key/value store
//!
//! - [`key`] - Reference-counted keys with value, metadata and locks
//! - [`keyset`] - Ordered key sets with an internal cursor
//! - [`proposal`] - Extension operations (array export, prefix rename, ...)
//! - [`plugin`] - Validators run on commit (`check/<kind>` metadata)
//! - [`config`] - TOML store configuration
//! - [`name`] - Key name canonicalisation and ordering
//! - [`flags`] - Key, lock and lookup flag sets
//! - [`error`] - Error type shared by all of the above

pub mod config;
pub mod error;
pub mod flags;
pub mod key;
pub mod keyset;
pub mod name;
pub mod plugin;
pub mod proposal;
