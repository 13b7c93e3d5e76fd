//! Store configuration
//!
//! `StoreConfig` is read from TOML and controls how key sets are allocated,
//! which validators run on commit and how they are configured:
//!
//! ```toml
//! initial_capacity = 32
//! stop_on_first_rejection = true
//! verdict_cache_capacity = 1024
//! validators = ["ipaddr"]
//!
//! [plugin]
//! "ipaddr/default" = "ipv4"
//! ```
//!
//! Validators receive the `plugin` table as a key set: it is mounted below
//! [`StoreConfig::MOUNT_ROOT`] and then renamed into the `user` namespace
//! with [`rename_keys`], so `"ipaddr/default"` arrives as
//! `user/ipaddr/default`.

use crate::core::key::Key;
use crate::core::keyset::KeySet;
use crate::core::name;
use crate::core::proposal::rename_keys;
use crate::error::{KdbError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Configuration of key sets and the validator registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Allocation hint for new key sets
    pub initial_capacity: usize,

    /// Abort a commit at the first rejected key
    pub stop_on_first_rejection: bool,

    /// Entries in the verdict cache; 0 disables caching
    pub verdict_cache_capacity: usize,

    /// Validator kinds to enable (matched against `check/<kind>` metadata)
    pub validators: Vec<String>,

    /// Settings handed to validators, relative names to values
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub plugin: BTreeMap<String, String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            initial_capacity: crate::core::keyset::MIN_ALLOC,
            stop_on_first_rejection: true,
            verdict_cache_capacity: 1024,
            validators: vec!["ipaddr".to_string()],
            plugin: BTreeMap::new(),
        }
    }
}

impl StoreConfig {
    /// Mount point below which the plugin table is projected
    pub const MOUNT_ROOT: &'static str = "system/elektra/mountpoints/default/config";

    /// Parse and validate a TOML document
    ///
    /// # Examples
    ///
    /// ```
    /// use keyset_rs::StoreConfig;
    ///
    /// let config = StoreConfig::from_toml_str("initial_capacity = 4").unwrap();
    /// assert_eq!(config.initial_capacity, 4);
    /// assert!(config.stop_on_first_rejection);
    /// ```
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: StoreConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading store configuration from {:?}", path);
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }

    /// Check validator kinds and plugin setting names
    pub fn validate(&self) -> Result<()> {
        for kind in &self.validators {
            name::check_base_name(kind)
                .map_err(|_| KdbError::Config(format!("invalid validator kind '{}'", kind)))?;
        }
        for setting in self.plugin.keys() {
            name::canonical_meta_name(setting)
                .map_err(|_| KdbError::Config(format!("invalid plugin setting '{}'", setting)))?;
        }
        Ok(())
    }

    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    pub fn with_stop_on_first_rejection(mut self, stop: bool) -> Self {
        self.stop_on_first_rejection = stop;
        self
    }

    pub fn with_verdict_cache_capacity(mut self, capacity: usize) -> Self {
        self.verdict_cache_capacity = capacity;
        self
    }

    /// Enable a validator kind (no-op if already enabled)
    pub fn with_validator(mut self, kind: impl Into<String>) -> Self {
        let kind = kind.into();
        if !self.validators.contains(&kind) {
            self.validators.push(kind);
        }
        self
    }

    pub fn with_plugin_setting(mut self, setting: impl Into<String>, value: impl Into<String>) -> Self {
        self.plugin.insert(setting.into(), value.into());
        self
    }

    /// Empty key set sized by `initial_capacity`
    pub fn new_keyset(&self) -> KeySet {
        KeySet::with_capacity(self.initial_capacity)
    }

    /// Project the plugin table below `root`
    ///
    /// The set holds `root` itself followed by one key per setting.
    pub fn to_keyset(&self, root: &str) -> Result<KeySet> {
        let mut ks = KeySet::with_capacity(self.plugin.len() + 1);
        let root_key = Key::new(root)?;
        let root_name = root_key.name();
        ks.append_key(root_key);

        for (setting, value) in &self.plugin {
            let key = Key::builder(&format!("{}/{}", root_name, setting))
                .string(value)
                .build()?;
            ks.append_key(key);
        }

        ks.rewind();
        Ok(ks)
    }

    /// Plugin settings as seen by validators (`user/<setting>`)
    pub fn plugin_config(&self) -> Result<KeySet> {
        let mut mounted = self.to_keyset(Self::MOUNT_ROOT)?;
        Ok(rename_keys(&mut mounted, "user"))
    }
}
