//! Validator registry and commit-time validation
//!
//! Maps validator kinds to [`Validator`]s and runs them over a key set:
//! - Every `check/<kind>` metadata entry of a key selects a validator
//! - A rejection records an error on the parent key
//! - Kinds without a registered validator have no opinion
//! - Verdicts are cached per kind, variant and value

use super::{builtin, Validator, VerdictCache, Verdict};
use crate::core::config::StoreConfig;
use crate::core::key::Key;
use crate::core::keyset::KeySet;
use crate::error::{KdbError, Result};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use tracing::{debug, info, warn};

/// Metadata prefix declaring a check
pub const CHECK_PREFIX: &str = "check/";

/// Error number recorded for rejected values
const VALIDATION_ERROR_NUMBER: &str = "C03200";

/// Result of committing a key set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitStatus {
    /// At least one check passed and none failed
    Success,
    /// A check failed; the parent key carries the error
    Rejected,
    /// No registered validator had anything to check
    NoUpdate,
}

impl CommitStatus {
    /// Status code: 1 success, -1 rejected, 0 no update
    pub fn code(self) -> i32 {
        match self {
            CommitStatus::Success => 1,
            CommitStatus::Rejected => -1,
            CommitStatus::NoUpdate => 0,
        }
    }
}

/// Registry of validators keyed by kind
pub struct ValidatorRegistry {
    validators: HashMap<String, Box<dyn Validator>>,
    cache: Option<VerdictCache>,
    stop_on_first_rejection: bool,
}

impl Default for ValidatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidatorRegistry {
    /// Empty registry with the default cache (1024 verdicts)
    pub fn new() -> Self {
        Self::with_cache_capacity(1024)
    }

    /// Empty registry; a capacity of 0 disables the verdict cache
    pub fn with_cache_capacity(capacity: usize) -> Self {
        ValidatorRegistry {
            validators: HashMap::new(),
            cache: NonZeroUsize::new(capacity).map(VerdictCache::new),
            stop_on_first_rejection: true,
        }
    }

    /// Registry with every built-in validator
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        if let Some(validator) = builtin(super::IpAddrValidator::KIND) {
            registry.register(validator);
        }
        registry
    }

    /// Build the registry described by `config`
    ///
    /// Validators are configured with [`StoreConfig::plugin_config`].
    ///
    /// # Errors
    ///
    /// `Config` for an unknown validator kind or a setting the validator
    /// rejects.
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        let mut registry = Self::with_cache_capacity(config.verdict_cache_capacity);
        registry.stop_on_first_rejection = config.stop_on_first_rejection;

        let plugin_config = config.plugin_config()?;
        for kind in &config.validators {
            let mut validator = builtin(kind)
                .ok_or_else(|| KdbError::Config(format!("unknown validator '{}'", kind)))?;
            validator.configure(&plugin_config)?;
            registry.register(validator);
        }

        info!("Validator registry ready with {:?}", registry.kinds());
        Ok(registry)
    }

    pub fn with_stop_on_first_rejection(mut self, stop: bool) -> Self {
        self.stop_on_first_rejection = stop;
        self
    }

    /// Register a validator, returning the one it replaces
    pub fn register(&mut self, validator: Box<dyn Validator>) -> Option<Box<dyn Validator>> {
        let kind = validator.kind().to_string();
        debug!("Registering validator '{}'", kind);
        if let Some(cache) = self.cache.as_mut() {
            cache.clear();
        }
        self.validators.insert(kind, validator)
    }

    pub fn get(&self, kind: &str) -> Option<&dyn Validator> {
        self.validators.get(kind).map(|v| v.as_ref())
    }

    /// Registered kinds, sorted
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.validators.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    /// Run one validator, consulting the cache first
    fn run(&mut self, kind: &str, variant: &str, value: &[u8]) -> Verdict {
        let Some(validator) = self.validators.get(kind) else {
            debug!("No validator for check/{}", kind);
            return Verdict::NoOpinion;
        };

        if let Some(cached) = self
            .cache
            .as_mut()
            .and_then(|cache| cache.get(kind, variant, value))
        {
            return cached;
        }

        let verdict = validator.validate(value, variant);

        if let Some(cache) = self.cache.as_mut() {
            cache.put(kind, variant, value, verdict.clone());
        }
        verdict
    }

    /// Verdict of every check declared on `key`, in metadata order
    pub fn check_key(&mut self, key: &Key) -> Vec<(String, Verdict)> {
        let value = key.value();
        let mut verdicts = Vec::new();

        for meta_name in key.meta_names() {
            let Some(kind) = meta_name.strip_prefix(CHECK_PREFIX) else {
                continue;
            };
            let variant = key.meta_string(&meta_name).unwrap_or_default();
            let verdict = self.run(kind, &variant, &value);
            debug!("check/{} on {}: {:?}", kind, key, verdict);
            verdicts.push((kind.to_string(), verdict));
        }

        verdicts
    }

    /// Combined verdict for `key`: the first rejection, else valid if any
    /// check passed, else no opinion
    pub fn validate_key(&mut self, key: &Key) -> Verdict {
        let mut combined = Verdict::NoOpinion;
        for (_, verdict) in self.check_key(key) {
            match verdict {
                Verdict::Invalid(_) => return verdict,
                Verdict::Valid => combined = Verdict::Valid,
                Verdict::NoOpinion => {}
            }
        }
        combined
    }

    /// Validate every key of `ks`, reporting rejections on `parent`
    ///
    /// The cursor of `ks` is not touched.
    pub fn commit(&mut self, ks: &KeySet, parent: &Key) -> CommitStatus {
        let mut accepted = 0usize;
        let mut rejected = 0usize;

        for key in ks.iter() {
            for (kind, verdict) in self.check_key(key) {
                match verdict {
                    Verdict::Valid => accepted += 1,
                    Verdict::NoOpinion => {}
                    Verdict::Invalid(reason) => {
                        rejected += 1;
                        let err = KdbError::ValidationRejected {
                            key: key.name(),
                            reason,
                        };
                        warn!("{}", err);
                        record_error(parent, key, &kind, &err);
                        if self.stop_on_first_rejection {
                            return CommitStatus::Rejected;
                        }
                    }
                }
            }
        }

        debug!(
            "Commit of {} keys: {} accepted, {} rejected",
            ks.len(),
            accepted,
            rejected
        );

        if rejected > 0 {
            CommitStatus::Rejected
        } else if accepted > 0 {
            CommitStatus::Success
        } else {
            CommitStatus::NoUpdate
        }
    }
}

/// Attach a validation error to the parent key's metadata
fn record_error(parent: &Key, key: &Key, kind: &str, err: &KdbError) {
    let entries = [
        ("error", "validation"),
        ("error/number", VALIDATION_ERROR_NUMBER),
        ("error/module", kind),
        ("error/description", "Validation Semantic"),
    ];
    let key_name = key.name();
    let reason = err.to_string();

    let recorded = entries
        .iter()
        .try_for_each(|(name, value)| parent.set_meta(name, value))
        .and_then(|_| parent.set_meta("error/key", &key_name))
        .and_then(|_| parent.set_meta("error/reason", &reason));

    if let Err(lock_err) = recorded {
        warn!("Could not record error on {}: {}", parent, lock_err);
    }
}
