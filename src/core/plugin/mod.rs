//! Validation plugins
//!
//! Keys declare the checks they must pass through `check/<kind>` metadata;
//! the value of that metadata selects a variant of the check (an empty
//! variant means "any"). On commit the [`ValidatorRegistry`] runs the
//! validator registered for every declared kind:
//!
//! ```
//! use keyset_rs::{keyset, CommitStatus, Key, ValidatorRegistry};
//!
//! let mut registry = ValidatorRegistry::with_builtins();
//! let parent = Key::new("user/tests/ipaddr").unwrap();
//! let ks = keyset![Key::builder("user/tests/ipaddr/gateway")
//!     .string("300.168.1.1")
//!     .meta("check/ipaddr", "ipv4")
//!     .build()
//!     .unwrap()];
//!
//! assert_eq!(registry.commit(&ks, &parent), CommitStatus::Rejected);
//! assert!(parent.meta_string("error/reason").is_some());
//! ```

mod cache;
pub mod ipaddr;
mod registry;

pub use cache::VerdictCache;
pub use ipaddr::{IpAddrValidator, IpVersion};
pub use registry::{CommitStatus, ValidatorRegistry, CHECK_PREFIX};

use crate::core::keyset::KeySet;
use crate::error::Result;

/// Outcome of a single validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The value passes the check
    Valid,
    /// The value fails the check, with a human-readable reason
    Invalid(String),
    /// The check does not apply to this value
    NoOpinion,
}

impl Verdict {
    /// Status code: 1 valid, -1 invalid, 0 no opinion
    pub fn status(&self) -> i32 {
        match self {
            Verdict::Valid => 1,
            Verdict::Invalid(_) => -1,
            Verdict::NoOpinion => 0,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Verdict::Valid)
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Verdict::Invalid(_))
    }
}

/// A check selected by `check/<kind>` metadata
pub trait Validator: Send + Sync {
    /// Kind this validator answers for (the `<kind>` in `check/<kind>`)
    fn kind(&self) -> &str;

    /// Judge `value` against the declared `variant`
    fn validate(&self, value: &[u8], variant: &str) -> Verdict;

    /// Apply plugin settings (`user/<kind>/...` keys)
    fn configure(&mut self, _config: &KeySet) -> Result<()> {
        Ok(())
    }
}

/// Validator for a built-in kind
pub fn builtin(kind: &str) -> Option<Box<dyn Validator>> {
    match kind {
        IpAddrValidator::KIND => Some(Box::new(IpAddrValidator::new())),
        _ => None,
    }
}
