//! Validation and canonicalisation of key names
//!
//! Key names are hierarchical: segments separated by `/`, rooted in a
//! namespace (`user/app/setting`) or cascading from `/` (`/app/setting`).
//! Metadata keys use namespace-free relative names (`check/ipaddr`).
//!
//! Every name stored in a [`Key`](crate::Key) is canonical:
//! - Empty segments and `.` are dropped
//! - `..` removes the previous segment but never the namespace
//! - Trailing slashes are removed

use crate::error::{KdbError, Result};
use regex::Regex;
use std::cmp::Ordering;
use std::sync::OnceLock;

/// Separator between name segments
pub const SEPARATOR: char = '/';

/// Namespaces a key name can be rooted in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Namespace {
    /// Name starts with `/` and resolves across all namespaces
    Cascading,
    Spec,
    Proc,
    Dir,
    User,
    System,
    /// Relative name used for metadata keys
    Meta,
}

impl Namespace {
    /// Namespaces accepted as the first segment of a key name
    const ROOTED: [(&'static str, Namespace); 5] = [
        ("spec", Namespace::Spec),
        ("proc", Namespace::Proc),
        ("dir", Namespace::Dir),
        ("user", Namespace::User),
        ("system", Namespace::System),
    ];

    fn from_segment(segment: &str) -> Option<Namespace> {
        Self::ROOTED
            .iter()
            .find(|(name, _)| *name == segment)
            .map(|(_, ns)| *ns)
    }
}

/// Segments must not contain control characters
fn control_chars() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[\x00-\x1f\x7f]").expect("static pattern compiles"))
}

/// Resolve `.`/`..` and empty segments
///
/// `keep` is the number of leading segments `..` may not remove.
fn resolve<'a>(segments: impl Iterator<Item = &'a str>, keep: usize) -> Vec<&'a str> {
    let mut resolved: Vec<&str> = Vec::new();

    for part in segments.filter(|s| !s.is_empty()) {
        match part {
            "." => continue,
            ".." => {
                if resolved.len() > keep {
                    resolved.pop();
                }
            }
            _ => resolved.push(part),
        }
    }

    resolved
}

fn check_chars(name: &str) -> Result<()> {
    if control_chars().is_match(name) {
        return Err(KdbError::InvalidName(format!(
            "'{}' contains control characters",
            name.escape_debug()
        )));
    }
    Ok(())
}

/// Canonicalise a key name
///
/// # Errors
///
/// Returns `InvalidName` if the name is empty, has an unknown namespace or
/// contains control characters.
///
/// # Examples
///
/// ```
/// use keyset_rs::core::name::canonical_key_name;
///
/// assert_eq!(canonical_key_name("user//app/./setting/").unwrap(), "user/app/setting");
/// assert_eq!(canonical_key_name("/app/../other").unwrap(), "/other");
/// assert!(canonical_key_name("nowhere/app").is_err());
/// ```
pub fn canonical_key_name(name: &str) -> Result<String> {
    if name.is_empty() {
        return Err(KdbError::InvalidName("name cannot be empty".to_string()));
    }
    check_chars(name)?;

    if name.starts_with(SEPARATOR) {
        let resolved = resolve(name.split(SEPARATOR), 0);
        return Ok(format!("/{}", resolved.join("/")));
    }

    let resolved = resolve(name.split(SEPARATOR), 1);
    match resolved.first() {
        Some(first) if Namespace::from_segment(first).is_some() => Ok(resolved.join("/")),
        Some(first) => Err(KdbError::InvalidName(format!(
            "'{}' is not rooted in a known namespace (got '{}')",
            name, first
        ))),
        None => Err(KdbError::InvalidName(format!("'{}' has no segments", name))),
    }
}

/// Canonicalise a metadata name (relative, no namespace)
pub fn canonical_meta_name(name: &str) -> Result<String> {
    check_chars(name)?;
    let resolved = resolve(name.split(SEPARATOR), 0);
    if resolved.is_empty() {
        return Err(KdbError::InvalidName(format!(
            "metadata name '{}' has no segments",
            name
        )));
    }
    Ok(resolved.join("/"))
}

/// Validate a single literal segment for `add_base_name`
pub fn check_base_name(base: &str) -> Result<()> {
    if base.is_empty() || base == "." || base == ".." || base.contains(SEPARATOR) {
        return Err(KdbError::InvalidName(format!(
            "'{}' is not a valid base name",
            base
        )));
    }
    check_chars(base)
}

/// Namespace of a canonical name
pub fn namespace_of(name: &str) -> Namespace {
    if name.starts_with(SEPARATOR) {
        return Namespace::Cascading;
    }
    let first = name.split(SEPARATOR).next().unwrap_or_default();
    Namespace::from_segment(first).unwrap_or(Namespace::Meta)
}

/// Last segment of a canonical name (empty for the cascading root)
pub fn base_name_of(name: &str) -> &str {
    name.rsplit(SEPARATOR).next().unwrap_or_default()
}

fn segments(name: &str) -> impl Iterator<Item = &str> {
    name.split(SEPARATOR).filter(|s| !s.is_empty())
}

/// Hierarchical order of canonical names
///
/// Names compare segment by segment, so every key sorts directly before
/// the keys below it: `user/a` < `user/a/b` < `user/a-c`. Cascading names
/// sort before all rooted namespaces.
pub fn cmp_names(a: &str, b: &str) -> Ordering {
    let a_cascading = a.starts_with(SEPARATOR);
    let b_cascading = b.starts_with(SEPARATOR);
    if a_cascading != b_cascading {
        return b_cascading.cmp(&a_cascading);
    }
    segments(a).cmp(segments(b))
}

/// Whether `child` lies anywhere below `parent`
pub fn is_below(parent: &str, child: &str) -> bool {
    let mut parent_parts = segments(parent);
    let mut child_parts = segments(child);
    if parent.starts_with(SEPARATOR) != child.starts_with(SEPARATOR) {
        return false;
    }
    loop {
        match (parent_parts.next(), child_parts.next()) {
            (None, Some(_)) => return true,
            (None, None) => return false,
            (Some(_), None) => return false,
            (Some(p), Some(c)) if p != c => return false,
            _ => {}
        }
    }
}

/// Whether `child` lies exactly one level below `parent`
pub fn is_directly_below(parent: &str, child: &str) -> bool {
    is_below(parent, child) && segments(child).count() == segments(parent).count() + 1
}
