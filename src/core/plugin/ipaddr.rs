//! IP address check (`check/ipaddr`)
//!
//! Variants: `ipv4`, `ipv6`, or empty for either. IPv6 addresses accept the
//! usual `::` compression and a trailing dotted IPv4 part; a single leading
//! or trailing colon stands for one zero group, while a bare `::` is
//! rejected.

use super::{Validator, Verdict};
use crate::core::keyset::KeySet;
use crate::error::{KdbError, Result};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// IP version selected by the `check/ipaddr` variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpVersion {
    V4,
    V6,
    Any,
}

impl FromStr for IpVersion {
    type Err = KdbError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ipv4" => Ok(IpVersion::V4),
            "ipv6" => Ok(IpVersion::V6),
            "" => Ok(IpVersion::Any),
            other => Err(KdbError::Config(format!(
                "unknown IP version '{}' (expected ipv4, ipv6 or empty)",
                other
            ))),
        }
    }
}

impl fmt::Display for IpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpVersion::V4 => write!(f, "IPv4"),
            IpVersion::V6 => write!(f, "IPv6"),
            IpVersion::Any => write!(f, "IP"),
        }
    }
}

/// Dotted quad with octets 0-255
pub fn is_ipv4(addr: &str) -> bool {
    let octets: Vec<&str> = addr.split('.').collect();
    octets.len() == 4
        && octets.iter().all(|octet| {
            !octet.is_empty()
                && octet.len() <= 3
                && octet.bytes().all(|b| b.is_ascii_digit())
                && octet.parse::<u16>().is_ok_and(|n| n <= 255)
        })
}

/// Eight hex groups, or fewer with a single `::`
pub fn is_ipv6(addr: &str) -> bool {
    if addr.contains(":::") || addr.matches("::").count() > 1 {
        return false;
    }

    let parts: Vec<&str> = addr.split(':').collect();
    let last = parts.len() - 1;
    let mut groups = 0usize;

    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if part.contains('.') {
            // embedded IPv4 only as the final part, counts as two groups
            if i != last || !is_ipv4(part) {
                return false;
            }
            groups += 2;
            continue;
        }
        if part.len() > 4 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
            return false;
        }
        groups += 1;
    }

    if groups == 0 {
        return false;
    }

    if addr.starts_with(':') && !addr.starts_with("::") {
        groups += 1;
    }
    if addr.ends_with(':') && !addr.ends_with("::") {
        groups += 1;
    }

    if addr.contains("::") {
        groups < 8
    } else {
        groups == 8
    }
}

/// Validator for `check/ipaddr`
#[derive(Debug, Clone)]
pub struct IpAddrValidator {
    /// Version used when a key declares an empty variant
    default_version: IpVersion,
}

impl Default for IpAddrValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl IpAddrValidator {
    pub const KIND: &'static str = "ipaddr";

    /// Plugin setting overriding the version for empty variants
    pub const DEFAULT_SETTING: &'static str = "user/ipaddr/default";

    pub fn new() -> Self {
        IpAddrValidator {
            default_version: IpVersion::Any,
        }
    }

    pub fn with_default_version(mut self, version: IpVersion) -> Self {
        self.default_version = version;
        self
    }

    pub fn check(&self, addr: &str, version: IpVersion) -> bool {
        match version {
            IpVersion::V4 => is_ipv4(addr),
            IpVersion::V6 => is_ipv6(addr),
            IpVersion::Any => is_ipv4(addr) || is_ipv6(addr),
        }
    }
}

impl Validator for IpAddrValidator {
    fn kind(&self) -> &str {
        Self::KIND
    }

    fn validate(&self, value: &[u8], variant: &str) -> Verdict {
        let version = match variant {
            "" => self.default_version,
            other => match other.parse::<IpVersion>() {
                Ok(version) => version,
                Err(err) => return Verdict::Invalid(err.to_string()),
            },
        };

        let Ok(addr) = std::str::from_utf8(value) else {
            return Verdict::Invalid("value is not a UTF-8 string".to_string());
        };

        if self.check(addr, version) {
            debug!("'{}' is a valid {} address", addr, version);
            Verdict::Valid
        } else {
            Verdict::Invalid(format!("'{}' is not a valid {} address", addr, version))
        }
    }

    fn configure(&mut self, config: &KeySet) -> Result<()> {
        if let Some(setting) = config.get(Self::DEFAULT_SETTING) {
            let value = setting.string().unwrap_or_default();
            self.default_version = value.parse()?;
            debug!("ipaddr default version set to {}", self.default_version);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(addr: &str, variant: &str) -> i32 {
        IpAddrValidator::new()
            .validate(addr.as_bytes(), variant)
            .status()
    }

    #[test]
    fn test_ipv4() {
        assert_eq!(status("192.168.1.1", "ipv4"), 1);
        assert_eq!(status("0.0.0.0", "ipv4"), 1);
        assert_eq!(status("255.255.255.255", "ipv4"), 1);
        assert_eq!(status("300.168.1.1", "ipv4"), -1);
        assert_eq!(status("192.168.1", "ipv4"), -1);
        assert_eq!(status("192.168.a.1", "ipv4"), -1);
        assert_eq!(status("1.2.3.4.5", "ipv4"), -1);
        assert_eq!(status("::1", "ipv4"), -1);
    }

    #[test]
    fn test_ipv6_valid() {
        for addr in [
            "2001:0db8:85a3:0000:0000:8a2e:0370:7334",
            "2001:0db8:85a3:0:0:8a2e:0370:7334",
            "2001:0db8:85a3::8a2e:0370:7334",
            ":0db8:85a3:0000:0000:8a2e:0370:7334",
            "::1",
            "2001::7334",
            "::ffff:192.0.2.128",
        ] {
            assert_eq!(status(addr, "ipv6"), 1, "{} should be valid", addr);
        }
    }

    #[test]
    fn test_ipv6_invalid() {
        for addr in [
            "2001:0db8:85a3:1234:0000:0000:8a2e:0370:7334",
            "2001:0db8:85a3:0:0:z:0370:7334",
            "0db8:85a3:0370:7334",
            ":0db8:85a3:0000:0000:1234:8a2e:0370:7334",
            "::",
            "::ffff:192.0.128",
            "1::2::3",
            "1:::2",
            "12345::1",
        ] {
            assert_eq!(status(addr, "ipv6"), -1, "{} should be invalid", addr);
        }
    }

    #[test]
    fn test_any_version() {
        assert_eq!(status("::ffff:192.0.128", ""), -1);
        assert_eq!(status("1.2.3.", ""), -1);
        assert_eq!(status("::1", ""), 1);
        assert_eq!(status("42.42.42.42", ""), 1);
    }

    #[test]
    fn test_unknown_variant_and_binary() {
        assert_eq!(status("1.2.3.4", "ipv5"), -1);
        let verdict = IpAddrValidator::new().validate(&[0xff, 0xfe], "ipv4");
        assert!(verdict.is_invalid());
    }

    #[test]
    fn test_configured_default_version() {
        let mut validator = IpAddrValidator::new();
        let config = KeySet::from_keys([crate::Key::builder(IpAddrValidator::DEFAULT_SETTING)
            .string("ipv4")
            .build()
            .unwrap()]);
        validator.configure(&config).unwrap();

        assert!(validator.validate(b"::1", "").is_invalid());
        assert!(validator.validate(b"::1", "ipv6").is_valid());

        let bad = KeySet::from_keys([crate::Key::builder(IpAddrValidator::DEFAULT_SETTING)
            .string("ipv9")
            .build()
            .unwrap()]);
        assert!(validator.configure(&bad).is_err());
    }
}
