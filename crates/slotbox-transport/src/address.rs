//! Slot addressing.
//!
//! Addresses use the mailslot namespace syntax so they interoperate with
//! unmodified peers:
//!
//! ```text
//! \\.\mailslot\Box        local scope
//! \\HOST\mailslot\Box     remote scope
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Serialize, Serializer};

use crate::error::{Result, SlotError};

/// Host segment used for local-scope addresses.
pub const LOCAL_HOST: &str = ".";

/// Literal channel segment shared by every slot address.
pub const CHANNEL_SEGMENT: &str = "mailslot";

/// Box name used when none is configured.
pub const DEFAULT_BOX_NAME: &str = "Box";

/// Host names that resolve to the local-scope address.
pub const LOCAL_ALIASES: [&str; 2] = [".", "localhost"];

/// A resolved slot address.
///
/// Two addresses are equal iff their rendered strings are equal.
#[derive(Debug, Clone)]
pub struct SlotAddress {
    path: String,
    host_len: usize,
}

impl SlotAddress {
    /// Local-scope address for `box_name`.
    pub fn local(box_name: &str) -> Self {
        Self::build(LOCAL_HOST, box_name)
    }

    /// Remote-scope address for `box_name` on `host`.
    ///
    /// The host name is not validated.
    pub fn remote(host: &str, box_name: &str) -> Self {
        Self::build(host, box_name)
    }

    fn build(host: &str, box_name: &str) -> Self {
        Self {
            path: format!(r"\\{host}\{CHANNEL_SEGMENT}\{box_name}"),
            host_len: host.len(),
        }
    }

    /// Parse a fully rendered address such as `\\.\mailslot\Box`.
    pub fn parse(input: &str) -> Result<Self> {
        let rest = input
            .strip_prefix(r"\\")
            .ok_or_else(|| SlotError::InvalidParameter(format!("missing \\\\ prefix: {input}")))?;
        let (host, tail) = rest
            .split_once('\\')
            .ok_or_else(|| SlotError::InvalidParameter(format!("missing host segment: {input}")))?;
        let box_name = tail
            .split_once('\\')
            .filter(|(channel, _)| channel.eq_ignore_ascii_case(CHANNEL_SEGMENT))
            .map(|(_, name)| name)
            .ok_or_else(|| {
                SlotError::InvalidParameter(format!("missing {CHANNEL_SEGMENT} segment: {input}"))
            })?;
        if host.is_empty() || box_name.is_empty() {
            return Err(SlotError::InvalidParameter(format!(
                "empty host or box name: {input}"
            )));
        }
        Ok(Self::build(host, box_name))
    }

    /// The rendered address string.
    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// Host segment (`.` for local scope).
    pub fn host(&self) -> &str {
        &self.path[2..2 + self.host_len]
    }

    /// Box name, the part after the channel segment.
    pub fn box_name(&self) -> &str {
        // \\ + host + \ + mailslot + \
        &self.path[2 + self.host_len + 1 + CHANNEL_SEGMENT.len() + 1..]
    }

    /// True for local-scope addresses.
    pub fn is_local(&self) -> bool {
        self.host() == LOCAL_HOST
    }

    /// The local-scope address with the same box name.
    pub fn to_local(&self) -> Self {
        Self::local(self.box_name())
    }
}

impl PartialEq for SlotAddress {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for SlotAddress {}

impl Hash for SlotAddress {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

impl fmt::Display for SlotAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

impl Serialize for SlotAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.path)
    }
}

/// Returns true if `host` names the local machine.
///
/// Only exact alias tokens match. An empty name is a remote host name like
/// any other and fails when opened.
pub fn is_local_alias(host: &str) -> bool {
    LOCAL_ALIASES.contains(&host)
}

/// Resolve one host name.
pub fn resolve_target(host: &str, box_name: &str) -> SlotAddress {
    if is_local_alias(host) {
        SlotAddress::local(box_name)
    } else {
        SlotAddress::remote(host, box_name)
    }
}

/// Resolve a list of host names into slot addresses.
///
/// Always returns at least one address: an empty list resolves to the
/// local-scope slot.
pub fn resolve_targets<S: AsRef<str>>(hosts: &[S], box_name: &str) -> Vec<SlotAddress> {
    if hosts.is_empty() {
        return vec![SlotAddress::local(box_name)];
    }
    hosts
        .iter()
        .map(|host| resolve_target(host.as_ref(), box_name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_address_format() {
        let addr = SlotAddress::local(DEFAULT_BOX_NAME);
        assert_eq!(addr.as_str(), r"\\.\mailslot\Box");
        assert!(addr.is_local());
        assert_eq!(addr.host(), ".");
        assert_eq!(addr.box_name(), "Box");
    }

    #[test]
    fn remote_address_format() {
        let addr = SlotAddress::remote("SERVER1", DEFAULT_BOX_NAME);
        assert_eq!(addr.as_str(), r"\\SERVER1\mailslot\Box");
        assert!(!addr.is_local());
        assert_eq!(addr.host(), "SERVER1");
        assert_eq!(addr.to_local(), SlotAddress::local("Box"));
    }

    #[test]
    fn empty_target_list_resolves_to_local() {
        let none: [&str; 0] = [];
        let resolved = resolve_targets(&none, DEFAULT_BOX_NAME);
        assert_eq!(resolved, vec![SlotAddress::local(DEFAULT_BOX_NAME)]);
    }

    #[test]
    fn resolves_one_address_per_target() {
        let hosts = [".", "localhost", "alpha", "beta gamma", "alpha"];
        let resolved = resolve_targets(&hosts, DEFAULT_BOX_NAME);
        assert_eq!(resolved.len(), hosts.len());
        assert_eq!(resolved[2].as_str(), r"\\alpha\mailslot\Box");
        // Malformed host names pass through untouched.
        assert_eq!(resolved[3].host(), "beta gamma");
        assert_eq!(resolved[2], resolved[4]);
    }

    #[test]
    fn local_aliases_match_default() {
        let default = resolve_targets::<&str>(&[], DEFAULT_BOX_NAME).remove(0);
        for alias in LOCAL_ALIASES {
            assert_eq!(resolve_target(alias, DEFAULT_BOX_NAME), default);
        }
    }

    #[test]
    fn empty_host_name_is_not_local() {
        assert!(!is_local_alias(""));
        let resolved = resolve_targets(&[""], DEFAULT_BOX_NAME);
        assert_eq!(resolved.len(), 1);
        assert!(!resolved[0].is_local());
        assert_eq!(resolved[0].host(), "");
        assert_eq!(resolved[0].as_str(), r"\\\mailslot\Box");
    }

    #[test]
    fn remote_dot_equals_local() {
        assert_eq!(SlotAddress::remote(".", "Box"), SlotAddress::local("Box"));
    }

    #[test]
    fn parse_roundtrips_rendered_addresses() {
        let addr = SlotAddress::parse(r"\\HOST\mailslot\sub\Box").expect("address should parse");
        assert_eq!(addr.host(), "HOST");
        assert_eq!(addr.box_name(), r"sub\Box");
        assert_eq!(addr.to_string(), r"\\HOST\mailslot\sub\Box");
    }

    #[test]
    fn parse_rejects_malformed_addresses() {
        for bad in [r"mailslot\Box", r"\\.\pipe\Box", r"\\.\mailslot\", r"\\\mailslot\Box"] {
            assert!(
                matches!(SlotAddress::parse(bad), Err(SlotError::InvalidParameter(_))),
                "{bad} should be rejected"
            );
        }
    }
}
