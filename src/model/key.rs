//! Store keys
//!
//! A `StoreKey` names one store globally: package type, store type, and
//! store name. Keys are immutable and used as map keys and external
//! identifiers throughout the engine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::DepotError;

/// The three kinds of store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreType {
    /// Locally written content (deploy target)
    Hosted,
    /// Proxy of an upstream origin, cached locally
    Remote,
    /// Virtual store aggregating other stores in precedence order
    Group,
}

impl StoreType {
    /// Short name as used in key strings
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreType::Hosted => "hosted",
            StoreType::Remote => "remote",
            StoreType::Group => "group",
        }
    }
}

impl fmt::Display for StoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreType {
    type Err = DepotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hosted" => Ok(StoreType::Hosted),
            "remote" => Ok(StoreType::Remote),
            "group" => Ok(StoreType::Group),
            other => Err(DepotError::Config(format!("Unknown store type: {other}"))),
        }
    }
}

/// Globally unique store identifier
///
/// Two keys are equal iff package type, store type, and name all match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StoreKey {
    /// Package ecosystem (e.g. "maven", "npm", "generic")
    pub package_type: String,
    /// Store type
    pub store_type: StoreType,
    /// Store name, unique within (package_type, store_type)
    pub name: String,
}

impl StoreKey {
    /// Create a new store key
    pub fn new(package_type: &str, store_type: StoreType, name: &str) -> Self {
        Self {
            package_type: package_type.to_string(),
            store_type,
            name: name.to_string(),
        }
    }

    /// Parse from the canonical "pkg:type:name" form
    pub fn parse(s: &str) -> Result<Self, DepotError> {
        let mut parts = s.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(pkg), Some(ty), Some(name)) if !pkg.is_empty() && !name.is_empty() => {
                Ok(Self::new(pkg, ty.parse()?, name))
            }
            _ => Err(DepotError::Config(format!(
                "Invalid store key '{s}', expected pkg:type:name"
            ))),
        }
    }

    /// True for hosted and remote stores, false for groups
    pub fn is_concrete(&self) -> bool {
        self.store_type != StoreType::Group
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.package_type, self.store_type, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_roundtrip() {
        let key = StoreKey::new("maven", StoreType::Remote, "central");
        let parsed = StoreKey::parse(&key.to_string()).unwrap();
        assert_eq!(key, parsed);
    }

    #[test]
    fn test_key_equality_requires_all_fields() {
        let a = StoreKey::new("maven", StoreType::Hosted, "releases");
        let b = StoreKey::new("npm", StoreType::Hosted, "releases");
        let c = StoreKey::new("maven", StoreType::Remote, "releases");
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, StoreKey::new("maven", StoreType::Hosted, "releases"));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(StoreKey::parse("maven:hosted").is_err());
        assert!(StoreKey::parse("maven:bogus:name").is_err());
        assert!(StoreKey::parse(":hosted:name").is_err());
    }

    #[test]
    fn test_is_concrete() {
        assert!(StoreKey::new("maven", StoreType::Hosted, "a").is_concrete());
        assert!(StoreKey::new("maven", StoreType::Remote, "b").is_concrete());
        assert!(!StoreKey::new("maven", StoreType::Group, "c").is_concrete());
    }
}
