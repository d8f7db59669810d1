//! Core types used throughout auction-lbin
//!
//! Item identities and attribute tier maps shared by the decoder, the
//! pricing engine and the snapshot store.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

/// Attribute name -> tier (1..N) carried by a single listing.
pub type AttributeTiers = BTreeMap<String, i32>;

/// Canonical key of an item in the price index.
///
/// Ordinary items use their declared id (`HYPERION`), pets use
/// `{tier}_{type}` (`LEGENDARY_GRIFFIN`) and runes `{rune}_{level}`
/// (`WISDOM_3`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemIdentity(String);

impl ItemIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Underscore-delimited segments of the identity
    pub fn segments(&self) -> std::str::Split<'_, char> {
        self.0.split('_')
    }
}

impl fmt::Display for ItemIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemIdentity {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ItemIdentity {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for ItemIdentity {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ItemIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_segments_split_on_underscore() {
        let id = ItemIdentity::new("FERVOR_HELMET");
        let parts: Vec<&str> = id.segments().collect();
        assert_eq!(parts, vec!["FERVOR", "HELMET"]);
    }

    #[test]
    fn identity_serializes_as_plain_string() {
        let id = ItemIdentity::from("WISDOM_3");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"WISDOM_3\"");
    }

    #[test]
    fn identity_lookup_by_str_in_btree_map() {
        let mut map = BTreeMap::new();
        map.insert(ItemIdentity::from("HELMET"), 1);
        assert_eq!(map.get("HELMET"), Some(&1));
    }
}
