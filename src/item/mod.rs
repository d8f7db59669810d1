//! Item identity resolution
//!
//! Walks a decoded listing to its `ExtraAttributes` compound and derives
//! the key the price index files the listing under.

use crate::nbt::{Blob, Compound, Tag, TagKind};
use crate::types::{AttributeTiers, ItemIdentity};
use serde::Deserialize;
use thiserror::Error;

pub const PET_ID: &str = "PET";
pub const RUNE_ID: &str = "RUNE";

/// A decoded listing that does not have the shape of an auction item
#[derive(Debug, Error)]
pub enum ListingError {
    #[error("Missing node `{0}`")]
    MissingNode(&'static str),

    #[error("Node `{path}` is {found}, expected {expected}")]
    WrongKind {
        path: &'static str,
        expected: TagKind,
        found: TagKind,
    },

    #[error("petInfo is not valid JSON: {0}")]
    PetInfo(#[from] serde_json::Error),

    #[error("petInfo has no `{0}` field")]
    PetInfoField(&'static str),

    #[error("runes compound is empty")]
    EmptyRunes,

    #[error("Rune `{0}` has a non-numeric or non-finite level")]
    RuneLevel(String),
}

/// What the pricing engine needs from one decoded listing
#[derive(Debug, Clone, PartialEq)]
pub struct ItemMeta {
    pub identity: ItemIdentity,
    /// Declared `id` before pet/rune handling
    pub item_id: String,
    pub tiers: AttributeTiers,
}

#[derive(Debug, Deserialize)]
struct PetInfo {
    tier: Option<String>,
    #[serde(rename = "type")]
    pet_type: Option<String>,
}

fn require<'a>(tag: Option<&'a Tag>, path: &'static str) -> Result<&'a Tag, ListingError> {
    tag.ok_or(ListingError::MissingNode(path))
}

fn require_compound<'a>(
    tag: Option<&'a Tag>,
    path: &'static str,
) -> Result<&'a Compound, ListingError> {
    let tag = require(tag, path)?;
    tag.as_compound().ok_or(ListingError::WrongKind {
        path,
        expected: TagKind::Compound,
        found: tag.kind(),
    })
}

fn require_str<'a>(tag: Option<&'a Tag>, path: &'static str) -> Result<&'a str, ListingError> {
    let tag = require(tag, path)?;
    tag.as_str().ok_or(ListingError::WrongKind {
        path,
        expected: TagKind::String,
        found: tag.kind(),
    })
}

/// Navigate root -> `i` -> first element -> `tag` -> `ExtraAttributes`.
pub fn extra_attributes(blob: &Blob) -> Result<&Compound, ListingError> {
    let list = require(blob.root.get("i"), "i")?;
    let items = list.as_list().ok_or(ListingError::WrongKind {
        path: "i",
        expected: TagKind::List,
        found: list.kind(),
    })?;
    let item = require_compound(items.first(), "i[0]")?;
    let tag = require_compound(item.get("tag"), "i[0].tag")?;
    require_compound(tag.get("ExtraAttributes"), "i[0].tag.ExtraAttributes")
}

/// Derive the index key of a listing from its `ExtraAttributes`.
pub fn resolve_identity(extra: &Compound) -> Result<ItemIdentity, ListingError> {
    let id = require_str(extra.get("id"), "ExtraAttributes.id")?;

    match id {
        PET_ID => {
            let raw = require_str(extra.get("petInfo"), "ExtraAttributes.petInfo")?;
            let info: PetInfo = serde_json::from_str(raw)?;
            let tier = info.tier.ok_or(ListingError::PetInfoField("tier"))?;
            let pet_type = info.pet_type.ok_or(ListingError::PetInfoField("type"))?;
            Ok(ItemIdentity::new(format!("{}_{}", tier, pet_type)))
        }
        RUNE_ID => {
            let runes = require_compound(extra.get("runes"), "ExtraAttributes.runes")?;
            let (rune, level) = runes.first().ok_or(ListingError::EmptyRunes)?;
            let level = level
                .as_f64()
                .filter(|level| level.is_finite())
                .ok_or_else(|| ListingError::RuneLevel(rune.to_string()))?;
            Ok(ItemIdentity::new(format!("{}_{}", rune, level.trunc() as i64)))
        }
        _ => Ok(ItemIdentity::new(id)),
    }
}

/// Attribute tiers carried by the item. Items without modifiers yield an
/// empty map; entries that are not integral are skipped.
pub fn attribute_tiers(extra: &Compound) -> AttributeTiers {
    extra
        .get_compound("attributes")
        .map(|attributes| {
            attributes
                .iter()
                .filter_map(|(name, tier)| {
                    let tier = i32::try_from(tier.as_i64()?).ok()?;
                    Some((name.to_string(), tier))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Resolve everything the pricing engine needs from a decoded listing.
pub fn inspect(blob: &Blob) -> Result<ItemMeta, ListingError> {
    let extra = extra_attributes(blob)?;
    let identity = resolve_identity(extra)?;
    let item_id = require_str(extra.get("id"), "ExtraAttributes.id")?.to_string();
    Ok(ItemMeta {
        identity,
        item_id,
        tiers: attribute_tiers(extra),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(extra: Compound) -> Blob {
        let item = Compound::new()
            .with("id", 397i16)
            .with("Count", 1i8)
            .with("tag", Compound::new().with("ExtraAttributes", extra));
        Blob::new(Compound::new().with("i", vec![Tag::Compound(item)]))
    }

    #[test]
    fn ordinary_item_uses_declared_id() {
        let blob = listing(Compound::new().with("id", "HYPERION"));
        let meta = inspect(&blob).unwrap();
        assert_eq!(meta.identity.as_str(), "HYPERION");
        assert!(meta.tiers.is_empty());
    }

    #[test]
    fn pet_identity_comes_from_pet_info() {
        let blob = listing(
            Compound::new()
                .with("id", "PET")
                .with("petInfo", r#"{"type":"GRIFFIN","active":false,"tier":"LEGENDARY"}"#),
        );
        let meta = inspect(&blob).unwrap();
        assert_eq!(meta.identity.as_str(), "LEGENDARY_GRIFFIN");
        assert_eq!(meta.item_id, "PET");
    }

    #[test]
    fn rune_identity_uses_single_rune_entry() {
        let blob = listing(
            Compound::new()
                .with("id", "RUNE")
                .with("runes", Compound::new().with("WISDOM", 3i32)),
        );
        assert_eq!(inspect(&blob).unwrap().identity.as_str(), "WISDOM_3");
    }

    #[test]
    fn rune_level_is_truncated_to_integer() {
        let extra = Compound::new()
            .with("id", "RUNE")
            .with("runes", Compound::new().with("BLOOD_2", 2.0f64));
        assert_eq!(resolve_identity(&extra).unwrap().as_str(), "BLOOD_2_2");
    }

    #[test]
    fn non_finite_rune_level_is_malformed() {
        for level in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let extra = Compound::new()
                .with("id", "RUNE")
                .with("runes", Compound::new().with("WISDOM", level));
            assert!(matches!(
                resolve_identity(&extra).unwrap_err(),
                ListingError::RuneLevel(ref rune) if rune == "WISDOM"
            ));
        }

        let text = Compound::new()
            .with("id", "RUNE")
            .with("runes", Compound::new().with("WISDOM", "3"));
        assert!(matches!(
            resolve_identity(&text).unwrap_err(),
            ListingError::RuneLevel(_)
        ));
    }

    #[test]
    fn pet_without_pet_info_is_malformed() {
        let err = resolve_identity(&Compound::new().with("id", "PET")).unwrap_err();
        assert!(matches!(err, ListingError::MissingNode("ExtraAttributes.petInfo")));
    }

    #[test]
    fn pet_info_must_be_json_with_tier_and_type() {
        let bad_json = Compound::new().with("id", "PET").with("petInfo", "{tier:");
        assert!(matches!(
            resolve_identity(&bad_json).unwrap_err(),
            ListingError::PetInfo(_)
        ));

        let no_type = Compound::new()
            .with("id", "PET")
            .with("petInfo", r#"{"tier":"EPIC"}"#);
        assert!(matches!(
            resolve_identity(&no_type).unwrap_err(),
            ListingError::PetInfoField("type")
        ));
    }

    #[test]
    fn empty_runes_is_malformed() {
        let extra = Compound::new().with("id", "RUNE").with("runes", Compound::new());
        assert!(matches!(
            resolve_identity(&extra).unwrap_err(),
            ListingError::EmptyRunes
        ));
    }

    #[test]
    fn missing_path_nodes_are_reported() {
        let no_items = Blob::new(Compound::new());
        assert!(matches!(
            inspect(&no_items).unwrap_err(),
            ListingError::MissingNode("i")
        ));

        let empty_list = Blob::new(Compound::new().with("i", Vec::<Tag>::new()));
        assert!(matches!(
            inspect(&empty_list).unwrap_err(),
            ListingError::MissingNode("i[0]")
        ));

        let no_id = listing(Compound::new().with("uuid", "abc"));
        assert!(matches!(
            inspect(&no_id).unwrap_err(),
            ListingError::MissingNode("ExtraAttributes.id")
        ));
    }

    #[test]
    fn wrong_kind_is_reported() {
        let blob = Blob::new(Compound::new().with("i", 5i32));
        match inspect(&blob).unwrap_err() {
            ListingError::WrongKind {
                path,
                expected,
                found,
            } => {
                assert_eq!(path, "i");
                assert_eq!(expected, TagKind::List);
                assert_eq!(found, TagKind::Int);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn attribute_tiers_read_integral_entries() {
        let extra = Compound::new().with("id", "CRIMSON_CHESTPLATE").with(
            "attributes",
            Compound::new()
                .with("mana_pool", 3i32)
                .with("veteran", 5i8)
                .with("bogus", "x"),
        );
        let tiers = attribute_tiers(&extra);
        assert_eq!(tiers.len(), 2);
        assert_eq!(tiers["mana_pool"], 3);
        assert_eq!(tiers["veteran"], 5);
    }
}
