//! Price Aggregator
//!
//! `ItemIndex` holds one `ItemPriceRecord` per item identity and only ever
//! lowers the minimums it stores while a pass is being folded in.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::attributes::{extract, AttributePolicy, AttributePrices};
use crate::item::ItemMeta;
use crate::types::ItemIdentity;

/// Armor families whose attribute floors are shared with the plain piece
/// (`FERVOR_HELMET` -> `HELMET`).
pub const ARMOR_FAMILIES: [&str; 6] = ["FERVOR", "AURORA", "TERROR", "CRIMSON", "HOLLOW", "MOLTEN"];

/// Price floors tracked for one item identity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemPriceRecord {
    /// Lowest BIN seen. `None` for piece records only reached through
    /// family propagation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lbin: Option<f64>,
    /// Lowest implied tier-1 price per attribute
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, f64>,
    /// Lowest price per attribute bundle
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attribute_combos: BTreeMap<String, f64>,
}

impl ItemPriceRecord {
    pub fn with_lbin(lbin: f64) -> Self {
        Self {
            lbin: Some(lbin),
            ..Self::default()
        }
    }

    pub fn observe_price(&mut self, price: f64) {
        self.lbin = Some(match self.lbin {
            Some(current) => current.min(price),
            None => price,
        });
    }

    pub fn lower_attribute(&mut self, attribute: &str, unit_price: f64) {
        lower_entry(&mut self.attributes, attribute, unit_price);
    }

    pub fn lower_combo(&mut self, combo_key: &str, price: f64) {
        lower_entry(&mut self.attribute_combos, combo_key, price);
    }
}

fn lower_entry(map: &mut BTreeMap<String, f64>, key: &str, value: f64) {
    match map.get_mut(key) {
        Some(current) => {
            if value < *current {
                *current = value;
            }
        }
        None => {
            map.insert(key.to_string(), value);
        }
    }
}

/// Piece identity sharing attribute floors with a family item, if any
pub fn family_piece(identity: &ItemIdentity) -> Option<ItemIdentity> {
    let mut segments = identity.segments();
    let family = segments.next()?;
    let piece = segments.next().filter(|piece| !piece.is_empty())?;
    ARMOR_FAMILIES
        .contains(&family)
        .then(|| ItemIdentity::new(piece))
}

/// Lowest-BIN index: item identity -> price floors
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemIndex {
    items: BTreeMap<ItemIdentity, ItemPriceRecord>,
}

impl ItemIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, identity: &str) -> Option<&ItemPriceRecord> {
        self.items.get(identity)
    }

    pub fn get_mut(&mut self, identity: &str) -> Option<&mut ItemPriceRecord> {
        self.items.get_mut(identity)
    }

    pub fn insert(&mut self, identity: ItemIdentity, record: ItemPriceRecord) {
        self.items.insert(identity, record);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ItemIdentity, &ItemPriceRecord)> {
        self.items.iter()
    }

    fn record_mut(&mut self, identity: &ItemIdentity) -> &mut ItemPriceRecord {
        self.items.entry(identity.clone()).or_default()
    }

    /// Fold one observed listing into the index.
    ///
    /// Minimums are only ever lowered. Attribute prices of armor family
    /// items are also applied to the shared piece identity; the reverse
    /// never happens and combos stay on the family item.
    pub fn apply(&mut self, identity: &ItemIdentity, price: f64, prices: &AttributePrices) {
        let record = self.record_mut(identity);
        record.observe_price(price);
        for (attribute, &unit) in &prices.per_attribute {
            record.lower_attribute(attribute, unit);
        }
        if let Some(combo_key) = &prices.combo_key {
            record.lower_combo(combo_key, price);
        }

        if prices.per_attribute.is_empty() {
            return;
        }
        if let Some(piece) = family_piece(identity) {
            let piece_record = self.record_mut(&piece);
            for (attribute, &unit) in &prices.per_attribute {
                piece_record.lower_attribute(attribute, unit);
            }
        }
    }

    /// Price a resolved listing and fold it in.
    pub fn observe_listing(&mut self, meta: &ItemMeta, price: f64, policy: &AttributePolicy) {
        let prices = extract(&meta.tiers, price, policy);
        self.apply(&meta.identity, price, &prices);
    }
}

impl FromIterator<(ItemIdentity, ItemPriceRecord)> for ItemIndex {
    fn from_iter<T: IntoIterator<Item = (ItemIdentity, ItemPriceRecord)>>(iter: T) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ItemIndex {
    type Item = (ItemIdentity, ItemPriceRecord);
    type IntoIter = std::collections::btree_map::IntoIter<ItemIdentity, ItemPriceRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
