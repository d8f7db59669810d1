//! Attribute Price Extractor
//!
//! Every attribute tier doubles the value of the roll, so a listing priced
//! `p` with an attribute at tier `t` implies a tier-1 price of
//! `p / 2^(t-1)`. Listings carrying two or more low-tier attributes are
//! also priced as a bundle under a canonical combo key.

use std::collections::{BTreeMap, BTreeSet};

use crate::types::AttributeTiers;

/// Highest tier an attribute may have for its listing to count as a combo
pub const DEFAULT_COMBO_MAX_TIER: i32 = 5;

/// Which attributes are priced and when a bundle is tracked
#[derive(Debug, Clone, PartialEq)]
pub struct AttributePolicy {
    /// Combo pricing requires every tier to be at most this value
    pub combo_max_tier: i32,
    /// When set, only these attributes are priced
    pub allow_list: Option<BTreeSet<String>>,
}

impl Default for AttributePolicy {
    fn default() -> Self {
        Self {
            combo_max_tier: DEFAULT_COMBO_MAX_TIER,
            allow_list: None,
        }
    }
}

impl AttributePolicy {
    pub fn with_allow_list<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allow_list = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn allows(&self, attribute: &str) -> bool {
        self.allow_list
            .as_ref()
            .map_or(true, |allowed| allowed.contains(attribute))
    }
}

/// Attribute pricing derived from one listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributePrices {
    /// Implied tier-1 price per attribute
    pub per_attribute: BTreeMap<String, f64>,
    /// Space-joined sorted attribute names, present only for combo-eligible listings
    pub combo_key: Option<String>,
}

impl AttributePrices {
    pub fn is_empty(&self) -> bool {
        self.per_attribute.is_empty() && self.combo_key.is_none()
    }

    pub fn combo_eligible(&self) -> bool {
        self.combo_key.is_some()
    }
}

/// Implied tier-1 price of an attribute rolled at `tier`
pub fn unit_price(price: f64, tier: i32) -> f64 {
    price / 2f64.powi(tier.saturating_sub(1))
}

/// Price every attribute of a listing and derive its combo key.
pub fn extract(tiers: &AttributeTiers, price: f64, policy: &AttributePolicy) -> AttributePrices {
    let mut per_attribute = BTreeMap::new();
    let mut low_tier_only = true;

    for (name, &tier) in tiers.iter().filter(|(name, _)| policy.allows(name)) {
        if tier > policy.combo_max_tier {
            low_tier_only = false;
        }
        per_attribute.insert(name.clone(), unit_price(price, tier));
    }

    // BTreeMap keys are already sorted, so the key is canonical.
    let combo_key = (low_tier_only && per_attribute.len() >= 2).then(|| {
        per_attribute
            .keys()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    });

    AttributePrices {
        per_attribute,
        combo_key,
    }
}
