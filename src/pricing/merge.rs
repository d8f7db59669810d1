//! Snapshot Merger
//!
//! Blends a historical snapshot into the current one with a count-weighted
//! running average: `(target + source * w) / (1 + w)`.

use std::collections::BTreeMap;

use super::index::{ItemIndex, ItemPriceRecord};

pub fn weighted_average(target: f64, source: f64, weight: u32) -> f64 {
    let weight = f64::from(weight);
    (target + source * weight) / (1.0 + weight)
}

/// Merge `source` into `target`, weighting `source` by `weight` (at least 1).
///
/// Identities missing from `target` are copied verbatim. For shared
/// identities every field present on both sides is averaged; fields present
/// on one side only are kept as they are.
pub fn merge_weighted(target: &mut ItemIndex, source: &ItemIndex, weight: u32) {
    let weight = weight.max(1);
    for (identity, incoming) in source.iter() {
        match target.get_mut(identity.as_str()) {
            Some(existing) => merge_record(existing, incoming, weight),
            None => target.insert(identity.clone(), incoming.clone()),
        }
    }
}

fn merge_record(existing: &mut ItemPriceRecord, incoming: &ItemPriceRecord, weight: u32) {
    existing.lbin = match (existing.lbin, incoming.lbin) {
        (Some(current), Some(other)) => Some(weighted_average(current, other, weight)),
        (current, other) => current.or(other),
    };
    merge_prices(&mut existing.attributes, &incoming.attributes, weight);
    merge_prices(&mut existing.attribute_combos, &incoming.attribute_combos, weight);
}

fn merge_prices(target: &mut BTreeMap<String, f64>, source: &BTreeMap<String, f64>, weight: u32) {
    for (key, &value) in source {
        target
            .entry(key.clone())
            .and_modify(|current| *current = weighted_average(*current, value, weight))
            .or_insert(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ItemIdentity;

    fn record(lbin: Option<f64>, attributes: &[(&str, f64)], combos: &[(&str, f64)]) -> ItemPriceRecord {
        ItemPriceRecord {
            lbin,
            attributes: attributes.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            attribute_combos: combos.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        }
    }

    fn index(entries: Vec<(&str, ItemPriceRecord)>) -> ItemIndex {
        entries
            .into_iter()
            .map(|(id, r)| (ItemIdentity::new(id), r))
            .collect()
    }

    #[test]
    fn weighted_lbin_average() {
        let mut target = index(vec![("HYPERION", ItemPriceRecord::with_lbin(100.0))]);
        let source = index(vec![("HYPERION", ItemPriceRecord::with_lbin(200.0))]);
        merge_weighted(&mut target, &source, 3);
        assert_eq!(target.get("HYPERION").unwrap().lbin, Some(175.0));
    }

    #[test]
    fn absent_identity_is_copied_verbatim() {
        let mut target = ItemIndex::new();
        let incoming = record(Some(10.0), &[("veteran", 5.0)], &[("a b", 9.0)]);
        let source = index(vec![("BOOTS", incoming.clone())]);
        merge_weighted(&mut target, &source, 7);
        assert_eq!(target.get("BOOTS"), Some(&incoming));
    }

    #[test]
    fn keys_are_unioned_and_shared_keys_averaged() {
        let mut target = index(vec![(
            "HELMET",
            record(None, &[("a", 10.0), ("b", 40.0)], &[("a b", 100.0)]),
        )]);
        let source = index(vec![(
            "HELMET",
            record(Some(60.0), &[("b", 10.0), ("c", 7.0)], &[("a c", 50.0)]),
        )]);
        merge_weighted(&mut target, &source, 2);

        let merged = target.get("HELMET").unwrap();
        assert_eq!(merged.lbin, Some(60.0));
        assert_eq!(merged.attributes["a"], 10.0);
        assert_eq!(merged.attributes["b"], 20.0);
        assert_eq!(merged.attributes["c"], 7.0);
        assert_eq!(merged.attribute_combos["a b"], 100.0);
        assert_eq!(merged.attribute_combos["a c"], 50.0);
    }

    #[test]
    fn target_only_identities_are_untouched() {
        let mut target = index(vec![("AOTE", ItemPriceRecord::with_lbin(5.0))]);
        merge_weighted(&mut target, &ItemIndex::new(), 4);
        assert_eq!(target.get("AOTE").unwrap().lbin, Some(5.0));
    }

    #[test]
    fn zero_weight_is_treated_as_one() {
        let mut target = index(vec![("X", ItemPriceRecord::with_lbin(100.0))]);
        let source = index(vec![("X", ItemPriceRecord::with_lbin(300.0))]);
        merge_weighted(&mut target, &source, 0);
        assert_eq!(target.get("X").unwrap().lbin, Some(200.0));
    }
}
