//! Snapshot Persistence Module
//!
//! Stores one lbin snapshot per weekday, a rolling weekly average, and a
//! marker recording which weekday was written last. `save_pass` blends a
//! finished pass into that history.

mod file_store;

pub use file_store::{DirLock, FileSnapshotStore};

use anyhow::Result;
use chrono::{Datelike, Local};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

use crate::pricing::{merge_weighted, ItemIndex};

/// Weight given to an earlier run of the same day
pub const SAME_DAY_WEIGHT: u32 = 2;

/// Snapshot storage errors that callers may want to match on
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Snapshot directory is locked by another pass: {0}")]
    Locked(String),

    #[error("Invalid weekday {0}, expected 0..=6")]
    InvalidDay(u8),
}

/// A persisted snapshot slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Bucket {
    /// Weekday bucket, 0 = Monday
    Day(u8),
    /// Weekly average
    Average,
}

impl Bucket {
    pub fn file_name(&self) -> String {
        match self {
            Bucket::Day(day) => format!("auction_{}.json", day),
            Bucket::Average => "auction.json".to_string(),
        }
    }

    pub fn from_file_name(name: &str) -> Option<Self> {
        let stem = name.strip_suffix(".json")?;
        if stem == "auction" {
            return Some(Bucket::Average);
        }
        let day: u8 = stem.strip_prefix("auction_")?.parse().ok()?;
        (day <= 6).then_some(Bucket::Day(day))
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bucket::Day(day) => write!(f, "day-{}", day),
            Bucket::Average => write!(f, "average"),
        }
    }
}

/// Storage for snapshot buckets and the last-written-day marker
pub trait SnapshotStore {
    fn load(&self, bucket: Bucket) -> Result<Option<ItemIndex>>;

    fn store(&mut self, bucket: Bucket, index: &ItemIndex) -> Result<()>;

    fn list_buckets(&self) -> Result<BTreeSet<Bucket>>;

    fn last_day(&self) -> Result<Option<u8>>;

    fn set_last_day(&mut self, day: u8) -> Result<()>;
}

/// Today's weekday index, 0 = Monday
pub fn today() -> u8 {
    Local::now().weekday().num_days_from_monday() as u8
}

/// Blend a finished pass into the stored history and persist it.
///
/// 1. A re-run on the same weekday is blended with that day's earlier
///    snapshot at weight 2, and the result replaces the day bucket.
/// 2. Every other weekday bucket is folded in with a weight that grows by
///    one per bucket, starting at 2.
/// 3. The result is written to the average bucket and returned.
///
/// The day marker is written last, so a failed bucket write never makes
/// the next run blend with a stale day bucket.
pub fn save_pass<S>(store: &mut S, mut items: ItemIndex, today: u8) -> Result<ItemIndex>
where
    S: SnapshotStore + ?Sized,
{
    if today > 6 {
        return Err(StoreError::InvalidDay(today).into());
    }

    let previous_day = store.last_day()?;

    if previous_day == Some(today) {
        if let Some(earlier) = store.load(Bucket::Day(today))? {
            merge_weighted(&mut items, &earlier, SAME_DAY_WEIGHT);
            info!(day = today, items = items.len(), "Blended same-day snapshot");
        }
    }

    store.store(Bucket::Day(today), &items)?;

    let mut count = 1u32;
    for bucket in store.list_buckets()? {
        let Bucket::Day(day) = bucket else {
            continue;
        };
        if day == today {
            continue;
        }
        let Some(history) = store.load(bucket)? else {
            continue;
        };
        count += 1;
        merge_weighted(&mut items, &history, count);
        debug!(bucket = %bucket, weight = count, "Folded historical snapshot");
    }

    store.store(Bucket::Average, &items)?;
    store.set_last_day(today)?;
    info!(
        day = today,
        buckets_folded = count - 1,
        items = items.len(),
        "Weekly average updated"
    );
    Ok(items)
}

/// In-memory store, used by tests and dry runs
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    buckets: BTreeMap<Bucket, ItemIndex>,
    day: Option<u8>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, bucket: Bucket) -> Option<&ItemIndex> {
        self.buckets.get(&bucket)
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self, bucket: Bucket) -> Result<Option<ItemIndex>> {
        Ok(self.buckets.get(&bucket).cloned())
    }

    fn store(&mut self, bucket: Bucket, index: &ItemIndex) -> Result<()> {
        self.buckets.insert(bucket, index.clone());
        Ok(())
    }

    fn list_buckets(&self) -> Result<BTreeSet<Bucket>> {
        Ok(self.buckets.keys().copied().collect())
    }

    fn last_day(&self) -> Result<Option<u8>> {
        Ok(self.day)
    }

    fn set_last_day(&mut self, day: u8) -> Result<()> {
        self.day = Some(day);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::ItemPriceRecord;
    use crate::types::ItemIdentity;

    fn lbin_index(pairs: &[(&str, f64)]) -> ItemIndex {
        pairs
            .iter()
            .map(|(id, lbin)| (ItemIdentity::new(*id), ItemPriceRecord::with_lbin(*lbin)))
            .collect()
    }

    fn lbin(index: &ItemIndex, id: &str) -> Option<f64> {
        index.get(id).and_then(|r| r.lbin)
    }

    #[test]
    fn bucket_file_names_round_trip() {
        for bucket in [Bucket::Day(0), Bucket::Day(6), Bucket::Average] {
            assert_eq!(Bucket::from_file_name(&bucket.file_name()), Some(bucket));
        }
        assert_eq!(Bucket::from_file_name("auction_7.json"), None);
        assert_eq!(Bucket::from_file_name("day"), None);
        assert_eq!(Bucket::from_file_name("auction_1.json.tmp"), None);
    }

    #[test]
    fn first_pass_writes_day_and_average() {
        let mut store = MemorySnapshotStore::new();
        let saved = save_pass(&mut store, lbin_index(&[("AOTE", 100.0)]), 2).unwrap();

        assert_eq!(lbin(&saved, "AOTE"), Some(100.0));
        assert_eq!(store.get(Bucket::Day(2)), Some(&saved));
        assert_eq!(store.get(Bucket::Average), Some(&saved));
        assert_eq!(store.last_day().unwrap(), Some(2));
    }

    #[test]
    fn same_day_rerun_blends_with_weight_two() {
        let mut store = MemorySnapshotStore::new();
        save_pass(&mut store, lbin_index(&[("AOTE", 100.0)]), 3).unwrap();
        save_pass(&mut store, lbin_index(&[("AOTE", 400.0)]), 3).unwrap();

        // (400 + 100 * 2) / 3
        let day = store.get(Bucket::Day(3)).unwrap();
        assert_eq!(lbin(day, "AOTE"), Some(200.0));
    }

    #[test]
    fn new_day_does_not_blend_with_stale_same_weekday_bucket() {
        let mut store = MemorySnapshotStore::new();
        save_pass(&mut store, lbin_index(&[("AOTE", 100.0)]), 1).unwrap();
        save_pass(&mut store, lbin_index(&[("AOTE", 50.0)]), 2).unwrap();

        // Day 2 is new: its bucket holds the raw pass.
        assert_eq!(lbin(store.get(Bucket::Day(2)).unwrap(), "AOTE"), Some(50.0));
        // Average folds day 1 at weight 2: (50 + 100 * 2) / 3
        let average = store.get(Bucket::Average).unwrap();
        assert!((lbin(average, "AOTE").unwrap() - 250.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn other_days_fold_with_increasing_weights() {
        let mut store = MemorySnapshotStore::new();
        store.store(Bucket::Day(0), &lbin_index(&[("X", 30.0)])).unwrap();
        store.store(Bucket::Day(1), &lbin_index(&[("X", 60.0)])).unwrap();
        store.store(Bucket::Average, &lbin_index(&[("X", 1e9)])).unwrap();
        store.set_last_day(1).unwrap();

        let saved = save_pass(&mut store, lbin_index(&[("X", 0.0)]), 4).unwrap();

        // Day 0 at weight 2: (0 + 30*2)/3 = 20; day 1 at weight 3: (20 + 60*3)/4 = 50.
        // The previous average is not folded in.
        assert_eq!(lbin(&saved, "X"), Some(50.0));
        assert_eq!(lbin(store.get(Bucket::Day(4)).unwrap(), "X"), Some(0.0));
    }

    #[test]
    fn identities_only_in_history_are_carried() {
        let mut store = MemorySnapshotStore::new();
        store.store(Bucket::Day(5), &lbin_index(&[("OLD", 9.0)])).unwrap();
        let saved = save_pass(&mut store, lbin_index(&[("NEW", 1.0)]), 0).unwrap();
        assert_eq!(lbin(&saved, "OLD"), Some(9.0));
        assert_eq!(lbin(&saved, "NEW"), Some(1.0));
    }

    /// Memory store whose next write to one bucket fails
    struct FailingStore {
        inner: MemorySnapshotStore,
        fail_on: Option<Bucket>,
    }

    impl SnapshotStore for FailingStore {
        fn load(&self, bucket: Bucket) -> Result<Option<ItemIndex>> {
            self.inner.load(bucket)
        }

        fn store(&mut self, bucket: Bucket, index: &ItemIndex) -> Result<()> {
            if self.fail_on == Some(bucket) {
                self.fail_on = None;
                anyhow::bail!("disk full");
            }
            self.inner.store(bucket, index)
        }

        fn list_buckets(&self) -> Result<BTreeSet<Bucket>> {
            self.inner.list_buckets()
        }

        fn last_day(&self) -> Result<Option<u8>> {
            self.inner.last_day()
        }

        fn set_last_day(&mut self, day: u8) -> Result<()> {
            self.inner.set_last_day(day)
        }
    }

    #[test]
    fn failed_day_write_leaves_marker_untouched() {
        let mut inner = MemorySnapshotStore::new();
        inner.store(Bucket::Day(2), &lbin_index(&[("AOTE", 1000.0)])).unwrap();
        inner.set_last_day(1).unwrap();
        let mut store = FailingStore {
            inner,
            fail_on: Some(Bucket::Day(2)),
        };

        assert!(save_pass(&mut store, lbin_index(&[("AOTE", 400.0)]), 2).is_err());
        assert_eq!(store.last_day().unwrap(), Some(1));

        // The retry is still a new day: last week's bucket is replaced, not blended.
        save_pass(&mut store, lbin_index(&[("AOTE", 100.0)]), 2).unwrap();
        let day = store.inner.get(Bucket::Day(2)).unwrap();
        assert_eq!(lbin(day, "AOTE"), Some(100.0));
        assert_eq!(store.last_day().unwrap(), Some(2));
    }

    #[test]
    fn failed_average_write_leaves_marker_untouched() {
        let mut store = FailingStore {
            inner: MemorySnapshotStore::new(),
            fail_on: Some(Bucket::Average),
        };
        assert!(save_pass(&mut store, lbin_index(&[("AOTE", 10.0)]), 4).is_err());
        assert_eq!(store.last_day().unwrap(), None);
    }

    #[test]
    fn rejects_out_of_range_day() {
        let mut store = MemorySnapshotStore::new();
        assert!(save_pass(&mut store, ItemIndex::new(), 7).is_err());
        assert_eq!(store.last_day().unwrap(), None);
    }
}
