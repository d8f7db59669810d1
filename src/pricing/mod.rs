//! Pricing engine
//!
//! Per-listing attribute pricing, the running lowest-BIN index and the
//! weighted merge used to blend snapshots over time.

mod attributes;
mod index;
mod merge;

pub use attributes::{extract, unit_price, AttributePolicy, AttributePrices, DEFAULT_COMBO_MAX_TIER};
pub use index::{family_piece, ItemIndex, ItemPriceRecord, ARMOR_FAMILIES};
pub use merge::{merge_weighted, weighted_average};
