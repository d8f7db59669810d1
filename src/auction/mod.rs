//! Auction ingestion
//!
//! Walks every page of the auctions endpoint and folds each BIN listing
//! into a fresh `ItemIndex`. A failed page aborts the pass and drops what
//! was collected so far; a listing that fails to decode is logged, counted
//! and skipped.

mod client;
mod types;

pub use client::AuctionClient;
pub use types::{AuctionPage, Listing};

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::item;
use crate::nbt;
use crate::pricing::{AttributePolicy, ItemIndex};
use crate::types::ItemIdentity;

/// Anything that can serve auction pages by number
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, page: u32) -> Result<AuctionPage>;
}

/// What happened to a single listing
#[derive(Debug, Clone, PartialEq)]
pub enum ListingOutcome {
    Indexed(ItemIdentity),
    /// Bidding auction, not a buy-it-now
    NotBin,
    DecodeFailed,
    Malformed,
}

/// Counters for one pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassStats {
    pub pages: u32,
    pub listings: u64,
    pub bin_listings: u64,
    pub indexed: u64,
    pub decode_failures: u64,
    pub malformed_listings: u64,
}

impl PassStats {
    pub fn record(&mut self, outcome: &ListingOutcome) {
        self.listings += 1;
        match outcome {
            ListingOutcome::NotBin => return,
            ListingOutcome::Indexed(_) => self.indexed += 1,
            ListingOutcome::DecodeFailed => self.decode_failures += 1,
            ListingOutcome::Malformed => self.malformed_listings += 1,
        }
        self.bin_listings += 1;
    }

    pub fn skipped(&self) -> u64 {
        self.decode_failures + self.malformed_listings
    }
}

/// Decode one listing and fold it into `index`.
pub fn ingest_listing(
    index: &mut ItemIndex,
    listing: &Listing,
    policy: &AttributePolicy,
) -> ListingOutcome {
    if !listing.bin {
        return ListingOutcome::NotBin;
    }

    let blob = match nbt::decode_item_bytes(&listing.item_bytes) {
        Ok(blob) => blob,
        Err(e) => {
            debug!(uuid = %listing.uuid, error = %e, "Skipping undecodable listing");
            return ListingOutcome::DecodeFailed;
        }
    };

    let meta = match item::inspect(&blob) {
        Ok(meta) => meta,
        Err(e) => {
            debug!(uuid = %listing.uuid, error = %e, "Skipping malformed listing");
            return ListingOutcome::Malformed;
        }
    };

    let price = listing.observed_price();
    if !price.is_finite() {
        debug!(uuid = %listing.uuid, price, "Skipping listing with non-finite price");
        return ListingOutcome::Malformed;
    }

    index.observe_listing(&meta, price, policy);
    ListingOutcome::Indexed(meta.identity)
}

/// Run one full pass over every page, starting at page 0.
pub async fn run_pass<S>(source: &S, policy: &AttributePolicy) -> Result<(ItemIndex, PassStats)>
where
    S: PageSource + ?Sized,
{
    let mut index = ItemIndex::new();
    let mut stats = PassStats::default();
    let mut page = 0u32;

    loop {
        let data = match source.fetch_page(page).await {
            Ok(data) => data,
            Err(e) => {
                error!(page, error = %e, "Auction page fetch failed, aborting pass");
                return Err(e);
            }
        };
        stats.pages += 1;

        for listing in &data.auctions {
            let outcome = ingest_listing(&mut index, listing, policy);
            stats.record(&outcome);
        }

        debug!(
            page = page + 1,
            total_pages = data.total_pages,
            items = index.len(),
            "Auction page processed"
        );

        page += 1;
        if page >= data.total_pages {
            break;
        }
    }

    info!(
        pages = stats.pages,
        listings = stats.listings,
        bin_listings = stats.bin_listings,
        indexed = stats.indexed,
        decode_failures = stats.decode_failures,
        malformed_listings = stats.malformed_listings,
        items = index.len(),
        "Auction pass complete"
    );
    Ok((index, stats))
}
