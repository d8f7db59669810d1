//! Auction API Types - payloads of the paginated auctions endpoint

use serde::{Deserialize, Serialize};

/// One page of active auctions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionPage {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub page: u32,
    pub total_pages: u32,
    #[serde(default)]
    pub total_auctions: u64,
    /// Epoch milliseconds of the upstream cache refresh
    #[serde(default)]
    pub last_updated: i64,
    #[serde(default)]
    pub auctions: Vec<Listing>,
}

/// A single auction listing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Listing {
    #[serde(default)]
    pub uuid: String,
    /// Buy-it-now listing (as opposed to a bidding auction)
    #[serde(default)]
    pub bin: bool,
    #[serde(default)]
    pub starting_bid: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    /// base64(gzip(NBT)) item record
    pub item_bytes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_name: Option<String>,
}

impl Listing {
    /// Price the listing sells for: `price` when given, else the starting bid
    pub fn observed_price(&self) -> f64 {
        self.price.unwrap_or(self.starting_bid)
    }
}
