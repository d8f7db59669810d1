//! Auction REST API Client
//!
//! Fetches pages of `GET {base_url}?page=N`. No authentication, retry or
//! rate limiting: a failed request fails the page.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT},
    Client,
};
use std::time::Duration;
use tracing::debug;

use super::types::AuctionPage;
use super::PageSource;

/// HTTP client for the auctions endpoint
pub struct AuctionClient {
    client: Client,
    base_url: String,
}

impl AuctionClient {
    /// Create a new client
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .user_agent(concat!("auction-lbin/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl PageSource for AuctionClient {
    async fn fetch_page(&self, page: u32) -> Result<AuctionPage> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("page", page)])
            .send()
            .await
            .with_context(|| format!("Failed to fetch auction page {}", page))?;

        if !response.status().is_success() {
            bail!("Failed to get auction page {}: {}", page, response.status());
        }

        let data: AuctionPage = response
            .json()
            .await
            .with_context(|| format!("Failed to parse auction page {}", page))?;

        debug!(
            page,
            total_pages = data.total_pages,
            auctions = data.auctions.len(),
            "Fetched auction page"
        );
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = AuctionClient::new(
            "https://api.hypixel.net/v2/skyblock/auctions/",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            client.base_url(),
            "https://api.hypixel.net/v2/skyblock/auctions"
        );
    }
}
