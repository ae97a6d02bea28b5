//! Marketplace price lookup.
//!
//! The pipeline only ever reads the local price cache; this module is the
//! collaborator that keeps the cache warm. A lookup service fetches
//! variant prices per store from the marketplace API with bounded retry
//! and a hard timeout, and writes them through to the store. A refresh
//! failure degrades to a stale cache, never a failed import.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::storage::InventoryDb;

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 250;

#[async_trait]
pub trait PriceLookup: Send + Sync {
    /// Current variant prices for one store, keyed by SKU.
    async fn fetch_prices(&self, store_id: &str) -> Result<HashMap<String, f64>>;
}

#[derive(Debug, Deserialize)]
struct PriceRow {
    sku: String,
    price: f64,
}

#[derive(Debug, Deserialize)]
struct PricesResponse {
    #[serde(default)]
    prices: Vec<PriceRow>,
}

/// HTTP-backed lookup against the marketplace price endpoint.
pub struct HttpPriceClient {
    http: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpPriceClient {
    pub fn new(http: Client, base_url: String, timeout: Duration) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    async fn get_once(&self, store_id: &str) -> Result<HashMap<String, f64>> {
        let url = format!("{}/stores/{}/variant-prices", self.base_url, store_id);
        let resp = self
            .http
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .context("marketplace price request")?;

        let status = resp.status();
        if !status.is_success() {
            bail!("marketplace price endpoint returned HTTP {}", status);
        }

        let parsed: PricesResponse = resp
            .json()
            .await
            .context("marketplace price response parse")?;
        Ok(parsed
            .prices
            .into_iter()
            .map(|row| (row.sku, row.price))
            .collect())
    }
}

#[async_trait]
impl PriceLookup for HttpPriceClient {
    async fn fetch_prices(&self, store_id: &str) -> Result<HashMap<String, f64>> {
        let mut backoff = INITIAL_BACKOFF_MS;
        let mut last_error: Option<anyhow::Error> = None;

        for attempt in 1..=MAX_RETRIES {
            match self.get_once(store_id).await {
                Ok(prices) => {
                    debug!(store = store_id, count = prices.len(), "price fetch ok");
                    return Ok(prices);
                }
                Err(e) => {
                    warn!(store = store_id, attempt, "price fetch failed: {:#}", e);
                    last_error = Some(e);
                }
            }
            if attempt < MAX_RETRIES {
                sleep(Duration::from_millis(backoff)).await;
                backoff *= 2;
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("price fetch failed")))
    }
}

/// Pull fresh prices for one store and write them through to the cache.
/// Returns how many SKUs were refreshed; failures leave the cache stale.
pub async fn refresh_price_cache(
    db: &InventoryDb,
    lookup: &dyn PriceLookup,
    store_id: &str,
) -> Result<usize> {
    let prices = lookup.fetch_prices(store_id).await?;
    for (sku, price) in &prices {
        db.upsert_marketplace_price(store_id, sku, *price)?;
    }
    info!(store = store_id, refreshed = prices.len(), "price cache refreshed");
    Ok(prices.len())
}

/// Refresh the cache for every store referenced by a source, skipping
/// stores whose refresh fails.
pub async fn refresh_all_store_caches(db: &InventoryDb, lookup: &dyn PriceLookup) -> usize {
    let sources = match db.list_sources() {
        Ok(s) => s,
        Err(e) => {
            warn!("could not list sources for price refresh: {:#}", e);
            return 0;
        }
    };

    let mut stores: Vec<String> = sources
        .into_iter()
        .filter_map(|s| s.store_id)
        .collect();
    stores.sort();
    stores.dedup();

    let mut refreshed = 0;
    for store_id in stores {
        match refresh_price_cache(db, lookup, &store_id).await {
            Ok(n) => refreshed += n,
            Err(e) => warn!(store = %store_id, "price refresh skipped: {:#}", e),
        }
    }
    refreshed
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedPrices(HashMap<String, f64>);

    #[async_trait]
    impl PriceLookup for FixedPrices {
        async fn fetch_prices(&self, _store_id: &str) -> Result<HashMap<String, f64>> {
            Ok(self.0.clone())
        }
    }

    struct FailingLookup;

    #[async_trait]
    impl PriceLookup for FailingLookup {
        async fn fetch_prices(&self, _store_id: &str) -> Result<HashMap<String, f64>> {
            bail!("marketplace down")
        }
    }

    #[tokio::test]
    async fn refresh_writes_through_to_cache() {
        let db = InventoryDb::in_memory().unwrap();
        let lookup = FixedPrices(
            [("A-Red-8".to_string(), 599.0), ("B-Navy-6".to_string(), 249.0)].into(),
        );

        let refreshed = refresh_price_cache(&db, &lookup, "store1").await.unwrap();
        assert_eq!(refreshed, 2);
        assert_eq!(db.marketplace_price("store1", "A-Red-8").unwrap(), Some(599.0));
    }

    #[tokio::test]
    async fn failed_refresh_leaves_cache_stale() {
        let db = InventoryDb::in_memory().unwrap();
        db.upsert_marketplace_price("store1", "A-Red-8", 500.0).unwrap();

        assert!(refresh_price_cache(&db, &FailingLookup, "store1").await.is_err());
        assert_eq!(db.marketplace_price("store1", "A-Red-8").unwrap(), Some(500.0));
    }
}
