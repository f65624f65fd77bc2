//! Binance REST Feed - Fallback Polling Price Source
//!
//! Fetches `/api/v3/ticker/price?symbol=...` once per poll. Used only
//! while the WebSocket feed for a symbol is down; the polling loop
//! itself is provided by the `PollingFeed` port.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::domain::price::TickerFrame;
use crate::ports::price_feed::{FeedError, PollingFeed};

/// Response body of the symbol price ticker endpoint.
#[derive(Debug, Deserialize)]
struct PriceTickerResponse {
    /// Price as a decimal string.
    price: String,
}

/// Binance REST price ticker client.
#[derive(Debug, Clone)]
pub struct BinanceRestFeed {
    /// Underlying HTTP client (carries the request timeout).
    http: Client,
    /// Base URL, e.g. `https://api.binance.com`.
    rest_base_url: String,
}

impl BinanceRestFeed {
    /// Create a REST feed with the given base URL and request timeout.
    pub fn new(rest_base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(2)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            rest_base_url: rest_base_url.into(),
        })
    }

    fn ticker_url(&self) -> String {
        format!(
            "{}/api/v3/ticker/price",
            self.rest_base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl PollingFeed for BinanceRestFeed {
    fn name(&self) -> &'static str {
        "binance_rest"
    }

    async fn fetch_price(&self, symbol: &str) -> Result<f64, FeedError> {
        let response = self
            .http
            .get(self.ticker_url())
            .query(&[("symbol", symbol)])
            .send()
            .await
            .map_err(|e| FeedError::Request(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FeedError::Status(status.as_u16()));
        }

        let body: PriceTickerResponse = response.json().await.map_err(|e| {
            debug!(symbol, error = %e, "Malformed price ticker response");
            FeedError::Parse
        })?;

        match TickerFrame::from_decimal_str(&body.price) {
            TickerFrame::Price(price) => Ok(price),
            TickerFrame::Unparseable => Err(FeedError::Parse),
        }
    }
}
