//! Binance WebSocket Feed - Primary Per-Symbol Price Source
//!
//! Opens one `<symbol>@ticker` stream per session and forwards the
//! last-trade price (`c` field) of every ticker frame. Frames that do
//! not carry a price are skipped; any transport error or close ends
//! the session so the symbol stream can fail over.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::domain::price::{PriceSample, TickerFrame};
use crate::ports::price_feed::{FeedError, StreamingFeed};

/// Upper bound on TCP connect plus WebSocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Binance 24hr ticker payload. Only the last price is used.
#[derive(Debug, Deserialize)]
struct TickerMsg {
    /// Last price as a decimal string.
    #[serde(rename = "c")]
    last_price: String,
}

/// Parse one text frame from a ticker stream.
pub fn parse_ticker(text: &str) -> TickerFrame {
    serde_json::from_str::<TickerMsg>(text)
        .map_or(TickerFrame::Unparseable, |msg| {
            TickerFrame::from_decimal_str(&msg.last_price)
        })
}

/// Binance real-time ticker feed via WebSocket.
#[derive(Debug, Clone)]
pub struct BinanceStreamFeed {
    /// Base URL, e.g. `wss://stream.binance.com:9443`.
    ws_base_url: String,
    connect_timeout: Duration,
}

impl BinanceStreamFeed {
    /// Create a feed against the given WebSocket base URL.
    pub fn new(ws_base_url: impl Into<String>) -> Self {
        Self {
            ws_base_url: ws_base_url.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Bound the connect and handshake phase of each session.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Stream URL for one symbol. Binance stream names are lowercase.
    pub fn stream_url(&self, symbol: &str) -> String {
        format!(
            "{}/ws/{}@ticker",
            self.ws_base_url.trim_end_matches('/'),
            symbol.to_lowercase()
        )
    }
}

#[async_trait]
impl StreamingFeed for BinanceStreamFeed {
    fn name(&self) -> &'static str {
        "binance_ws"
    }

    #[instrument(skip(self, out, cancel), fields(source = "binance_ws"))]
    async fn stream(
        &self,
        symbol: &str,
        out: &mpsc::Sender<PriceSample>,
        cancel: &CancellationToken,
    ) -> Result<(), FeedError> {
        let url = self.stream_url(symbol);

        let connected = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            connected = tokio::time::timeout(self.connect_timeout, connect_async(url.as_str())) => connected,
        };
        let (ws_stream, _) = match connected {
            Ok(Ok(established)) => established,
            Ok(Err(e)) => {
                return Err(FeedError::Connect {
                    url,
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                return Err(FeedError::Connect {
                    url,
                    reason: format!("handshake timed out after {:?}", self.connect_timeout),
                });
            }
        };

        let (mut write, mut read) = ws_stream.split();
        info!(url = %url, "Binance WebSocket connected");

        loop {
            let msg = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(());
                }
                msg = read.next() => msg,
            };

            match msg {
                Some(Ok(Message::Text(text))) => match parse_ticker(&text) {
                    TickerFrame::Price(price) => {
                        let sample = PriceSample {
                            symbol: symbol.to_string(),
                            price,
                        };
                        tokio::select! {
                            biased;
                            () = cancel.cancelled() => return Ok(()),
                            sent = out.send(sample) => {
                                sent.map_err(|_| FeedError::Downstream)?;
                            }
                        }
                    }
                    TickerFrame::Unparseable => {
                        debug!(len = text.len(), "Skipping non-price frame");
                    }
                },
                Some(Ok(Message::Ping(data))) => {
                    // Pong is queued automatically by tungstenite
                    debug!(len = data.len(), "Binance ping received");
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "Binance closed the stream");
                    return Err(FeedError::Closed);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(FeedError::Transport(e.to_string())),
                None => return Err(FeedError::Closed),
            }
        }
    }
}
