//! Feed Adapter Tests - Binance WebSocket and REST Against Loopback Servers
//!
//! Spins up a local tungstenite server and a local axum server so the
//! adapters are exercised over real sockets without touching Binance.

use std::collections::HashMap;
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::Query;
use axum::http::StatusCode;
use axum::routing::get;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_test::{assert_err, assert_ok};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crypto_alerts::adapters::feeds::{BinanceRestFeed, BinanceStreamFeed};
use crypto_alerts::ports::price_feed::{FeedError, PollingFeed, StreamingFeed};

/// Serve one WebSocket connection that sends `frames` and then either
/// closes or stays open until the client leaves.
async fn ws_server(frames: Vec<String>, close_after: bool) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
        for frame in frames {
            ws.send(Message::Text(frame)).await.unwrap();
        }
        if close_after {
            let _ = ws.close(None).await;
        } else {
            while let Some(Ok(_)) = ws.next().await {}
        }
    });

    format!("ws://{addr}")
}

async fn rest_server(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn test_ws_forwards_prices_and_skips_other_frames() {
    let url = ws_server(
        vec![
            r#"{"result":null,"id":1}"#.to_string(),
            r#"{"e":"24hrTicker","s":"BTCUSDT","c":"67000.50"}"#.to_string(),
            "garbage".to_string(),
            r#"{"e":"24hrTicker","s":"BTCUSDT","c":"67001.25"}"#.to_string(),
        ],
        true,
    )
    .await;

    let feed = BinanceStreamFeed::new(url);
    let (tx, mut rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();

    let result = feed.stream("BTCUSDT", &tx, &cancel).await;
    assert!(matches!(result, Err(FeedError::Closed)), "got {result:?}");

    let first = rx.recv().await.unwrap();
    let second = rx.recv().await.unwrap();
    assert_eq!(first.symbol, "BTCUSDT");
    assert_eq!(first.price, 67_000.50);
    assert_eq!(second.price, 67_001.25);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_ws_returns_ok_on_cancel() {
    let url = ws_server(
        vec![r#"{"c":"3100.00"}"#.to_string()],
        false,
    )
    .await;

    let feed = BinanceStreamFeed::new(url);
    let (tx, mut rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();

    let session_cancel = cancel.clone();
    let session = tokio::spawn(async move { feed.stream("ETHUSDT", &tx, &session_cancel).await });

    assert_eq!(rx.recv().await.unwrap().price, 3100.0);
    cancel.cancel();

    let result = tokio::time::timeout(Duration::from_secs(5), session)
        .await
        .unwrap()
        .unwrap();
    assert_ok!(result);
}

#[tokio::test]
async fn test_ws_connect_failure_is_reported() {
    // Bind then drop to get a port nobody listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let feed = BinanceStreamFeed::new(format!("ws://{addr}"));
    let (tx, _rx) = mpsc::channel(8);
    let result = feed.stream("BTCUSDT", &tx, &CancellationToken::new()).await;

    let err = assert_err!(result);
    assert!(matches!(err, FeedError::Connect { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_ws_stalled_handshake_times_out() {
    // Accepts TCP but never answers the upgrade request.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
        drop(socket);
    });

    let feed = BinanceStreamFeed::new(format!("ws://{addr}"))
        .with_connect_timeout(Duration::from_millis(200));
    let (tx, _rx) = mpsc::channel(8);
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        feed.stream("BTCUSDT", &tx, &CancellationToken::new()),
    )
    .await
    .expect("stream must give up on a stalled handshake");

    let err = assert_err!(result);
    assert!(matches!(err, FeedError::Connect { .. }), "got {err:?}");
    server.abort();
}

#[tokio::test]
async fn test_rest_fetches_price_for_symbol() {
    let app = Router::new().route(
        "/api/v3/ticker/price",
        get(|Query(params): Query<HashMap<String, String>>| async move {
            match params.get("symbol").map(String::as_str) {
                Some("BTCUSDT") => Ok(Json(json!({"symbol": "BTCUSDT", "price": "64123.45000000"}))),
                _ => Err(StatusCode::BAD_REQUEST),
            }
        }),
    );
    let base = rest_server(app).await;

    let feed = assert_ok!(BinanceRestFeed::new(base, Duration::from_secs(2)));
    assert_eq!(assert_ok!(feed.fetch_price("BTCUSDT").await), 64_123.45);
    assert!(matches!(
        feed.fetch_price("DOGEUSDT").await,
        Err(FeedError::Status(400))
    ));
}

#[tokio::test]
async fn test_rest_rejects_malformed_bodies() {
    let app = Router::new()
        .route(
            "/bad-price/api/v3/ticker/price",
            get(|| async { Json(json!({"symbol": "BTCUSDT", "price": "abc"})) }),
        )
        .route(
            "/no-price/api/v3/ticker/price",
            get(|| async { Json(json!({"symbol": "BTCUSDT"})) }),
        );
    let base = rest_server(app).await;

    let bad_price = BinanceRestFeed::new(format!("{base}/bad-price"), Duration::from_secs(2)).unwrap();
    assert!(matches!(bad_price.fetch_price("BTCUSDT").await, Err(FeedError::Parse)));

    let no_price = BinanceRestFeed::new(format!("{base}/no-price"), Duration::from_secs(2)).unwrap();
    assert!(matches!(no_price.fetch_price("BTCUSDT").await, Err(FeedError::Parse)));
}

#[tokio::test]
async fn test_rest_poll_loop_delivers_until_cancelled() {
    let app = Router::new().route(
        "/api/v3/ticker/price",
        get(|| async { Json(json!({"symbol": "BTCUSDT", "price": "10.5"})) }),
    );
    let base = rest_server(app).await;

    let feed = BinanceRestFeed::new(base, Duration::from_secs(2)).unwrap();
    let (tx, mut rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();

    let poll_cancel = cancel.clone();
    let poller = tokio::spawn(async move {
        feed.poll("BTCUSDT", Duration::from_millis(20), &tx, &poll_cancel).await;
    });

    for _ in 0..2 {
        let sample = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sample.price, 10.5);
    }

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), poller)
        .await
        .unwrap()
        .unwrap();
}
