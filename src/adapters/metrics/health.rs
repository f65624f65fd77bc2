//! Health Check Server - Liveness, Readiness and Stream Status
//!
//! Exposes /live, /ready and /streams via axum 0.7. Readiness depends
//! on the router still running and the baseline snapshot directory
//! being writable, and flips to 503 as soon as graceful shutdown begins.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::adapters::persistence::JsonBaselineStore;
use crate::domain::price::FeedMode;
use crate::usecases::price_router::PriceRouter;

/// Shared state behind the health endpoints.
pub struct HealthState {
    /// False once shutdown has started.
    ready: AtomicBool,
    /// Router whose per-symbol modes are reported on /streams.
    router: Arc<PriceRouter>,
    /// Baseline storage checked for writability, if attached.
    baselines: Option<Arc<JsonBaselineStore>>,
}

impl HealthState {
    /// Create a ready health state for `router`.
    pub fn new(router: Arc<PriceRouter>) -> Self {
        Self {
            ready: AtomicBool::new(true),
            router,
            baselines: None,
        }
    }

    /// Include baseline storage health in readiness.
    #[must_use]
    pub fn with_storage(mut self, baselines: Arc<JsonBaselineStore>) -> Self {
        self.baselines = Some(baselines);
        self
    }

    /// Not draining and the router still accepts subscriptions.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed) && !self.router.is_shut_down()
    }

    /// Full readiness check, including a storage write test.
    pub async fn check_ready(&self) -> bool {
        if !self.is_ready() {
            return false;
        }
        match &self.baselines {
            Some(store) => store.is_healthy().await,
            None => true,
        }
    }

    /// Mark the service as draining; /ready starts answering 503.
    pub fn set_not_ready(&self) {
        self.ready.store(false, Ordering::Relaxed);
    }

    /// Current mode of every live symbol stream.
    pub fn stream_modes(&self) -> HashMap<String, FeedMode> {
        self.router.modes()
    }
}

/// Build the health routes around a shared state.
pub fn routes(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
        .route("/streams", get(streams))
        .with_state(state)
}

/// Serve the health routes until `shutdown` fires.
#[instrument(skip(state, shutdown))]
pub async fn serve(
    state: Arc<HealthState>,
    bind_address: String,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!(address = %bind_address, "Health server started");

    axum::serve(listener, routes(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}

/// Liveness: always returns 200 if the process is running.
async fn liveness() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Readiness: returns 503 once shutdown has begun or storage fails.
async fn readiness(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    if state.check_ready().await {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn streams(State(state): State<Arc<HealthState>>) -> Json<HashMap<String, FeedMode>> {
    Json(state.stream_modes())
}
