//! HTTP surface — the inbound webhook and the job trigger routes.
//!
//! The two job routes are the engine's "run once" entry points, meant to
//! be hit by an external scheduler on any cadence. Both are idempotent
//! and safe to invoke concurrently; overlapping sweeps serialize on the
//! per-lead claim.

pub mod inbound;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tracing::error;

use crate::config::EngineConfig;
use crate::error::Error;
use crate::intent::IntentClassifier;
use crate::nurture::expirer::{ExpireReport, SnoozeExpirer};
use crate::nurture::router::NurtureRouter;
use crate::nurture::sweep::{SweepReport, SweepScheduler};
use crate::store::NurtureStore;
use crate::transport::SmsTransport;

use self::inbound::{InboundDelivery, InboundOutcome, handle_inbound};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct EngineState {
    pub store: Arc<dyn NurtureStore>,
    pub sweeper: Arc<SweepScheduler>,
    pub expirer: Arc<SnoozeExpirer>,
    pub classifier: Arc<IntentClassifier>,
    pub router: Arc<NurtureRouter>,
}

impl EngineState {
    /// Wire the engine components from config.
    pub fn new(
        config: &EngineConfig,
        store: Arc<dyn NurtureStore>,
        transport: Arc<dyn SmsTransport>,
    ) -> Self {
        Self {
            sweeper: Arc::new(SweepScheduler::from_config(
                config,
                Arc::clone(&store),
                transport,
            )),
            expirer: Arc::new(SnoozeExpirer::from_config(config, Arc::clone(&store))),
            classifier: Arc::new(IntentClassifier::default()),
            router: Arc::new(NurtureRouter::new(config.long_term_snooze_days)),
            store,
        }
    }
}

/// Build the Axum router with webhook and job trigger routes.
pub fn engine_routes(state: EngineState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/webhook/sms", post(webhook_sms))
        .route("/jobs/sweep", post(run_sweep))
        .route("/jobs/expire-snoozes", post(run_expire))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

/// Map an engine error to a 500. The provider and the external scheduler
/// both retry on non-2xx, which is exactly what we want for store
/// failures.
fn internal_error(e: Error) -> (StatusCode, String) {
    error!(error = %e, "Request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

async fn webhook_sms(
    State(state): State<EngineState>,
    Json(delivery): Json<InboundDelivery>,
) -> Result<Json<InboundOutcome>, (StatusCode, String)> {
    handle_inbound(&state, &delivery)
        .await
        .map(Json)
        .map_err(internal_error)
}

async fn run_sweep(
    State(state): State<EngineState>,
) -> Result<Json<SweepReport>, (StatusCode, String)> {
    state.sweeper.run_once().await.map(Json).map_err(internal_error)
}

#[derive(Debug, Deserialize)]
struct ExpireParams {
    #[serde(default)]
    dry_run: bool,
}

async fn run_expire(
    State(state): State<EngineState>,
    Query(params): Query<ExpireParams>,
) -> Result<Json<ExpireReport>, (StatusCode, String)> {
    state
        .expirer
        .run_once(params.dry_run)
        .await
        .map(Json)
        .map_err(internal_error)
}
