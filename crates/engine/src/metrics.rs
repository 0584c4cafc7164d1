//! Prometheus metrics for claim activity

use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use prometheus::{
    histogram_opts, opts, Encoder, Histogram, IntCounter, IntCounterVec, IntGauge, Registry,
    TextEncoder,
};
use std::sync::Arc;
use tracing::{error, info};

/// Claim and batch counters, owned by the engine
#[derive(Debug)]
pub struct ClaimMetrics {
    registry: Registry,

    pub claims_succeeded_total: IntCounter,
    pub claims_failed_total: IntCounterVec,
    pub batches_total: IntCounter,
    pub batches_skipped_total: IntCounter,
    pub wallets: IntGauge,
    pub batch_duration: Histogram,
}

impl ClaimMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let claims_succeeded_total = IntCounter::with_opts(opts!(
            "claimer_claims_succeeded_total",
            "Claims accepted by the faucet"
        ))?;
        let claims_failed_total = IntCounterVec::new(
            opts!("claimer_claims_failed_total", "Claims that did not succeed"),
            &["reason"],
        )?;
        let batches_total = IntCounter::with_opts(opts!(
            "claimer_batches_total",
            "Batch runs that attempted claims"
        ))?;
        let batches_skipped_total = IntCounter::with_opts(opts!(
            "claimer_batches_skipped_total",
            "Batch runs skipped because the faucet was in cooldown"
        ))?;
        let wallets = IntGauge::with_opts(opts!("claimer_wallets", "Managed wallets"))?;
        let batch_duration = Histogram::with_opts(histogram_opts!(
            "claimer_batch_duration_seconds",
            "Wall-clock duration of a batch run",
            vec![1.0, 5.0, 15.0, 60.0, 300.0, 900.0, 3600.0]
        ))?;

        registry.register(Box::new(claims_succeeded_total.clone()))?;
        registry.register(Box::new(claims_failed_total.clone()))?;
        registry.register(Box::new(batches_total.clone()))?;
        registry.register(Box::new(batches_skipped_total.clone()))?;
        registry.register(Box::new(wallets.clone()))?;
        registry.register(Box::new(batch_duration.clone()))?;

        Ok(Self {
            registry,
            claims_succeeded_total,
            claims_failed_total,
            batches_total,
            batches_skipped_total,
            wallets,
            batch_duration,
        })
    }

    pub fn record_failure(&self, reason: &str) {
        self.claims_failed_total.with_label_values(&[reason]).inc();
    }

    /// Render in Prometheus text exposition format.
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

async fn metrics_handler(State(metrics): State<Arc<ClaimMetrics>>) -> Result<String, StatusCode> {
    metrics.gather().map_err(|err| {
        error!("Failed to gather metrics: {}", err);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// `/metrics` and `/health`
pub fn metrics_router(metrics: Arc<ClaimMetrics>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .with_state(metrics)
}

/// Serve the metrics router until the listener fails.
pub async fn serve_metrics(bind_address: &str, metrics: Arc<ClaimMetrics>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    info!("Metrics server listening on {}", bind_address);
    axum::serve(listener, metrics_router(metrics)).await
}
