//! Health and metrics HTTP endpoint

use crate::metrics::MetricsCollector;
use anyhow::{Context, Result};
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use prometheus::TextEncoder;
use serde_json::json;
use tracing::info;

/// Where the HTTP endpoint listens
#[derive(Debug, Clone)]
pub struct HealthServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HealthServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Serves `/health` and `/metrics`
pub struct HealthServer {
    config: HealthServerConfig,
    metrics: MetricsCollector,
}

impl HealthServer {
    pub fn new(config: HealthServerConfig, metrics: MetricsCollector) -> Self {
        Self { config, metrics }
    }

    /// Bind and serve until the task is aborted
    pub async fn serve(self) -> Result<()> {
        let app = Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(self.metrics);

        let address = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&address)
            .await
            .with_context(|| format!("Failed to bind health endpoint on {}", address))?;

        info!("Health endpoint listening on {}", address);
        axum::serve(listener, app)
            .await
            .context("Health endpoint server failed")
    }
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn metrics_handler(State(metrics): State<MetricsCollector>) -> String {
    let encoder = TextEncoder::new();
    let families = metrics.registry().gather();
    encoder.encode_to_string(&families).unwrap_or_default()
}
