//! Prometheus metrics endpoint and HTTP request tracking middleware.

use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use std::time::Instant;

use crate::db::{ClaimType, ClaimStatus, ClaimScope, count_claims_by_status};
use crate::AppState;

pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";
pub const LOGINS_TOTAL: &str = "logins_total";
pub const CLAIMS_SUBMITTED_TOTAL: &str = "claims_submitted_total";
pub const CLAIMS_PROCESSED_TOTAL: &str = "claims_processed_total";
pub const CLAIMS_PENDING: &str = "claims_pending";

/// Install the Prometheus recorder. Call once at startup.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    describe_counter!(HTTP_REQUESTS_TOTAL, "Total number of HTTP requests received");
    describe_histogram!(HTTP_REQUEST_DURATION_SECONDS, "HTTP request duration in seconds");
    describe_counter!(LOGINS_TOTAL, "Login attempts by outcome (success/failed)");
    describe_counter!(CLAIMS_SUBMITTED_TOTAL, "Claims submitted, by claim type");
    describe_counter!(CLAIMS_PROCESSED_TOTAL, "Claims approved or rejected, by status");
    describe_gauge!(CLAIMS_PENDING, "Claims currently awaiting a decision");

    Ok(handle)
}

/// GET /metrics - Prometheus text format, no session required
pub async fn metrics_endpoint(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if let Ok(counts) = count_claims_by_status(&state.db, ClaimScope::All).await {
        gauge!(CLAIMS_PENDING).set(counts.pending as f64);
    }

    match state.metrics_handle.as_ref() {
        Some(h) => (StatusCode::OK, h.render()),
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Metrics not initialized".to_string(),
        ),
    }
}

/// Records `http_requests_total` and `http_request_duration_seconds` per matched route
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();

    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|mp| mp.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let method = request.method().to_string();

    let response = next.run(request).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    counter!(HTTP_REQUESTS_TOTAL, "method" => method.clone(), "path" => path.clone(), "status" => status).increment(1);
    histogram!(HTTP_REQUEST_DURATION_SECONDS, "method" => method, "path" => path).record(duration);

    response
}

pub fn record_login(success: bool) {
    let outcome = if success { "success" } else { "failed" };
    counter!(LOGINS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_claim_submitted(claim_type: ClaimType) {
    counter!(CLAIMS_SUBMITTED_TOTAL, "type" => claim_type.as_str()).increment(1);
}

pub fn record_claim_processed(status: ClaimStatus) {
    counter!(CLAIMS_PROCESSED_TOTAL, "status" => status.as_str()).increment(1);
}
