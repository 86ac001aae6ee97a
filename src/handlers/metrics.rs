use axum::{extract::State, http::header::CONTENT_TYPE, response::IntoResponse};
use prometheus::{Encoder, TEXT_FORMAT, TextEncoder};
use std::sync::Arc;
use crate::error::ApiError;
use crate::metrics::TRACKED_CLIENTS;
use crate::state::AppState;

pub async fn metrics_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    // sampled at scrape time rather than on every request
    TRACKED_CLIENTS.set(state.rate_limiter.tracked_clients() as f64);

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| ApiError::Internal(format!("failed to encode metrics: {e}")))?;
    let body = String::from_utf8(buffer)
        .map_err(|e| ApiError::Internal(format!("metrics are not utf-8: {e}")))?;

    Ok(([(CONTENT_TYPE, TEXT_FORMAT)], body))
}
