use axum::extract::{Request, State};
use axum::http::header::USER_AGENT;
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::client_ip;
use crate::metrics::{REQUEST_LATENCY, REQUEST_TOTAL};
use crate::state::AppState;

pub async fn request_log(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    REQUEST_TOTAL.inc();

    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let query = req.uri().query().unwrap_or_default().to_owned();
    let ip = client_ip::from_request(&req, &state.config.server.trusted_proxies);
    let user_agent = req
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned();

    let response = next.run(req).await;

    let latency = start.elapsed();
    REQUEST_LATENCY.observe(latency.as_secs_f64());

    info!(
        status = response.status().as_u16(),
        method = %method,
        path = %path,
        query = %query,
        ip = %ip,
        user_agent = %user_agent,
        latency_ms = latency.as_millis() as u64,
        "HTTP request"
    );

    response
}
