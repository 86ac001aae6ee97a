use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;
use tracing::warn;

use crate::client_ip;
use crate::error::ApiError;
use crate::metrics::RATE_LIMITED_TOTAL;
use crate::rate_limit::Admission;
use crate::state::AppState;

// Rejected requests stop here: nothing further down the stack runs.
pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let client = client_ip::from_request(&req, &state.config.server.trusted_proxies);

    match state.rate_limiter.admit(&client) {
        Admission::Admitted => Ok(next.run(req).await),
        Admission::Rejected => {
            RATE_LIMITED_TOTAL.inc();
            warn!(client = %client, path = req.uri().path(), "rate limit exceeded");
            Err(ApiError::TooManyRequests)
        }
    }
}
