use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::warn;

use crate::client_ip;
use crate::error::ApiError;
use crate::state::AppState;

pub async fn ip_access(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let client = client_ip::from_request(&req, &state.config.server.trusted_proxies);

    if !is_allowed(&client, &state.config.middleware.ip_access.allowed_ips) {
        warn!(client = %client, "request denied by ip allow-list");
        return Err(ApiError::Forbidden(
            "access denied for your IP address".to_string(),
        ));
    }

    Ok(next.run(req).await)
}

// Unparsable identifiers (e.g. "unknown") are never allowed
pub fn is_allowed(client: &str, allowed: &[IpAddr]) -> bool {
    client
        .parse::<IpAddr>()
        .is_ok_and(|ip| allowed.contains(&ip.to_canonical()))
}
