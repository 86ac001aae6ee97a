use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use std::sync::Arc;

use crate::error::ConfigError;
use crate::handlers::{get_user_handler, health_handler, metrics_handler, register_handler};
use crate::middleware::{auth, cors, ip_access, rate_limit, request_log};
use crate::state::AppState;

/// Assembles routes and the middleware pipeline. Disabled middleware is not
/// attached at all.
pub fn build_router(state: Arc<AppState>) -> Result<Router, ConfigError> {
    let mw = &state.config.middleware;

    let public = Router::new().route("/register", post(register_handler));

    let mut protected = Router::new().route("/users/{id}", get(get_user_handler));
    if state.auth.is_some() {
        protected = protected.route_layer(from_fn_with_state(state.clone(), auth::require_auth));
    }

    let mut app = Router::new()
        .nest("/v1", public.merge(protected))
        .route("/health", get(health_handler));

    if mw.prometheus {
        app = app.route("/metrics", get(metrics_handler));
    }

    // layers added later wrap the earlier ones
    if state.rate_limiter.is_active() {
        app = app.layer(from_fn_with_state(state.clone(), rate_limit::rate_limit));
    }
    if mw.cors.enabled {
        app = app.layer(cors::layer(&mw.cors)?);
    }
    if mw.ip_access.enabled {
        app = app.layer(from_fn_with_state(state.clone(), ip_access::ip_access));
    }
    app = app.layer(from_fn_with_state(state.clone(), request_log::request_log));

    Ok(app.with_state(state))
}
