use anyhow::Context;
use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::rate_limit::idle_sweeper;
use crate::router::build_router;
use crate::state::AppState;

/// Binds the configured address and serves until SIGINT/SIGTERM.
pub async fn serve(state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = state.config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    run(listener, state, shutdown_signal()).await
}

/// Serves on an already bound listener until `shutdown` resolves, then
/// drains in-flight requests.
pub async fn run<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app: Router = build_router(state.clone())?;

    if let Some(ttl) = state.rate_limiter.idle_ttl() {
        tokio::spawn(idle_sweeper(Arc::clone(&state.rate_limiter), ttl));
    }

    let mw = &state.config.middleware;
    info!(
        addr = %listener.local_addr()?,
        env = %state.config.env,
        rate_limit = mw.rate_limit.enabled,
        rps = mw.rate_limit.rps,
        burst = mw.rate_limit.burst,
        jwt = state.auth.is_some(),
        "server starting"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    .context("server error")?;

    info!("server stopped");
    Ok(())
}

// Resolves on Ctrl-C or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    info!("shutdown signal received, draining connections");
}
