//! HTTP API scaffold: an axum router behind a middleware pipeline of
//! request logging, IP allow-listing, CORS, per-client token-bucket rate
//! limiting and JWT auth.

pub mod client_ip;
pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod rate_limit;
pub mod router;
pub mod server;
pub mod state;
pub mod users;

pub use config::{Args, Config};
pub use error::{ApiError, ConfigError};
pub use rate_limit::{Admission, RateLimiter};
pub use router::build_router;
pub use state::AppState;
