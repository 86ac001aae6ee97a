mod health;
mod metrics;
mod users;

pub use health::health_handler;
pub use metrics::metrics_handler;
pub use users::{get_user_handler, register_handler};
