use std::sync::Arc;

use crate::config::Config;
use crate::error::ConfigError;
use crate::middleware::auth::JwtAuth;
use crate::rate_limit::RateLimiter;
use crate::users::UserStore;

// app's shared state

pub struct AppState {
    pub config: Arc<Config>,
    pub rate_limiter: Arc<RateLimiter>, // shared with the idle sweeper
    pub auth: Option<JwtAuth>,          // None when jwt is disabled
    pub users: UserStore,
}

impl AppState {
    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        let rate_limiter = RateLimiter::from_config(&config.middleware.rate_limit)?;
        let auth = JwtAuth::from_config(&config.jwt);

        Ok(Self {
            config: Arc::new(config),
            rate_limiter: Arc::new(rate_limiter),
            auth,
            users: UserStore::new(),
        })
    }
}
