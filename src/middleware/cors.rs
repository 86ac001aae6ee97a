use axum::http::{HeaderName, HeaderValue, Method};
use std::time::Duration;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer, ExposeHeaders};

use crate::config::CorsConfig;
use crate::error::ConfigError;

const MAX_AGE: Duration = Duration::from_secs(12 * 3600);

/// Builds the CORS layer. `"*"` in a list means "any"; with credentials the
/// request's own origin/method/headers are mirrored instead, since browsers
/// refuse a literal wildcard on credentialed requests.
pub fn layer(cfg: &CorsConfig) -> Result<CorsLayer, ConfigError> {
    let creds = cfg.allow_credentials;

    let origins = if is_wildcard(&cfg.allow_origins) {
        if creds { AllowOrigin::mirror_request() } else { Any.into() }
    } else {
        let values = cfg
            .allow_origins
            .iter()
            .map(|o| {
                HeaderValue::from_str(o)
                    .map_err(|_| ConfigError::InvalidCors(format!("invalid origin `{o}`")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        AllowOrigin::list(values)
    };

    let methods = if is_wildcard(&cfg.allow_methods) {
        if creds { AllowMethods::mirror_request() } else { Any.into() }
    } else {
        let values = cfg
            .allow_methods
            .iter()
            .map(|m| {
                Method::from_bytes(m.to_ascii_uppercase().as_bytes())
                    .map_err(|_| ConfigError::InvalidCors(format!("invalid method `{m}`")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        AllowMethods::list(values)
    };

    let headers = if is_wildcard(&cfg.allow_headers) {
        if creds { AllowHeaders::mirror_request() } else { Any.into() }
    } else {
        AllowHeaders::list(header_names(&cfg.allow_headers)?)
    };

    let expose = if is_wildcard(&cfg.expose_headers) {
        if creds {
            return Err(ConfigError::InvalidCors(
                "expose_headers cannot be `*` when credentials are allowed".to_string(),
            ));
        }
        Any.into()
    } else {
        ExposeHeaders::list(header_names(&cfg.expose_headers)?)
    };

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(methods)
        .allow_headers(headers)
        .expose_headers(expose)
        .allow_credentials(creds)
        .max_age(MAX_AGE))
}

fn is_wildcard(list: &[String]) -> bool {
    list.iter().any(|v| v.trim() == "*")
}

fn header_names(names: &[String]) -> Result<Vec<HeaderName>, ConfigError> {
    names
        .iter()
        .map(|h| {
            HeaderName::from_bytes(h.trim().as_bytes())
                .map_err(|_| ConfigError::InvalidCors(format!("invalid header name `{h}`")))
        })
        .collect()
}
