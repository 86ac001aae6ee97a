use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::path::PathBuf;

// startup failures
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid value `{value}` for {key}: {reason}")]
    Env {
        key: String,
        value: String,
        reason: String,
    },

    #[error("rate limit rps must be a finite, non-negative number, got {0}")]
    InvalidRate(f64),

    #[error("rate limit burst must be at least 1, got {0}")]
    InvalidBurst(i64),

    #[error("jwt secret must be at least {min} characters")]
    WeakJwtSecret { min: usize },

    #[error("jwt expire_secs must be between 1 and {max}, got {value}")]
    InvalidJwtExpiry { value: u64, max: u64 },

    #[error("unknown log level `{0}`")]
    InvalidLogLevel(String),

    #[error("invalid cors setting: {0}")]
    InvalidCors(String),
}

// rendered as {"error": .., "code": ..}
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("too many requests")]
    TooManyRequests,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("internal server error")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: u16,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// extractor rejections keep axum's message but use our status and body
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(cause) = &self {
            // the cause stays in the logs, the client gets the generic message
            tracing::error!(cause = %cause, "internal error");
        }

        let status = self.status();
        let body = ErrorBody {
            error: self.to_string(),
            code: status.as_u16(),
        };

        (status, Json(body)).into_response()
    }
}
