use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::JwtConfig;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "userID")]
    pub user_id: u64,
    pub iss: String,
    pub iat: u64,
    pub exp: u64,
}

pub struct JwtAuth {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: String,
    expire: Duration,
}

impl JwtAuth {
    pub fn from_config(cfg: &JwtConfig) -> Option<Self> {
        cfg.enabled
            .then(|| Self::new(&cfg.secret, &cfg.issuer, Duration::from_secs(cfg.expire_secs)))
    }

    pub fn new(secret: &str, issuer: &str, expire: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer]);

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            issuer: issuer.to_string(),
            expire,
        }
    }

    pub fn generate_token(&self, user_id: u64) -> Result<String, ApiError> {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        let claims = Claims {
            user_id,
            iss: self.issuer.clone(),
            iat: now,
            exp: now.saturating_add(self.expire.as_secs()),
        };
        self.sign(&claims)
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, ApiError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| ApiError::Internal(format!("failed to sign token: {e}")))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, "token rejected");
                ApiError::Unauthorized("invalid or expired token".to_string())
            })
    }
}

// case-insensitive "Bearer " prefix, anything else is the raw token
pub fn extract_token(header: &str) -> &str {
    let bytes = header.as_bytes();
    if bytes.len() > 7 && bytes[..6].eq_ignore_ascii_case(b"BEARER") {
        header.get(7..).unwrap_or(header)
    } else {
        header
    }
}

pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(auth) = &state.auth else {
        return Ok(next.run(req).await);
    };

    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(extract_token)
        .unwrap_or_default();
    if token.is_empty() {
        return Err(ApiError::Unauthorized(
            "authorization header required".to_string(),
        ));
    }

    let claims = auth.verify(token)?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
