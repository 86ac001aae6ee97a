use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    extract::{Path, State},
    http::StatusCode,
};
use std::sync::Arc;
use tracing::info;
use crate::error::ApiError;
use crate::models::{RegisterRequest, RegisterResponse, User};
use crate::state::AppState;

pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let Json(payload) = payload?;
    let user = state.users.create(&payload.name, &payload.email)?;

    let token = match &state.auth {
        Some(auth) => Some(auth.generate_token(user.id)?),
        None => None,
    };

    info!(user_id = user.id, name = %user.name, "user registered");

    Ok((StatusCode::CREATED, Json(RegisterResponse { user, token })))
}

pub async fn get_user_handler(
    State(state): State<Arc<AppState>>,
    id: Result<Path<u64>, PathRejection>,
) -> Result<Json<User>, ApiError> {
    let Path(id) = id?;
    state
        .users
        .get(id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("user not found".to_string()))
}
