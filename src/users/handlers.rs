use axum::{
    extract::State,
    routing::{get, put},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{dto::MessageResponse, extractors::AuthUser},
    error::ApiResult,
    extract::ApiJson,
    state::AppState,
    users::{
        dto::{ChangePasswordRequest, ProfileResponse, UpdateProfileRequest},
        services,
    },
};

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_profile).put(update_profile))
        .route("/profile/change-password", put(change_password))
}

#[instrument(skip(state, claims))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> ApiResult<Json<ProfileResponse>> {
    let user = services::profile(&state, claims.uid).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, claims, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ApiJson(payload): ApiJson<UpdateProfileRequest>,
) -> ApiResult<Json<MessageResponse>> {
    services::update_profile(&state, claims.uid, payload).await?;
    Ok(Json(MessageResponse::new("Profile updated successfully")))
}

#[instrument(skip(state, claims, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ApiJson(payload): ApiJson<ChangePasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    services::change_password(&state, claims.uid, payload).await?;
    Ok(Json(MessageResponse::new("Password changed successfully")))
}
