use axum::{extract::State, routing::get, Json, Router};
use tracing::instrument;

use crate::{
    auth::extractors::AuthUser,
    dashboard::{dto::StatsResponse, services},
    error::ApiResult,
    state::AppState,
};

pub fn dashboard_routes() -> Router<AppState> {
    Router::new().route("/dashboard/stats", get(stats))
}

#[instrument(skip(state, claims))]
pub async fn stats(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> ApiResult<Json<StatsResponse>> {
    Ok(Json(services::stats(&state, claims.uid).await?))
}
