use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::dto::MessageResponse,
    error::ApiResult,
    extract::ApiJson,
    rbac::{
        dto::{
            MenuRequest, PermissionsRequest, PermissionsResponse, PermissionsUpdated,
            RoleRequest, SavedResponse,
        },
        repo_types::{Menu, Role},
        services,
    },
    state::AppState,
};

pub fn rbac_routes() -> Router<AppState> {
    Router::new()
        .route("/roles", get(list_roles).post(create_role))
        .route(
            "/roles/:id",
            get(show_role).put(update_role).delete(delete_role),
        )
        .route(
            "/roles/:id/permissions",
            get(role_permissions).post(replace_permissions),
        )
        .route("/menus", get(list_menus).post(create_menu))
        .route(
            "/menus/:id",
            get(show_menu).put(update_menu).delete(delete_menu),
        )
}

#[instrument(skip(state))]
pub async fn list_roles(State(state): State<AppState>) -> ApiResult<Json<Vec<Role>>> {
    Ok(Json(services::list_roles(&state).await?))
}

#[instrument(skip(state))]
pub async fn show_role(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Role>> {
    Ok(Json(services::role(&state, id).await?))
}

#[instrument(skip(state, payload))]
pub async fn create_role(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RoleRequest>,
) -> ApiResult<(StatusCode, Json<SavedResponse<Role>>)> {
    let role = services::create_role(&state, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(SavedResponse::new("Role Created", role)),
    ))
}

#[instrument(skip(state, payload))]
pub async fn update_role(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(payload): ApiJson<RoleRequest>,
) -> ApiResult<Json<SavedResponse<Role>>> {
    let role = services::update_role(&state, id, payload).await?;
    Ok(Json(SavedResponse::new("Role Updated", role)))
}

#[instrument(skip(state))]
pub async fn delete_role(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<MessageResponse>> {
    services::delete_role(&state, id).await?;
    Ok(Json(MessageResponse::new("Role Deleted")))
}

#[instrument(skip(state))]
pub async fn role_permissions(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<PermissionsResponse>> {
    let menu_ids = services::permissions(&state, id).await?;
    Ok(Json(PermissionsResponse {
        role_id: id,
        menu_ids,
    }))
}

#[instrument(skip(state, payload))]
pub async fn replace_permissions(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(payload): ApiJson<PermissionsRequest>,
) -> ApiResult<Json<PermissionsUpdated>> {
    let menu_ids = services::replace_permissions(&state, id, payload).await?;
    Ok(Json(PermissionsUpdated {
        message: "Permissions Updated".into(),
        menu_ids,
    }))
}

#[instrument(skip(state))]
pub async fn list_menus(State(state): State<AppState>) -> ApiResult<Json<Vec<Menu>>> {
    Ok(Json(services::list_menus(&state).await?))
}

#[instrument(skip(state))]
pub async fn show_menu(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Menu>> {
    Ok(Json(services::menu(&state, id).await?))
}

#[instrument(skip(state, payload))]
pub async fn create_menu(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<MenuRequest>,
) -> ApiResult<(StatusCode, Json<SavedResponse<Menu>>)> {
    let menu = services::create_menu(&state, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(SavedResponse::new("Menu Created", menu)),
    ))
}

#[instrument(skip(state, payload))]
pub async fn update_menu(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(payload): ApiJson<MenuRequest>,
) -> ApiResult<Json<SavedResponse<Menu>>> {
    let menu = services::update_menu(&state, id, payload).await?;
    Ok(Json(SavedResponse::new("Menu Updated", menu)))
}

#[instrument(skip(state))]
pub async fn delete_menu(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<MessageResponse>> {
    services::delete_menu(&state, id).await?;
    Ok(Json(MessageResponse::new("Menu Deleted")))
}
