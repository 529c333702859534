use std::collections::{BTreeSet, HashMap};

use tracing::{info, warn};

use crate::{
    error::{ApiError, ApiResult},
    rbac::{
        dto::{MenuRequest, PermissionsRequest, RoleRequest},
        repo_types::{Menu, MenuFields, Role, RoleFields, ROOT_PARENT},
    },
    state::AppState,
    validation::Rules,
};

const ROLE_NAME_MAX: usize = 100;
const MENU_NAME_MAX: usize = 100;
const URL_MAX: usize = 255;

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ---------- roles ----------

pub async fn list_roles(state: &AppState) -> ApiResult<Vec<Role>> {
    Ok(state.rbac.list_roles().await?)
}

pub async fn role(state: &AppState, id: i64) -> ApiResult<Role> {
    state
        .rbac
        .find_role(id)
        .await?
        .ok_or_else(|| ApiError::not_found("No Role Found"))
}

/// `current` is the role being updated, so it may keep its own name.
async fn role_fields(
    state: &AppState,
    req: RoleRequest,
    current: Option<i64>,
) -> ApiResult<RoleFields> {
    let mut rules = Rules::new();
    let name = rules
        .required("role_name", &req.role_name)
        .map(|n| n.trim().to_string());
    if let Some(name) = &name {
        rules.max_len("role_name", name, ROLE_NAME_MAX);
        if !rules.has_error("role_name") {
            let taken = state
                .rbac
                .find_role_by_name(name)
                .await?
                .is_some_and(|other| Some(other.id) != current);
            if taken {
                rules.fail("role_name", "The role_name field must contain a unique value.");
            }
        }
    }
    rules.finish()?;
    let Some(role_name) = name else {
        return Err(ApiError::validation("The submitted data is invalid."));
    };
    Ok(RoleFields {
        role_name,
        description: blank_to_none(req.description),
    })
}

pub async fn create_role(state: &AppState, req: RoleRequest) -> ApiResult<Role> {
    let fields = role_fields(state, req, None).await?;
    let role = state
        .rbac
        .create_role(&fields)
        .await
        .map_err(|e| e.for_field("role_name"))?;
    info!(role_id = role.id, role_name = %role.role_name, "role created");
    Ok(role)
}

pub async fn update_role(state: &AppState, id: i64, req: RoleRequest) -> ApiResult<Role> {
    role(state, id).await?;
    let fields = role_fields(state, req, Some(id)).await?;
    let role = state
        .rbac
        .update_role(id, &fields)
        .await
        .map_err(|e| e.for_field("role_name"))?
        .ok_or_else(|| ApiError::not_found("No Role Found"))?;
    info!(role_id = id, "role updated");
    Ok(role)
}

pub async fn delete_role(state: &AppState, id: i64) -> ApiResult<()> {
    if !state.rbac.delete_role(id).await? {
        return Err(ApiError::not_found("No Role Found"));
    }
    info!(role_id = id, "role deleted");
    Ok(())
}

// ---------- menus ----------

pub async fn list_menus(state: &AppState) -> ApiResult<Vec<Menu>> {
    Ok(state.rbac.list_menus().await?)
}

pub async fn menu(state: &AppState, id: i64) -> ApiResult<Menu> {
    state
        .rbac
        .find_menu(id)
        .await?
        .ok_or_else(|| ApiError::not_found("No Menu Found"))
}

/// True when `parent` is `id` itself or sits somewhere below it.
fn creates_cycle(menus: &[Menu], id: i64, parent: i64) -> bool {
    let parents: HashMap<i64, i64> = menus.iter().map(|m| (m.id, m.parent_id)).collect();
    let mut seen = BTreeSet::new();
    let mut cursor = parent;
    while cursor != ROOT_PARENT {
        if cursor == id {
            return true;
        }
        // an already broken chain is not this write's concern
        if !seen.insert(cursor) {
            return false;
        }
        match parents.get(&cursor) {
            Some(&next) => cursor = next,
            None => return false,
        }
    }
    false
}

async fn menu_fields(
    state: &AppState,
    req: MenuRequest,
    current: Option<i64>,
) -> ApiResult<MenuFields> {
    let mut rules = Rules::new();
    let name = rules
        .required("menu_name", &req.menu_name)
        .map(|n| n.trim().to_string());
    if let Some(name) = &name {
        rules.max_len("menu_name", name, MENU_NAME_MAX);
    }
    let url = rules.required("url", &req.url).map(|u| u.trim().to_string());
    if let Some(url) = &url {
        rules.max_len("url", url, URL_MAX);
    }

    if req.parent_id < ROOT_PARENT {
        rules.fail("parent_id", "The parent_id field must be 0 or an existing menu.");
    } else if req.parent_id != ROOT_PARENT {
        let menus = state.rbac.list_menus().await?;
        if !menus.iter().any(|m| m.id == req.parent_id) {
            rules.fail("parent_id", "The parent_id field must be 0 or an existing menu.");
        } else if let Some(id) = current {
            if creates_cycle(&menus, id, req.parent_id) {
                warn!(menu_id = id, parent_id = req.parent_id, "menu cycle rejected");
                rules.fail(
                    "parent_id",
                    "The parent_id field cannot be the menu itself or one of its descendants.",
                );
            }
        }
    }
    rules.finish()?;
    let (Some(menu_name), Some(url)) = (name, url) else {
        return Err(ApiError::validation("The submitted data is invalid."));
    };

    Ok(MenuFields {
        menu_name,
        parent_id: req.parent_id,
        url,
        icon: blank_to_none(req.icon),
        menu_order: req.menu_order,
    })
}

pub async fn create_menu(state: &AppState, req: MenuRequest) -> ApiResult<Menu> {
    let fields = menu_fields(state, req, None).await?;
    let menu = state.rbac.create_menu(&fields).await?;
    info!(menu_id = menu.id, parent_id = menu.parent_id, "menu created");
    Ok(menu)
}

pub async fn update_menu(state: &AppState, id: i64, req: MenuRequest) -> ApiResult<Menu> {
    menu(state, id).await?;
    let fields = menu_fields(state, req, Some(id)).await?;
    let menu = state
        .rbac
        .update_menu(id, &fields)
        .await?
        .ok_or_else(|| ApiError::not_found("No Menu Found"))?;
    info!(menu_id = id, "menu updated");
    Ok(menu)
}

pub async fn delete_menu(state: &AppState, id: i64) -> ApiResult<()> {
    menu(state, id).await?;
    let menus = state.rbac.list_menus().await?;
    if menus.iter().any(|m| m.parent_id == id) {
        warn!(menu_id = id, "delete of menu with children rejected");
        return Err(ApiError::validation(
            "Menu still has child menus and cannot be deleted.",
        ));
    }
    if !state.rbac.delete_menu(id).await? {
        return Err(ApiError::not_found("No Menu Found"));
    }
    info!(menu_id = id, "menu deleted");
    Ok(())
}

// ---------- permissions ----------

pub async fn permissions(state: &AppState, role_id: i64) -> ApiResult<Vec<i64>> {
    role(state, role_id).await?;
    Ok(state.rbac.permission_menu_ids(role_id).await?)
}

/// Replaces the role's whole permission set. Returns the stored ids, ascending.
pub async fn replace_permissions(
    state: &AppState,
    role_id: i64,
    req: PermissionsRequest,
) -> ApiResult<Vec<i64>> {
    role(state, role_id).await?;

    let wanted: BTreeSet<i64> = req.menu_ids.into_iter().collect();
    if !wanted.is_empty() {
        let known: BTreeSet<i64> = state
            .rbac
            .list_menus()
            .await?
            .into_iter()
            .map(|m| m.id)
            .collect();
        let unknown: Vec<String> = wanted
            .difference(&known)
            .map(|id| id.to_string())
            .collect();
        if !unknown.is_empty() {
            warn!(role_id, ?unknown, "permissions reference unknown menus");
            let mut rules = Rules::new();
            rules.fail(
                "menu_ids",
                format!("Unknown menu ids: {}.", unknown.join(", ")),
            );
            rules.finish()?;
        }
    }

    let menu_ids: Vec<i64> = wanted.into_iter().collect();
    state.rbac.replace_permissions(role_id, &menu_ids).await?;
    info!(role_id, count = menu_ids.len(), "permissions replaced");
    Ok(menu_ids)
}
