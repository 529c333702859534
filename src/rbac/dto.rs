use serde::{Deserialize, Serialize};

use crate::rbac::repo_types::ROOT_PARENT;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RoleRequest {
    pub role_name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MenuRequest {
    pub menu_name: Option<String>,
    pub parent_id: i64,
    pub url: Option<String>,
    pub icon: Option<String>,
    pub menu_order: i32,
}

impl Default for MenuRequest {
    fn default() -> Self {
        Self {
            menu_name: None,
            parent_id: ROOT_PARENT,
            url: None,
            icon: None,
            menu_order: 0,
        }
    }
}

/// A missing `menu_ids` revokes everything.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PermissionsRequest {
    pub menu_ids: Vec<i64>,
}

/// Message plus the row that was written.
#[derive(Debug, Serialize)]
pub struct SavedResponse<T> {
    pub message: String,
    pub data: T,
}

impl<T> SavedResponse<T> {
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            data,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PermissionsResponse {
    pub role_id: i64,
    pub menu_ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct PermissionsUpdated {
    pub message: String,
    pub menu_ids: Vec<i64>,
}
