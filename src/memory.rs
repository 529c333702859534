//! In-process stand-in for the Postgres repositories, used by tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::auth::repo::UserRepo;
use crate::auth::repo_types::{NewUser, User};
use crate::dashboard::repo::VisitRepo;
use crate::error::StoreError;
use crate::rbac::repo::RbacRepo;
use crate::rbac::repo_types::{Menu, MenuFields, Role, RoleFields};

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: BTreeMap<i64, User>,
    roles: BTreeMap<i64, Role>,
    menus: BTreeMap<i64, Menu>,
    permissions: BTreeSet<(i64, i64)>,
    visits: Vec<(i64, OffsetDateTime)>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    /// Email and role-name lookups miss, as if a concurrent writer had not committed yet.
    stale_lookups: bool,
}

impl MemoryStore {
    pub fn with_stale_lookups() -> Self {
        Self {
            stale_lookups: true,
            ..Self::default()
        }
    }

    /// Direct row access for test setup.
    pub fn edit_user(&self, id: i64, f: impl FnOnce(&mut User)) {
        let mut t = self.tables.lock().unwrap();
        if let Some(user) = t.users.get_mut(&id) {
            f(user);
        }
    }
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        if self.stale_lookups {
            return Ok(None);
        }
        let t = self.tables.lock().unwrap();
        Ok(t.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<User>> {
        Ok(self.tables.lock().unwrap().users.get(&id).cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let mut t = self.tables.lock().unwrap();
        if t.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate);
        }
        let id = t.next_id();
        let now = OffsetDateTime::now_utc();
        let row = User {
            id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role_id: user.role_id,
            otp_code: Some(user.otp_code),
            otp_expires_at: Some(user.otp_expires_at),
            created_at: now,
            updated_at: now,
        };
        t.users.insert(id, row.clone());
        Ok(row)
    }

    async fn clear_otp(&self, id: i64) -> anyhow::Result<()> {
        self.edit_user(id, |u| {
            u.otp_code = None;
            u.otp_expires_at = None;
        });
        Ok(())
    }

    async fn update_profile(&self, id: i64, name: &str, email: &str) -> Result<(), StoreError> {
        let taken = {
            let t = self.tables.lock().unwrap();
            t.users.values().any(|u| u.id != id && u.email == email)
        };
        if taken {
            return Err(StoreError::Duplicate);
        }
        self.edit_user(id, |u| {
            u.name = name.to_string();
            u.email = email.to_string();
            u.updated_at = OffsetDateTime::now_utc();
        });
        Ok(())
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> anyhow::Result<()> {
        self.edit_user(id, |u| u.password_hash = password_hash.to_string());
        Ok(())
    }

    async fn count(&self) -> anyhow::Result<i64> {
        Ok(self.tables.lock().unwrap().users.len() as i64)
    }
}

#[async_trait]
impl RbacRepo for MemoryStore {
    async fn list_roles(&self) -> anyhow::Result<Vec<Role>> {
        Ok(self.tables.lock().unwrap().roles.values().cloned().collect())
    }

    async fn find_role(&self, id: i64) -> anyhow::Result<Option<Role>> {
        Ok(self.tables.lock().unwrap().roles.get(&id).cloned())
    }

    async fn find_role_by_name(&self, name: &str) -> anyhow::Result<Option<Role>> {
        if self.stale_lookups {
            return Ok(None);
        }
        let t = self.tables.lock().unwrap();
        Ok(t.roles.values().find(|r| r.role_name == name).cloned())
    }

    async fn create_role(&self, fields: &RoleFields) -> Result<Role, StoreError> {
        let mut t = self.tables.lock().unwrap();
        if t.roles.values().any(|r| r.role_name == fields.role_name) {
            return Err(StoreError::Duplicate);
        }
        let id = t.next_id();
        let now = OffsetDateTime::now_utc();
        let role = Role {
            id,
            role_name: fields.role_name.clone(),
            description: fields.description.clone(),
            created_at: now,
            updated_at: now,
        };
        t.roles.insert(id, role.clone());
        Ok(role)
    }

    async fn update_role(
        &self,
        id: i64,
        fields: &RoleFields,
    ) -> Result<Option<Role>, StoreError> {
        let mut t = self.tables.lock().unwrap();
        if t.roles
            .values()
            .any(|r| r.id != id && r.role_name == fields.role_name)
        {
            return Err(StoreError::Duplicate);
        }
        Ok(t.roles.get_mut(&id).map(|role| {
            role.role_name = fields.role_name.clone();
            role.description = fields.description.clone();
            role.updated_at = OffsetDateTime::now_utc();
            role.clone()
        }))
    }

    async fn delete_role(&self, id: i64) -> anyhow::Result<bool> {
        let mut t = self.tables.lock().unwrap();
        let existed = t.roles.remove(&id).is_some();
        t.permissions.retain(|(role_id, _)| *role_id != id);
        Ok(existed)
    }

    async fn list_menus(&self) -> anyhow::Result<Vec<Menu>> {
        let mut menus: Vec<Menu> = self.tables.lock().unwrap().menus.values().cloned().collect();
        menus.sort_by_key(|m| (m.parent_id, m.menu_order, m.id));
        Ok(menus)
    }

    async fn find_menu(&self, id: i64) -> anyhow::Result<Option<Menu>> {
        Ok(self.tables.lock().unwrap().menus.get(&id).cloned())
    }

    async fn create_menu(&self, fields: &MenuFields) -> anyhow::Result<Menu> {
        let mut t = self.tables.lock().unwrap();
        let id = t.next_id();
        let now = OffsetDateTime::now_utc();
        let menu = Menu {
            id,
            menu_name: fields.menu_name.clone(),
            parent_id: fields.parent_id,
            url: fields.url.clone(),
            icon: fields.icon.clone(),
            menu_order: fields.menu_order,
            created_at: now,
            updated_at: now,
        };
        t.menus.insert(id, menu.clone());
        Ok(menu)
    }

    async fn update_menu(&self, id: i64, fields: &MenuFields) -> anyhow::Result<Option<Menu>> {
        let mut t = self.tables.lock().unwrap();
        Ok(t.menus.get_mut(&id).map(|menu| {
            menu.menu_name = fields.menu_name.clone();
            menu.parent_id = fields.parent_id;
            menu.url = fields.url.clone();
            menu.icon = fields.icon.clone();
            menu.menu_order = fields.menu_order;
            menu.updated_at = OffsetDateTime::now_utc();
            menu.clone()
        }))
    }

    async fn delete_menu(&self, id: i64) -> anyhow::Result<bool> {
        let mut t = self.tables.lock().unwrap();
        let existed = t.menus.remove(&id).is_some();
        t.permissions.retain(|(_, menu_id)| *menu_id != id);
        Ok(existed)
    }

    async fn permission_menu_ids(&self, role_id: i64) -> anyhow::Result<Vec<i64>> {
        let t = self.tables.lock().unwrap();
        Ok(t.permissions
            .iter()
            .filter(|(r, _)| *r == role_id)
            .map(|(_, m)| *m)
            .collect())
    }

    async fn replace_permissions(&self, role_id: i64, menu_ids: &[i64]) -> anyhow::Result<()> {
        let mut t = self.tables.lock().unwrap();
        t.permissions.retain(|(r, _)| *r != role_id);
        for &menu_id in menu_ids {
            t.permissions.insert((role_id, menu_id));
        }
        Ok(())
    }
}

#[async_trait]
impl VisitRepo for MemoryStore {
    async fn record(&self, user_id: i64, at: OffsetDateTime) -> anyhow::Result<()> {
        self.tables.lock().unwrap().visits.push((user_id, at));
        Ok(())
    }

    async fn count_all(&self) -> anyhow::Result<i64> {
        Ok(self.tables.lock().unwrap().visits.len() as i64)
    }

    async fn count_between(
        &self,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> anyhow::Result<i64> {
        let t = self.tables.lock().unwrap();
        Ok(t.visits
            .iter()
            .filter(|(_, at)| *at >= start && *at <= end)
            .count() as i64)
    }
}
