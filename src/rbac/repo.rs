use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::StoreError;
use crate::rbac::repo_types::{Menu, MenuFields, Role, RoleFields};

#[async_trait]
pub trait RbacRepo: Send + Sync {
    async fn list_roles(&self) -> anyhow::Result<Vec<Role>>;
    async fn find_role(&self, id: i64) -> anyhow::Result<Option<Role>>;
    async fn find_role_by_name(&self, name: &str) -> anyhow::Result<Option<Role>>;
    /// `StoreError::Duplicate` when the name is already taken.
    async fn create_role(&self, fields: &RoleFields) -> Result<Role, StoreError>;
    async fn update_role(&self, id: i64, fields: &RoleFields)
        -> Result<Option<Role>, StoreError>;
    /// `false` when no such role existed. Permission rows cascade.
    async fn delete_role(&self, id: i64) -> anyhow::Result<bool>;

    async fn list_menus(&self) -> anyhow::Result<Vec<Menu>>;
    async fn find_menu(&self, id: i64) -> anyhow::Result<Option<Menu>>;
    async fn create_menu(&self, fields: &MenuFields) -> anyhow::Result<Menu>;
    async fn update_menu(&self, id: i64, fields: &MenuFields) -> anyhow::Result<Option<Menu>>;
    async fn delete_menu(&self, id: i64) -> anyhow::Result<bool>;

    /// Distinct menu ids granted to the role, ascending.
    async fn permission_menu_ids(&self, role_id: i64) -> anyhow::Result<Vec<i64>>;
    /// Drops every grant of the role, then inserts `menu_ids`.
    async fn replace_permissions(&self, role_id: i64, menu_ids: &[i64]) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct PgRbacRepo {
    db: PgPool,
}

impl PgRbacRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

const ROLE_COLUMNS: &str = "id, role_name, description, created_at, updated_at";
const MENU_COLUMNS: &str =
    "id, menu_name, parent_id, url, icon, menu_order, created_at, updated_at";

#[async_trait]
impl RbacRepo for PgRbacRepo {
    async fn list_roles(&self) -> anyhow::Result<Vec<Role>> {
        let rows = sqlx::query_as::<_, Role>(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles ORDER BY id"
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn find_role(&self, id: i64) -> anyhow::Result<Option<Role>> {
        let row = sqlx::query_as::<_, Role>(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn find_role_by_name(&self, name: &str) -> anyhow::Result<Option<Role>> {
        let row = sqlx::query_as::<_, Role>(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE role_name = $1"
        ))
        .bind(name)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn create_role(&self, fields: &RoleFields) -> Result<Role, StoreError> {
        let row = sqlx::query_as::<_, Role>(&format!(
            "INSERT INTO roles (role_name, description) VALUES ($1, $2) RETURNING {ROLE_COLUMNS}"
        ))
        .bind(&fields.role_name)
        .bind(&fields.description)
        .fetch_one(&self.db)
        .await?;
        Ok(row)
    }

    async fn update_role(
        &self,
        id: i64,
        fields: &RoleFields,
    ) -> Result<Option<Role>, StoreError> {
        let row = sqlx::query_as::<_, Role>(&format!(
            r#"
            UPDATE roles
               SET role_name = $1, description = $2, updated_at = now()
             WHERE id = $3
            RETURNING {ROLE_COLUMNS}
            "#
        ))
        .bind(&fields.role_name)
        .bind(&fields.description)
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn delete_role(&self, id: i64) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete role")?;
        Ok(res.rows_affected() > 0)
    }

    async fn list_menus(&self) -> anyhow::Result<Vec<Menu>> {
        let rows = sqlx::query_as::<_, Menu>(&format!(
            "SELECT {MENU_COLUMNS} FROM menus ORDER BY parent_id, menu_order, id"
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn find_menu(&self, id: i64) -> anyhow::Result<Option<Menu>> {
        let row = sqlx::query_as::<_, Menu>(&format!(
            "SELECT {MENU_COLUMNS} FROM menus WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn create_menu(&self, fields: &MenuFields) -> anyhow::Result<Menu> {
        let row = sqlx::query_as::<_, Menu>(&format!(
            r#"
            INSERT INTO menus (menu_name, parent_id, url, icon, menu_order)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {MENU_COLUMNS}
            "#
        ))
        .bind(&fields.menu_name)
        .bind(fields.parent_id)
        .bind(&fields.url)
        .bind(&fields.icon)
        .bind(fields.menu_order)
        .fetch_one(&self.db)
        .await
        .context("insert menu")?;
        Ok(row)
    }

    async fn update_menu(&self, id: i64, fields: &MenuFields) -> anyhow::Result<Option<Menu>> {
        let row = sqlx::query_as::<_, Menu>(&format!(
            r#"
            UPDATE menus
               SET menu_name = $1, parent_id = $2, url = $3, icon = $4,
                   menu_order = $5, updated_at = now()
             WHERE id = $6
            RETURNING {MENU_COLUMNS}
            "#
        ))
        .bind(&fields.menu_name)
        .bind(fields.parent_id)
        .bind(&fields.url)
        .bind(&fields.icon)
        .bind(fields.menu_order)
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("update menu")?;
        Ok(row)
    }

    async fn delete_menu(&self, id: i64) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM menus WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete menu")?;
        Ok(res.rows_affected() > 0)
    }

    async fn permission_menu_ids(&self, role_id: i64) -> anyhow::Result<Vec<i64>> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            "SELECT menu_id FROM role_permissions WHERE role_id = $1 ORDER BY menu_id",
        )
        .bind(role_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn replace_permissions(&self, role_id: i64, menu_ids: &[i64]) -> anyhow::Result<()> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
            .bind(role_id)
            .execute(&mut *tx)
            .await
            .context("clear permissions")?;
        if !menu_ids.is_empty() {
            sqlx::query(
                r#"
                INSERT INTO role_permissions (role_id, menu_id)
                SELECT $1, UNNEST($2::BIGINT[])
                "#,
            )
            .bind(role_id)
            .bind(menu_ids)
            .execute(&mut *tx)
            .await
            .context("insert permissions")?;
        }
        tx.commit().await.context("commit tx")?;
        Ok(())
    }
}
