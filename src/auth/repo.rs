use async_trait::async_trait;
use sqlx::PgPool;

use crate::auth::repo_types::{NewUser, User};
use crate::error::StoreError;

const USER_COLUMNS: &str =
    "id, name, email, password_hash, role_id, otp_code, otp_expires_at, created_at, updated_at";

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<User>>;
    /// `StoreError::Duplicate` when the email is already taken.
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;
    /// Drops the pending code, marking the account verified.
    async fn clear_otp(&self, id: i64) -> anyhow::Result<()>;
    async fn update_profile(&self, id: i64, name: &str, email: &str) -> Result<(), StoreError>;
    async fn update_password(&self, id: i64, password_hash: &str) -> anyhow::Result<()>;
    async fn count(&self) -> anyhow::Result<i64>;
}

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let created = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, email, password_hash, role_id, otp_code, otp_expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role_id)
        .bind(&user.otp_code)
        .bind(user.otp_expires_at)
        .fetch_one(&self.db)
        .await?;
        Ok(created)
    }

    async fn clear_otp(&self, id: i64) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
               SET otp_code = NULL, otp_expires_at = NULL, updated_at = now()
             WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn update_profile(&self, id: i64, name: &str, email: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET name = $1, email = $2, updated_at = now() WHERE id = $3")
            .bind(name)
            .bind(email)
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET password_hash = $1, updated_at = now() WHERE id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn count(&self) -> anyhow::Result<i64> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.db)
            .await?;
        Ok(n)
    }
}
