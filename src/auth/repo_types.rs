use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,                          // trimmed and lowercased
    #[serde(skip_serializing)]
    pub password_hash: String,                  // Argon2 PHC string
    pub role_id: i64,
    #[serde(skip_serializing)]
    pub otp_code: Option<String>,               // set while unverified
    #[serde(skip_serializing)]
    pub otp_expires_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl User {
    /// A pending OTP code means the email address was never confirmed.
    pub fn is_verified(&self) -> bool {
        self.otp_code.is_none()
    }
}

/// Insert payload for a freshly registered account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role_id: i64,
    pub otp_code: String,
    pub otp_expires_at: OffsetDateTime,
}
