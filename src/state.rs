use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing::warn;

use crate::auth::jwt::{JwtKeys, TokenError};
use crate::auth::repo::{PgUserRepo, UserRepo};
use crate::config::AppConfig;
use crate::dashboard::repo::{PgVisitRepo, VisitRepo};
use crate::mailer::{self, Mailer};
use crate::rbac::repo::{PgRbacRepo, RbacRepo};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepo>,
    pub rbac: Arc<dyn RbacRepo>,
    pub visits: Arc<dyn VisitRepo>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
            warn!(error = %e, "migration failed; continuing");
        }

        if config.jwt.secret.is_none() {
            warn!("JWT_SECRET is not set; login and protected routes will fail");
        }
        if config.mail.api_url.is_none() {
            warn!("MAIL_API_URL is not set; OTP emails will not be delivered");
        }

        let mailer: Arc<dyn Mailer> = Arc::from(mailer::from_config(&config.mail));
        Ok(Self {
            users: Arc::new(PgUserRepo::new(db.clone())),
            rbac: Arc::new(PgRbacRepo::new(db.clone())),
            visits: Arc::new(PgVisitRepo::new(db)),
            mailer,
            config,
        })
    }

    /// Signing keys built from the injected config on demand.
    pub fn jwt_keys(&self) -> Result<JwtKeys, TokenError> {
        JwtKeys::from_config(&self.config.jwt)
    }
}

#[cfg(test)]
impl AppState {
    pub fn from_parts(
        config: AppConfig,
        store: Arc<crate::memory::MemoryStore>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            users: store.clone(),
            rbac: store.clone(),
            visits: store,
            mailer,
        }
    }

    pub fn fake() -> Self {
        Self::from_parts(
            AppConfig::for_tests(),
            Arc::new(crate::memory::MemoryStore::default()),
            Arc::new(crate::mailer::testing::RecordingMailer::default()),
        )
    }
}
