use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;

/// Append-only log of dashboard visits.
#[async_trait]
pub trait VisitRepo: Send + Sync {
    async fn record(&self, user_id: i64, at: OffsetDateTime) -> anyhow::Result<()>;
    async fn count_all(&self) -> anyhow::Result<i64>;
    /// Visits with `start <= visited_at <= end`.
    async fn count_between(&self, start: OffsetDateTime, end: OffsetDateTime)
        -> anyhow::Result<i64>;
}

#[derive(Clone)]
pub struct PgVisitRepo {
    db: PgPool,
}

impl PgVisitRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl VisitRepo for PgVisitRepo {
    async fn record(&self, user_id: i64, at: OffsetDateTime) -> anyhow::Result<()> {
        sqlx::query("INSERT INTO dashboard_visits (user_id, visited_at) VALUES ($1, $2)")
            .bind(user_id)
            .bind(at)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn count_all(&self) -> anyhow::Result<i64> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM dashboard_visits")
            .fetch_one(&self.db)
            .await?;
        Ok(n)
    }

    async fn count_between(
        &self,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> anyhow::Result<i64> {
        let (n,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM dashboard_visits WHERE visited_at >= $1 AND visited_at <= $2",
        )
        .bind(start)
        .bind(end)
        .fetch_one(&self.db)
        .await?;
        Ok(n)
    }
}
