use time::{Date, Duration, OffsetDateTime, UtcOffset};
use tracing::error;

use crate::{
    dashboard::dto::{PieChartData, StatsResponse},
    error::ApiResult,
    state::AppState,
};

/// Inclusive `[start, end]` range in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
}

impl Window {
    /// `days` whole days starting at midnight of `first`.
    fn days_from(first: Date, days: i64) -> Self {
        let start = first.midnight().assume_utc();
        Self {
            start,
            end: start + Duration::days(days) - Duration::nanoseconds(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Windows {
    pub today: Window,
    pub this_week: Window,
    pub this_month: Window,
    pub this_year: Window,
}

/// Calendar windows around `now`; weeks run Monday through Sunday.
pub fn windows(now: OffsetDateTime) -> Windows {
    let date = now.to_offset(UtcOffset::UTC).date();

    let monday = date - Duration::days(date.weekday().number_days_from_monday() as i64);
    let first_of_month = date - Duration::days(date.day() as i64 - 1);
    let first_of_year = date - Duration::days(date.ordinal() as i64 - 1);

    Windows {
        today: Window::days_from(date, 1),
        this_week: Window::days_from(monday, 7),
        this_month: Window::days_from(
            first_of_month,
            time::util::days_in_year_month(date.year(), date.month()) as i64,
        ),
        this_year: Window::days_from(first_of_year, time::util::days_in_year(date.year()) as i64),
    }
}

pub async fn stats(state: &AppState, user_id: i64) -> ApiResult<StatsResponse> {
    stats_at(state, user_id, OffsetDateTime::now_utc()).await
}

async fn stats_at(state: &AppState, user_id: i64, now: OffsetDateTime) -> ApiResult<StatsResponse> {
    if let Err(e) = state.visits.record(user_id, now).await {
        error!(error = %e, user_id, "failed to record dashboard visit");
    }

    let w = windows(now);
    let count = move |w: Window| state.visits.count_between(w.start, w.end);
    let pie_chart_data = PieChartData {
        today: count(w.today).await?,
        this_week: count(w.this_week).await?,
        this_month: count(w.this_month).await?,
        this_year: count(w.this_year).await?,
    };

    Ok(StatsResponse {
        total_users: state.users.count().await?,
        total_dashboard_access: state.visits.count_all().await?,
        pie_chart_data,
    })
}
