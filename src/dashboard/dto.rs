use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PieChartData {
    pub today: i64,
    pub this_week: i64,
    pub this_month: i64,
    pub this_year: i64,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_users: i64,
    pub total_dashboard_access: i64,
    pub pie_chart_data: PieChartData,
}
