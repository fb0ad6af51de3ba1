//! Dashboard statistics aggregation queries.

use serde::Serialize;
use sqlx::PgPool;

use crate::errors::AppError;
use crate::models::issue::IssueWithApp;
use crate::services::{application, issue};

/// Issues shown in the dashboard feed.
const RECENT_ISSUES: i64 = 10;

/// Window for the recently-scanned count.
const RECENT_SCAN_HOURS: i64 = 24;

/// Aggregated dashboard statistics for the overview page.
#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub total_apps: i64,
    pub critical_apps: i64,
    pub warning_apps: i64,
    pub recently_scanned_apps: i64,
    pub total_issues: i64,
    pub critical_or_high_issues: i64,
    pub recent_issues: Vec<IssueWithApp>,
}

#[derive(Debug, sqlx::FromRow)]
struct AppCountsRow {
    total: i64,
    critical: i64,
    warning: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct IssueCountsRow {
    total: i64,
    critical_or_high: i64,
}

/// Fetch all dashboard statistics in parallel queries.
pub async fn get_stats(pool: &PgPool) -> Result<DashboardStats, AppError> {
    let (apps, recently_scanned_apps, issues, recent_issues) = tokio::try_join!(
        fetch_app_counts(pool),
        application::count_recently_scanned(pool, chrono::Duration::hours(RECENT_SCAN_HOURS)),
        fetch_issue_counts(pool),
        issue::recent(pool, RECENT_ISSUES),
    )?;

    Ok(DashboardStats {
        total_apps: apps.total,
        critical_apps: apps.critical,
        warning_apps: apps.warning,
        recently_scanned_apps,
        total_issues: issues.total,
        critical_or_high_issues: issues.critical_or_high,
        recent_issues,
    })
}

async fn fetch_app_counts(pool: &PgPool) -> Result<AppCountsRow, AppError> {
    let row = sqlx::query_as::<_, AppCountsRow>(
        r#"
        SELECT
            COUNT(*) AS total,
            COALESCE(SUM(CASE WHEN status = 'critical' THEN 1 ELSE 0 END), 0) AS critical,
            COALESCE(SUM(CASE WHEN status = 'warning'  THEN 1 ELSE 0 END), 0) AS warning
        FROM applications
        "#,
    )
    .fetch_one(pool)
    .await?;
    Ok(row)
}

async fn fetch_issue_counts(pool: &PgPool) -> Result<IssueCountsRow, AppError> {
    let row = sqlx::query_as::<_, IssueCountsRow>(
        r#"
        SELECT
            COUNT(*) AS total,
            COALESCE(SUM(CASE WHEN severity IN ('critical', 'high') THEN 1 ELSE 0 END), 0) AS critical_or_high
        FROM issues
        "#,
    )
    .fetch_one(pool)
    .await?;
    Ok(row)
}
