//! Application health classification.

use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::application::AppHealth;

/// Medium issues tolerated before an application is flagged.
pub const MEDIUM_WARNING_THRESHOLD: i64 = 5;

/// Severity counts over an application's current issue population.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, sqlx::FromRow)]
pub struct SeverityCounts {
    pub high_or_critical: i64,
    pub medium: i64,
}

/// Any critical or high issue makes the application critical; more than
/// five medium issues make it a warning.
pub fn classify(counts: &SeverityCounts) -> AppHealth {
    if counts.high_or_critical > 0 {
        AppHealth::Critical
    } else if counts.medium > MEDIUM_WARNING_THRESHOLD {
        AppHealth::Warning
    } else {
        AppHealth::Healthy
    }
}

/// Count current issues across every scan type of one application.
pub async fn current_counts(pool: &PgPool, application_id: Uuid) -> Result<SeverityCounts, AppError> {
    let counts = sqlx::query_as::<_, SeverityCounts>(
        r#"
        SELECT
            COALESCE(SUM(CASE WHEN severity IN ('critical', 'high') THEN 1 ELSE 0 END), 0) AS high_or_critical,
            COALESCE(SUM(CASE WHEN severity = 'medium' THEN 1 ELSE 0 END), 0) AS medium
        FROM issues
        WHERE application_id = $1
        "#,
    )
    .bind(application_id)
    .fetch_one(pool)
    .await?;
    Ok(counts)
}

/// Classify an application from the issues currently stored for it.
pub async fn evaluate(pool: &PgPool, application_id: Uuid) -> Result<AppHealth, AppError> {
    let counts = current_counts(pool, application_id).await?;
    Ok(classify(&counts))
}
