//! Idempotent replacement of one scan type's issues.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::issue::NewIssue;
use crate::models::summary::Summary;
use crate::services::summary;

/// Replace every stored issue of `scan_type` for the application with
/// `issues`, then rebuild its summary.
///
/// Delete, insert and recompute share one transaction, so readers see either
/// the previous set or the new one. All new rows carry the same `scanned_at`.
///
/// Writers of the same (application, scan type) are serialized by a
/// transaction-scoped advisory lock.
pub async fn replace_issues(
    pool: &PgPool,
    application_id: Uuid,
    scan_type: &str,
    issues: &[NewIssue],
    metadata: serde_json::Value,
) -> Result<Summary, AppError> {
    let scanned_at = Utc::now();
    let mut tx = pool.begin().await?;

    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text || ':' || $2, 0))")
        .bind(application_id)
        .bind(scan_type)
        .execute(&mut *tx)
        .await?;

    let removed = sqlx::query("DELETE FROM issues WHERE application_id = $1 AND scan_type = $2")
        .bind(application_id)
        .bind(scan_type)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    for issue in issues {
        sqlx::query(
            r#"
            INSERT INTO issues (application_id, scan_type, severity, message,
                file_path, line_number, metric_value, scanned_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(application_id)
        .bind(scan_type)
        .bind(issue.severity)
        .bind(&issue.message)
        .bind(&issue.file_path)
        .bind(issue.line_number)
        .bind(issue.metric_value)
        .bind(scanned_at)
        .execute(&mut *tx)
        .await?;
    }

    let summary = summary::recompute(&mut *tx, application_id, scan_type, metadata, scanned_at).await?;
    tx.commit().await?;

    tracing::debug!(
        application_id = %application_id,
        scan_type,
        removed,
        inserted = issues.len(),
        "Replaced issues"
    );

    Ok(summary)
}
