//! Scan run audit trail.

use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::scan_run::{ScanRun, ScanRunStatus, ScannerFailure};

/// Runs shown per application.
pub const RECENT_RUNS: i64 = 10;

/// Open a run in the `running` state.
pub async fn start(
    pool: &PgPool,
    application_id: Uuid,
    scan_types: &[String],
) -> Result<ScanRun, AppError> {
    let run = sqlx::query_as::<_, ScanRun>(
        r#"
        INSERT INTO scan_runs (application_id, scan_types, status, started_at)
        VALUES ($1, $2, 'running', NOW())
        RETURNING *
        "#,
    )
    .bind(application_id)
    .bind(scan_types)
    .fetch_one(pool)
    .await?;
    Ok(run)
}

/// Close a run with its final status, issue count and adapter failures.
pub async fn finish(
    pool: &PgPool,
    run_id: Uuid,
    status: ScanRunStatus,
    total_issues: i32,
    failures: &[ScannerFailure],
) -> Result<ScanRun, AppError> {
    let details = serde_json::to_value(failures)
        .map_err(|e| AppError::Internal(format!("Failed to encode scan failures: {e}")))?;

    sqlx::query_as::<_, ScanRun>(
        r#"
        UPDATE scan_runs
        SET status = $2, total_issues = $3, error_details = $4, completed_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(run_id)
    .bind(status)
    .bind(total_issues)
    .bind(details)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Scan run not found".to_string()))
}

/// Latest runs of one application, newest first.
pub async fn recent_for_application(
    pool: &PgPool,
    application_id: Uuid,
) -> Result<Vec<ScanRun>, AppError> {
    let runs = sqlx::query_as::<_, ScanRun>(
        "SELECT * FROM scan_runs WHERE application_id = $1 ORDER BY started_at DESC LIMIT $2",
    )
    .bind(application_id)
    .bind(RECENT_RUNS)
    .fetch_all(pool)
    .await?;
    Ok(runs)
}
