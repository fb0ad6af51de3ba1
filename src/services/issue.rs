//! Read side of the issue store.

use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::issue::{Issue, IssueWithApp, Severity};
use crate::models::pagination::{PagedResult, Pagination};

/// Filters for listing an application's issues.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct IssueFilters {
    pub scan_type: Option<String>,
    pub severity: Option<Severity>,
}

/// Issues of one application, most recent first.
pub async fn list_for_application(
    pool: &PgPool,
    application_id: Uuid,
    filters: &IssueFilters,
    pagination: &Pagination,
) -> Result<PagedResult<Issue>, AppError> {
    let mut conditions = vec!["application_id = $1".to_string()];
    let mut param_index = 1u32;

    if filters.scan_type.is_some() {
        param_index += 1;
        conditions.push(format!("scan_type = ${param_index}"));
    }
    if filters.severity.is_some() {
        param_index += 1;
        conditions.push(format!("severity = ${param_index}"));
    }

    let where_clause = conditions.join(" AND ");
    let count_sql = format!("SELECT COUNT(*) FROM issues WHERE {where_clause}");
    let data_sql = format!(
        "SELECT * FROM issues WHERE {where_clause} \
         ORDER BY scanned_at DESC, created_at DESC, id ASC LIMIT {} OFFSET {}",
        pagination.limit(),
        pagination.offset()
    );

    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql).bind(application_id);
    let mut data_query = sqlx::query_as::<_, Issue>(&data_sql).bind(application_id);

    if let Some(ref scan_type) = filters.scan_type {
        count_query = count_query.bind(scan_type);
        data_query = data_query.bind(scan_type);
    }
    if let Some(severity) = filters.severity {
        count_query = count_query.bind(severity);
        data_query = data_query.bind(severity);
    }

    let total = count_query.fetch_one(pool).await?;
    let items = data_query.fetch_all(pool).await?;

    Ok(PagedResult::new(items, total, pagination))
}

/// Number of issues currently stored for an application, info included.
pub async fn count_for_application(pool: &PgPool, application_id: Uuid) -> Result<i64, AppError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM issues WHERE application_id = $1")
        .bind(application_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Most recent issues across all applications.
pub async fn recent(pool: &PgPool, limit: i64) -> Result<Vec<IssueWithApp>, AppError> {
    let issues = sqlx::query_as::<_, IssueWithApp>(
        r#"
        SELECT i.id, i.application_id, a.name AS app_name, i.scan_type, i.severity,
            i.message, i.file_path, i.line_number, i.scanned_at
        FROM issues i
        JOIN applications a ON a.id = i.application_id
        ORDER BY i.scanned_at DESC, i.created_at DESC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(issues)
}
