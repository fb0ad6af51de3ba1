//! Application registry: registration, lookup, listing and scan bookkeeping.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::errors::AppError;
use crate::models::application::{AppHealth, Application, ApplicationSummary, RegisterApplication};
use crate::models::pagination::{PagedResult, Pagination};

/// Filters for listing applications.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ApplicationFilters {
    pub status: Option<AppHealth>,
    pub search: Option<String>,
}

/// Register an application, or return the existing one with the same name.
///
/// The boolean is `true` when a new row was created.
pub async fn register(
    pool: &PgPool,
    input: &RegisterApplication,
) -> Result<(Application, bool), AppError> {
    input.validate()?;

    let inserted = sqlx::query_as::<_, Application>(
        r#"
        INSERT INTO applications (name, path)
        VALUES ($1, $2)
        ON CONFLICT (name) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(&input.name)
    .bind(&input.path)
    .fetch_optional(pool)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => AppError::Conflict(
            format!("Path '{}' is already registered to another application", input.path),
        ),
        _ => AppError::Database(e),
    })?;

    match inserted {
        Some(app) => Ok((app, true)),
        None => Ok((find_by_name(pool, &input.name).await?, false)),
    }
}

/// Find application by ID.
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Application, AppError> {
    sqlx::query_as::<_, Application>("SELECT * FROM applications WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Application not found".to_string()))
}

/// Find application by its unique name.
pub async fn find_by_name(pool: &PgPool, name: &str) -> Result<Application, AppError> {
    sqlx::query_as::<_, Application>("SELECT * FROM applications WHERE name = $1")
        .bind(name)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Application '{name}' not found")))
}

/// List applications with filters and pagination.
pub async fn list(
    pool: &PgPool,
    filters: &ApplicationFilters,
    pagination: &Pagination,
) -> Result<PagedResult<ApplicationSummary>, AppError> {
    let mut conditions: Vec<String> = Vec::new();
    let mut param_index = 0u32;

    if filters.status.is_some() {
        param_index += 1;
        conditions.push(format!("status = ${param_index}"));
    }
    if filters.search.is_some() {
        param_index += 1;
        conditions.push(format!("(name ILIKE ${param_index} OR path ILIKE ${param_index})"));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM applications {where_clause}");
    let data_sql = format!(
        "SELECT id, name, status, last_scanned_at FROM applications {where_clause} \
         ORDER BY name ASC LIMIT {} OFFSET {}",
        pagination.limit(),
        pagination.offset()
    );

    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    let mut data_query = sqlx::query_as::<_, ApplicationSummary>(&data_sql);

    if let Some(status) = filters.status {
        count_query = count_query.bind(status);
        data_query = data_query.bind(status);
    }
    if let Some(ref search) = filters.search {
        let pattern = format!("%{search}%");
        count_query = count_query.bind(pattern.clone());
        data_query = data_query.bind(pattern);
    }

    let total = count_query.fetch_one(pool).await?;
    let items = data_query.fetch_all(pool).await?;

    Ok(PagedResult::new(items, total, pagination))
}

/// Applications never scanned or last scanned before the staleness threshold.
pub async fn needs_scan(pool: &PgPool, stale_after: Duration) -> Result<Vec<Application>, AppError> {
    let cutoff = Utc::now() - stale_after;
    let apps = sqlx::query_as::<_, Application>(
        r#"
        SELECT * FROM applications
        WHERE last_scanned_at IS NULL OR last_scanned_at < $1
        ORDER BY last_scanned_at ASC NULLS FIRST, name ASC
        "#,
    )
    .bind(cutoff)
    .fetch_all(pool)
    .await?;
    Ok(apps)
}

/// Number of applications scanned within the last `within`.
pub async fn count_recently_scanned(pool: &PgPool, within: Duration) -> Result<i64, AppError> {
    let cutoff = Utc::now() - within;
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM applications WHERE last_scanned_at > $1",
    )
    .bind(cutoff)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Record the outcome of a cycle on the application row.
pub async fn update_scan_state(
    pool: &PgPool,
    id: Uuid,
    status: AppHealth,
    scanned_at: DateTime<Utc>,
) -> Result<(), AppError> {
    let result = sqlx::query(
        r#"
        UPDATE applications
        SET status = $2, last_scanned_at = $3, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(status)
    .bind(scanned_at)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Application not found".to_string()));
    }
    Ok(())
}
