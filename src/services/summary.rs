//! Per-(application, scan type) rollups.
//!
//! A summary is always derived from the issue rows it describes; `recompute`
//! runs on the same connection (and transaction) that just replaced them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::application::AppHealth;
use crate::models::issue::Severity;
use crate::models::summary::Summary;
use crate::parsers::round2;
use crate::services::health::{self, SeverityCounts};

/// Counts and average derived from one scan type's issues.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tally {
    pub total_issues: i32,
    pub high_severity: i32,
    pub medium_severity: i32,
    pub low_severity: i32,
    pub average_score: Option<f64>,
}

/// Fold `(severity, metric)` pairs into a tally.
///
/// Info issues are excluded from the total; issues without a severity are
/// counted in it but in no bucket. The average covers every issue carrying
/// a metric.
pub fn tally<I>(issues: I) -> Tally
where
    I: IntoIterator<Item = (Option<Severity>, Option<f64>)>,
{
    let mut t = Tally::default();
    let mut metric_sum = 0.0;
    let mut metric_count = 0u32;

    for (severity, metric) in issues {
        match severity {
            Some(Severity::Info) => {}
            Some(s) if s.is_high_or_critical() => {
                t.total_issues += 1;
                t.high_severity += 1;
            }
            Some(Severity::Medium) => {
                t.total_issues += 1;
                t.medium_severity += 1;
            }
            Some(_) => {
                t.total_issues += 1;
                t.low_severity += 1;
            }
            None => t.total_issues += 1,
        }
        if let Some(value) = metric {
            metric_sum += value;
            metric_count += 1;
        }
    }

    if metric_count > 0 {
        t.average_score = Some(round2(metric_sum / f64::from(metric_count)));
    }
    t
}

/// Rebuild the summary row for one scan type from its current issues.
pub async fn recompute(
    conn: &mut PgConnection,
    application_id: Uuid,
    scan_type: &str,
    metadata: serde_json::Value,
    scanned_at: DateTime<Utc>,
) -> Result<Summary, AppError> {
    let rows = sqlx::query_as::<_, (Option<Severity>, Option<f64>)>(
        "SELECT severity, metric_value FROM issues WHERE application_id = $1 AND scan_type = $2",
    )
    .bind(application_id)
    .bind(scan_type)
    .fetch_all(&mut *conn)
    .await?;

    let t = tally(rows);

    let summary = sqlx::query_as::<_, Summary>(
        r#"
        INSERT INTO summaries (application_id, scan_type, total_issues, high_severity,
            medium_severity, low_severity, average_score, metadata, scanned_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (application_id, scan_type) DO UPDATE SET
            total_issues = EXCLUDED.total_issues,
            high_severity = EXCLUDED.high_severity,
            medium_severity = EXCLUDED.medium_severity,
            low_severity = EXCLUDED.low_severity,
            average_score = EXCLUDED.average_score,
            metadata = EXCLUDED.metadata,
            scanned_at = EXCLUDED.scanned_at,
            updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(application_id)
    .bind(scan_type)
    .bind(t.total_issues)
    .bind(t.high_severity)
    .bind(t.medium_severity)
    .bind(t.low_severity)
    .bind(t.average_score)
    .bind(&metadata)
    .bind(scanned_at)
    .fetch_one(&mut *conn)
    .await?;

    Ok(summary)
}

/// Summary with the display status derived by the application classifier.
#[derive(Debug, Serialize)]
pub struct SummaryView {
    #[serde(flatten)]
    pub summary: Summary,
    pub status: AppHealth,
    pub color: &'static str,
}

impl From<Summary> for SummaryView {
    fn from(summary: Summary) -> Self {
        let status = health::classify(&SeverityCounts {
            high_or_critical: i64::from(summary.high_severity),
            medium: i64::from(summary.medium_severity),
        });
        Self {
            summary,
            status,
            color: status.color(),
        }
    }
}

/// Latest summary per scan type for one application.
pub async fn latest_by_type(
    pool: &PgPool,
    application_id: Uuid,
) -> Result<BTreeMap<String, SummaryView>, AppError> {
    let rows = sqlx::query_as::<_, Summary>(
        "SELECT * FROM summaries WHERE application_id = $1 ORDER BY scan_type ASC",
    )
    .bind(application_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|s| (s.scan_type.clone(), SummaryView::from(s)))
        .collect())
}
