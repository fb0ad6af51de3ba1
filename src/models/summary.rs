//! Per-(application, scan type) rollup model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Summary {
    pub id: Uuid,
    pub application_id: Uuid,
    pub scan_type: String,
    pub total_issues: i32,
    pub high_severity: i32,
    pub medium_severity: i32,
    pub low_severity: i32,
    pub average_score: Option<f64>,
    pub metadata: serde_json::Value,
    pub scanned_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
