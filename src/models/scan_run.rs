//! Scan run audit model.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "scan_run_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ScanRunStatus {
    Running,
    Completed,
    CompletedWithErrors,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScanRun {
    pub id: Uuid,
    pub application_id: Uuid,
    pub scan_types: Vec<String>,
    pub status: ScanRunStatus,
    pub total_issues: Option<i32>,
    pub error_details: serde_json::Value,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ScanRun {
    /// Wall-clock length of a finished run.
    pub fn duration(&self) -> Option<Duration> {
        self.completed_at.map(|done| done - self.started_at)
    }
}

/// One adapter failure recorded on the run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScannerFailure {
    pub scanner: String,
    pub message: String,
}
