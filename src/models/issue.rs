//! Normalized issue model and the canonical severity scale shared by every tool.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// -- Enums matching PostgreSQL --

/// Canonical 5-level severity every tool vocabulary is mapped onto.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "severity_level", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Info => "info",
        }
    }

    /// Critical and high findings count together in every rollup.
    pub fn is_high_or_critical(&self) -> bool {
        matches!(self, Self::Critical | Self::High)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// -- Issue --

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Issue {
    pub id: Uuid,
    pub application_id: Uuid,
    pub scan_type: String,
    pub severity: Option<Severity>,
    pub message: String,
    pub file_path: Option<String>,
    pub line_number: Option<i32>,
    pub metric_value: Option<f64>,
    pub scanned_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A normalized finding produced by a parser, not yet bound to an application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewIssue {
    pub severity: Option<Severity>,
    pub message: String,
    pub file_path: Option<String>,
    pub line_number: Option<i32>,
    pub metric_value: Option<f64>,
}

impl NewIssue {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity: Some(severity),
            message: message.into(),
            file_path: None,
            line_number: None,
            metric_value: None,
        }
    }

    pub fn at(mut self, file_path: Option<String>, line_number: Option<i32>) -> Self {
        self.file_path = file_path;
        self.line_number = line_number;
        self
    }

    pub fn with_metric(mut self, value: f64) -> Self {
        self.metric_value = Some(value);
        self
    }
}

/// Issue row joined with its application name, for cross-application feeds.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct IssueWithApp {
    pub id: Uuid,
    pub application_id: Uuid,
    pub app_name: String,
    pub scan_type: String,
    pub severity: Option<Severity>,
    pub message: String,
    pub file_path: Option<String>,
    pub line_number: Option<i32>,
    pub scanned_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_serializes_lowercase() {
        let json = serde_json::to_string(&Severity::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
        let parsed: Severity = serde_json::from_str("\"info\"").unwrap();
        assert_eq!(parsed, Severity::Info);
    }

    #[test]
    fn high_or_critical_grouping() {
        assert!(Severity::Critical.is_high_or_critical());
        assert!(Severity::High.is_high_or_critical());
        assert!(!Severity::Medium.is_high_or_critical());
        assert!(!Severity::Info.is_high_or_critical());
    }

    #[test]
    fn new_issue_builder() {
        let issue = NewIssue::new(Severity::Low, "Complexity (12.5): User#save")
            .at(Some("app/models/user.rb".to_string()), Some(3))
            .with_metric(12.5);
        assert_eq!(issue.severity, Some(Severity::Low));
        assert_eq!(issue.file_path.as_deref(), Some("app/models/user.rb"));
        assert_eq!(issue.line_number, Some(3));
        assert_eq!(issue.metric_value, Some(12.5));
    }
}
