//! Scan target registry model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Overall health of an application, derived from its current issues.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "app_health", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AppHealth {
    Pending,
    Healthy,
    Warning,
    Critical,
}

impl AppHealth {
    /// Display colour used by dashboards.
    pub fn color(&self) -> &'static str {
        match self {
            Self::Healthy => "green",
            Self::Warning => "yellow",
            Self::Critical => "red",
            Self::Pending => "gray",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Application {
    pub id: Uuid,
    pub name: String,
    pub path: String,
    pub status: AppHealth,
    pub last_scanned_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Registration request issued by discovery.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegisterApplication {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1))]
    pub path: String,
}

/// Summary DTO for list views.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApplicationSummary {
    pub id: Uuid,
    pub name: String,
    pub status: AppHealth,
    pub last_scanned_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_serialization() {
        let json = serde_json::to_string(&AppHealth::Warning).unwrap();
        assert_eq!(json, "\"warning\"");
    }

    #[test]
    fn health_colors() {
        assert_eq!(AppHealth::Healthy.color(), "green");
        assert_eq!(AppHealth::Warning.color(), "yellow");
        assert_eq!(AppHealth::Critical.color(), "red");
        assert_eq!(AppHealth::Pending.color(), "gray");
    }

    #[test]
    fn register_requires_name_and_path() {
        let ok = RegisterApplication {
            name: "billing".to_string(),
            path: "/srv/apps/billing".to_string(),
        };
        assert!(ok.validate().is_ok());

        let missing = RegisterApplication {
            name: String::new(),
            path: String::new(),
        };
        let errors = missing.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));
        assert!(errors.field_errors().contains_key("path"));
    }
}
