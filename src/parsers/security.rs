//! Brakeman JSON report normalizer.
//!
//! Brakeman reports a confidence level rather than a severity; the
//! confidence is what drives the canonical severity.

use serde::Deserialize;

use crate::models::issue::NewIssue;
use crate::parsers::severity::SECURITY_CONFIDENCE;
use crate::parsers::{line_number, Normalizer, ParseError, ParseResult};

#[derive(Default)]
pub struct SecurityNormalizer;

impl SecurityNormalizer {
    pub fn new() -> Self {
        Self
    }
}

impl Normalizer for SecurityNormalizer {
    fn normalize(&self, data: &[u8]) -> Result<ParseResult, anyhow::Error> {
        let report: SecurityReport = serde_json::from_slice(data)?;
        let mut result = ParseResult::default();

        for (i, warning) in report.warnings.into_iter().enumerate() {
            match self.convert_warning(warning, i) {
                Ok(issue) => result.issues.push(issue),
                Err(err) => result.errors.push(err),
            }
        }

        if let Some(info) = report.scan_info {
            if let Some(version) = info.brakeman_version {
                result
                    .metadata
                    .insert("tool_version".to_string(), version.into());
            }
            if let Some(rails) = info.rails_version {
                result
                    .metadata
                    .insert("rails_version".to_string(), rails.into());
            }
        }

        Ok(result)
    }

    fn scan_type(&self) -> &'static str {
        "security"
    }
}

#[derive(Debug, Deserialize)]
struct SecurityReport {
    scan_info: Option<ScanInfo>,
    #[serde(default)]
    warnings: Vec<SecurityWarning>,
}

#[derive(Debug, Deserialize)]
struct ScanInfo {
    brakeman_version: Option<String>,
    rails_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SecurityWarning {
    warning_type: Option<String>,
    message: Option<String>,
    file: Option<String>,
    line: Option<i64>,
    confidence: Option<String>,
}

impl SecurityNormalizer {
    fn convert_warning(
        &self,
        warning: SecurityWarning,
        index: usize,
    ) -> Result<NewIssue, ParseError> {
        let warning_type = warning.warning_type.unwrap_or_default();
        let description = warning.message.unwrap_or_default();

        if warning_type.is_empty() && description.is_empty() {
            return Err(ParseError {
                record_index: index,
                field: "warning_type".to_string(),
                message: "Warning has neither a type nor a message".to_string(),
            });
        }

        let message = match (warning_type.is_empty(), description.is_empty()) {
            (false, false) => format!("{warning_type}: {description}"),
            (true, _) => description,
            (_, true) => warning_type,
        };

        Ok(NewIssue::new(
            SECURITY_CONFIDENCE.map_opt(warning.confidence.as_deref()),
            message,
        )
        .at(warning.file, line_number(warning.line)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::issue::Severity;

    #[test]
    fn parses_all_warnings() {
        let normalizer = SecurityNormalizer::new();
        let data = include_bytes!("../../tests/fixtures/brakeman_sample.json");
        let result = normalizer.normalize(data).unwrap();
        assert_eq!(result.issues.len(), 3);
        assert!(result.errors.is_empty());
        assert_eq!(result.metadata["tool_version"], "6.2.1");
    }

    #[test]
    fn confidence_drives_severity() {
        let normalizer = SecurityNormalizer::new();
        let data = include_bytes!("../../tests/fixtures/brakeman_sample.json");
        let result = normalizer.normalize(data).unwrap();
        let severities: Vec<_> = result.issues.iter().map(|i| i.severity).collect();
        assert_eq!(
            severities,
            vec![
                Some(Severity::Critical),
                Some(Severity::High),
                Some(Severity::Medium),
            ]
        );
    }

    #[test]
    fn message_and_location() {
        let normalizer = SecurityNormalizer::new();
        let data = include_bytes!("../../tests/fixtures/brakeman_sample.json");
        let result = normalizer.normalize(data).unwrap();
        let sqli = &result.issues[0];
        assert_eq!(sqli.message, "SQL Injection: Possible SQL injection");
        assert_eq!(sqli.file_path.as_deref(), Some("app/models/invoice.rb"));
        assert_eq!(sqli.line_number, Some(27));
        assert_eq!(result.issues[2].line_number, None);
    }

    #[test]
    fn missing_confidence_is_low() {
        let normalizer = SecurityNormalizer::new();
        let data = br#"{"warnings":[{"warning_type":"Redirect","message":"Possible unprotected redirect","file":"app/c.rb","line":3}]}"#;
        let result = normalizer.normalize(data).unwrap();
        assert_eq!(result.issues[0].severity, Some(Severity::Low));
    }

    #[test]
    fn empty_warning_is_reported() {
        let normalizer = SecurityNormalizer::new();
        let result = normalizer.normalize(br#"{"warnings":[{"file":"x.rb"}]}"#).unwrap();
        assert!(result.issues.is_empty());
        assert_eq!(result.errors.len(), 1);
    }
}
